//! # Exporter Configuration
//!
//! A metrics exporter is described by its name, the address it listens on
//! and its command-line arguments. The port is taken from the arguments
//! when they carry a listen flag, otherwise from the address.
//!
//! ```text
//! args:    --web.listen-address=":9100"        → 9100
//!          --telemetry.address=0.0.0.0:9187    → 9187
//! address: localhost:9100                      → 9100
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn arg_port_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"--(?:telemetry\.address|web\.listen-address)=["']?[^\s"':]*:([0-9]+)["']?"#)
            .ok()
    })
    .as_ref()
}

fn address_port_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([0-9]+)$").ok()).as_ref()
}

/// The digits captured by `re`, if it matched. The inner `None` marks a
/// match whose port does not fit in 16 bits.
fn capture_port(re: Option<&Regex>, input: Option<&str>) -> Option<Option<u16>> {
    let digits = re?.captures(input?)?.get(1)?;
    Some(digits.as_str().parse().ok())
}

/// A metrics exporter running on a managed system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Exporter name, e.g. `node_exporter`.
    pub name: String,
    /// Listen address, e.g. `:9100` or `host:9100`.
    #[serde(default)]
    pub address: Option<String>,
    /// Command-line arguments.
    #[serde(default)]
    pub args: Option<String>,
}

impl ExporterConfig {
    /// Exporter with the given name, address and arguments.
    pub fn new(
        name: impl Into<String>,
        address: Option<impl Into<String>>,
        args: Option<impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.map(Into::into),
            args: args.map(Into::into),
        }
    }

    /// Port the exporter serves metrics on.
    ///
    /// A listen flag in the arguments takes precedence over the address:
    /// once the flag matches, the address is never consulted. `None` when
    /// the chosen source does not yield a port that fits in 16 bits.
    pub fn port(&self) -> Option<u16> {
        match capture_port(arg_port_regex(), self.args.as_deref()) {
            Some(from_args) => from_args,
            None => capture_port(address_port_regex(), self.address.as_deref()).flatten(),
        }
    }
}
