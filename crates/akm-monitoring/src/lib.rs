#![deny(missing_docs)]

//! # akm-monitoring: Metrics Endpoints of Managed Systems
//!
//! [`ExporterConfig::port`] extracts the port a metrics exporter serves on.
//! [`EndpointInfo`] is the flat descriptor reported to callers, and
//! [`EndpointDirectory`] answers endpoint queries per organization.

pub mod endpoint;
pub mod exporter;

pub use endpoint::{EndpointDirectory, EndpointInfo};
pub use exporter::ExporterConfig;
