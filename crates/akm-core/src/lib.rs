#![deny(missing_docs)]

//! # akm-core: Foundational Types for the Activation-Key Engine
//!
//! Every other crate in the workspace depends on this one. It has no
//! internal dependencies: only `serde`, `thiserror`, `chrono` and
//! `rand_core` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** An [`OrgId`] cannot be passed
//!    where a [`SystemId`] is expected, and a [`KeyToken`] is never a bare
//!    `String`.
//!
//! 2. **Organization scoping is explicit.** Every operation receives a
//!    [`Caller`] carrying the organization it acts in. Nothing in the
//!    workspace looks data up without one.
//!
//! 3. **[`ValidationError`] for input shape.** Format problems with caller
//!    input are rejected at construction with the offending value attached.

pub mod caller;
pub mod error;
pub mod identity;
pub mod temporal;

pub use caller::{Caller, Role};
pub use error::ValidationError;
pub use identity::{KeyToken, OrgId, PackageNameId, ServerGroupId, SystemId};
pub use temporal::Timestamp;
