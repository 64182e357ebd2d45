#![deny(missing_docs)]

//! # akm-state: Activation-Key Policy Engine
//!
//! - [`policy::PolicyEngine`]: one transition per operation, each
//!   enumerating its own cascades.
//! - [`repository::KeyRepository`]: organization-scoped in-memory storage
//!   with one lock per organization and the single-default rule.
//! - [`service::ActivationKeyService`]: role check, lookup, transition on
//!   copies, all-or-nothing commit.
//!
//! ## Key Lifecycle
//!
//! ```text
//! create ──▶ Active ──(any mutation)──▶ Active ──▶ delete (terminal)
//! ```
//!
//! A deleted key is gone: a later lookup fails with
//! [`PolicyError::NotFound`].

pub mod details;
pub mod error;
pub mod key;
pub mod policy;
pub mod repository;
pub mod service;

pub use details::{KeyDetailsUpdate, NewKey, PackageSpec};
pub use error::PolicyError;
pub use key::{ActivatedSystem, ActivationKey, KeyDetails};
pub use policy::PolicyEngine;
pub use repository::{KeyRepository, OrgKeyTable};
pub use service::ActivationKeyService;
