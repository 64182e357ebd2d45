//! Route modules, one per method namespace.

pub mod activation_keys;
pub mod monitoring;
