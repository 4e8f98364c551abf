//! Audit journal module
//!
//! Records one line per anonymization call with hashed identifiers.

pub mod logger;

pub use logger::AuditLogger;
