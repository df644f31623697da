//! Attrgate - attribute-based access decisions
//!
//! Decides whether a subject, described by asserted identity attributes, may
//! use a relying party, and prepares the diagnostics shown when it may not.
//! The decision core lives in [`authorize`]; the other modules wire it into
//! an HTTP service.

pub mod authorize;
pub mod errors;
pub mod reauth;
pub mod settings;
pub mod state;
pub mod web;
