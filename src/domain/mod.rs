//! Domain layer containing the event vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (event capability, IDs, timestamps, errors)

pub mod foundation;
