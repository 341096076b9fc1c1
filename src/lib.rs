//! # kateline
//!
//! A line-by-line syntax highlighting tokenizer driven by Kate grammar definitions.
//!
//! The core lives in [syntax]: load a grammar once, then feed it lines together with the
//! context stack returned for the previous line. [config] holds the layered configuration
//! used by the registry and the `kateline` binary.
//!
//! ## Testing
//!
//! Verified grammar fixtures live in `samples/` and are reached through the
//! [testing module](crate::testing).

pub mod config;
pub mod syntax;
pub mod testing;
