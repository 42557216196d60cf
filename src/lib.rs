//! Master Patient Index (MPI)
//!
//! A deterministic record-linkage engine for healthcare patient identity:
//! given an incoming demographic record, decide whether it belongs to a
//! person already in the index or should start a new one.
//!
//! This crate covers:
//! - PII canonicalization and typed feature extraction (`pii`)
//! - Blocking-key derivation for candidate narrowing (`blocking`)
//! - Matcher functions and matching rules (`matching`)
//! - Algorithm configuration, including the bundled DIBBS algorithms (`algorithm`)
//! - The MPI store, in-memory and PostgreSQL-backed (`store`)
//! - The multi-pass linkage engine (`engine`)
//! - Linkage-key hashing (`hash`) and offline scoring against a ground truth (`evaluation`)
//!
//! HTTP handlers, CLI entrypoints, config-file loading, and FHIR adapters
//! are deliberately out of scope: this crate is a library any of those can
//! embed, not a service in itself.

pub mod algorithm;
pub mod blocking;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod hash;
pub mod matching;
pub mod observability;
pub mod pii;
pub mod store;

pub use error::{Error, Result};
