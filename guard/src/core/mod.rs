//! Deterministic, pure logic for guard evaluation.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (file bytes, parsed keys, loaded artifacts) and return deterministic
//! outputs suitable for tests.

pub mod format;
pub mod hash;
pub mod keys;
pub mod mechanism;
pub mod parse;
pub mod policy;
pub mod template;
pub mod types;
