//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! strings and values and return deterministic outputs suitable for tests.

pub mod numbering;
pub mod state;
pub mod style;
pub mod text;
pub mod types;
pub mod validator;
