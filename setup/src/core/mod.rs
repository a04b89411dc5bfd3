//! Deterministic, pure logic shared by setup steps and pipelines.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod env_dump;
pub mod env_state;
pub mod export;
pub mod types;
