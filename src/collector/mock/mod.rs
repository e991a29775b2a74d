//! Mock filesystem implementations for testing.
//!
//! This module provides `MockFs` and pre-built scenarios for testing
//! collectors without real runit service trees or `/proc` access.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
