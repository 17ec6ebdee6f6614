//! Shared utilities for Tether.
//!
//! This crate provides the cross-cutting pieces used by the other Tether
//! crates: the unified error type and a couple of filesystem helpers.

pub mod errors;
pub mod fs;
