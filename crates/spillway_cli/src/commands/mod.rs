//! CLI command implementations.

pub mod pipe;
