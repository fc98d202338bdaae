//! HTTP API modules.

pub mod search;
