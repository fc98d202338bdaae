//! Common library exports shared between the API surface and the backend.

extern crate serde;


pub mod multilingual;
pub mod search_query;
pub mod search_result;
