//! Response bodies returned by the HTTP API.

pub mod files;
