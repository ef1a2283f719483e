//! Axum route handlers.

pub mod files;
