//! Core business logic for carpool-rs.

pub mod services;

pub use services::*;
