//! Identifiers and error types shared across the data model

pub mod errors;
pub mod identifiers;
