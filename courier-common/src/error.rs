//! Error types for the courier-common crate.

use thiserror::Error;

/// A message record rejected at the boundary before it reaches the engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// A required field is missing or blank.
    #[error("Message {0} is required")]
    MissingField(&'static str),
}
