//! Types shared between the courier delivery engine and its callers.

pub mod audit;
pub mod error;
pub mod logging;
pub mod message;
pub mod outcome;

pub use error::InputError;
pub use message::Message;
pub use outcome::{DeliveryOutcome, NO_STATUS_FOUND};
pub use tracing;
