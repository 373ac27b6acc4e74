pub mod controller;

pub use controller::{Courier, Dispatch, load_messages};
