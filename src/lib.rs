pub mod constants;
pub mod controller;
pub mod decoder;
pub mod documents;
pub mod identity;
pub mod interpret;
pub mod logging;
pub mod reducer;
pub mod session;
pub mod str_utils;
pub mod types;

pub use controller::{RunRequest, StreamController, StreamPhase};
pub use types::*;
