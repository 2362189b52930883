pub mod application;
mod error;
pub mod settings;

pub use application::{HubEvent, RelayHub, ServerStatus};
pub use error::Error;
