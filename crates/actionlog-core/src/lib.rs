pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::ActionLogConfig;
pub use error::{ActionLogError, Result};
pub use events::{ChangeEvent, EventKind};
pub use types::*;
