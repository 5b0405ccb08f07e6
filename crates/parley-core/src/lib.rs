pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::ParleyConfig;
pub use error::{ParleyError, Result};
pub use protocol::{ClientEvent, ServerEvent};
pub use types::*;
