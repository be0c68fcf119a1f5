pub mod config;
pub mod error;
pub mod types;

pub use config::VidlensConfig;
pub use error::{Result, VidlensError};
pub use types::*;
