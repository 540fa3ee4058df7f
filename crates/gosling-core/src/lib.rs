pub mod config;
pub mod error;

pub use config::{Dialect, EnvVars, FileConfig, Overrides, Settings};
pub use error::{GoslingError, Result};
