pub mod config;
pub mod logging;

pub use config::{load_dotenv, Config, ConfigError};
