#[cfg(feature = "cli")]
pub mod cli;
pub mod resolutions;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};
pub use toml_config::{ApiConfig, ImportConfig, OutputConfig, SessionConfig};
pub use resolutions::parse_resolutions;
