//! # Configuration
//!
//! The tool catalog and the engine settings come from one TOML file
//! (`config/toolwire.toml` by default). Raw serde shapes are validated and
//! converted into [`Catalog`] and [`EngineSettings`]; transform names are
//! resolved against a [`TransformRegistry`].

mod error;
mod loader;
mod raw;
mod settings;
mod transforms;

pub use crate::constants::CONFIG_PATH;
pub use error::ConfigError;
pub use loader::{ensure_env_loaded, load_config, load_config_with, parse_config};
pub use settings::EngineSettings;
pub use transforms::TransformRegistry;

use crate::domain::catalog::Catalog;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: EngineSettings,
    pub catalog: Catalog,
}
