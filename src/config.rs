//! Global configuration management
//! This module handles the loading and parsing of configuration files
//! and environment variables for the application.
//! Usage:
//! ```rust
//! use markitup::config::SETTINGS;
//! let cfg = &*SETTINGS;
//! println!("{:?}", cfg.single_output_dir);
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{env, fs, path::PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Output folder for single-file conversions.
    pub single_output_dir: String,
    /// Suffix appended to a folder's name to form its output folder.
    pub folder_suffix: String,
    /// Directory for extracted images. Empty means images are embedded as base64.
    pub image_path: PathBuf,
    pub use_pandoc: bool,
    pub pandoc_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            single_output_dir: "arquivos_convertidos".to_string(),
            folder_suffix: "_convertido".to_string(),
            image_path: PathBuf::new(),
            use_pandoc: false,
            pandoc_path: "pandoc".to_string(),
        }
    }
}

pub static SETTINGS: Lazy<Settings> = Lazy::new(|| {
    Settings::new().unwrap_or_else(|e| {
        log::warn!("Failed to load configuration, using defaults: {}", e);
        Settings::default()
    })
});

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // 1. built-in default config
        let mut builder = Config::builder().add_source(File::from_str(
            include_str!("../Config.toml"),
            FileFormat::Toml,
        ));

        // 2. try to load external config file next to the executable
        if let Ok(exe_path) = env::current_exe() {
            if let Some(dir) = exe_path.parent() {
                let external = dir.join("Config.toml");
                if fs::metadata(&external).is_ok() {
                    log::debug!("loading external config {}", external.display());
                    builder = builder.add_source(File::from(external).required(false));
                }
            }
        }

        // 3. load environment variables
        builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Whether extracted images should be written to disk instead of inlined.
    pub fn saves_images(&self) -> bool {
        !self.image_path.as_os_str().is_empty()
    }
}
