use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use publish_core::config::{config_root, TransformOptions};
use serde::Deserialize;

const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`; every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub log_level: String,
    pub transform: TransformOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            transform: TransformOptions::default(),
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    config_root().map(|dir| dir.join(CONFIG_FILE))
}

impl Settings {
    /// An explicit path must exist; the default location may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
