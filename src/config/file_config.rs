use crate::forum::CategorySeed;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub media_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub public_base_url: Option<String>,
    pub auth_token_retention_days: Option<u64>,
    pub prune_interval_hours: Option<u64>,

    pub avatars: Option<AvatarsConfig>,
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AvatarsConfig {
    pub max_size_bytes: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
