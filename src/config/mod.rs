mod file_config;

pub use file_config::{AvatarsConfig, FileConfig};

use crate::forum::CategorySeed;
use crate::server::RequestsLoggingLevel;
use crate::storage::DEFAULT_AVATAR_MAX_SIZE_BYTES;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub public_base_url: Option<String>,
    pub auth_token_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    /// Base of the urls handed out for stored media, without trailing slash.
    pub public_base_url: String,
    pub auth_token_retention_days: u64,
    pub prune_interval_hours: u64,
    pub avatar_max_size_bytes: usize,
    pub categories: Vec<CategorySeed>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.join("media"));

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let public_base_url = file
            .public_base_url
            .or_else(|| cli.public_base_url.clone())
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let auth_token_retention_days = file
            .auth_token_retention_days
            .unwrap_or(cli.auth_token_retention_days);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);
        if prune_interval_hours == 0 {
            bail!("prune_interval_hours must be greater than zero");
        }

        let avatar_max_size_bytes = file
            .avatars
            .and_then(|a| a.max_size_bytes)
            .unwrap_or(DEFAULT_AVATAR_MAX_SIZE_BYTES);

        Ok(Self {
            db_dir,
            media_path,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            public_base_url,
            auth_token_retention_days,
            prune_interval_hours,
            avatar_max_size_bytes,
            categories: file.categories,
        })
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }

    pub fn forum_db_path(&self) -> PathBuf {
        self.db_dir.join("forum.db")
    }

    pub fn avatars_dir(&self) -> PathBuf {
        self.media_path.join("avatars")
    }

    pub fn avatars_base_url(&self) -> String {
        format!("{}/media/avatars", self.public_base_url)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
