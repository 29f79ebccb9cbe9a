use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub frontend_dir_path: Option<String>,
    /// Directory served under `/media`.
    pub media_path: Option<String>,
    pub avatar_max_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            frontend_dir_path: None,
            media_path: None,
            avatar_max_size_bytes: crate::storage::DEFAULT_AVATAR_MAX_SIZE_BYTES,
        }
    }
}
