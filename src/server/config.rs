use super::RequestsLoggingLevel;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    /// Request bodies above this size are rejected with 413.
    pub max_upload_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            host: "0.0.0.0".to_string(),
            port: 443,
            metrics_port: 9091,
            max_upload_size_bytes: 512 * 1024 * 1024,
        }
    }
}
