use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "mediagetr")]
#[command(about = "media retrieval server")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "MEDIAGETR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "MEDIAGETR_PORT", default_value = "5151")]
    pub port: u16,

    /// Root directory local media paths are confined to
    #[arg(long, env = "MEDIAGETR_MEDIA_ROOT", default_value = ".")]
    pub media_root: PathBuf,

    /// AWS region for the S3 backend (SDK defaults if not specified)
    #[arg(long, env = "MEDIAGETR_S3_REGION")]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint URL (MinIO, LocalStack, etc.)
    #[arg(long, env = "MEDIAGETR_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Timeout in seconds for upstream HTTP fetches
    #[arg(long, env = "MEDIAGETR_HTTP_TIMEOUT", default_value = "30")]
    pub http_timeout_secs: u64,

    /// Upper bound on pooled outbound connections per backend host
    #[arg(long, env = "MEDIAGETR_MAX_IDLE_CONNECTIONS", default_value = "32")]
    pub max_idle_connections: usize,

    /// Enable CORS for all origins
    #[arg(long, env = "MEDIAGETR_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 5151,
            media_root: PathBuf::from("."),
            s3_region: None,
            s3_endpoint: None,
            http_timeout_secs: 30,
            max_idle_connections: 32,
            cors: true,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_bind_addr_default() {
        assert_eq!(base_config().bind_addr(), "0.0.0.0:5151");
    }

    #[test]
    fn test_bind_addr_custom_port() {
        let mut config = base_config();
        config.host = "localhost".to_string();
        config.port = 3000;
        assert_eq!(config.bind_addr(), "localhost:3000");
    }

    #[test]
    fn test_http_timeout() {
        assert_eq!(base_config().http_timeout(), Duration::from_secs(30));
    }
}
