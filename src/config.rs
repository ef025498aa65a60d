//! Configuration for the cachegate server

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration
///
/// Read-only after startup: parsed once, then shared by reference with the
/// router and the transfer handlers. No globals, no runtime mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Prefix prepended to every request path when forming the object key.
    /// Two gateways with different prefixes can safely share one bucket.
    #[serde(default)]
    pub key_prefix: String,

    /// Header-to-metadata mapping string: `header1=meta1,header2=meta2`.
    /// Pairs without `=` are dropped at parse time.
    #[serde(default)]
    pub header_mapping: String,

    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log level filter string.
    /// Set via config file or CACHEGATE_LOG_LEVEL env var. Overridden by RUST_LOG.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Filesystem backend for local development and tests
    Filesystem {
        /// Directory for data storage
        path: PathBuf,
    },

    /// S3 backend for production use
    S3 {
        /// Bucket that holds all objects served by this gateway
        bucket: String,

        /// S3 endpoint URL (for MinIO, LocalStack, or custom S3-compatible services)
        /// If not specified, uses AWS default endpoint
        #[serde(default)]
        endpoint: Option<String>,

        /// AWS region
        #[serde(default = "default_region")]
        region: String,

        /// Use path-style URLs (required for MinIO, LocalStack)
        #[serde(default = "default_force_path_style")]
        force_path_style: bool,

        /// AWS access key ID
        #[serde(default)]
        access_key_id: Option<String>,

        /// AWS secret access key
        #[serde(default)]
        secret_access_key: Option<String>,
    },
}

// Default value functions for serde
fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

fn default_log_level() -> String {
    "cachegate=debug,tower_http=debug".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Filesystem {
            path: PathBuf::from("./data"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            key_prefix: String::new(),
            header_mapping: String::new(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CACHEGATE_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.listen_addr = parsed;
            }
        }

        if let Ok(prefix) = std::env::var("CACHEGATE_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Ok(mapping) = std::env::var("CACHEGATE_HEADER_MAPPING") {
            config.header_mapping = mapping;
        }

        // An S3 bucket selects the S3 backend; otherwise fall back to a
        // local data directory.
        if let Ok(bucket) = std::env::var("CACHEGATE_S3_BUCKET") {
            config.storage = StorageConfig::S3 {
                bucket,
                endpoint: std::env::var("CACHEGATE_S3_ENDPOINT").ok(),
                region: std::env::var("CACHEGATE_S3_REGION")
                    .unwrap_or_else(|_| default_region()),
                force_path_style: std::env::var("CACHEGATE_S3_PATH_STYLE")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
                access_key_id: std::env::var("CACHEGATE_AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("CACHEGATE_AWS_SECRET_ACCESS_KEY").ok(),
            };
        } else if let Ok(dir) = std::env::var("CACHEGATE_DATA_DIR") {
            config.storage = StorageConfig::Filesystem {
                path: PathBuf::from(dir),
            };
        }

        if let Ok(level) = std::env::var("CACHEGATE_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load() -> Self {
        // Try config file first
        if let Ok(path) = std::env::var("CACHEGATE_CONFIG") {
            if let Ok(config) = Self::from_file(&path) {
                return config;
            }
        }

        // Try default config file locations
        for path in &["cachegate.toml", "/etc/cachegate/config.toml"] {
            if std::path::Path::new(path).exists() {
                if let Ok(config) = Self::from_file(path) {
                    return config;
                }
            }
        }

        // Fall back to environment variables
        Self::from_env()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 8080);
        assert!(config.key_prefix.is_empty());
        assert!(matches!(config.storage, StorageConfig::Filesystem { .. }));
    }

    #[test]
    fn test_config_parse_filesystem() {
        let toml = r#"
            listen_addr = "0.0.0.0:8123"
            key_prefix = "ci/"
            header_mapping = "x-cache-tag=tag"

            [storage]
            type = "filesystem"
            path = "/var/lib/cachegate"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.listen_addr.port(), 8123);
        assert_eq!(config.key_prefix, "ci/");
        assert_eq!(config.header_mapping, "x-cache-tag=tag");

        match config.storage {
            StorageConfig::Filesystem { path } => {
                assert_eq!(path, PathBuf::from("/var/lib/cachegate"));
            }
            _ => panic!("Expected filesystem storage"),
        }
    }

    #[test]
    fn test_config_parse_s3() {
        let toml = r#"
            listen_addr = "0.0.0.0:8080"

            [storage]
            type = "s3"
            bucket = "build-cache"
            endpoint = "http://localhost:9000"
            region = "us-east-1"
            force_path_style = true
        "#;

        let config: Config = toml::from_str(toml).unwrap();

        match config.storage {
            StorageConfig::S3 {
                bucket,
                endpoint,
                region,
                force_path_style,
                ..
            } => {
                assert_eq!(bucket, "build-cache");
                assert_eq!(endpoint, Some("http://localhost:9000".to_string()));
                assert_eq!(region, "us-east-1");
                assert!(force_path_style);
            }
            _ => panic!("Expected S3 storage"),
        }
    }
}
