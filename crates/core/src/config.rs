//! 配置模块
//!
//! 配置来源（优先级从低到高）：
//! 1. 内置默认值
//! 2. `SWEETPOS_CONFIG` 指向的 YAML 文件
//! 3. 环境变量 `SWEETPOS_HOST` / `SWEETPOS_PORT` / `RUST_LOG`
//!
//! `DATABASE_URL` 必须存在，缺失时启动失败。

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_CONFIG_PATH: &str = "SWEETPOS_CONFIG";
pub const ENV_HOST: &str = "SWEETPOS_HOST";
pub const ENV_PORT: &str = "SWEETPOS_PORT";
pub const ENV_LOG: &str = "RUST_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            request_timeout_secs: 30,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing EnvFilter 语法，例如 `info,sweetpos_core=debug`
    pub level: String,
    /// 以 JSON 行输出
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// 从进程环境加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// 从给定的变量表加载配置（便于测试）
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = match vars.get(ENV_CONFIG_PATH) {
            Some(path) if !path.trim().is_empty() => Self::from_yaml_file(path)?,
            _ => Self::default_without_database(),
        };

        if let Some(url) = vars.get(ENV_DATABASE_URL) {
            config.database_url = url.trim().to_string();
        }
        if let Some(host) = vars.get(ENV_HOST) {
            config.server.host = host.clone();
        }
        if let Some(port) = vars.get(ENV_PORT) {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PORT.to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(level) = vars.get(ENV_LOG) {
            config.logging.level = level.clone();
        }

        if config.database_url.is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(config)
    }

    fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn default_without_database() -> Self {
        Self {
            database_url: String::new(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_database_url_is_fatal() {
        let err = Config::from_vars(&vars(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = Config::from_vars(&vars(&[
            (ENV_DATABASE_URL, "sqlite://shop.db"),
            (ENV_HOST, "0.0.0.0"),
            (ENV_PORT, "9000"),
            (ENV_LOG, "debug"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite://shop.db");
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.request_timeout_secs, 30);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = Config::from_vars(&vars(&[
            (ENV_DATABASE_URL, ":memory:"),
            (ENV_PORT, "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn yaml_file_is_overlaid_by_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database_url: /var/lib/sweetpos/shop.db\nserver:\n  port: 7000\nlogging:\n  json: true"
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = Config::from_vars(&vars(&[
            (ENV_CONFIG_PATH, path.as_str()),
            (ENV_PORT, "7100"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "/var/lib/sweetpos/shop.db");
        assert_eq!(config.server.port, 7100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.logging.json);
    }
}
