use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::Path;

use crate::param::USER_AGENT;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    www_root: String,
    port: u16,
    local: bool,
    worker_threads: usize,
    timeout_secs: u64,
    buffer_size: usize,
    max_request_size: usize,
    access_log: String,
    redirects_file: String,
    client: ClientConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ClientConfig {
    timeout_secs: u64,
    buffer_size: usize,
    max_redirects: usize,
    user_agent: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Toml(e) => write!(f, "invalid TOML: {}", e),
            ConfigError::Json(e) => write!(f, "invalid JSON: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Toml(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            buffer_size: 4096,
            max_redirects: 5,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: "www".to_string(),
            port: 8080,
            local: true,
            worker_threads: 0,
            timeout_secs: 10,
            buffer_size: 8192,
            max_request_size: 65536,
            access_log: "server_access.log".to_string(),
            redirects_file: "redirections.json".to_string(),
            client: ClientConfig::default(),
        }
    }

    /// 从 TOML 文件读取配置。文件不存在时使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, ConfigError> {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("配置文件{}不存在，使用默认配置", filename);
                return Ok(Self::new().resolved());
            }
            Err(e) => return Err(e.into()),
        };
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)?;
        Self::from_toml_str(&str_val)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw_config: Config = toml::from_str(text)?;
        Ok(raw_config.resolved())
    }

    fn resolved(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.timeout_secs == 0 {
            warn!("timeout_secs被设置为0，这会让所有连接立即超时，因此该值将被改为10。");
            self.timeout_secs = 10;
        }
        self
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn set_www_root(&mut self, root: &str) {
        self.www_root = root.to_string();
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn access_log(&self) -> &str {
        &self.access_log
    }

    pub fn redirects_file(&self) -> &str {
        &self.redirects_file
    }

    pub fn client(&self) -> &ClientConfig {
        &self.client
    }
}

impl ClientConfig {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// 内置的重定向表：旧路径 -> 新路径
pub fn default_redirects() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("/redirect-test".to_string(), "/index.html".to_string());
    map.insert("/old-page.html".to_string(), "/index.html".to_string());
    map.insert("/moved.html".to_string(), "/files/test.txt".to_string());
    map
}

/// 读取 JSON 重定向表并覆盖到内置表之上。文件不存在时只返回内置表。
pub fn load_redirects(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let mut redirects = default_redirects();
    if !path.exists() {
        return Ok(redirects);
    }
    let text = std::fs::read_to_string(path)?;
    let from_file: HashMap<String, String> = serde_json::from_str(&text)?;
    info!("从{}载入{}条重定向规则", path.display(), from_file.len());
    redirects.extend(from_file);
    Ok(redirects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.www_root(), "www");
        assert_eq!(config.client().max_redirects(), 5);
        assert_eq!(config.client().timeout_secs(), 10);
        assert_eq!(config.client().buffer_size(), 4096);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            port = 9000
            www_root = "public"

            [client]
            max_redirects = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.port(), 9000);
        assert_eq!(config.www_root(), "public");
        assert_eq!(config.access_log(), "server_access.log");
        assert!(config.worker_threads() > 0);
        assert_eq!(config.client().max_redirects(), 3);
        assert_eq!(config.client().buffer_size(), 4096);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("port = \"not a number\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_toml("/definitely/not/here.toml").unwrap();
        assert_eq!(config.port(), 8080);
    }

    #[test]
    fn test_load_redirects_merges_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"/moved.html": "/elsewhere.html", "/extra": "/index.html"}}"#
        )
        .unwrap();
        let redirects = load_redirects(file.path()).unwrap();
        assert_eq!(redirects["/moved.html"], "/elsewhere.html");
        assert_eq!(redirects["/extra"], "/index.html");
        assert_eq!(redirects["/redirect-test"], "/index.html");
    }

    #[test]
    fn test_load_redirects_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            load_redirects(file.path()),
            Err(ConfigError::Json(_))
        ));
    }
}
