use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "ORDERSTAT_CONFIG";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AppConfig
{
    pub server: ServerConfig,
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig
{
    pub host: String,
    pub port: u16,
}

impl ServerConfig
{
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError>
    {
        format!("{}:{}", self.host, self.port).parse()
                                              .map_err(|e| ConfigError::Invalid(format!("server address {}:{}: {}", self.host, self.port, e)))
    }
}

/// ClickHouse 连接参数。`bootstrap` 仅在建库时使用，缺省时沿用运行时账号。
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ClickHouseConfig
{
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default)]
    pub bootstrap: Option<Credentials>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Credentials
{
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_query_timeout_secs() -> u64
{
    30
}

impl ClickHouseConfig
{
    /// 组装 HTTP 接口地址，例如 `http://localhost:8123`。
    pub fn url(&self) -> Result<String, ConfigError>
    {
        let mut url = Url::parse("http://localhost").map_err(|e| ConfigError::InternalError(e.to_string()))?;
        url.set_host(Some(&self.host)).map_err(|e| ConfigError::Invalid(format!("clickhouse host `{}`: {}", self.host, e)))?;
        url.set_port(Some(self.port)).map_err(|_| ConfigError::Invalid(format!("clickhouse port {}", self.port)))?;
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    pub fn runtime_credentials(&self) -> Credentials
    {
        Credentials { username: self.username.clone(),
                      password: self.password.clone() }
    }

    pub fn bootstrap_credentials(&self) -> Credentials
    {
        self.bootstrap.clone().unwrap_or_else(|| self.runtime_credentials())
    }

    pub fn query_timeout(&self) -> Duration
    {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MigrationConfig
{
    /// 建表脚本路径；缺省使用内置脚本。
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub provision_on_startup: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LogConfig
{
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// 时间戳使用 UTC；缺省使用本地时区。
    #[serde(default)]
    pub utc: bool,
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
    /// 通道满时阻塞写日志的线程，而不是丢弃。
    #[serde(default)]
    pub block_when_full: bool,
}

fn default_log_level() -> String
{
    "info".to_string()
}

fn default_channel_size() -> usize
{
    100_000
}

impl Default for LogConfig
{
    fn default() -> Self
    {
        Self { level: default_log_level(),
               file: None,
               utc: false,
               channel_size: default_channel_size(),
               block_when_full: false }
    }
}

impl LogConfig
{
    pub fn level_filter(&self) -> Result<log::LevelFilter, ConfigError>
    {
        self.level.parse().map_err(|_| ConfigError::Invalid(format!("log level `{}`", self.level)))
    }
}

/// 配置文件路径：命令行第一个参数，其次环境变量 `ORDERSTAT_CONFIG`，最后 `config.toml`。
pub fn resolve_config_path(arg: Option<String>) -> PathBuf
{
    arg.or_else(|| std::env::var(CONFIG_PATH_ENV).ok()).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// 读取配置文件，并返回`AppConfig`结构体实例。
///
/// # 错误
/// - `ConfigError::ConfigMissing`: 如果配置文件不存在。
/// - `ConfigError::ConfigParseError`: 如果TOML解析失败。
/// - `ConfigError::InternalError`: 如果读取文件时发生IO错误。
pub fn read_config_file(config_path: &Path) -> Result<AppConfig, ConfigError>
{
    if !config_path.exists() {
        return Err(ConfigError::ConfigMissing(config_path.display().to_string()));
    }

    let config_content = fs::read_to_string(config_path)?;
    let config: AppConfig = toml::from_str(&config_content)?;
    config.validate()?;
    Ok(config)
}

impl AppConfig
{
    pub fn validate(&self) -> Result<(), ConfigError>
    {
        if self.clickhouse.database.trim().is_empty() {
            return Err(ConfigError::Invalid("clickhouse.database must not be empty".to_string()));
        }
        if self.clickhouse.query_timeout_secs == 0 {
            return Err(ConfigError::Invalid("clickhouse.query_timeout_secs must be positive".to_string()));
        }
        self.clickhouse.url()?;
        self.server.socket_addr()?;
        self.log.level_filter()?;
        if self.log.channel_size == 0 {
            return Err(ConfigError::Invalid("log.channel_size must be positive".to_string()));
        }
        Ok(())
    }
}
