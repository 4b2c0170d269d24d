use log::{debug, info};
pub use clickhouse::{
    error::{Error, Result},
    Client, Row,
};

use crate::{
    config::{ClickHouseConfig, Credentials},
    error::ConfigError,
};

/// ClickHouse HTTP 客户端的轻量封装。
///
/// `clickhouse::Client` 内部是共享的 HTTP 连接池，克隆代价很低，因此这里不加锁，
/// 每次操作各自克隆一份即可并发执行。
#[derive(Clone)]
pub struct ClickHouseClient
{
    pub client: Client,
    url: String,
}

impl ClickHouseClient
{
    /// 使用运行时账号连接到配置中的数据库。
    pub fn runtime(config: &ClickHouseConfig) -> std::result::Result<Self, ConfigError>
    {
        Self::build(config, &config.runtime_credentials(), Some(&config.database))
    }

    /// 使用建库账号连接，不指定数据库。
    pub fn bootstrap(config: &ClickHouseConfig) -> std::result::Result<Self, ConfigError>
    {
        Self::build(config, &config.bootstrap_credentials(), None)
    }

    fn build(config: &ClickHouseConfig, credentials: &Credentials, database: Option<&str>) -> std::result::Result<Self, ConfigError>
    {
        let url = config.url()?;
        let mut client = Client::default().with_url(url.as_str())
                                          .with_user(credentials.username.as_str())
                                          .with_password(credentials.password.as_str());
        if let Some(database) = database {
            client = client.with_database(database);
        }
        debug!("[OrderStat] : ClickHouse client prepared for {} as {}", url, credentials.username);
        Ok(Self { client, url })
    }

    /// 包装已有的客户端（测试中用于指向 mock 服务）。
    pub fn from_client(client: Client, url: impl Into<String>) -> Self
    {
        Self { client, url: url.into() }
    }

    pub fn url(&self) -> &str
    {
        &self.url
    }

    /// 执行 `SELECT 1`，确认服务可达且账号有效。
    pub async fn ping(&self) -> Result<()>
    {
        self.client.query("SELECT 1").execute().await?;
        info!("[OrderStat] : Successfully connected to the ClickHouse server at {}.", self.url);
        Ok(())
    }

    /// 执行一条不返回行的语句（DDL 等）。
    pub async fn execute(&self, statement: &str) -> Result<()>
    {
        debug!("[OrderStat] : Executing statement: {}", statement);
        self.client.query(statement).execute().await
    }
}
