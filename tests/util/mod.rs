#![allow(dead_code)]

use std::sync::Arc;

use orderstat::{
    clickhouse_api::queries_operations::ClickHouseClient,
    config::ClickHouseConfig,
    provision::{SchemaProvisioner, SchemaSource},
    statistics::Statistics,
    test_utils::{clickhouse_config, InMemoryStatistics},
};

/// 每个用例独享一个数据库，避免互相干扰。
pub fn live_config() -> ClickHouseConfig
{
    let mut config = clickhouse_config();
    if let Ok(host) = std::env::var("ORDERSTAT_TEST_CLICKHOUSE_HOST") {
        config.host = host;
    }
    config.database = format!("orderstat_test_{}", uuid::Uuid::new_v4().simple());
    config
}

pub fn provisioner(config: &ClickHouseConfig) -> SchemaProvisioner
{
    SchemaProvisioner::new(ClickHouseClient::bootstrap(config).unwrap(),
                           ClickHouseClient::runtime(config).unwrap(),
                           config.database.clone(),
                           SchemaSource::Embedded)
}

pub async fn drop_database(config: &ClickHouseConfig)
{
    let bootstrap = ClickHouseClient::bootstrap(config).unwrap();
    bootstrap.execute(&format!("DROP DATABASE IF EXISTS {}", config.database)).await.unwrap();
}

pub fn in_memory_store() -> (Arc<InMemoryStatistics>, Arc<dyn Statistics>)
{
    let store = Arc::new(InMemoryStatistics::new());
    let shared: Arc<dyn Statistics> = store.clone();
    (store, shared)
}

/// 比较两组档位时忽略顺序。
pub fn as_set(levels: &[orderstat::DepthOrder]) -> Vec<(String, u64, u64)>
{
    let mut set: Vec<_> = levels.iter().map(|l| (l.side.to_string(), l.price.to_bits(), l.base_qty.to_bits())).collect();
    set.sort();
    set
}
