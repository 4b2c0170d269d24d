use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    config::ClickHouseConfig,
    error::StoreError,
    model::{Client, DepthOrder, HistoryOrder, OrderBook},
    statistics::{book_params, Statistics},
};

/// 内存版 [`Statistics`]，语义与 ClickHouse 实现一致：保存即替换最新快照，历史只追加。
#[derive(Default)]
pub struct InMemoryStatistics
{
    books: RwLock<HashMap<(String, String), Vec<DepthOrder>>>,
    history: RwLock<Vec<HistoryOrder>>,
    closed: AtomicBool,
}

impl InMemoryStatistics
{
    pub fn new() -> Self
    {
        Self::default()
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), StoreError>
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed(operation));
        }
        Ok(())
    }

    pub async fn history_len(&self) -> usize
    {
        self.history.read().await.len()
    }
}

#[async_trait]
impl Statistics for InMemoryStatistics
{
    async fn get_order_book(&self, exchange: &str, pair: &str) -> Result<Vec<DepthOrder>, StoreError>
    {
        self.ensure_open("get_order_book")?;
        let books = self.books.read().await;
        let levels = books.get(&(exchange.to_string(), pair.to_string())).cloned().unwrap_or_default();
        Ok(OrderBook::from_levels(exchange, pair, levels).into_levels())
    }

    async fn save_order_book(&self, exchange: &str, pair: &str, levels: &[DepthOrder]) -> Result<(), StoreError>
    {
        const OPERATION: &str = "save_order_book";
        self.ensure_open(OPERATION)?;
        let params = book_params(exchange, pair);
        if levels.is_empty() {
            return Err(StoreError::EmptyBatch { operation: OPERATION, params });
        }
        for (index, level) in levels.iter().enumerate() {
            if let Err(reason) = level.check() {
                return Err(StoreError::Batch { operation: OPERATION,
                                               params,
                                               index,
                                               reason });
            }
        }
        self.books.write().await.insert((exchange.to_string(), pair.to_string()), levels.to_vec());
        Ok(())
    }

    async fn get_order_history(&self, client: &Client) -> Result<Vec<HistoryOrder>, StoreError>
    {
        self.ensure_open("get_order_history")?;
        let mut orders: Vec<HistoryOrder> = self.history.read().await.iter().filter(|order| Client::from(*order) == *client).cloned().collect();
        orders.sort_by_key(|order| order.time_placed);
        Ok(orders)
    }

    async fn save_order(&self, client: &Client, order: &HistoryOrder) -> Result<(), StoreError>
    {
        const OPERATION: &str = "save_order";
        self.ensure_open(OPERATION)?;
        if let Some(field) = client.conflicting_field(order) {
            return Err(StoreError::KeyMismatch { operation: OPERATION,
                                                 params: client.to_string(),
                                                 field });
        }
        let mut stored = order.clone();
        stored.client_name = client.client_name.clone();
        stored.exchange_name = client.exchange_name.clone();
        stored.label = client.label.clone();
        stored.pair = client.pair.clone();
        self.history.write().await.push(stored);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError>
    {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 2024-05-05T10:00:00Z
pub const TIME_PLACED_MILLIS: i64 = 1_714_903_200_000;

pub fn history_order(client_name: &str, exchange_name: &str, label: &str, pair: &str) -> HistoryOrder
{
    HistoryOrder { client_name: client_name.to_string(),
                   exchange_name: exchange_name.to_string(),
                   label: label.to_string(),
                   pair: pair.to_string(),
                   side: "buy".to_string(),
                   type_order: "limit".to_string(),
                   base_qty: 1.0,
                   price: 10000.0,
                   algorithm_name_placed: "test_algo".to_string(),
                   lowest_sell_prc: 10100.0,
                   highest_buy_prc: 9900.0,
                   commission_quote_qty: 10.0,
                   time_placed: DateTime::<Utc>::from_timestamp_millis(TIME_PLACED_MILLIS).unwrap_or_default() }
}

/// `("binance", "BTC/USD")` 示例订单簿：两档 ask，一档 bid。
pub fn sample_levels() -> Vec<DepthOrder>
{
    vec![DepthOrder::ask(10000.0, 1.0), DepthOrder::ask(10100.0, 2.0), DepthOrder::bid(9900.0, 1.0)]
}

pub fn clickhouse_config() -> ClickHouseConfig
{
    ClickHouseConfig { host: "localhost".to_string(),
                       port: 8123,
                       database: "statistics".to_string(),
                       username: "default".to_string(),
                       password: String::new(),
                       query_timeout_secs: 30,
                       bootstrap: None }
}

/// 指向 `clickhouse::test::Mock` 的客户端，关闭压缩以便 mock 直接解析 RowBinary。
#[cfg(test)]
pub(crate) fn mock_client(mock: &clickhouse::test::Mock) -> crate::clickhouse_api::queries_operations::ClickHouseClient
{
    let client = clickhouse::Client::default().with_url(mock.url()).with_compression(clickhouse::Compression::None);
    crate::clickhouse_api::queries_operations::ClickHouseClient::from_client(client, mock.url())
}
