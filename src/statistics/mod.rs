use async_trait::async_trait;

use crate::{
    error::StoreError,
    model::{Client, DepthOrder, HistoryOrder},
};

pub mod clickhouse_store;

pub use self::clickhouse_store::ClickHouseStatistics;

/// 订单簿与历史订单的持久化接口。
///
/// 实现必须可以被多个任务并发调用；除共享连接池外不持有可变状态。
#[async_trait]
pub trait Statistics: Send + Sync
{
    /// 返回 `(exchange, pair)` 最新一份快照：asks 按价格升序在前，bids 按价格降序在后。
    /// 没有任何快照时返回空序列。
    async fn get_order_book(&self, exchange: &str, pair: &str) -> Result<Vec<DepthOrder>, StoreError>;

    /// 以一次批量写入保存一份完整快照，要么全部可见，要么全部不可见。
    async fn save_order_book(&self, exchange: &str, pair: &str, levels: &[DepthOrder]) -> Result<(), StoreError>;

    /// 按四个键字段精确匹配，按 `time_placed` 升序返回。
    async fn get_order_history(&self, client: &Client) -> Result<Vec<HistoryOrder>, StoreError>;

    /// 追加一条历史订单，键字段以 `client` 为准。
    async fn save_order(&self, client: &Client, order: &HistoryOrder) -> Result<(), StoreError>;

    /// 释放连接。重复调用无副作用。
    async fn close(&self) -> Result<(), StoreError>;
}

pub(crate) fn book_params(exchange: &str, pair: &str) -> String
{
    format!("exchange={}, pair={}", exchange, pair)
}
