use std::{
    future::Future,
    sync::atomic::{AtomicBool, AtomicI64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use clickhouse::query::Query;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clickhouse_api::{
        datatype::{
            history_order_row::HistoryOrderRow,
            order_book_row::{DepthLevelRow, OrderBookRow},
        },
        queries_operations::ClickHouseClient,
        query_builder::ClickHouseQueryBuilder,
    },
    config::ClickHouseConfig,
    error::StoreError,
    model::{Client, DepthOrder, HistoryOrder, OrderBook},
    statistics::{book_params, Statistics},
};

pub const ORDER_BOOK_TABLE: &str = "order_book";
pub const ORDER_HISTORY_TABLE: &str = "order_history";

const CLIENT_KEY_COLUMNS: [&str; 4] = ["client_name", "exchange_name", "label", "pair"];

static LAST_SNAPSHOT_MICROS: AtomicI64 = AtomicI64::new(0);

/// 进程内严格递增的快照时间戳（微秒）。同一微秒内的多次保存或时钟回拨时顺延 1µs，
/// 后保存的快照总是排在前一份之后。
pub(crate) fn next_snapshot_ts() -> i64
{
    let now = Utc::now().timestamp_micros();
    match LAST_SNAPSHOT_MICROS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1))) {
        | Ok(last) | Err(last) => now.max(last + 1),
    }
}

/// 最新快照：`snapshot_ts` 最大的那一份，`snapshot_id` 只在多个进程写入同一微秒时参与比较。
/// 绑定顺序：exchange, pair, exchange, pair。
pub fn latest_order_book_query() -> ClickHouseQueryBuilder
{
    let latest = ClickHouseQueryBuilder::new().select("argMax(snapshot_id, (snapshot_ts, snapshot_id))")
                                              .from(ORDER_BOOK_TABLE)
                                              .where_eq("exchange")
                                              .where_eq("pair");

    ClickHouseQueryBuilder::new().select("?fields")
                                 .from(ORDER_BOOK_TABLE)
                                 .where_eq("exchange")
                                 .where_eq("pair")
                                 .where_eq_subquery("snapshot_id", latest)
}

/// 绑定顺序：client_name, exchange_name, label, pair。
pub fn order_history_query() -> ClickHouseQueryBuilder
{
    ClickHouseQueryBuilder::new().select("?fields")
                                 .from(ORDER_HISTORY_TABLE)
                                 .where_eq_all(&CLIENT_KEY_COLUMNS)
                                 .order_by("time_placed ASC")
}

/// 基于 ClickHouse 的 [`Statistics`] 实现。
pub struct ClickHouseStatistics
{
    clickhouse: ClickHouseClient,
    query_timeout: Duration,
    closed: AtomicBool,
}

impl ClickHouseStatistics
{
    pub fn new(clickhouse: ClickHouseClient, query_timeout: Duration) -> Self
    {
        Self { clickhouse,
               query_timeout,
               closed: AtomicBool::new(false) }
    }

    /// 按配置建立运行时连接并 ping 一次。
    pub async fn connect(config: &ClickHouseConfig) -> Result<Self, StoreError>
    {
        let clickhouse = ClickHouseClient::runtime(config).map_err(|e| StoreError::Connection(e.to_string()))?;
        clickhouse.ping().await.map_err(|e| StoreError::Connection(format!("{}: {}", clickhouse.url(), e)))?;
        Ok(Self::new(clickhouse, config.query_timeout()))
    }

    pub fn is_closed(&self) -> bool
    {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), StoreError>
    {
        if self.is_closed() {
            return Err(StoreError::Closed(operation));
        }
        Ok(())
    }

    /// 给一次操作加上超时。超时后 future 被丢弃，未完成的 HTTP 请求随之中止，未 `end()` 的插入不会提交。
    async fn bounded<T, F>(&self, operation: &'static str, params: &str, fut: F) -> Result<T, StoreError>
        where F: Future<Output = Result<T, StoreError>>
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            | Ok(result) => result,
            | Err(_) => {
                warn!("[OrderStat] : {} timed out after {:?} for ({})", operation, self.query_timeout, params);
                Err(StoreError::Timeout { operation,
                                          params: params.to_string(),
                                          timeout: self.query_timeout })
            }
        }
    }

    /// 按出现顺序绑定全部参数，个数必须与构造器中的占位符一致。
    fn keyed_query(&self, operation: &'static str, params: &str, builder: &ClickHouseQueryBuilder, values: &[&str]) -> Result<Query, StoreError>
    {
        if builder.placeholders() != values.len() {
            return Err(StoreError::Binding { operation,
                                             params: params.to_string(),
                                             expected: builder.placeholders(),
                                             given: values.len() });
        }
        Ok(values.iter().fold(self.clickhouse.client.query(&builder.build()), |query, value| query.bind(*value)))
    }

    async fn fetch_latest_levels(&self, exchange: &str, pair: &str, params: &str) -> Result<Vec<DepthOrder>, StoreError>
    {
        const OPERATION: &str = "get_order_book";
        let rows = self.keyed_query(OPERATION, params, &latest_order_book_query(), &[exchange, pair, exchange, pair])?
                       .fetch_all::<DepthLevelRow>()
                       .await
                       .map_err(|e| StoreError::from_query(OPERATION, params.to_string(), e))?;

        let levels = rows.into_iter()
                         .map(DepthOrder::try_from)
                         .collect::<Result<Vec<_>, _>>()
                         .map_err(|reason| StoreError::Decode { operation: OPERATION,
                                                                params: params.to_string(),
                                                                reason })?;

        let book = OrderBook::from_levels(exchange, pair, levels);
        if book.is_empty() {
            debug!("[OrderStat] : No snapshot stored for ({})", params);
        }
        else {
            debug!("[OrderStat] : Loaded snapshot with {} levels for ({})", book.len(), params);
        }
        Ok(book.into_levels())
    }

    async fn insert_snapshot(&self, exchange: &str, pair: &str, levels: &[DepthOrder], params: &str) -> Result<(), StoreError>
    {
        const OPERATION: &str = "save_order_book";
        let snapshot_id = Uuid::new_v4().to_string();
        let snapshot_ts = next_snapshot_ts();

        let mut insert = self.clickhouse
                             .client
                             .insert::<OrderBookRow>(ORDER_BOOK_TABLE)
                             .map_err(|e| StoreError::from_insert(OPERATION, params.to_string(), e))?;

        // 任何一行写入失败都直接返回，`insert` 在未 `end()` 的情况下被丢弃，整批不提交。
        for level in levels {
            let row = OrderBookRow::new(exchange, pair, &snapshot_id, snapshot_ts, level);
            insert.write(&row).await.map_err(|e| StoreError::from_insert(OPERATION, params.to_string(), e))?;
        }
        insert.end().await.map_err(|e| StoreError::from_insert(OPERATION, params.to_string(), e))?;

        debug!("[OrderStat] : Saved snapshot {} with {} levels for ({})", snapshot_id, levels.len(), params);
        Ok(())
    }

    async fn fetch_history(&self, client: &Client, params: &str) -> Result<Vec<HistoryOrder>, StoreError>
    {
        const OPERATION: &str = "get_order_history";
        let key = [client.client_name.as_str(), client.exchange_name.as_str(), client.label.as_str(), client.pair.as_str()];
        let rows = self.keyed_query(OPERATION, params, &order_history_query(), &key)?
                       .fetch_all::<HistoryOrderRow>()
                       .await
                       .map_err(|e| StoreError::from_query(OPERATION, params.to_string(), e))?;

        rows.into_iter()
            .map(HistoryOrder::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| StoreError::Decode { operation: OPERATION,
                                                   params: params.to_string(),
                                                   reason })
    }

    async fn insert_history(&self, row: HistoryOrderRow, params: &str) -> Result<(), StoreError>
    {
        const OPERATION: &str = "save_order";
        let mut insert = self.clickhouse
                             .client
                             .insert::<HistoryOrderRow>(ORDER_HISTORY_TABLE)
                             .map_err(|e| StoreError::from_insert(OPERATION, params.to_string(), e))?;
        insert.write(&row).await.map_err(|e| StoreError::from_insert(OPERATION, params.to_string(), e))?;
        insert.end().await.map_err(|e| StoreError::from_insert(OPERATION, params.to_string(), e))
    }
}

#[async_trait]
impl Statistics for ClickHouseStatistics
{
    async fn get_order_book(&self, exchange: &str, pair: &str) -> Result<Vec<DepthOrder>, StoreError>
    {
        self.ensure_open("get_order_book")?;
        let params = book_params(exchange, pair);
        self.bounded("get_order_book", &params, self.fetch_latest_levels(exchange, pair, &params)).await
    }

    async fn save_order_book(&self, exchange: &str, pair: &str, levels: &[DepthOrder]) -> Result<(), StoreError>
    {
        const OPERATION: &str = "save_order_book";
        self.ensure_open(OPERATION)?;
        let params = book_params(exchange, pair);

        if levels.is_empty() {
            return Err(StoreError::EmptyBatch { operation: OPERATION, params });
        }
        // 发送前先整体校验，任何一档不合法都不写入。
        if let Some((index, reason)) = levels.iter().enumerate().find_map(|(index, level)| level.check().err().map(|reason| (index, reason))) {
            return Err(StoreError::Batch { operation: OPERATION,
                                           params,
                                           index,
                                           reason });
        }

        self.bounded(OPERATION, &params, self.insert_snapshot(exchange, pair, levels, &params)).await
    }

    async fn get_order_history(&self, client: &Client) -> Result<Vec<HistoryOrder>, StoreError>
    {
        self.ensure_open("get_order_history")?;
        let params = client.to_string();
        self.bounded("get_order_history", &params, self.fetch_history(client, &params)).await
    }

    async fn save_order(&self, client: &Client, order: &HistoryOrder) -> Result<(), StoreError>
    {
        const OPERATION: &str = "save_order";
        self.ensure_open(OPERATION)?;
        let params = client.to_string();

        if let Some(field) = client.conflicting_field(order) {
            return Err(StoreError::KeyMismatch { operation: OPERATION, params, field });
        }

        let row = HistoryOrderRow::new(client, order);
        self.bounded(OPERATION, &params, self.insert_history(row, &params)).await
    }

    async fn close(&self) -> Result<(), StoreError>
    {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("[OrderStat] : Statistics store already closed.");
        }
        else {
            info!("[OrderStat] : Statistics store closed, released ClickHouse client for {}.", self.clickhouse.url());
        }
        Ok(())
    }
}
