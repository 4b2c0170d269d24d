//! 交易统计数据的持久化组件：订单簿快照与历史订单写入 ClickHouse，
//! 并通过一个很薄的 HTTP 层对外提供读写。

pub mod clickhouse_api;
pub mod config;
pub mod error;
pub mod model;
pub mod network;
pub mod provision;
pub mod stat_log;
pub mod statistics;
pub mod test_utils;

pub use crate::{
    error::{ProvisionError, StoreError},
    model::{Client, DepthOrder, HistoryOrder, OrderBook, Side},
    provision::SchemaProvisioner,
    statistics::{ClickHouseStatistics, Statistics},
};
