use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

use crate::model::{Client, HistoryOrder};

/// `order_history` 表中的一行。`time_placed` 以 DateTime64(3, 'UTC') 存储。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct HistoryOrderRow
{
    pub client_name: String,
    pub exchange_name: String,
    pub label: String,
    pub pair: String,
    pub side: String,
    pub type_order: String,
    pub base_qty: f64,
    pub price: f64,
    pub algorithm_name_placed: String,
    pub lowest_sell_prc: f64,
    pub highest_buy_prc: f64,
    pub commission_quote_qty: f64,
    pub time_placed: i64,
}

impl HistoryOrderRow
{
    /// 键字段以 `client` 为准。
    pub fn new(client: &Client, order: &HistoryOrder) -> Self
    {
        Self { client_name: client.client_name.clone(),
               exchange_name: client.exchange_name.clone(),
               label: client.label.clone(),
               pair: client.pair.clone(),
               side: order.side.clone(),
               type_order: order.type_order.clone(),
               base_qty: order.base_qty,
               price: order.price,
               algorithm_name_placed: order.algorithm_name_placed.clone(),
               lowest_sell_prc: order.lowest_sell_prc,
               highest_buy_prc: order.highest_buy_prc,
               commission_quote_qty: order.commission_quote_qty,
               time_placed: order.time_placed.timestamp_millis() }
    }
}

impl TryFrom<HistoryOrderRow> for HistoryOrder
{
    type Error = String;

    fn try_from(row: HistoryOrderRow) -> Result<Self, Self::Error>
    {
        let time_placed = DateTime::<Utc>::from_timestamp_millis(row.time_placed).ok_or_else(|| format!("time_placed {} is out of range", row.time_placed))?;

        Ok(HistoryOrder { client_name: row.client_name,
                          exchange_name: row.exchange_name,
                          label: row.label,
                          pair: row.pair,
                          side: row.side,
                          type_order: row.type_order,
                          base_qty: row.base_qty,
                          price: row.price,
                          algorithm_name_placed: row.algorithm_name_placed,
                          lowest_sell_prc: row.lowest_sell_prc,
                          highest_buy_prc: row.highest_buy_prc,
                          commission_quote_qty: row.commission_quote_qty,
                          time_placed })
    }
}
