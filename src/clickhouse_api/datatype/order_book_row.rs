use std::str::FromStr;

use clickhouse::Row;
use serde::{Deserialize, Serialize};

use crate::model::{DepthOrder, Side};

/// `order_book` 表中的一行。同一次保存写入的所有行共享 `snapshot_id` 与 `snapshot_ts`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct OrderBookRow
{
    pub exchange: String,
    pub pair: String,
    pub snapshot_id: String,
    /// DateTime64(6, 'UTC')，微秒时间戳，进程内严格递增
    pub snapshot_ts: i64,
    pub side: String,
    pub price: f64,
    pub base_qty: f64,
}

impl OrderBookRow
{
    pub fn new(exchange: &str, pair: &str, snapshot_id: &str, snapshot_ts: i64, level: &DepthOrder) -> Self
    {
        Self { exchange: exchange.to_string(),
               pair: pair.to_string(),
               snapshot_id: snapshot_id.to_string(),
               snapshot_ts,
               side: level.side.as_str().to_string(),
               price: level.price,
               base_qty: level.base_qty }
    }
}

/// 读取订单簿时只取档位相关的列。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct DepthLevelRow
{
    pub side: String,
    pub price: f64,
    pub base_qty: f64,
}

impl TryFrom<DepthLevelRow> for DepthOrder
{
    type Error = String;

    fn try_from(row: DepthLevelRow) -> Result<Self, Self::Error>
    {
        Ok(DepthOrder { side: Side::from_str(&row.side)?,
                        price: row.price,
                        base_qty: row.base_qty })
    }
}

impl From<&DepthOrder> for DepthLevelRow
{
    fn from(level: &DepthOrder) -> Self
    {
        Self { side: level.side.as_str().to_string(),
               price: level.price,
               base_qty: level.base_qty }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn order_book_row_carries_snapshot_and_side()
    {
        let row = OrderBookRow::new("binance", "BTC/USD", "snap-1", 1_714_903_200_000_000, &DepthOrder::bid(9900.0, 1.0));
        assert_eq!(row.side, "bid");
        assert_eq!(row.snapshot_id, "snap-1");
        assert_eq!(row.snapshot_ts, 1_714_903_200_000_000);
        assert_eq!(row.price, 9900.0);
    }

    #[test]
    fn depth_level_row_converts_back()
    {
        let level = DepthOrder::ask(10100.0, 2.0);
        let row = DepthLevelRow::from(&level);
        assert_eq!(DepthOrder::try_from(row).unwrap(), level);
    }

    #[test]
    fn unknown_side_fails_to_convert()
    {
        let row = DepthLevelRow { side: "mid".to_string(),
                                  price: 1.0,
                                  base_qty: 1.0 };
        assert!(DepthOrder::try_from(row).is_err());
    }
}
