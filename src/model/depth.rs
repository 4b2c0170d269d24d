use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::Side;

/// 订单簿中的一个价格档位。
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct DepthOrder
{
    pub side: Side,
    pub price: f64,
    pub base_qty: f64,
}

impl DepthOrder
{
    pub fn ask(price: f64, base_qty: f64) -> Self
    {
        Self { side: Side::Ask, price, base_qty }
    }

    pub fn bid(price: f64, base_qty: f64) -> Self
    {
        Self { side: Side::Bid, price, base_qty }
    }

    /// 检查档位是否可以落库：价格必须为正的有限数，数量必须为非负的有限数。
    pub fn check(&self) -> Result<(), String>
    {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(format!("price must be a positive finite number, got {}", self.price));
        }
        if !self.base_qty.is_finite() || self.base_qty < 0.0 {
            return Err(format!("base_qty must be a non-negative finite number, got {}", self.base_qty));
        }
        Ok(())
    }
}

/// 某交易所某交易对的一份完整订单簿快照。
///
/// asks 按价格升序，bids 按价格降序。
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OrderBook
{
    pub exchange: String,
    pub pair: String,
    pub asks: Vec<DepthOrder>,
    pub bids: Vec<DepthOrder>,
}

impl OrderBook
{
    /// 按 `side` 把平铺的档位拆成 asks 与 bids，并排序。
    pub fn from_levels(exchange: impl Into<String>, pair: impl Into<String>, levels: impl IntoIterator<Item = DepthOrder>) -> Self
    {
        let (mut asks, mut bids): (Vec<DepthOrder>, Vec<DepthOrder>) = levels.into_iter().partition(|level| level.side == Side::Ask);
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));

        Self { exchange: exchange.into(),
               pair: pair.into(),
               asks,
               bids }
    }

    pub fn len(&self) -> usize
    {
        self.asks.len() + self.bids.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.asks.is_empty() && self.bids.is_empty()
    }

    /// 先 asks 后 bids 的平铺档位序列。
    pub fn into_levels(self) -> Vec<DepthOrder>
    {
        let mut levels = self.asks;
        levels.extend(self.bids);
        levels
    }
}
