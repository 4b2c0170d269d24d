use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次下单或成交事件。只追加，不修改。
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct HistoryOrder
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
    pub time_placed: DateTime<Utc>,
}

/// 历史订单的查询键，本身不落库。
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
pub struct Client
{
    pub client_name: String,
    pub exchange_name: String,
    pub label: String,
    pub pair: String,
}

impl Client
{
    pub fn new(client_name: impl Into<String>, exchange_name: impl Into<String>, label: impl Into<String>, pair: impl Into<String>) -> Self
    {
        Self { client_name: client_name.into(),
               exchange_name: exchange_name.into(),
               label: label.into(),
               pair: pair.into() }
    }

    /// `order` 上每个非空的键字段都必须与本查询键一致；返回第一个不一致的字段名。
    pub fn conflicting_field(&self, order: &HistoryOrder) -> Option<&'static str>
    {
        let pairs = [("client_name", &self.client_name, &order.client_name),
                     ("exchange_name", &self.exchange_name, &order.exchange_name),
                     ("label", &self.label, &order.label),
                     ("pair", &self.pair, &order.pair)];

        pairs.into_iter().find(|(_, key, given)| !given.is_empty() && key != given).map(|(name, _, _)| name)
    }
}

impl From<&HistoryOrder> for Client
{
    fn from(order: &HistoryOrder) -> Self
    {
        Self { client_name: order.client_name.clone(),
               exchange_name: order.exchange_name.clone(),
               label: order.label.clone(),
               pair: order.pair.clone() }
    }
}

impl std::fmt::Display for Client
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f,
               "client_name={}, exchange_name={}, label={}, pair={}",
               self.client_name, self.exchange_name, self.label, self.pair)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::test_utils::history_order;

    #[test]
    fn client_from_history_order()
    {
        let order = history_order("c1", "binance", "algo1", "BTC/USD");
        assert_eq!(Client::from(&order), Client::new("c1", "binance", "algo1", "BTC/USD"));
    }

    #[test]
    fn conflicting_field_ignores_empty_fields()
    {
        let client = Client::new("c1", "binance", "algo1", "BTC/USD");
        let mut order = history_order("", "", "", "");
        assert_eq!(client.conflicting_field(&order), None);

        order.label = "algo2".to_string();
        assert_eq!(client.conflicting_field(&order), Some("label"));

        order.label = "algo1".to_string();
        order.client_name = "c2".to_string();
        assert_eq!(client.conflicting_field(&order), Some("client_name"));
    }

    #[test]
    fn history_order_json_field_names()
    {
        let json = r#"{
            "client_name": "c1",
            "exchange_name": "binance",
            "label": "algo1",
            "pair": "BTC/USD",
            "side": "buy",
            "type_order": "limit",
            "base_qty": 1.0,
            "price": 10000.0,
            "algorithm_name_placed": "twap",
            "lowest_sell_prc": 10100.0,
            "highest_buy_prc": 9900.0,
            "commission_quote_qty": 10.0,
            "time_placed": "2024-05-05T10:00:00Z"
        }"#;
        let order: HistoryOrder = serde_json::from_str(json).unwrap();
        assert_eq!(order.client_name, "c1");
        assert_eq!(order.algorithm_name_placed, "twap");
        assert_eq!(order.time_placed.timestamp(), 1_714_903_200);
    }

    #[test]
    fn client_display_lists_all_key_fields()
    {
        let client = Client::new("c1", "binance", "algo1", "BTC/USD");
        assert_eq!(client.to_string(), "client_name=c1, exchange_name=binance, label=algo1, pair=BTC/USD");
    }
}
