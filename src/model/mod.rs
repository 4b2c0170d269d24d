use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

pub mod depth; // 订单簿档位与快照
pub mod history; // 历史订单与查询键

pub use depth::{DepthOrder, OrderBook};
pub use history::{Client, HistoryOrder};

/// 订单簿档位所在的一侧。
///
/// NOTE 档位的方向必须由调用方显式给出。按价格正负推断买卖方向在真实行情中并不成立，因此不做推断。
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side
{
    #[serde(rename = "ask", alias = "sell", alias = "ASK", alias = "SELL", alias = "a")]
    Ask,
    #[serde(rename = "bid", alias = "buy", alias = "BID", alias = "BUY", alias = "b")]
    Bid,
}

impl Side
{
    pub fn as_str(&self) -> &'static str
    {
        match self {
            | Side::Ask => "ask",
            | Side::Bid => "bid",
        }
    }
}

impl Display for Side
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Side
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            | "ask" | "sell" | "a" => Ok(Side::Ask),
            | "bid" | "buy" | "b" => Ok(Side::Bid),
            | _ => Err(format!("'{}' is not a valid Side", s)),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn side_should_parse_aliases()
    {
        assert_eq!(Side::from_str("ask").unwrap(), Side::Ask);
        assert_eq!(Side::from_str("SELL").unwrap(), Side::Ask);
        assert_eq!(Side::from_str("Bid").unwrap(), Side::Bid);
        assert_eq!(Side::from_str("buy").unwrap(), Side::Bid);
        assert!(Side::from_str("long").is_err());
    }

    #[test]
    fn side_should_serialize_lowercase()
    {
        assert_eq!(serde_json::to_string(&Side::Ask).unwrap(), "\"ask\"");
        assert_eq!(serde_json::to_string(&Side::Bid).unwrap(), "\"bid\"");
        assert_eq!(serde_json::from_str::<Side>("\"sell\"").unwrap(), Side::Ask);
    }

    #[test]
    fn side_display_matches_as_str()
    {
        assert_eq!(format!("{}", Side::Ask), Side::Ask.as_str());
        assert_eq!(format!("{}", Side::Bid), "bid");
    }
}
