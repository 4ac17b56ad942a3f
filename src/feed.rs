// 9.0: price feed message decoding.
//
// The feed publishes one JSON object per best bid/ask change:
//   {"symbol": "SOLUSDT", "bid": "149.95", "ask": 150.05}
// bid and ask may be JSON numbers or numeric strings. Binance-style short
// keys ("s", "b", "a") are accepted too. Everything else about the feed
// (connection, reconnects, candles) belongs to the collaborator.

use crate::types::{Price, Symbol};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    pub symbol: Symbol,
    pub bid: Price,
    pub ask: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("Malformed feed message: {0}")]
    Malformed(String),

    #[error("Feed message missing field {0}")]
    MissingField(&'static str),

    #[error("Field {field} is not a number: {raw}")]
    InvalidNumber { field: &'static str, raw: String },

    #[error("Field {field} is negative: {value}")]
    NegativePrice { field: &'static str, value: Decimal },

    #[error("Feed message has an empty symbol")]
    EmptySymbol,
}

impl FeedMessage {
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| FeedError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, FeedError> {
        let Value::Object(fields) = value else {
            return Err(FeedError::Malformed("expected a JSON object".to_string()));
        };

        let symbol_raw = fields
            .get("symbol")
            .or_else(|| fields.get("s"))
            .and_then(Value::as_str)
            .ok_or(FeedError::MissingField("symbol"))?;
        let symbol = Symbol::parse(symbol_raw).ok_or(FeedError::EmptySymbol)?;

        let bid = read_price(fields.get("bid").or_else(|| fields.get("b")), "bid")?;
        let ask = read_price(fields.get("ask").or_else(|| fields.get("a")), "ask")?;

        Ok(Self { symbol, bid, ask })
    }
}

// numbers go through their decimal text so 149.95 stays 149.95
fn read_price(value: Option<&Value>, field: &'static str) -> Result<Price, FeedError> {
    let raw = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(FeedError::InvalidNumber {
                field,
                raw: other.to_string(),
            })
        }
        None => return Err(FeedError::MissingField(field)),
    };

    let parsed = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| FeedError::InvalidNumber {
            field,
            raw: raw.clone(),
        })?;

    Price::new(parsed).ok_or(FeedError::NegativePrice {
        field,
        value: parsed,
    })
}
