// 2.0: latest bid/ask per symbol. one slot per symbol, overwritten in place.
// no history is kept here; candles and trade storage live outside the engine.

use crate::types::{Price, Side, Symbol, Timestamp};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid: Price,
    pub ask: Price,
    pub updated_at: Timestamp,
}

impl Quote {
    pub fn new(symbol: Symbol, bid: Price, ask: Price, updated_at: Timestamp) -> Self {
        Self {
            symbol,
            bid,
            ask,
            updated_at,
        }
    }

    // 2.1: longs buy at the ask, shorts sell at the bid
    pub fn entry_price(&self, side: Side) -> Price {
        match side {
            Side::Long => self.ask,
            Side::Short => self.bid,
        }
    }

    // 2.2: closing crosses the spread the other way
    pub fn exit_price(&self, side: Side) -> Price {
        match side {
            Side::Long => self.bid,
            Side::Short => self.ask,
        }
    }
}

/// Lookup table of the most recent quote for each symbol.
///
/// Writes go through the engine, which holds the symbol's partition lock while
/// it overwrites the slot and runs the liquidation sweep, so a reader holding
/// the same lock always sees the quote the sweep used.
#[derive(Debug, Default)]
pub struct QuoteCache {
    quotes: DashMap<Symbol, Quote>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional overwrite. Returns the previous quote, if any.
    pub fn update(&self, quote: Quote) -> Option<Quote> {
        self.quotes.insert(quote.symbol.clone(), quote)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.get(symbol).map(|q| q.value().clone())
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.quotes.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
