//! Quote updates from the price feed.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult};
use crate::events::{EventPayload, QuoteUpdatedEvent};
use crate::feed::{FeedError, FeedMessage};
use crate::quotes::Quote;
use crate::types::{Price, Symbol, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, warn};

impl Engine {
    /// Overwrite the quote for `symbol` and sweep its positions for liquidation.
    ///
    /// Runs under the symbol's lock, so the sweep sees exactly this quote and
    /// no open or close on the symbol can interleave with it. Returns what the
    /// sweep liquidated.
    pub fn update_quote(&self, symbol: Symbol, bid: Price, ask: Price) -> Vec<LiquidationResult> {
        let book = self.book(&symbol);
        let mut book = book.lock();

        let quote = Quote::new(symbol.clone(), bid, ask, Timestamp::now());
        self.quotes.update(quote.clone());

        let liquidations = self.sweep(&mut book, &quote);

        debug!(
            symbol = %symbol,
            bid = %bid,
            ask = %ask,
            open = book.len(),
            liquidated = liquidations.len(),
            "quote updated"
        );

        self.emit_event(EventPayload::QuoteUpdated(QuoteUpdatedEvent {
            symbol,
            bid,
            ask,
            liquidations: liquidations.len(),
        }));

        liquidations
    }

    /// Entry point for the feed collaborator with raw values.
    pub fn on_quote(
        &self,
        symbol: &str,
        bid: Decimal,
        ask: Decimal,
    ) -> Result<Vec<LiquidationResult>, EngineError> {
        let symbol = Self::parse_symbol(symbol)?;
        let bid = Price::new(bid).ok_or(EngineError::InvalidPrice(bid))?;
        let ask = Price::new(ask).ok_or(EngineError::InvalidPrice(ask))?;
        Ok(self.update_quote(symbol, bid, ask))
    }

    /// Decode one JSON feed message and apply it. Bad messages are logged and
    /// dropped; they never touch engine state.
    pub fn on_feed_message(&self, raw: &str) -> Result<Vec<LiquidationResult>, FeedError> {
        match FeedMessage::parse(raw) {
            Ok(msg) => Ok(self.update_quote(msg.symbol, msg.bid, msg.ask)),
            Err(e) => {
                warn!(error = %e, "dropping feed message");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::types::{Side, UserId};
    use rust_decimal_macros::dec;

    #[test]
    fn on_quote_normalizes_symbol() {
        let engine = Engine::new(EngineConfig::default());
        engine.on_quote("solusdt", dec!(149), dec!(150)).unwrap();

        let quote = engine.get_quote("SOLUSDT").unwrap();
        assert_eq!(quote.bid.value(), dec!(149));
        assert_eq!(quote.ask.value(), dec!(150));
        assert_eq!(engine.symbols().len(), 1);
    }

    #[test]
    fn on_quote_rejects_bad_input() {
        let engine = Engine::new(EngineConfig::default());
        assert!(matches!(
            engine.on_quote("", dec!(1), dec!(2)),
            Err(EngineError::InvalidSymbol(_))
        ));
        assert_eq!(
            engine.on_quote("SOLUSDT", dec!(-1), dec!(2)),
            Err(EngineError::InvalidPrice(dec!(-1)))
        );
        assert!(engine.get_quote("SOLUSDT").is_none());
    }

    #[test]
    fn later_quote_overwrites() {
        let engine = Engine::new(EngineConfig::default());
        engine.on_quote("SOLUSDT", dec!(149), dec!(150)).unwrap();
        engine.on_quote("SOLUSDT", dec!(139), dec!(140)).unwrap();
        assert_eq!(engine.get_quote("solusdt").unwrap().ask.value(), dec!(140));
    }

    #[test]
    fn feed_message_applies() {
        let engine = Engine::new(EngineConfig::default());
        engine.register_user(UserId(1)).unwrap();
        engine
            .on_feed_message(r#"{"symbol":"solusdt","bid":"149","ask":"150"}"#)
            .unwrap();
        engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap();

        let liquidated = engine
            .on_feed_message(r#"{"symbol":"SOLUSDT","bid":134,"ask":135}"#)
            .unwrap();
        assert_eq!(liquidated.len(), 1);
    }

    #[test]
    fn bad_feed_message_is_dropped() {
        let engine = Engine::new(EngineConfig::default());
        engine.on_quote("SOLUSDT", dec!(149), dec!(150)).unwrap();

        assert!(engine.on_feed_message(r#"{"symbol":"SOLUSDT","bid":"x"}"#).is_err());
        assert_eq!(engine.get_quote("SOLUSDT").unwrap().bid.value(), dec!(149));
    }

    #[test]
    fn quote_events_recorded() {
        let engine = Engine::new(EngineConfig::default());
        engine.on_quote("SOLUSDT", dec!(149), dec!(150)).unwrap();
        let events = engine.events();
        assert!(matches!(
            &events[0].payload,
            EventPayload::QuoteUpdated(e) if e.symbol.as_str() == "SOLUSDT" && e.liquidations == 0
        ));
    }
}
