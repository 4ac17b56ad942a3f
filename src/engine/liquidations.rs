//! Liquidation sweep.
//!
//! Runs inside every quote update while the symbol's book is locked. Breached
//! positions leave the open set as `Liquidated` and their margin is forfeited:
//! nothing is released back to the owner.

use super::book::PositionBook;
use super::core::Engine;
use super::results::LiquidationResult;
use crate::events::{EventPayload, PositionLiquidatedEvent};
use crate::liquidation::{evaluate_liquidation, LiquidationStatus};
use crate::quotes::Quote;
use crate::types::{OrderId, Price, Symbol};
use tracing::{error, warn};

impl Engine {
    /// Re-run the sweep for `symbol` against its cached quote.
    ///
    /// Positions opened after the last tick are first checked here or on the
    /// next tick. Does nothing when the symbol has never been quoted.
    pub fn check_liquidations(&self, symbol: &str) -> Vec<LiquidationResult> {
        let Some(symbol) = Symbol::parse(symbol) else {
            return Vec::new();
        };

        let Some(book) = self.existing_book(&symbol) else {
            return Vec::new();
        };
        let mut book = book.lock();

        match self.quotes.get(&symbol) {
            Some(quote) => self.sweep(&mut book, &quote),
            None => Vec::new(),
        }
    }

    // bounded by the number of open positions on the symbol. no I/O.
    pub(super) fn sweep(&self, book: &mut PositionBook, quote: &Quote) -> Vec<LiquidationResult> {
        let breached: Vec<(OrderId, Price)> = book
            .iter()
            .filter_map(|position| match evaluate_liquidation(position, quote) {
                LiquidationStatus::Breached { trigger_price, .. } => {
                    Some((position.order_id, trigger_price))
                }
                LiquidationStatus::Safe { .. } => None,
            })
            .collect();

        let mut results = Vec::with_capacity(breached.len());

        for (order_id, trigger_price) in breached {
            let Some(position) = book.remove(order_id) else {
                continue;
            };
            let liquidated = position.into_liquidated();
            let user_id = liquidated.user_id;

            self.unindex_order(user_id, order_id);

            // bookkeeping only; the balance already excludes this margin
            if let Err(e) = self.ledger.record_forfeit(user_id, liquidated.margin_reserved) {
                error!(
                    user_id = %user_id,
                    order_id = %order_id,
                    error = %e,
                    "forfeit not recorded"
                );
            }

            warn!(
                user_id = %user_id,
                order_id = %order_id,
                symbol = %liquidated.symbol,
                side = %liquidated.side,
                trigger = %trigger_price,
                liquidation = %liquidated.liquidation_price,
                margin = %liquidated.margin_reserved,
                "position liquidated"
            );

            self.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
                order_id,
                user_id,
                symbol: liquidated.symbol.clone(),
                side: liquidated.side,
                trigger_price,
                liquidation_price: liquidated.liquidation_price,
                forfeited_margin: liquidated.margin_reserved,
            }));

            results.push(LiquidationResult {
                order_id,
                user_id,
                symbol: liquidated.symbol,
                side: liquidated.side,
                quantity: liquidated.quantity,
                entry_price: liquidated.entry_price,
                liquidation_price: liquidated.liquidation_price,
                trigger_price,
                forfeited_margin: liquidated.margin_reserved,
            });
        }

        results
    }
}
