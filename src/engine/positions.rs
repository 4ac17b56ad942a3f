//! Opening, closing and querying positions.

use super::core::Engine;
use super::results::{AccountSummary, CloseResult, EngineError, OpenResult};
use crate::events::{EventPayload, OpenRejectedEvent, PositionClosedEvent, PositionOpenedEvent};
use crate::margin::{calculate_margin_requirement, margin_ratio};
use crate::position::{settle_close, Position};
use crate::types::{Leverage, Money, OrderId, Side, Symbol, Timestamp, UserId};
use rust_decimal::Decimal;
use tracing::{debug, info};

impl Engine {
    /// Open a position at the current quote: longs pay the ask, shorts get the bid.
    pub fn open_position(
        &self,
        user_id: UserId,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        leverage: Decimal,
    ) -> Result<OpenResult, EngineError> {
        let symbol = Self::parse_symbol(symbol)?;
        let leverage = self.validate_request(quantity, leverage)?;

        if !self.ledger.contains(user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        // update_quote creates the book before the first quote lands
        let book = self
            .existing_book(&symbol)
            .ok_or_else(|| EngineError::NoPriceAvailable(symbol.clone()))?;
        let mut book = book.lock();

        let quote = self
            .quotes
            .get(&symbol)
            .ok_or_else(|| EngineError::NoPriceAvailable(symbol.clone()))?;
        let entry_price = quote.entry_price(side);

        let margin_req = calculate_margin_requirement(quantity, entry_price, leverage);
        let new_balance = match self.ledger.reserve(user_id, margin_req.margin) {
            Ok(balance) => balance,
            Err(e) => {
                let err = EngineError::from(e);
                debug!(user_id = %user_id, symbol = %symbol, error = %err, "open rejected");
                self.emit_event(EventPayload::OpenRejected(OpenRejectedEvent {
                    user_id,
                    symbol,
                    side,
                    reason: err.to_string(),
                }));
                return Err(err);
            }
        };

        let order_id = self.next_order_id();
        let position = Position::open(
            order_id,
            user_id,
            side,
            symbol.clone(),
            entry_price,
            quantity,
            leverage,
            Timestamp::now(),
        );

        if book.insert(position.clone()).is_some() {
            // ids come from a counter; a collision means the counter is broken
            self.ledger.release(user_id, margin_req.margin)?;
            return Err(EngineError::Internal(format!("order id {order_id} reused")));
        }
        self.index_order(user_id, order_id, symbol.clone());

        info!(
            user_id = %user_id,
            order_id = %order_id,
            symbol = %symbol,
            side = %side,
            entry = %entry_price,
            margin = %position.margin_reserved,
            liquidation = %position.liquidation_price,
            "position opened"
        );

        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            order_id,
            user_id,
            symbol,
            side,
            quantity,
            entry_price,
            leverage,
            margin_reserved: position.margin_reserved,
            liquidation_price: position.liquidation_price,
            new_balance,
        }));

        Ok(OpenResult {
            position,
            new_balance,
        })
    }

    /// Close an open position at the current quote and pay back margin plus PnL.
    ///
    /// Fails with `NotFound` when the position does not exist, belongs to
    /// someone else, or already left the open set through a close or a
    /// liquidation.
    pub fn close_position(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<CloseResult, EngineError> {
        let symbol = self
            .user_orders
            .get(&user_id)
            .and_then(|orders| orders.get(&order_id).cloned())
            .ok_or(EngineError::NotFound(order_id))?;

        let book = self
            .existing_book(&symbol)
            .ok_or(EngineError::NotFound(order_id))?;
        let mut book = book.lock();

        // recheck under the lock: a sweep may have won the race
        let position = book
            .get(order_id)
            .filter(|p| p.user_id == user_id)
            .ok_or(EngineError::NotFound(order_id))?;

        let quote = self
            .quotes
            .get(&symbol)
            .ok_or_else(|| EngineError::NoPriceAvailable(symbol.clone()))?;

        let settlement = settle_close(position, quote.exit_price(position.side));

        // credit first: if the ledger refuses, the position stays open
        let new_balance = self
            .ledger
            .release(user_id, settlement.credited)
            .map_err(|e| {
                EngineError::Internal(format!("release for position {order_id}: {e}"))
            })?;

        let closed = book
            .remove(order_id)
            .ok_or_else(|| {
                EngineError::Internal(format!("position {order_id} vanished under lock"))
            })?
            .into_closed();
        self.unindex_order(user_id, order_id);

        info!(
            user_id = %user_id,
            order_id = %order_id,
            symbol = %symbol,
            exit = %settlement.exit_price,
            pnl = %settlement.realized_pnl,
            credited = %settlement.credited,
            balance = %new_balance,
            "position closed"
        );

        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            order_id,
            user_id,
            symbol,
            exit_price: settlement.exit_price,
            realized_pnl: settlement.realized_pnl,
            credited: settlement.credited,
            new_balance,
        }));

        Ok(CloseResult {
            position: closed,
            exit_price: settlement.exit_price,
            pnl: settlement.realized_pnl,
            credited: settlement.credited,
            new_balance,
        })
    }

    /// Open positions of a user, oldest first.
    pub fn list_open_positions(&self, user_id: UserId) -> Result<Vec<Position>, EngineError> {
        if !self.ledger.contains(user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let orders: Vec<(OrderId, Symbol)> = self
            .user_orders
            .get(&user_id)
            .map(|orders| orders.iter().map(|(id, sym)| (*id, sym.clone())).collect())
            .unwrap_or_default();

        let mut positions = Vec::with_capacity(orders.len());
        for (order_id, symbol) in orders {
            let Some(book) = self.existing_book(&symbol) else {
                continue;
            };
            let book = book.lock();
            if let Some(position) = book.get(order_id) {
                positions.push(position.clone());
            }
        }

        Ok(positions)
    }

    pub fn get_position(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Position, EngineError> {
        let symbol = self
            .user_orders
            .get(&user_id)
            .and_then(|orders| orders.get(&order_id).cloned())
            .ok_or(EngineError::NotFound(order_id))?;

        let book = self
            .existing_book(&symbol)
            .ok_or(EngineError::NotFound(order_id))?;
        let book = book.lock();
        book.get(order_id)
            .filter(|p| p.user_id == user_id)
            .cloned()
            .ok_or(EngineError::NotFound(order_id))
    }

    /// Mark an open position to the price it would close at right now.
    pub fn unrealized_pnl(&self, user_id: UserId, order_id: OrderId) -> Result<Money, EngineError> {
        let position = self.get_position(user_id, order_id)?;
        let quote = self
            .quotes
            .get(&position.symbol)
            .ok_or_else(|| EngineError::NoPriceAvailable(position.symbol.clone()))?;
        Ok(position.unrealized_pnl(&quote))
    }

    /// Balance, locked margin and mark-to-market equity for one user.
    pub fn account_summary(&self, user_id: UserId) -> Result<AccountSummary, EngineError> {
        let positions = self.list_open_positions(user_id)?;
        let balance = self.ledger.balance(user_id)?;

        let locked_margin: Money = positions.iter().map(|p| p.margin_reserved).sum();
        let notional: Money = positions.iter().map(|p| p.notional_value()).sum();
        let unrealized_pnl: Money = positions
            .iter()
            .filter_map(|p| self.quotes.get(&p.symbol).map(|q| p.unrealized_pnl(&q)))
            .sum();

        let position_equity = locked_margin.add(unrealized_pnl);

        Ok(AccountSummary {
            user_id,
            balance,
            locked_margin,
            unrealized_pnl,
            equity: balance.add(position_equity),
            margin_ratio: margin_ratio(position_equity, notional),
            open_positions: positions.len(),
        })
    }

    fn validate_request(
        &self,
        quantity: Decimal,
        leverage: Decimal,
    ) -> Result<Leverage, EngineError> {
        if quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(quantity));
        }

        let leverage = Leverage::new(leverage).ok_or(EngineError::InvalidLeverage(leverage))?;
        if let Some(max) = self.config.max_leverage {
            if leverage > max {
                return Err(EngineError::LeverageTooHigh {
                    requested: leverage.value(),
                    max,
                });
            }
        }

        Ok(leverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::position::PositionStatus;
    use crate::types::Price;
    use rust_decimal_macros::dec;

    fn setup_engine() -> Engine {
        let engine = Engine::new(EngineConfig::default());
        engine.register_user(UserId(1)).unwrap();
        engine
    }

    fn tick(engine: &Engine, symbol: &str, bid: Decimal, ask: Decimal) {
        engine.update_quote(
            Symbol::parse(symbol).unwrap(),
            Price::new_unchecked(bid),
            Price::new_unchecked(ask),
        );
    }

    #[test]
    fn open_long_uses_ask() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));

        let result = engine
            .open_position(UserId(1), "solusdt", Side::Long, dec!(1), dec!(10))
            .unwrap();

        assert_eq!(result.position.entry_price.value(), dec!(150));
        assert_eq!(result.position.margin_reserved.value(), dec!(15));
        assert_eq!(result.position.liquidation_price.value(), dec!(135));
        assert_eq!(result.position.symbol.as_str(), "SOLUSDT");
        assert_eq!(result.new_balance.value(), dec!(9985));
    }

    #[test]
    fn open_short_uses_bid() {
        let engine = setup_engine();
        tick(&engine, "ETHUSDT", dec!(2000), dec!(2001));

        let result = engine
            .open_position(UserId(1), "ETHUSDT", Side::Short, dec!(2), dec!(5))
            .unwrap();

        assert_eq!(result.position.entry_price.value(), dec!(2000));
        assert_eq!(result.position.margin_reserved.value(), dec!(800));
        assert_eq!(result.position.liquidation_price.value(), dec!(2400));
        assert_eq!(result.new_balance.value(), dec!(9200));
    }

    #[test]
    fn open_without_quote() {
        let engine = setup_engine();
        let err = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap_err();
        assert_eq!(err, EngineError::NoPriceAvailable(Symbol::parse("SOLUSDT").unwrap()));
        assert!(engine.books.is_empty());
    }

    #[test]
    fn open_unknown_user() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));
        let err = engine
            .open_position(UserId(99), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap_err();
        assert_eq!(err, EngineError::UserNotFound(UserId(99)));
    }

    #[test]
    fn open_rejects_bad_inputs() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));

        assert_eq!(
            engine.open_position(UserId(1), "SOLUSDT", Side::Long, dec!(0), dec!(10)),
            Err(EngineError::InvalidQuantity(dec!(0)))
        );
        assert_eq!(
            engine.open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(0.5)),
            Err(EngineError::InvalidLeverage(dec!(0.5)))
        );
        assert!(matches!(
            engine.open_position(UserId(1), " ", Side::Long, dec!(1), dec!(10)),
            Err(EngineError::InvalidSymbol(_))
        ));
        assert_eq!(engine.get_balance(UserId(1)).unwrap().value(), dec!(10000));
    }

    #[test]
    fn open_accepts_high_leverage_by_default() {
        let engine = setup_engine();
        tick(&engine, "BTCUSDT", dec!(59990), dec!(60000));

        let result = engine
            .open_position(UserId(1), "BTCUSDT", Side::Long, dec!(1), dec!(125))
            .unwrap();
        assert_eq!(result.position.leverage.value(), dec!(125));
        assert_eq!(result.position.margin_reserved.value(), dec!(480));
        assert_eq!(result.position.liquidation_price.value(), dec!(59520));
    }

    #[test]
    fn configured_leverage_ceiling_rejects() {
        let config = EngineConfig {
            max_leverage: Leverage::new(dec!(100)),
            ..EngineConfig::default()
        };
        let engine = Engine::new(config);
        engine.register_user(UserId(1)).unwrap();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));

        assert_eq!(
            engine.open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(101)),
            Err(EngineError::LeverageTooHigh {
                requested: dec!(101),
                max: Leverage::new(dec!(100)).unwrap(),
            })
        );
        assert!(engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(100))
            .is_ok());
    }

    #[test]
    fn open_insufficient_margin_creates_nothing() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));

        // 100 * 150 / 1 = 15000 > 10000
        let err = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(100), dec!(1))
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientMargin { .. }));
        assert_eq!(engine.get_balance(UserId(1)).unwrap().value(), dec!(10000));
        assert!(engine.list_open_positions(UserId(1)).unwrap().is_empty());
        assert!(engine
            .events()
            .iter()
            .any(|e| matches!(e.payload, EventPayload::OpenRejected(_))));
    }

    #[test]
    fn close_long_at_bid() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));
        let opened = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap();

        tick(&engine, "SOLUSDT", dec!(160), dec!(161));
        let closed = engine.close_position(UserId(1), opened.position.order_id).unwrap();

        assert_eq!(closed.exit_price.value(), dec!(160));
        assert_eq!(closed.pnl.value(), dec!(10));
        assert_eq!(closed.new_balance.value(), dec!(10010));
        assert_eq!(closed.position.status, PositionStatus::Closed);
    }

    #[test]
    fn close_short_at_ask() {
        let engine = setup_engine();
        tick(&engine, "ETHUSDT", dec!(2000), dec!(2001));
        let opened = engine
            .open_position(UserId(1), "ETHUSDT", Side::Short, dec!(2), dec!(5))
            .unwrap();

        tick(&engine, "ETHUSDT", dec!(1899), dec!(1900));
        let closed = engine.close_position(UserId(1), opened.position.order_id).unwrap();

        // (2000 - 1900) * 2
        assert_eq!(closed.pnl.value(), dec!(200));
        assert_eq!(closed.new_balance.value(), dec!(10200));
    }

    #[test]
    fn close_twice_is_not_found() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));
        let order_id = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap()
            .position
            .order_id;

        engine.close_position(UserId(1), order_id).unwrap();
        assert_eq!(
            engine.close_position(UserId(1), order_id),
            Err(EngineError::NotFound(order_id))
        );
    }

    #[test]
    fn close_someone_elses_position() {
        let engine = setup_engine();
        engine.register_user(UserId(2)).unwrap();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));
        let order_id = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap()
            .position
            .order_id;

        assert_eq!(
            engine.close_position(UserId(2), order_id),
            Err(EngineError::NotFound(order_id))
        );
        assert_eq!(engine.list_open_positions(UserId(1)).unwrap().len(), 1);
    }

    #[test]
    fn list_in_open_order_across_symbols() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));
        tick(&engine, "ETHUSDT", dec!(2000), dec!(2001));

        let a = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap();
        let b = engine
            .open_position(UserId(1), "ETHUSDT", Side::Short, dec!(1), dec!(10))
            .unwrap();
        let c = engine
            .open_position(UserId(1), "SOLUSDT", Side::Short, dec!(1), dec!(10))
            .unwrap();

        let ids: Vec<OrderId> = engine
            .list_open_positions(UserId(1))
            .unwrap()
            .iter()
            .map(|p| p.order_id)
            .collect();
        assert_eq!(ids, vec![a.position.order_id, b.position.order_id, c.position.order_id]);
    }

    #[test]
    fn list_unknown_user() {
        let engine = setup_engine();
        assert_eq!(
            engine.list_open_positions(UserId(5)),
            Err(EngineError::UserNotFound(UserId(5)))
        );
    }

    #[test]
    fn unrealized_and_summary() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));
        let order_id = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap()
            .position
            .order_id;

        tick(&engine, "SOLUSDT", dec!(155), dec!(156));
        assert_eq!(engine.unrealized_pnl(UserId(1), order_id).unwrap().value(), dec!(5));

        let summary = engine.account_summary(UserId(1)).unwrap();
        assert_eq!(summary.balance.value(), dec!(9985));
        assert_eq!(summary.locked_margin.value(), dec!(15));
        assert_eq!(summary.unrealized_pnl.value(), dec!(5));
        assert_eq!(summary.equity.value(), dec!(10005));
        assert_eq!(summary.open_positions, 1);
        // (15 + 5) / 150
        assert_eq!(summary.margin_ratio.round_dp(4), dec!(0.1333));
    }

    #[test]
    fn close_reports_full_loss_and_floors_credit() {
        let engine = setup_engine();
        // wide spread: bid already under the long's liquidation price at open
        tick(&engine, "SOLUSDT", dec!(100), dec!(150));
        let order_id = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap()
            .position
            .order_id;

        let closed = engine.close_position(UserId(1), order_id).unwrap();
        // (100 - 150) * 1
        assert_eq!(closed.pnl.value(), dec!(-50));
        assert_eq!(closed.credited, Money::zero());
        assert_eq!(closed.new_balance.value(), dec!(9985));

        let event = engine
            .events()
            .into_iter()
            .find_map(|e| match e.payload {
                EventPayload::PositionClosed(closed) => Some(closed),
                _ => None,
            })
            .unwrap();
        assert_eq!(event.realized_pnl.value(), dec!(-50));
        assert_eq!(event.credited, Money::zero());
    }

    #[test]
    fn close_profit_credits_margin_plus_pnl() {
        let engine = setup_engine();
        tick(&engine, "SOLUSDT", dec!(149), dec!(150));
        let order_id = engine
            .open_position(UserId(1), "SOLUSDT", Side::Long, dec!(1), dec!(10))
            .unwrap()
            .position
            .order_id;

        tick(&engine, "SOLUSDT", dec!(160), dec!(161));
        let closed = engine.close_position(UserId(1), order_id).unwrap();
        assert_eq!(closed.credited.value(), dec!(25));
    }
}
