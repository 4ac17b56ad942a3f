// 4.0: position record and its math. one shape for longs and shorts:
// margin, leverage and liquidation price are always present and fixed at open.
// pnl is price move * quantity. leverage sizes the margin, never the pnl.

use crate::liquidation::calculate_liquidation_price;
use crate::margin::calculate_margin_requirement;
use crate::quotes::Quote;
use crate::types::{Leverage, Money, OrderId, Price, Side, Symbol, Timestamp, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
    Liquidated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub symbol: Symbol,
    pub entry_price: Price,
    pub quantity: Decimal,
    pub leverage: Leverage,
    pub margin_reserved: Money,
    pub liquidation_price: Price,
    pub status: PositionStatus,
    pub opened_at: Timestamp,
}

impl Position {
    // 4.1: margin and liquidation price are derived here and nowhere else
    pub fn open(
        order_id: OrderId,
        user_id: UserId,
        side: Side,
        symbol: Symbol,
        entry_price: Price,
        quantity: Decimal,
        leverage: Leverage,
        timestamp: Timestamp,
    ) -> Self {
        let margin_req = calculate_margin_requirement(quantity, entry_price, leverage);
        let liquidation_price = calculate_liquidation_price(entry_price, leverage, side);

        Self {
            order_id,
            user_id,
            side,
            symbol,
            entry_price,
            quantity,
            leverage,
            margin_reserved: margin_req.margin,
            liquidation_price,
            status: PositionStatus::Open,
            opened_at: timestamp,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn notional_value(&self) -> Money {
        Money::new(self.quantity * self.entry_price.value())
    }

    // 4.2: paper pnl against the price this position would exit at right now
    pub fn unrealized_pnl(&self, quote: &Quote) -> Money {
        calculate_pnl(self.side, self.quantity, self.entry_price, quote.exit_price(self.side))
    }

    /// Consumes an open position and returns the closed record.
    pub fn into_closed(mut self) -> Self {
        debug_assert!(self.is_open(), "position {} left Open twice", self.order_id);
        self.status = PositionStatus::Closed;
        self
    }

    pub fn into_liquidated(mut self) -> Self {
        debug_assert!(self.is_open(), "position {} left Open twice", self.order_id);
        self.status = PositionStatus::Liquidated;
        self
    }
}

// 4.3: the pnl formula. long: (exit - entry) * qty, short: (entry - exit) * qty
pub fn calculate_pnl(
    side: Side,
    quantity: Decimal,
    entry_price: Price,
    exit_price: Price,
) -> Money {
    let pnl = side.sign() * quantity * (exit_price.value() - entry_price.value());
    Money::new(pnl)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSettlement {
    pub exit_price: Price,
    pub realized_pnl: Money,
    pub credited: Money,
}

// 4.4: what a close pays back. realized_pnl is the plain pnl formula; the
// credit is margin + pnl floored at zero, so a position opened inside its own
// liquidation band cannot push the balance below what it was before the open.
pub fn settle_close(position: &Position, exit_price: Price) -> CloseSettlement {
    let realized_pnl =
        calculate_pnl(position.side, position.quantity, position.entry_price, exit_price);
    let owed = position.margin_reserved.add(realized_pnl);
    let credited = if owed.is_negative() { Money::zero() } else { owed };

    CloseSettlement {
        exit_price,
        realized_pnl,
        credited,
    }
}
