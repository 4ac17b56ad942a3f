//! Liquidation price and breach detection.
//!
//! A position is liquidated once the price it would exit at has moved far
//! enough to eat its entire margin. With margin = entry / leverage per unit,
//! that happens at `entry * (1 - 1/L)` for longs and `entry * (1 + 1/L)` for
//! shorts. Fees and funding are not part of the formula.

use crate::position::Position;
use crate::quotes::Quote;
use crate::types::{Leverage, Price, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationStatus {
    Safe {
        trigger_price: Price,
        liquidation_price: Price,
        buffer_percent: Decimal,
    },
    Breached {
        trigger_price: Price,
        liquidation_price: Price,
    },
}

impl LiquidationStatus {
    pub fn is_breached(&self) -> bool {
        matches!(self, LiquidationStatus::Breached { .. })
    }
}

/// Calculates the price at which a position gets liquidated.
pub fn calculate_liquidation_price(entry_price: Price, leverage: Leverage, side: Side) -> Price {
    let fraction = leverage.margin_fraction();

    let liq_price = match side {
        Side::Long => entry_price.value() * (Decimal::ONE - fraction),
        Side::Short => entry_price.value() * (Decimal::ONE + fraction),
    };

    Price::new_unchecked(liq_price.max(Decimal::ZERO))
}

// longs are marked at the bid, shorts at the ask
pub fn trigger_price(side: Side, quote: &Quote) -> Price {
    quote.exit_price(side)
}

pub fn is_breached(side: Side, liquidation_price: Price, quote: &Quote) -> bool {
    let trigger = trigger_price(side, quote);
    match side {
        Side::Long => trigger <= liquidation_price,
        Side::Short => trigger >= liquidation_price,
    }
}

pub fn evaluate_liquidation(position: &Position, quote: &Quote) -> LiquidationStatus {
    let trigger = trigger_price(position.side, quote);
    let liquidation_price = position.liquidation_price;

    if is_breached(position.side, liquidation_price, quote) {
        return LiquidationStatus::Breached {
            trigger_price: trigger,
            liquidation_price,
        };
    }

    // how far the trigger price can still move, as a percent of itself
    let buffer_percent = if trigger.value().is_zero() {
        Decimal::ZERO
    } else {
        (trigger.value() - liquidation_price.value()).abs() / trigger.value() * dec!(100)
    };

    LiquidationStatus::Safe {
        trigger_price: trigger,
        liquidation_price,
        buffer_percent,
    }
}
