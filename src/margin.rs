//! Margin calculation for opening positions.
//!
//! Margin is the notional value at entry divided by leverage. It is computed
//! once when the position opens and never recomputed: a 10x position on $150
//! of notional locks $15 for its whole life.

use crate::types::{Leverage, Money, Price};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarginRequirement {
    pub notional: Money,
    pub margin: Money,
    pub leverage: Leverage,
}

pub fn notional_value(quantity: Decimal, price: Price) -> Money {
    Money::new(quantity.abs() * price.value())
}

// entry * qty / leverage. division last so 3x on 150 is exactly 50.
pub fn calculate_margin_requirement(
    quantity: Decimal,
    entry_price: Price,
    leverage: Leverage,
) -> MarginRequirement {
    let notional = notional_value(quantity, entry_price);
    let margin = Money::new(notional.value() / leverage.value());

    MarginRequirement {
        notional,
        margin,
        leverage,
    }
}

/// Ratio of equity to entry notional. 0.1 means the position is carried at 10x.
pub fn margin_ratio(equity: Money, notional: Money) -> Decimal {
    if notional.value().is_zero() {
        return Decimal::MAX;
    }
    equity.value() / notional.value()
}
