// 8.0.2: result types and errors for engine operations.

use crate::ledger::LedgerError;
use crate::position::Position;
use crate::types::{Leverage, Money, OrderId, Price, Side, Symbol, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResult {
    pub position: Position,
    pub new_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResult {
    pub position: Position,
    pub exit_price: Price,
    pub pnl: Money,
    /// Margin plus pnl returned to the balance, never below zero.
    pub credited: Money,
    pub new_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Price,
    pub liquidation_price: Price,
    pub trigger_price: Price,
    pub forfeited_margin: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub user_id: UserId,
    pub balance: Money,
    pub locked_margin: Money,
    pub unrealized_pnl: Money,
    pub equity: Money,
    pub margin_ratio: Decimal,
    pub open_positions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("No price available for {0}")]
    NoPriceAvailable(Symbol),

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Money, available: Money },

    #[error("Position {0} not found")]
    NotFound(OrderId),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("User {0} already exists")]
    UserAlreadyExists(UserId),

    #[error("Invalid symbol {0:?}")]
    InvalidSymbol(String),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("Leverage must be at least 1, got {0}")]
    InvalidLeverage(Decimal),

    #[error("Leverage {requested} exceeds maximum {max}")]
    LeverageTooHigh { requested: Decimal, max: Leverage },

    #[error("Price must not be negative, got {0}")]
    InvalidPrice(Decimal),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Money),

    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                requested,
                available,
            } => EngineError::InsufficientMargin {
                required: requested,
                available,
            },
            LedgerError::UnknownUser(id) => EngineError::UserNotFound(id),
            LedgerError::UserExists(id) => EngineError::UserAlreadyExists(id),
        }
    }
}
