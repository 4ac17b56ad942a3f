// 11.0: every state change produces an event. used for audit trails and for
// checking after the fact that each position left Open exactly once.

use crate::types::{Leverage, Money, OrderId, Price, Side, Symbol, Timestamp, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Account events
    UserRegistered(UserRegisteredEvent),
    Deposit(DepositEvent),

    // Price events
    QuoteUpdated(QuoteUpdatedEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
    OpenRejected(OpenRejectedEvent),

    // Risk events
    PositionLiquidated(PositionLiquidatedEvent),
}

impl EventPayload {
    /// Order id of the position this event ends, if it ends one.
    pub fn terminal_order_id(&self) -> Option<OrderId> {
        match self {
            EventPayload::PositionClosed(e) => Some(e.order_id),
            EventPayload::PositionLiquidated(e) => Some(e.order_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegisteredEvent {
    pub user_id: UserId,
    pub initial_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub user_id: UserId,
    pub amount: Money,
    pub new_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteUpdatedEvent {
    pub symbol: Symbol,
    pub bid: Price,
    pub ask: Price,
    pub liquidations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Price,
    pub leverage: Leverage,
    pub margin_reserved: Money,
    pub liquidation_price: Price,
    pub new_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub exit_price: Price,
    pub realized_pnl: Money,
    pub credited: Money,
    pub new_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub trigger_price: Price,
    pub liquidation_price: Price,
    pub forfeited_margin: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRejectedEvent {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub reason: String,
}

/// Bounded in-memory event history. The oldest events are dropped first.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<Event>,
    next_id: u64,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_id: 1,
            capacity: capacity.max(1),
        }
    }

    pub fn emit(&mut self, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.events.push_back(Event::new(id, Timestamp::now(), payload));

        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
        id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    pub fn recent(&self, count: usize) -> Vec<Event> {
        let start = self.events.len().saturating_sub(count);
        self.events.iter().skip(start).cloned().collect()
    }
}
