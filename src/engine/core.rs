// 8.0 engine/core.rs: main engine. holds quotes, balances, open positions, audit log.
//
// all methods take &self: the engine is shared across the feed thread and
// request handlers behind an Arc. state is partitioned by symbol, and every
// mutation of a symbol's positions happens under that symbol's mutex. the
// quote slot for a symbol is only written under the same mutex, so whoever
// holds it sees one consistent quote.
//
// lock order: symbol book -> ledger slot / user index slot -> event log.
// nothing acquires a book while holding any of the others.

use super::book::PositionBook;
use super::config::{ConfigError, EngineConfig};
use super::results::EngineError;
use crate::events::{DepositEvent, Event, EventLog, EventPayload, UserRegisteredEvent};
use crate::ledger::{Account, Ledger};
use crate::quotes::{Quote, QuoteCache};
use crate::types::{Money, OrderId, Symbol, UserId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) quotes: QuoteCache,
    pub(super) ledger: Ledger,
    pub(super) books: DashMap<Symbol, Arc<Mutex<PositionBook>>>,
    // user -> open order ids and their symbols, in open order
    pub(super) user_orders: DashMap<UserId, BTreeMap<OrderId, Symbol>>,
    pub(super) events: Mutex<EventLog>,
    pub(super) next_order_id: AtomicU64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let engine = Self {
            events: Mutex::new(EventLog::new(config.max_events)),
            config,
            quotes: QuoteCache::new(),
            ledger: Ledger::new(),
            books: DashMap::new(),
            user_orders: DashMap::new(),
            next_order_id: AtomicU64::new(1),
        };

        for seed in engine.config.seed_users.clone() {
            if let Err(e) = engine.register_user_with_balance(seed.user_id, seed.balance) {
                warn!(user_id = %seed.user_id, error = %e, "skipping seed user");
            }
        }

        engine
    }

    /// Validates the config before building.
    pub fn try_new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register_user(&self, user_id: UserId) -> Result<Money, EngineError> {
        self.register_user_with_balance(user_id, self.config.default_balance)
    }

    pub fn register_user_with_balance(
        &self,
        user_id: UserId,
        initial_balance: Money,
    ) -> Result<Money, EngineError> {
        if initial_balance.is_negative() {
            return Err(EngineError::InvalidAmount(initial_balance));
        }

        self.ledger.open_account(user_id, initial_balance)?;
        info!(user_id = %user_id, balance = %initial_balance, "user registered");

        self.emit_event(EventPayload::UserRegistered(UserRegisteredEvent {
            user_id,
            initial_balance,
        }));

        Ok(initial_balance)
    }

    pub fn deposit(&self, user_id: UserId, amount: Money) -> Result<Money, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(amount));
        }

        let new_balance = self.ledger.deposit(user_id, amount)?;

        self.emit_event(EventPayload::Deposit(DepositEvent {
            user_id,
            amount,
            new_balance,
        }));

        Ok(new_balance)
    }

    pub fn get_balance(&self, user_id: UserId) -> Result<Money, EngineError> {
        Ok(self.ledger.balance(user_id)?)
    }

    pub fn get_account(&self, user_id: UserId) -> Option<Account> {
        self.ledger.account(user_id)
    }

    pub fn get_quote(&self, symbol: &str) -> Option<Quote> {
        let symbol = Symbol::parse(symbol)?;
        self.quotes.get(&symbol)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.quotes.symbols()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().snapshot()
    }

    pub fn recent_events(&self, count: usize) -> Vec<Event> {
        self.events.lock().recent(count)
    }

    pub(super) fn parse_symbol(raw: &str) -> Result<Symbol, EngineError> {
        Symbol::parse(raw).ok_or_else(|| EngineError::InvalidSymbol(raw.to_string()))
    }

    // the shard guard is dropped before the caller locks the book.
    // only quote updates create a book
    pub(super) fn book(&self, symbol: &Symbol) -> Arc<Mutex<PositionBook>> {
        if let Some(book) = self.existing_book(symbol) {
            return book;
        }
        let entry = self.books.entry(symbol.clone()).or_default();
        Arc::clone(entry.value())
    }

    pub(super) fn existing_book(&self, symbol: &Symbol) -> Option<Arc<Mutex<PositionBook>>> {
        self.books.get(symbol).map(|book| Arc::clone(book.value()))
    }

    pub(super) fn next_order_id(&self) -> OrderId {
        OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(super) fn index_order(&self, user_id: UserId, order_id: OrderId, symbol: Symbol) {
        self.user_orders
            .entry(user_id)
            .or_default()
            .insert(order_id, symbol);
    }

    pub(super) fn unindex_order(&self, user_id: UserId, order_id: OrderId) {
        if let Some(mut orders) = self.user_orders.get_mut(&user_id) {
            orders.remove(&order_id);
        }
    }

    pub(super) fn emit_event(&self, payload: EventPayload) {
        self.events.lock().emit(payload);
    }
}
