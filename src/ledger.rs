//! Per-user cash balances.
//!
//! A balance is the cash a user can post as margin. Margin locked on open
//! positions is not part of it: `reserve` moves money out when a position
//! opens, `release` moves margin plus realized PnL back when it closes, and a
//! liquidation releases nothing.
//!
//! Each account lives in one `DashMap` slot. Every mutation runs while holding
//! that slot's write guard, so a check-then-debit can never race another
//! debit for the same user.

use crate::types::{Money, Timestamp, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub balance: Money,
    pub total_deposited: Money,
    pub total_reserved: Money,
    pub total_released: Money,
    pub forfeited_margin: Money,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(id: UserId, initial_balance: Money, timestamp: Timestamp) -> Self {
        Self {
            id,
            balance: initial_balance,
            total_deposited: initial_balance,
            total_reserved: Money::zero(),
            total_released: Money::zero(),
            forfeited_margin: Money::zero(),
            created_at: timestamp,
        }
    }

    pub fn deposit(&mut self, amount: Money) {
        self.balance = self.balance.add(amount);
        self.total_deposited = self.total_deposited.add(amount);
    }

    pub fn reserve(&mut self, amount: Money) -> Result<(), LedgerError> {
        if amount.value() > self.balance.value() {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance = self.balance.sub(amount);
        self.total_reserved = self.total_reserved.add(amount);
        Ok(())
    }

    // may be negative: margin back plus a loss
    pub fn release(&mut self, amount: Money) {
        self.balance = self.balance.add(amount);
        self.total_released = self.total_released.add(amount);
    }

    pub fn forfeit(&mut self, margin: Money) {
        self.forfeited_margin = self.forfeited_margin.add(margin);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },

    #[error("User {0} not found")]
    UnknownUser(UserId),

    #[error("User {0} already exists")]
    UserExists(UserId),
}

#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<UserId, Account>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_account(&self, id: UserId, initial_balance: Money) -> Result<(), LedgerError> {
        match self.accounts.entry(id) {
            Entry::Occupied(_) => Err(LedgerError::UserExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(Account::new(id, initial_balance, Timestamp::now()));
                Ok(())
            }
        }
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.accounts.contains_key(&id)
    }

    pub fn deposit(&self, id: UserId, amount: Money) -> Result<Money, LedgerError> {
        let mut account = self.accounts.get_mut(&id).ok_or(LedgerError::UnknownUser(id))?;
        account.deposit(amount);
        Ok(account.balance)
    }

    /// Atomic check-and-debit. Returns the balance after the debit.
    pub fn reserve(&self, id: UserId, amount: Money) -> Result<Money, LedgerError> {
        let mut account = self.accounts.get_mut(&id).ok_or(LedgerError::UnknownUser(id))?;
        account.reserve(amount)?;
        Ok(account.balance)
    }

    /// Unconditional credit. Returns the balance after the credit.
    pub fn release(&self, id: UserId, amount: Money) -> Result<Money, LedgerError> {
        let mut account = self.accounts.get_mut(&id).ok_or(LedgerError::UnknownUser(id))?;
        account.release(amount);
        Ok(account.balance)
    }

    /// Books margin lost to a liquidation. The balance does not move.
    pub fn record_forfeit(&self, id: UserId, margin: Money) -> Result<Money, LedgerError> {
        let mut account = self.accounts.get_mut(&id).ok_or(LedgerError::UnknownUser(id))?;
        account.forfeit(margin);
        Ok(account.balance)
    }

    pub fn balance(&self, id: UserId) -> Result<Money, LedgerError> {
        self.accounts
            .get(&id)
            .map(|a| a.balance)
            .ok_or(LedgerError::UnknownUser(id))
    }

    pub fn account(&self, id: UserId) -> Option<Account> {
        self.accounts.get(&id).map(|a| a.value().clone())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
