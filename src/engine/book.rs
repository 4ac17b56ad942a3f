//! Open positions for one symbol.
//!
//! Keyed by order id. Ids come from a monotonic counter, so iteration order is
//! open order and a sweep always visits positions in the same sequence.

use crate::position::Position;
use crate::types::OrderId;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct PositionBook {
    open: BTreeMap<OrderId, Position>,
}

impl PositionBook {
    pub fn insert(&mut self, position: Position) -> Option<Position> {
        self.open.insert(position.order_id, position)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Position> {
        self.open.get(&order_id)
    }

    pub fn remove(&mut self, order_id: OrderId) -> Option<Position> {
        self.open.remove(&order_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }
}
