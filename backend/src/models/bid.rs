//! Bid model
//!
//! A bid offers tokens for a quantity of one capacity type on behalf of one
//! order. Bids are built by an ordering agent and cleared by the producing
//! agent offering that capacity type.

use crate::core::types::{unit_price, Capacity, CapacityType, OrderId, Tokens, UnitPrice};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Capacity type requested (must match the receiving producer)
    pub capacity_type: CapacityType,

    /// Units requested, copied from the order's required part
    pub capacity: Capacity,

    /// Tokens offered for the whole quantity
    pub tokens: Tokens,

    /// Order the bid was placed for
    pub order_id: OrderId,
}

impl Bid {
    pub fn new(
        capacity_type: CapacityType,
        capacity: Capacity,
        tokens: Tokens,
        order_id: OrderId,
    ) -> Self {
        Self {
            capacity_type,
            capacity,
            tokens,
            order_id,
        }
    }

    /// Tokens offered per unit of capacity.
    ///
    /// A zero-capacity bid is priced at 0 so it sorts last.
    pub fn unit_price(&self) -> UnitPrice {
        unit_price(self.tokens, self.capacity).unwrap_or(0.0)
    }
}
