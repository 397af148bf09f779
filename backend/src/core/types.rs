//! Domain scalars and identifiers
//!
//! Tokens and capacity are unsigned integers: the engine never holds a
//! negative balance or a negative capacity, so every subtraction is either
//! checked (balances) or saturating (capacity).
//!
//! Identifiers are string newtypes so a producer id can never be passed where
//! an order id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of account, emitted every cycle and spent on bids.
pub type Tokens = u64;

/// Abstract resource quantity supplied by a producer.
pub type Capacity = u64;

/// Product identifier used by process sheets and investment specs.
pub type Product = u32;

/// Per-unit capacity price (`tokens / capacity`).
pub type UnitPrice = f64;

/// Cycle penalty score. 0 is best, 5 is the timeout penalty.
pub type Score = u32;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Resource category a requirement or producer refers to
    CapacityType
);
string_id!(
    /// Unique order identifier, supplied by an [`OrderIdGenerator`](crate::core::ids::OrderIdGenerator)
    OrderId
);
string_id!(ProducerId);
string_id!(ConsumerId);
string_id!(
    /// Mailbox identifier. Consumers and producers share the namespace, so
    /// the owner kind is encoded as a prefix (`c` or `p`).
    OrderingAgentId
);

impl OrderingAgentId {
    /// Ordering agent that places a consumer's product requests
    pub fn from_consumer(id: &ConsumerId) -> Self {
        Self(format!("c{}", id))
    }

    /// Ordering agent that places a producer's investment requests
    pub fn from_producer(id: &ProducerId) -> Self {
        Self(format!("p{}", id))
    }
}

/// Per-unit price of buying `capacity` units for `tokens`.
///
/// Returns `None` for zero capacity, which no valid bid carries.
pub fn unit_price(tokens: Tokens, capacity: Capacity) -> Option<UnitPrice> {
    if capacity == 0 {
        return None;
    }
    Some(tokens as f64 / capacity as f64)
}
