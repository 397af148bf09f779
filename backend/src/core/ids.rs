//! Order id generation
//!
//! The generator is an injected collaborator. It takes `&self` so a single
//! generator can be shared by consecutive engines (see
//! [`Emulator::reset`](crate::orchestrator::Emulator::reset)) and ids stay
//! unique for the whole process lifetime.

use crate::core::types::OrderId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of globally unique order ids
pub trait OrderIdGenerator: Send + Sync {
    /// Produce an id that has never been returned before
    fn next_id(&self) -> OrderId;
}

/// Monotonic counter rendered as decimal strings (`"0"`, `"1"`, ...)
///
/// # Example
/// ```
/// use tokenomics_emulator_core_rs::core::ids::{OrderIdGenerator, SequentialIdGenerator};
///
/// let ids = SequentialIdGenerator::new();
/// assert_eq!(ids.next_id().as_str(), "0");
/// assert_eq!(ids.next_id().as_str(), "1");
/// ```
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Value the next call will render
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl OrderIdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> OrderId {
        let value = self.next.fetch_add(1, Ordering::SeqCst);
        OrderId::new(value.to_string())
    }
}

/// Random v4 UUIDs, for deployments where ids must not be guessable
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl OrderIdGenerator for UuidIdGenerator {
    fn next_id(&self) -> OrderId {
        OrderId::new(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids_are_distinct() {
        let ids = SequentialIdGenerator::starting_at(40);
        let a = ids.next_id();
        let b = ids.next_id();

        assert_eq!(a.as_str(), "40");
        assert_eq!(b.as_str(), "41");
        assert_eq!(ids.peek(), 42);
    }

    #[test]
    fn test_uuid_ids_are_distinct() {
        let ids = UuidIdGenerator;
        let seen: HashSet<_> = (0..100).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 100);
    }
}
