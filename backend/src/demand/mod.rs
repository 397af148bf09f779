//! Demand generation
//!
//! Two [`Consumer`] implementations:
//! - [`RandomConsumer`]: Poisson-distributed request count per cycle, each
//!   request for a uniformly chosen product, paid from its wallet
//! - [`ScriptedConsumer`]: replays a fixed sequence of per-cycle requests
//!
//! Both record what the system hands them in a shared [`LedgerHandle`] so
//! callers can inspect token flows after the consumer was moved into the
//! system.
//!
//! # Example
//!
//! ```
//! use tokenomics_emulator_core_rs::demand::RandomConsumer;
//! use tokenomics_emulator_core_rs::models::consumer::Consumer;
//!
//! let mut consumer = RandomConsumer::new("alice".into(), 42, vec![1, 2], 1.5);
//! consumer.receive(100);
//! let requests = consumer.demand(0);
//! assert!(requests.iter().map(|r| r.tokens).sum::<u64>() <= 100);
//! ```

use crate::core::types::{ConsumerId, Product, Tokens};
use crate::models::consumer::{Consumer, ConsumerRequest};
use crate::rng::RngManager;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Token flows observed by one consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    /// Tokens held and not yet committed to a request
    pub wallet: Tokens,
    /// Total tokens received (emission and refunds)
    pub received: Tokens,
    /// Total tokens committed to requests
    pub committed: Tokens,
    /// Requests reported as fully produced
    pub completed: Vec<ConsumerRequest>,
}

/// Shared view of a consumer's ledger
#[derive(Debug, Clone, Default)]
pub struct LedgerHandle(Arc<Mutex<Ledger>>);

impl LedgerHandle {
    pub fn snapshot(&self) -> Ledger {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        let mut ledger = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut ledger)
    }

    fn receive(&self, tokens: Tokens) {
        self.update(|l| {
            l.wallet = l.wallet.saturating_add(tokens);
            l.received = l.received.saturating_add(tokens);
        });
    }

    /// Commit up to `tokens` from the wallet; returns what was committed
    fn commit(&self, tokens: Tokens) -> Tokens {
        self.update(|l| {
            let tokens = tokens.min(l.wallet);
            l.wallet -= tokens;
            l.committed += tokens;
            tokens
        })
    }

    fn complete(&self, request: &ConsumerRequest) {
        self.update(|l| l.completed.push(request.clone()));
    }
}

// ============================================================================
// Random demand
// ============================================================================

/// Consumer placing a Poisson-distributed number of requests per cycle
///
/// The wallet is split evenly across the cycle's requests; requests that
/// would carry no tokens are not placed.
pub struct RandomConsumer {
    id: ConsumerId,
    rng: RngManager,
    products: Vec<Product>,
    /// Expected requests per cycle (Poisson λ)
    rate_per_cycle: f64,
    ledger: LedgerHandle,
}

impl RandomConsumer {
    pub fn new(id: ConsumerId, seed: u64, products: Vec<Product>, rate_per_cycle: f64) -> Self {
        Self {
            id,
            rng: RngManager::new(seed),
            products,
            rate_per_cycle,
            ledger: LedgerHandle::default(),
        }
    }

    pub fn ledger(&self) -> LedgerHandle {
        self.ledger.clone()
    }
}

impl Consumer for RandomConsumer {
    fn id(&self) -> ConsumerId {
        self.id.clone()
    }

    fn demand(&mut self, _cycle: u64) -> Vec<ConsumerRequest> {
        if self.products.is_empty() {
            return Vec::new();
        }
        let count = self.rng.poisson(self.rate_per_cycle);
        if count == 0 {
            return Vec::new();
        }
        let share = self.ledger.snapshot().wallet / count;
        if share == 0 {
            return Vec::new();
        }

        let mut requests = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let index = self.rng.range(0, self.products.len() as u64) as usize;
            let tokens = self.ledger.commit(share);
            requests.push(ConsumerRequest {
                consumer_id: self.id.clone(),
                product: self.products[index],
                tokens,
            });
        }
        requests
    }

    fn receive(&mut self, tokens: Tokens) {
        self.ledger.receive(tokens);
    }

    fn request_completed(&mut self, request: &ConsumerRequest) {
        self.ledger.complete(request);
    }
}

// ============================================================================
// Scripted demand
// ============================================================================

/// Consumer replaying requests scheduled per cycle
///
/// Scheduled requests are placed with the tokens given in the script,
/// regardless of the wallet.
pub struct ScriptedConsumer {
    id: ConsumerId,
    script: BTreeMap<u64, VecDeque<(Product, Tokens)>>,
    ledger: LedgerHandle,
}

impl ScriptedConsumer {
    pub fn new(id: ConsumerId) -> Self {
        Self {
            id,
            script: BTreeMap::new(),
            ledger: LedgerHandle::default(),
        }
    }

    /// Schedule a request for `product` worth `tokens` in `cycle`
    pub fn with_request(mut self, cycle: u64, product: Product, tokens: Tokens) -> Self {
        self.script
            .entry(cycle)
            .or_default()
            .push_back((product, tokens));
        self
    }

    pub fn ledger(&self) -> LedgerHandle {
        self.ledger.clone()
    }
}

impl Consumer for ScriptedConsumer {
    fn id(&self) -> ConsumerId {
        self.id.clone()
    }

    fn demand(&mut self, cycle: u64) -> Vec<ConsumerRequest> {
        let Some(scheduled) = self.script.remove(&cycle) else {
            return Vec::new();
        };
        scheduled
            .into_iter()
            .map(|(product, tokens)| {
                self.ledger.update(|l| {
                    l.wallet = l.wallet.saturating_sub(tokens);
                    l.committed += tokens;
                });
                ConsumerRequest {
                    consumer_id: self.id.clone(),
                    product,
                    tokens,
                }
            })
            .collect()
    }

    fn receive(&mut self, tokens: Tokens) {
        self.ledger.receive(tokens);
    }

    fn request_completed(&mut self, request: &ConsumerRequest) {
        self.ledger.complete(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_demand_is_deterministic() {
        let mut a = RandomConsumer::new("a".into(), 99, vec![1, 2, 3], 2.0);
        let mut b = RandomConsumer::new("a".into(), 99, vec![1, 2, 3], 2.0);

        for cycle in 0..20 {
            a.receive(100);
            b.receive(100);
            assert_eq!(a.demand(cycle), b.demand(cycle));
        }
    }

    #[test]
    fn test_random_demand_spends_from_wallet() {
        let mut consumer = RandomConsumer::new("a".into(), 5, vec![1], 3.0);
        let ledger = consumer.ledger();
        consumer.receive(90);

        let mut spent = 0;
        for cycle in 0..10 {
            spent += consumer.demand(cycle).iter().map(|r| r.tokens).sum::<Tokens>();
        }

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.committed, spent);
        assert_eq!(snapshot.wallet + spent, 90);
    }

    #[test]
    fn test_empty_wallet_places_nothing() {
        let mut consumer = RandomConsumer::new("a".into(), 5, vec![1], 5.0);
        for cycle in 0..10 {
            assert!(consumer.demand(cycle).is_empty());
        }
    }

    #[test]
    fn test_scripted_demand_replays_schedule() {
        let mut consumer = ScriptedConsumer::new("s".into())
            .with_request(0, 1, 10)
            .with_request(0, 2, 20)
            .with_request(2, 1, 5);

        let first = consumer.demand(0);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].product, 2);
        assert!(consumer.demand(1).is_empty());
        assert_eq!(consumer.demand(2)[0].tokens, 5);
        assert!(consumer.demand(2).is_empty());
    }

    #[test]
    fn test_ledger_records_receipts_and_completions() {
        let mut consumer = ScriptedConsumer::new("s".into()).with_request(0, 1, 10);
        let ledger = consumer.ledger();

        consumer.receive(50);
        let request = consumer.demand(0).remove(0);
        consumer.request_completed(&request);

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.received, 50);
        assert_eq!(snapshot.wallet, 40);
        assert_eq!(snapshot.completed, vec![request]);
    }
}
