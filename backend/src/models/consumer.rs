//! Consumer collaborator
//!
//! Consumers sit outside the engine. Each cycle the system hands them their
//! share of the token emission, asks them for new product requests and
//! returns the unspent tokens of requests that were rejected.

use crate::core::types::{ConsumerId, Product, Tokens};
use serde::{Deserialize, Serialize};

/// A consumer's request for one unit of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRequest {
    pub consumer_id: ConsumerId,
    pub product: Product,
    /// Tokens the consumer commits to the request
    pub tokens: Tokens,
}

/// Source of demand and sink of emitted or refunded tokens
///
/// Implementations must be deterministic for the engine to be: the system
/// calls them in consumer-id order.
pub trait Consumer: Send + Sync {
    fn id(&self) -> ConsumerId;

    /// Product requests to place this cycle. Every returned request should
    /// carry this consumer's id; the system overrides a mismatching one.
    fn demand(&mut self, cycle: u64) -> Vec<ConsumerRequest>;

    /// Tokens credited to the consumer (cycle emission or refund)
    fn receive(&mut self, tokens: Tokens);

    /// Called once when a request has been fully produced
    fn request_completed(&mut self, _request: &ConsumerRequest) {}
}
