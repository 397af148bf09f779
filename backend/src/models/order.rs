//! Order model
//!
//! An order tracks one request through production. It holds:
//! - The request it serves (consumer demand or producer investment)
//! - The token balance left to spend on bids
//! - One part per capacity type the product's process sheet requires
//! - A funded flag and a counter of unresolved cycles
//!
//! Part lifecycle: `Unknown -> Processing -> Completed` or
//! `Unknown -> Rejected`. A rejected part is bid again in later cycles, so it
//! may move on to `Processing`, `Completed` or stay `Rejected`.
//!
//! CRITICAL: every operation except funding requires a funded order

use crate::core::errors::ErrorKind;
use crate::core::types::{
    Capacity, CapacityType, OrderId, OrderingAgentId, Score, Tokens, UnitPrice,
};
use crate::models::consumer::ConsumerRequest;
use crate::models::process_sheet::ProcessSheet;
use crate::models::producing_agent::InvestmentRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Score of an order completed this cycle
pub const SCORE_COMPLETED: Score = 0;
/// Score of an order still in production
pub const SCORE_STILL_PROCESSING: Score = 1;
/// Score of an order whose parts were all rejected
pub const SCORE_REJECTED: Score = 3;
/// Score of an order dropped after too many unresolved cycles
pub const SCORE_TIMED_OUT: Score = 5;

/// Unresolved cycles an order may accumulate before it times out
pub const MAX_ELAPSED_CYCLES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartStatus {
    /// No bid outcome yet
    Unknown,
    /// Partially produced; the remainder is booked at the producer
    Processing,
    Completed,
    /// Last bid found no capacity
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub capacity: Capacity,
    pub status: PartStatus,
}

/// The request an order serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderRequest {
    Consumer(ConsumerRequest),
    Investment(InvestmentRequest),
}

/// Requester-facing order summary pushed into ordering agent inboxes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    pub id: OrderId,
    pub tokens: Tokens,
    /// Parts still to bid for (neither processing nor completed)
    pub required: BTreeMap<CapacityType, Capacity>,
}

/// Outcome of [`Order::complete_cycle`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    ConsumerCompleted(ConsumerRequest),
    InvestmentCompleted(InvestmentRequest),
    /// `remaining` is refunded to the consumer
    ConsumerRejected {
        remaining: Tokens,
        request: ConsumerRequest,
    },
    /// `remaining` goes back to the investment fund
    InvestmentRejected {
        remaining: Tokens,
        request: InvestmentRequest,
    },
    StillProcessing,
}

impl OrderEvent {
    /// Whether the order leaves the open set
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderEvent::StillProcessing)
    }
}

/// Errors that can occur during order operations
#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("Order {order_id} requires funding")]
    FundingRequired { order_id: OrderId },

    #[error("Order {order_id} is already funded")]
    AlreadyFunded { order_id: OrderId },

    #[error("Order {order_id} is not an investment order")]
    NotAnInvestment { order_id: OrderId },

    #[error("Order {order_id} has no part for capacity type {capacity_type}")]
    PartNotFound {
        order_id: OrderId,
        capacity_type: CapacityType,
    },

    #[error("Order {order_id}: part {capacity_type} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        order_id: OrderId,
        capacity_type: CapacityType,
        from: PartStatus,
        to: PartStatus,
    },

    #[error("Order {order_id} has {available} tokens left, {required} required")]
    InsufficientTokens {
        order_id: OrderId,
        required: Tokens,
        available: Tokens,
    },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::FundingRequired { .. } => ErrorKind::FundingRequired,
            OrderError::AlreadyFunded { .. }
            | OrderError::NotAnInvestment { .. }
            | OrderError::InvalidTransition { .. } => ErrorKind::WrongState,
            OrderError::PartNotFound { .. } => ErrorKind::NotFound,
            OrderError::InsufficientTokens { .. } => ErrorKind::ContractViolation,
        }
    }
}

/// An order for one unit of a product
///
/// # Example
/// ```
/// use tokenomics_emulator_core_rs::models::consumer::ConsumerRequest;
/// use tokenomics_emulator_core_rs::models::order::{Order, OrderEvent, SCORE_COMPLETED};
/// use tokenomics_emulator_core_rs::models::process_sheet::ProcessSheet;
/// use tokenomics_emulator_core_rs::core::types::CapacityType;
///
/// let sheet = ProcessSheet::new(1, [(CapacityType::new("power"), 100)]);
/// let request = ConsumerRequest { consumer_id: "alice".into(), product: 1, tokens: 100 };
/// let mut order = Order::new_consumer("o1".into(), &sheet, request);
///
/// order.completed(&"power".into(), 60).unwrap();
/// let (score, event) = order.complete_cycle().unwrap();
/// assert_eq!(score, SCORE_COMPLETED);
/// assert!(matches!(event, OrderEvent::ConsumerCompleted(_)));
/// assert_eq!(order.tokens(), 40);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,

    /// Token balance left to spend
    tokens: Tokens,

    parts: BTreeMap<CapacityType, Part>,

    request: OrderRequest,

    /// Cycles this order stayed unresolved
    cycles_elapsed: u32,

    funded: bool,
}

fn parts_from(sheet: &ProcessSheet) -> BTreeMap<CapacityType, Part> {
    sheet
        .requirements
        .iter()
        .map(|(capacity_type, capacity)| {
            (
                capacity_type.clone(),
                Part {
                    capacity: *capacity,
                    status: PartStatus::Unknown,
                },
            )
        })
        .collect()
}

impl Order {
    /// Create a consumer order, funded with the request's tokens
    pub fn new_consumer(id: OrderId, sheet: &ProcessSheet, request: ConsumerRequest) -> Self {
        Self {
            id,
            tokens: request.tokens,
            parts: parts_from(sheet),
            request: OrderRequest::Consumer(request),
            cycles_elapsed: 0,
            funded: true,
        }
    }

    /// Create an unfunded investment order with a zero balance
    pub fn new_investment(id: OrderId, sheet: &ProcessSheet, request: InvestmentRequest) -> Self {
        Self {
            id,
            tokens: 0,
            parts: parts_from(sheet),
            request: OrderRequest::Investment(request),
            cycles_elapsed: 0,
            funded: false,
        }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn tokens(&self) -> Tokens {
        self.tokens
    }

    pub fn request(&self) -> &OrderRequest {
        &self.request
    }

    pub fn cycles_elapsed(&self) -> u32 {
        self.cycles_elapsed
    }

    pub fn part_status(&self, capacity_type: &CapacityType) -> Option<PartStatus> {
        self.parts.get(capacity_type).map(|p| p.status)
    }

    pub fn parts(&self) -> impl Iterator<Item = (&CapacityType, &Part)> {
        self.parts.iter()
    }

    pub fn is_investment(&self) -> bool {
        matches!(self.request, OrderRequest::Investment(_))
    }

    pub fn requires_funding(&self) -> bool {
        !self.funded
    }

    fn ensure_funded(&self) -> Result<(), OrderError> {
        if self.requires_funding() {
            return Err(OrderError::FundingRequired {
                order_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Cut-off price recorded by the investment request (funding weight)
    pub fn cut_off_price(&self) -> Result<Option<UnitPrice>, OrderError> {
        match &self.request {
            OrderRequest::Investment(r) => Ok(r.cut_off_price),
            OrderRequest::Consumer(_) => Err(OrderError::NotAnInvestment {
                order_id: self.id.clone(),
            }),
        }
    }

    /// Fund an investment order from the investment fund
    pub fn fund(&mut self, tokens: Tokens) -> Result<(), OrderError> {
        if !self.is_investment() {
            return Err(OrderError::NotAnInvestment {
                order_id: self.id.clone(),
            });
        }
        if self.funded {
            return Err(OrderError::AlreadyFunded {
                order_id: self.id.clone(),
            });
        }
        self.tokens = tokens;
        self.funded = true;
        Ok(())
    }

    pub fn info(&self) -> Result<OrderInfo, OrderError> {
        self.ensure_funded()?;
        let required = self
            .parts
            .iter()
            .filter(|(_, p)| !matches!(p.status, PartStatus::Processing | PartStatus::Completed))
            .map(|(t, p)| (t.clone(), p.capacity))
            .collect();
        Ok(OrderInfo {
            id: self.id.clone(),
            tokens: self.tokens,
            required,
        })
    }

    /// Ordering agent that bids for this order
    pub fn agent_id(&self) -> Result<OrderingAgentId, OrderError> {
        self.ensure_funded()?;
        Ok(match &self.request {
            OrderRequest::Consumer(r) => OrderingAgentId::from_consumer(&r.consumer_id),
            OrderRequest::Investment(r) => OrderingAgentId::from_producer(&r.producer_id),
        })
    }

    fn status_of(&self, capacity_type: &CapacityType) -> Result<PartStatus, OrderError> {
        self.ensure_funded()?;
        self.part_status(capacity_type)
            .ok_or_else(|| OrderError::PartNotFound {
                order_id: self.id.clone(),
                capacity_type: capacity_type.clone(),
            })
    }

    fn invalid_transition(
        &self,
        capacity_type: &CapacityType,
        from: PartStatus,
        to: PartStatus,
    ) -> OrderError {
        OrderError::InvalidTransition {
            order_id: self.id.clone(),
            capacity_type: capacity_type.clone(),
            from,
            to,
        }
    }

    fn spend(&mut self, tokens: Tokens) -> Result<(), OrderError> {
        if tokens > self.tokens {
            return Err(OrderError::InsufficientTokens {
                order_id: self.id.clone(),
                required: tokens,
                available: self.tokens,
            });
        }
        self.tokens -= tokens;
        Ok(())
    }

    fn set_status(&mut self, capacity_type: &CapacityType, status: PartStatus) {
        if let Some(part) = self.parts.get_mut(capacity_type) {
            part.status = status;
        }
    }

    /// Mark a part as partially produced, spending the bid's tokens
    ///
    /// Repeating the call on a processing part is a no-op.
    pub fn processing(&mut self, capacity_type: &CapacityType, tokens: Tokens) -> Result<(), OrderError> {
        match self.status_of(capacity_type)? {
            PartStatus::Processing => Ok(()),
            PartStatus::Completed => Err(self.invalid_transition(
                capacity_type,
                PartStatus::Completed,
                PartStatus::Processing,
            )),
            PartStatus::Unknown | PartStatus::Rejected => {
                self.spend(tokens)?;
                self.set_status(capacity_type, PartStatus::Processing);
                Ok(())
            }
        }
    }

    /// Mark a part as produced
    ///
    /// Tokens are spent unless the part was already charged as processing.
    pub fn completed(&mut self, capacity_type: &CapacityType, tokens: Tokens) -> Result<(), OrderError> {
        match self.status_of(capacity_type)? {
            PartStatus::Completed => Err(self.invalid_transition(
                capacity_type,
                PartStatus::Completed,
                PartStatus::Completed,
            )),
            PartStatus::Processing => {
                self.set_status(capacity_type, PartStatus::Completed);
                Ok(())
            }
            PartStatus::Unknown | PartStatus::Rejected => {
                self.spend(tokens)?;
                self.set_status(capacity_type, PartStatus::Completed);
                Ok(())
            }
        }
    }

    /// Mark a part's bid as rejected; no tokens are spent
    pub fn rejected(&mut self, capacity_type: &CapacityType) -> Result<(), OrderError> {
        match self.status_of(capacity_type)? {
            from @ (PartStatus::Processing | PartStatus::Completed) => {
                Err(self.invalid_transition(capacity_type, from, PartStatus::Rejected))
            }
            PartStatus::Unknown | PartStatus::Rejected => {
                self.set_status(capacity_type, PartStatus::Rejected);
                Ok(())
            }
        }
    }

    /// Resolve the cycle for this order
    ///
    /// - all parts completed: completed event, score 0
    /// - all parts rejected: rejected event, score 3
    /// - unresolved with the counter at its cap: rejected event, score 5
    /// - otherwise: still processing, score 1, counter incremented
    pub fn complete_cycle(&mut self) -> Result<(Score, OrderEvent), OrderError> {
        self.ensure_funded()?;
        let total = self.parts.len();
        let completed = self
            .parts
            .values()
            .filter(|p| p.status == PartStatus::Completed)
            .count();
        let rejected = self
            .parts
            .values()
            .filter(|p| p.status == PartStatus::Rejected)
            .count();

        if completed == total {
            let event = match &self.request {
                OrderRequest::Consumer(r) => OrderEvent::ConsumerCompleted(r.clone()),
                OrderRequest::Investment(r) => OrderEvent::InvestmentCompleted(r.clone()),
            };
            return Ok((SCORE_COMPLETED, event));
        }
        if rejected == total {
            return Ok((SCORE_REJECTED, self.rejection()));
        }
        if self.cycles_elapsed >= MAX_ELAPSED_CYCLES {
            return Ok((SCORE_TIMED_OUT, self.rejection()));
        }
        self.cycles_elapsed += 1;
        Ok((SCORE_STILL_PROCESSING, OrderEvent::StillProcessing))
    }

    fn rejection(&self) -> OrderEvent {
        match &self.request {
            OrderRequest::Consumer(r) => OrderEvent::ConsumerRejected {
                remaining: self.tokens,
                request: r.clone(),
            },
            OrderRequest::Investment(r) => OrderEvent::InvestmentRejected {
                remaining: self.tokens,
                request: r.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::producing_agent::InvestmentKind;

    fn sheet() -> ProcessSheet {
        ProcessSheet::new(1, [(CapacityType::new("a"), 10), (CapacityType::new("b"), 20)])
    }

    fn consumer_order(tokens: Tokens) -> Order {
        Order::new_consumer(
            OrderId::new("o1"),
            &sheet(),
            ConsumerRequest {
                consumer_id: "alice".into(),
                product: 1,
                tokens,
            },
        )
    }

    fn investment_order(cut_off_price: Option<UnitPrice>) -> Order {
        Order::new_investment(
            OrderId::new("o2"),
            &sheet(),
            InvestmentRequest {
                producer_id: "p1".into(),
                kind: InvestmentKind::Restoration,
                product: 1,
                cut_off_price,
            },
        )
    }

    fn a() -> CapacityType {
        CapacityType::new("a")
    }

    fn b() -> CapacityType {
        CapacityType::new("b")
    }

    #[test]
    fn test_consumer_order_is_funded() {
        let order = consumer_order(100);
        assert!(!order.requires_funding());
        assert_eq!(order.tokens(), 100);
        assert_eq!(order.agent_id().unwrap().as_str(), "calice");
        assert!(order.cut_off_price().is_err());
    }

    #[test]
    fn test_unfunded_investment_order_rejects_operations() {
        let mut order = investment_order(Some(0.5));
        assert!(order.requires_funding());
        assert_eq!(order.cut_off_price().unwrap(), Some(0.5));

        assert_eq!(order.info().unwrap_err().kind(), ErrorKind::FundingRequired);
        assert_eq!(order.processing(&a(), 1).unwrap_err().kind(), ErrorKind::FundingRequired);
        assert_eq!(order.complete_cycle().unwrap_err().kind(), ErrorKind::FundingRequired);

        order.fund(40).unwrap();
        assert_eq!(order.tokens(), 40);
        assert_eq!(order.agent_id().unwrap().as_str(), "pp1");
        assert_eq!(order.fund(10).unwrap_err().kind(), ErrorKind::WrongState);
    }

    #[test]
    fn test_consumer_order_cannot_be_funded() {
        let mut order = consumer_order(100);
        assert!(matches!(order.fund(10), Err(OrderError::NotAnInvestment { .. })));
    }

    #[test]
    fn test_info_lists_only_unserved_parts() {
        let mut order = consumer_order(100);
        order.processing(&a(), 10).unwrap();

        let info = order.info().unwrap();
        assert_eq!(info.tokens, 90);
        assert_eq!(info.required, BTreeMap::from([(b(), 20)]));

        order.rejected(&b()).unwrap();
        assert_eq!(order.info().unwrap().required.len(), 1);
    }

    #[test]
    fn test_processing_then_completed_charges_once() {
        let mut order = consumer_order(100);
        order.processing(&a(), 30).unwrap();
        order.processing(&a(), 30).unwrap();
        assert_eq!(order.tokens(), 70);

        order.completed(&a(), 30).unwrap();
        assert_eq!(order.tokens(), 70);
        assert_eq!(order.part_status(&a()), Some(PartStatus::Completed));
    }

    #[test]
    fn test_invalid_transitions_fail_wrong_state() {
        let mut order = consumer_order(100);
        order.processing(&a(), 10).unwrap();
        assert_eq!(order.rejected(&a()).unwrap_err().kind(), ErrorKind::WrongState);

        order.completed(&b(), 10).unwrap();
        assert_eq!(order.completed(&b(), 10).unwrap_err().kind(), ErrorKind::WrongState);
        assert_eq!(order.processing(&b(), 10).unwrap_err().kind(), ErrorKind::WrongState);
        assert_eq!(order.rejected(&b()).unwrap_err().kind(), ErrorKind::WrongState);
    }

    #[test]
    fn test_rejected_part_can_be_served_later() {
        let mut order = consumer_order(100);
        order.rejected(&a()).unwrap();
        order.rejected(&a()).unwrap();
        order.completed(&a(), 10).unwrap();
        assert_eq!(order.part_status(&a()), Some(PartStatus::Completed));
        assert_eq!(order.tokens(), 90);
    }

    #[test]
    fn test_overspend_fails_and_keeps_balance() {
        let mut order = consumer_order(10);
        let err = order.completed(&a(), 11).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
        assert_eq!(order.tokens(), 10);
        assert_eq!(order.part_status(&a()), Some(PartStatus::Unknown));
    }

    #[test]
    fn test_unknown_part_is_not_found() {
        let mut order = consumer_order(10);
        let err = order.processing(&CapacityType::new("z"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_all_completed_scores_zero() {
        let mut order = consumer_order(100);
        order.completed(&a(), 10).unwrap();
        order.completed(&b(), 10).unwrap();

        let (score, event) = order.complete_cycle().unwrap();
        assert_eq!(score, SCORE_COMPLETED);
        assert!(matches!(event, OrderEvent::ConsumerCompleted(ref r) if r.tokens == 100));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_all_rejected_refunds_remaining() {
        let mut order = consumer_order(100);
        order.rejected(&a()).unwrap();
        order.rejected(&b()).unwrap();

        let (score, event) = order.complete_cycle().unwrap();
        assert_eq!(score, SCORE_REJECTED);
        assert!(matches!(event, OrderEvent::ConsumerRejected { remaining: 100, .. }));
    }

    #[test]
    fn test_timeout_on_third_unresolved_cycle() {
        let mut order = consumer_order(100);
        order.processing(&a(), 40).unwrap();
        order.rejected(&b()).unwrap();

        assert_eq!(order.complete_cycle().unwrap(), (SCORE_STILL_PROCESSING, OrderEvent::StillProcessing));
        assert_eq!(order.complete_cycle().unwrap(), (SCORE_STILL_PROCESSING, OrderEvent::StillProcessing));
        assert_eq!(order.cycles_elapsed(), MAX_ELAPSED_CYCLES);

        let (score, event) = order.complete_cycle().unwrap();
        assert_eq!(score, SCORE_TIMED_OUT);
        assert!(matches!(event, OrderEvent::ConsumerRejected { remaining: 60, .. }));
    }

    #[test]
    fn test_rejected_investment_returns_remaining() {
        let mut order = investment_order(None);
        order.fund(25).unwrap();
        order.rejected(&a()).unwrap();
        order.rejected(&b()).unwrap();

        let (_, event) = order.complete_cycle().unwrap();
        assert!(matches!(event, OrderEvent::InvestmentRejected { remaining: 25, .. }));
    }
}
