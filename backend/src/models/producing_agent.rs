//! Producing agent model
//!
//! A producing agent supplies one capacity type. Each cycle it:
//! - loses a share of its capacity to degradation
//! - serves the booking carried over from the previous cycle
//! - clears the pending bids in descending unit-price order
//!
//! Capacity is a per-cycle throughput: a clearing pass draws on it but does
//! not consume it. It only shrinks through degradation and only grows
//! through completed restoration or upgrade investments.
//!
//! # Critical Invariants
//!
//! 1. At most one booking is carried between cycles
//! 2. `capacity <= max_capacity` after every restoration
//! 3. The three bid lists returned by a clearing pass are disjoint
//! 4. At most one investment command is handled between two clearing passes

use crate::core::errors::ErrorKind;
use crate::core::types::{Capacity, CapacityType, OrderId, Product, ProducerId, Tokens, UnitPrice};
use crate::models::bid::Bid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Restoration purchase: requires `product`, restores `restores` units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restoration {
    pub product: Product,
    pub restores: Capacity,
}

/// Upgrade purchase: requires `product`, raises max and current capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upgrade {
    pub product: Product,
    pub increases: Capacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestmentKind {
    Upgrade,
    Restoration,
}

/// Request for an investment order, created by [`ProducingAgent::handle_cmd`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRequest {
    pub producer_id: ProducerId,
    pub kind: InvestmentKind,
    /// Product whose process sheet the investment order follows
    pub product: Product,
    /// Producer's cut-off price when the request was made (funding weight)
    pub cut_off_price: Option<UnitPrice>,
}

/// Investment command submitted for a producer during orders placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducingAgentCommand {
    #[serde(default)]
    pub do_upgrade: bool,
    #[serde(default)]
    pub do_restoration: bool,
}

/// Partially served bid carried into the next clearing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Units still to be produced
    pub outstanding: Capacity,
    /// Bid as originally placed
    pub bid: Bid,
}

impl Booking {
    pub fn order_id(&self) -> &OrderId {
        &self.bid.order_id
    }
}

/// Outcome of one clearing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductionResult {
    /// Bids served partially; their remainder is booked for the next pass
    pub processing: Vec<Bid>,
    /// Bids fully served
    pub completed: Vec<Bid>,
    /// Bids that found no capacity left
    pub rejected: Vec<Bid>,
}

/// Requester-facing producer summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerInfo {
    pub id: ProducerId,
    pub capacity_type: CapacityType,
    pub max_capacity: Capacity,
    pub capacity: Capacity,
    pub cut_off_price: Option<UnitPrice>,
}

/// Producer-facing capacity and production view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducingAgentView {
    pub id: ProducerId,
    pub capacity_type: CapacityType,
    pub max_capacity: Capacity,
    pub capacity: Capacity,
    /// Capacity of every bid resolved in the last clearing pass, booking included
    pub requested_capacity: Capacity,
    /// Units the next clearing pass will lose to degradation
    pub degradation: Capacity,
    /// Max and current capacity gain of an upgrade
    pub upgrade: Capacity,
    /// Capacity gain of a restoration
    pub restoration: Capacity,
    pub upgrade_running: bool,
    pub restoration_running: bool,
    pub cut_off_price: Option<UnitPrice>,
    pub booking: Option<Booking>,
    /// Tokens earned in the last clearing pass
    pub funds: Tokens,
}

/// Errors raised by producing agent operations
#[derive(Debug, Error, PartialEq)]
pub enum ProducerError {
    #[error("Producer {producer_id} already handled an investment command this cycle")]
    CommandAlreadyHandled { producer_id: ProducerId },

    #[error("Producer {producer_id} already has an upgrade running")]
    UpgradeRunning { producer_id: ProducerId },

    #[error("Producer {producer_id} already has a restoration running")]
    RestorationRunning { producer_id: ProducerId },

    #[error("Producer {producer_id} has no {kind:?} running")]
    NoInvestmentRunning {
        producer_id: ProducerId,
        kind: InvestmentKind,
    },

    #[error("Investment request for producer {actual} sent to producer {expected}")]
    ProducerMismatch {
        expected: ProducerId,
        actual: ProducerId,
    },

    #[error("Producer {producer_id} supplies {expected}, got bid for {actual}")]
    CapacityTypeMismatch {
        producer_id: ProducerId,
        expected: CapacityType,
        actual: CapacityType,
    },
}

impl ProducerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProducerError::UpgradeRunning { .. } | ProducerError::RestorationRunning { .. } => {
                ErrorKind::ValidationFailed
            }
            ProducerError::NoInvestmentRunning { .. } => ErrorKind::WrongState,
            ProducerError::ProducerMismatch { .. } => ErrorKind::NotFound,
            ProducerError::CommandAlreadyHandled { .. }
            | ProducerError::CapacityTypeMismatch { .. } => ErrorKind::ContractViolation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProducingAgent {
    id: ProducerId,
    capacity_type: CapacityType,

    /// Percent of current capacity lost per clearing pass (rounded up)
    degradation_rate: u32,
    restoration: Restoration,
    upgrade: Upgrade,

    capacity: Capacity,
    max_capacity: Capacity,

    /// Bids received this cycle, cleared by every pass
    pending_bids: Vec<Bid>,
    booking: Option<Booking>,

    /// `None` until the first bid is accepted
    cut_off_price: Option<UnitPrice>,

    requested_capacity: Capacity,
    remaining_capacity: Capacity,
    funds: Tokens,
    total_funds: Tokens,

    upgrade_running: bool,
    restoration_running: bool,
    command_handled: bool,
}

impl ProducingAgent {
    /// Create a producer at full capacity with no pricing history
    ///
    /// # Example
    /// ```
    /// use tokenomics_emulator_core_rs::models::producing_agent::{ProducingAgent, Restoration, Upgrade};
    ///
    /// let producer = ProducingAgent::new(
    ///     "p1".into(),
    ///     "power".into(),
    ///     100,
    ///     10,
    ///     Restoration { product: 2, restores: 7 },
    ///     Upgrade { product: 3, increases: 10 },
    /// );
    /// assert_eq!(producer.capacity(), 100);
    /// assert_eq!(producer.cut_off_price(), None);
    /// ```
    pub fn new(
        id: ProducerId,
        capacity_type: CapacityType,
        capacity: Capacity,
        degradation_rate: u32,
        restoration: Restoration,
        upgrade: Upgrade,
    ) -> Self {
        Self {
            id,
            capacity_type,
            degradation_rate: degradation_rate.min(100),
            restoration,
            upgrade,
            capacity,
            max_capacity: capacity,
            pending_bids: Vec::new(),
            booking: None,
            cut_off_price: None,
            requested_capacity: 0,
            remaining_capacity: capacity,
            funds: 0,
            total_funds: 0,
            upgrade_running: false,
            restoration_running: false,
            command_handled: false,
        }
    }

    pub fn id(&self) -> &ProducerId {
        &self.id
    }

    pub fn capacity_type(&self) -> &CapacityType {
        &self.capacity_type
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn max_capacity(&self) -> Capacity {
        self.max_capacity
    }

    /// Capacity left unbooked by the last clearing pass
    pub fn remaining_capacity(&self) -> Capacity {
        self.remaining_capacity
    }

    pub fn requested_capacity(&self) -> Capacity {
        self.requested_capacity
    }

    pub fn cut_off_price(&self) -> Option<UnitPrice> {
        self.cut_off_price
    }

    pub fn booking(&self) -> Option<&Booking> {
        self.booking.as_ref()
    }

    pub fn pending_bids(&self) -> &[Bid] {
        &self.pending_bids
    }

    /// Tokens earned in the last clearing pass
    pub fn funds(&self) -> Tokens {
        self.funds
    }

    /// Tokens earned over the agent's lifetime
    pub fn total_funds(&self) -> Tokens {
        self.total_funds
    }

    pub fn upgrade_running(&self) -> bool {
        self.upgrade_running
    }

    pub fn restoration_running(&self) -> bool {
        self.restoration_running
    }

    /// Units the next clearing pass will lose: `ceil(rate% × capacity)`
    pub fn degradation(&self) -> Capacity {
        let units = (u128::from(self.capacity) * u128::from(self.degradation_rate)).div_ceil(100);
        Capacity::try_from(units).unwrap_or(self.capacity)
    }

    pub fn info(&self) -> ProducerInfo {
        ProducerInfo {
            id: self.id.clone(),
            capacity_type: self.capacity_type.clone(),
            max_capacity: self.max_capacity,
            capacity: self.capacity,
            cut_off_price: self.cut_off_price,
        }
    }

    pub fn view(&self) -> ProducingAgentView {
        ProducingAgentView {
            id: self.id.clone(),
            capacity_type: self.capacity_type.clone(),
            max_capacity: self.max_capacity,
            capacity: self.capacity,
            requested_capacity: self.requested_capacity,
            degradation: self.degradation(),
            upgrade: self.upgrade.increases,
            restoration: self.restoration.restores,
            upgrade_running: self.upgrade_running,
            restoration_running: self.restoration_running,
            cut_off_price: self.cut_off_price,
            booking: self.booking.clone(),
            funds: self.funds,
        }
    }

    /// Queue bids for the next clearing pass
    ///
    /// All bids are checked before any is queued; a bid for another capacity
    /// type rejects the whole batch.
    pub fn place_bids(&mut self, bids: Vec<Bid>) -> Result<(), ProducerError> {
        if let Some(bid) = bids.iter().find(|b| b.capacity_type != self.capacity_type) {
            return Err(ProducerError::CapacityTypeMismatch {
                producer_id: self.id.clone(),
                expected: self.capacity_type.clone(),
                actual: bid.capacity_type.clone(),
            });
        }
        self.pending_bids.extend(bids);
        Ok(())
    }

    /// Handle an investment command
    ///
    /// Returns one request per investment started. Fails without side effects
    /// if a requested investment is already running or a command was already
    /// handled since the last clearing pass.
    pub fn handle_cmd(
        &mut self,
        cmd: ProducingAgentCommand,
    ) -> Result<Vec<InvestmentRequest>, ProducerError> {
        if self.command_handled {
            return Err(ProducerError::CommandAlreadyHandled {
                producer_id: self.id.clone(),
            });
        }
        if cmd.do_upgrade && self.upgrade_running {
            return Err(ProducerError::UpgradeRunning {
                producer_id: self.id.clone(),
            });
        }
        if cmd.do_restoration && self.restoration_running {
            return Err(ProducerError::RestorationRunning {
                producer_id: self.id.clone(),
            });
        }

        let mut requests = Vec::with_capacity(2);
        if cmd.do_upgrade {
            requests.push(self.investment_request(InvestmentKind::Upgrade));
            self.upgrade_running = true;
        }
        if cmd.do_restoration {
            requests.push(self.investment_request(InvestmentKind::Restoration));
            self.restoration_running = true;
        }
        self.command_handled = true;
        Ok(requests)
    }

    /// Product an investment of `kind` requires
    pub fn investment_product(&self, kind: InvestmentKind) -> Product {
        match kind {
            InvestmentKind::Upgrade => self.upgrade.product,
            InvestmentKind::Restoration => self.restoration.product,
        }
    }

    fn investment_request(&self, kind: InvestmentKind) -> InvestmentRequest {
        InvestmentRequest {
            producer_id: self.id.clone(),
            kind,
            product: self.investment_product(kind),
            cut_off_price: self.cut_off_price,
        }
    }

    fn check_running(&self, request: &InvestmentRequest) -> Result<(), ProducerError> {
        if request.producer_id != self.id {
            return Err(ProducerError::ProducerMismatch {
                expected: self.id.clone(),
                actual: request.producer_id.clone(),
            });
        }
        let running = match request.kind {
            InvestmentKind::Upgrade => self.upgrade_running,
            InvestmentKind::Restoration => self.restoration_running,
        };
        if !running {
            return Err(ProducerError::NoInvestmentRunning {
                producer_id: self.id.clone(),
                kind: request.kind,
            });
        }
        Ok(())
    }

    /// Apply a completed investment
    ///
    /// Restoration adds its fixed amount capped at max capacity. Upgrade
    /// raises both max and current capacity.
    pub fn investment_completed(&mut self, request: &InvestmentRequest) -> Result<(), ProducerError> {
        self.check_running(request)?;
        match request.kind {
            InvestmentKind::Restoration => {
                self.restoration_running = false;
                self.capacity = self
                    .capacity
                    .saturating_add(self.restoration.restores)
                    .min(self.max_capacity);
            }
            InvestmentKind::Upgrade => {
                self.upgrade_running = false;
                self.max_capacity = self.max_capacity.saturating_add(self.upgrade.increases);
                self.capacity = self.capacity.saturating_add(self.upgrade.increases);
            }
        }
        Ok(())
    }

    /// Drop a rejected investment; capacity is unchanged
    pub fn investment_rejected(&mut self, request: &InvestmentRequest) -> Result<(), ProducerError> {
        self.check_running(request)?;
        match request.kind {
            InvestmentKind::Restoration => self.restoration_running = false,
            InvestmentKind::Upgrade => self.upgrade_running = false,
        }
        Ok(())
    }

    /// Remove the booking held for `order_id`, if any
    pub fn release_booking(&mut self, order_id: &OrderId) -> Option<Booking> {
        if self.booking.as_ref().map(Booking::order_id) == Some(order_id) {
            return self.booking.take();
        }
        None
    }

    /// Run the clearing pass for this cycle
    ///
    /// 1. Degrade capacity by `ceil(rate% × capacity)`
    /// 2. Serve the carried booking against the degraded capacity
    /// 3. Sort pending bids by descending unit price. The sort is stable,
    ///    so equally priced bids keep their submission order
    /// 4. Walk the bids: fitting bids complete, the first bid that only
    ///    partially fits is booked (and reported as processing), every bid
    ///    after capacity runs out is rejected
    ///
    /// Accepted bids (completed and booked) add their tokens to `funds` and
    /// move the cut-off price to their unit price.
    pub fn produce(&mut self) -> ProductionResult {
        self.capacity = self.capacity.saturating_sub(self.degradation());

        let mut bids = std::mem::take(&mut self.pending_bids);
        bids.sort_by(|a, b| b.unit_price().total_cmp(&a.unit_price()));

        let mut result = ProductionResult::default();
        let mut remaining = self.capacity;
        let mut funds: Tokens = 0;

        if let Some(booking) = self.booking.take() {
            if booking.outstanding <= remaining {
                remaining -= booking.outstanding;
                result.completed.push(booking.bid);
            } else {
                let outstanding = booking.outstanding - remaining;
                remaining = 0;
                result.processing.push(booking.bid.clone());
                self.booking = Some(Booking {
                    outstanding,
                    bid: booking.bid,
                });
            }
        }

        for bid in bids {
            if remaining == 0 {
                result.rejected.push(bid);
                continue;
            }
            funds = funds.saturating_add(bid.tokens);
            self.cut_off_price = Some(bid.unit_price());
            if bid.capacity <= remaining {
                remaining -= bid.capacity;
                result.completed.push(bid);
            } else {
                let outstanding = bid.capacity - remaining;
                remaining = 0;
                result.processing.push(bid.clone());
                self.booking = Some(Booking { outstanding, bid });
            }
        }

        self.requested_capacity = [&result.processing, &result.completed, &result.rejected]
            .into_iter()
            .flatten()
            .map(|b| b.capacity)
            .fold(0, Capacity::saturating_add);
        self.remaining_capacity = remaining;
        self.funds = funds;
        self.total_funds = self.total_funds.saturating_add(funds);
        self.command_handled = false;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(capacity: Capacity, degradation_rate: u32) -> ProducingAgent {
        ProducingAgent::new(
            ProducerId::new("p1"),
            CapacityType::new("1"),
            capacity,
            degradation_rate,
            Restoration {
                product: 2,
                restores: 7,
            },
            Upgrade {
                product: 3,
                increases: 10,
            },
        )
    }

    fn bid(capacity: Capacity, tokens: Tokens, order: &str) -> Bid {
        Bid::new(CapacityType::new("1"), capacity, tokens, OrderId::new(order))
    }

    fn ids(bids: &[Bid]) -> Vec<&str> {
        bids.iter().map(|b| b.order_id.as_str()).collect()
    }

    #[test]
    fn test_empty_pass_keeps_undefined_price() {
        let mut p = agent(100, 0);
        let result = p.produce();

        assert_eq!(result, ProductionResult::default());
        assert_eq!(p.cut_off_price(), None);
        assert_eq!(p.funds(), 0);
        assert_eq!(p.capacity(), 100);
    }

    #[test]
    fn test_bids_cleared_in_price_order() {
        let mut p = agent(100, 0);
        p.place_bids(vec![bid(40, 20, "1"), bid(40, 4, "2"), bid(20, 20, "3"), bid(40, 1, "4")])
            .unwrap();
        let result = p.produce();

        assert_eq!(ids(&result.completed), vec!["3", "1", "2"]);
        assert_eq!(ids(&result.rejected), vec!["4"]);
        assert!(result.processing.is_empty());
        assert_eq!(p.requested_capacity(), 140);
        assert_eq!(p.funds(), 44);
        assert_eq!(p.cut_off_price(), Some(0.1));
        assert_eq!(p.remaining_capacity(), 0);
    }

    #[test]
    fn test_expensive_bid_exhausts_capacity() {
        let mut p = agent(100, 0);
        p.place_bids(vec![bid(100, 100, "1"), bid(10, 1, "2")]).unwrap();
        let result = p.produce();

        assert_eq!(ids(&result.completed), vec!["1"]);
        assert_eq!(ids(&result.rejected), vec!["2"]);
        assert_eq!(p.cut_off_price(), Some(1.0));
    }

    #[test]
    fn test_partial_fit_is_booked_and_processing() {
        let mut p = agent(100, 0);
        p.place_bids(vec![bid(200, 20, "1")]).unwrap();
        let result = p.produce();

        assert_eq!(ids(&result.processing), vec!["1"]);
        assert!(result.completed.is_empty());
        let booking = p.booking().unwrap();
        assert_eq!(booking.outstanding, 100);
        assert_eq!(booking.order_id().as_str(), "1");
        assert_eq!(p.funds(), 20);
        assert_eq!(p.cut_off_price(), Some(0.1));
    }

    #[test]
    fn test_booking_served_before_new_bids() {
        let mut p = agent(100, 0);
        p.place_bids(vec![bid(150, 30, "1")]).unwrap();
        p.produce();

        p.place_bids(vec![bid(100, 20, "2")]).unwrap();
        let result = p.produce();

        assert_eq!(ids(&result.completed), vec!["1"]);
        assert_eq!(ids(&result.processing), vec!["2"]);
        assert_eq!(p.booking().unwrap().outstanding, 50);
        assert_eq!(p.requested_capacity(), 250);
        assert_eq!(p.funds(), 20);
        assert_eq!(p.cut_off_price(), Some(0.2));
    }

    #[test]
    fn test_oversized_booking_blocks_new_bids() {
        let mut p = agent(100, 0);
        p.place_bids(vec![bid(250, 25, "1")]).unwrap();
        p.produce();

        p.place_bids(vec![bid(10, 50, "2")]).unwrap();
        let result = p.produce();

        assert_eq!(ids(&result.processing), vec!["1"]);
        assert_eq!(ids(&result.rejected), vec!["2"]);
        assert_eq!(p.booking().unwrap().outstanding, 50);
        assert_eq!(p.cut_off_price(), Some(0.1));
    }

    #[test]
    fn test_degradation_rounds_up_and_applies_before_clearing() {
        let mut p = agent(95, 10);
        assert_eq!(p.degradation(), 10);

        p.place_bids(vec![bid(90, 90, "1")]).unwrap();
        let result = p.produce();

        assert_eq!(p.capacity(), 85);
        assert_eq!(ids(&result.processing), vec!["1"]);
        assert_eq!(p.booking().unwrap().outstanding, 5);
    }

    #[test]
    fn test_degradation_of_huge_capacity_does_not_overflow() {
        let p = agent(u64::MAX, 100);
        assert_eq!(p.degradation(), u64::MAX);

        let p = agent(u64::MAX / 2 + 1, 50);
        assert_eq!(p.degradation(), u64::MAX / 4 + 1);
    }

    #[test]
    fn test_equal_prices_keep_submission_order() {
        let mut p = agent(10, 0);
        p.place_bids(vec![bid(10, 10, "first"), bid(10, 10, "second")]).unwrap();
        let result = p.produce();

        assert_eq!(ids(&result.completed), vec!["first"]);
        assert_eq!(ids(&result.rejected), vec!["second"]);
    }

    #[test]
    fn test_place_bids_rejects_foreign_capacity_type() {
        let mut p = agent(100, 0);
        let foreign = Bid::new(CapacityType::new("2"), 10, 10, OrderId::new("1"));
        let err = p.place_bids(vec![bid(10, 10, "0"), foreign]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContractViolation);
        assert!(p.pending_bids().is_empty());
    }

    #[test]
    fn test_restoration_capped_at_max_capacity() {
        let mut p = agent(100, 5);
        p.produce();
        assert_eq!(p.capacity(), 95);

        let requests = p
            .handle_cmd(ProducingAgentCommand {
                do_upgrade: false,
                do_restoration: true,
            })
            .unwrap();
        assert_eq!(
            requests,
            vec![InvestmentRequest {
                producer_id: ProducerId::new("p1"),
                kind: InvestmentKind::Restoration,
                product: 2,
                cut_off_price: None,
            }]
        );

        p.investment_completed(&requests[0]).unwrap();
        assert_eq!(p.capacity(), 100);
        assert_eq!(p.max_capacity(), 100);
        assert!(!p.restoration_running());

        let err = p.investment_completed(&requests[0]).unwrap_err();
        assert!(matches!(err, ProducerError::NoInvestmentRunning { .. }));
    }

    #[test]
    fn test_upgrade_raises_max_and_current_capacity() {
        let mut p = agent(100, 50);
        p.produce();
        assert_eq!(p.capacity(), 50);

        let requests = p
            .handle_cmd(ProducingAgentCommand {
                do_upgrade: true,
                do_restoration: true,
            })
            .unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].kind, InvestmentKind::Upgrade);
        assert_eq!(requests[0].product, 3);
        assert_eq!(requests[1].kind, InvestmentKind::Restoration);

        p.investment_completed(&requests[0]).unwrap();
        p.investment_completed(&requests[1]).unwrap();
        assert_eq!(p.max_capacity(), 110);
        assert_eq!(p.capacity(), 67);
    }

    #[test]
    fn test_running_investment_cannot_be_requested_again() {
        let mut p = agent(100, 0);
        p.handle_cmd(ProducingAgentCommand {
            do_upgrade: true,
            do_restoration: false,
        })
        .unwrap();
        p.produce();

        let err = p
            .handle_cmd(ProducingAgentCommand {
                do_upgrade: true,
                do_restoration: false,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        let requests = p
            .handle_cmd(ProducingAgentCommand {
                do_upgrade: false,
                do_restoration: true,
            })
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert!(p.upgrade_running());
        assert!(p.restoration_running());
    }

    #[test]
    fn test_second_command_before_clearing_fails() {
        let mut p = agent(100, 0);
        p.handle_cmd(ProducingAgentCommand::default()).unwrap();

        let err = p
            .handle_cmd(ProducingAgentCommand {
                do_upgrade: true,
                do_restoration: false,
            })
            .unwrap_err();
        assert!(matches!(err, ProducerError::CommandAlreadyHandled { .. }));
        assert!(!p.upgrade_running());

        p.produce();
        assert!(p.handle_cmd(ProducingAgentCommand::default()).is_ok());
    }

    #[test]
    fn test_rejection_only_clears_flag() {
        let mut p = agent(100, 0);
        let requests = p
            .handle_cmd(ProducingAgentCommand {
                do_upgrade: true,
                do_restoration: false,
            })
            .unwrap();

        p.investment_rejected(&requests[0]).unwrap();
        assert!(!p.upgrade_running());
        assert_eq!(p.max_capacity(), 100);
        assert_eq!(p.capacity(), 100);
    }

    #[test]
    fn test_foreign_investment_request_is_not_found() {
        let mut p = agent(100, 0);
        let request = InvestmentRequest {
            producer_id: ProducerId::new("p2"),
            kind: InvestmentKind::Upgrade,
            product: 3,
            cut_off_price: None,
        };

        let err = p.investment_completed(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_release_booking_only_matches_owner() {
        let mut p = agent(100, 0);
        p.place_bids(vec![bid(150, 30, "1")]).unwrap();
        p.produce();

        assert!(p.release_booking(&OrderId::new("2")).is_none());
        assert!(p.release_booking(&OrderId::new("1")).is_some());
        assert!(p.booking().is_none());
    }
}
