//! Event stream for observing and auditing the engine.
//!
//! Every mutating call on the system records what it changed as [`Event`]s
//! into an [`EventLog`]. Observers read or drain the log instead of the
//! engine writing to any logging backend. Events enable:
//! - Debugging (understand what happened and in which cycle)
//! - Auditing (verify token flows between consumers, orders and producers)
//! - Streaming (events serialize to JSON, one object per event)
//!
//! # Event Types
//!
//! Events are grouped by the call that records them:
//! - **Cycle start**: `CycleStarted`, `DemandPlaced`, `DemandDiscarded`
//! - **Orders placement**: `InvestmentRequested`, `InvestmentCommandHandled`
//! - **Start ordering**: `OrderFunded`, `OrderingStarted`
//! - **Ordering**: `BidsPlaced`, `BiddingCommandHandled`
//! - **Cycle completion**: `ProductionCleared`, `BookingReleased`,
//!   `InvestmentApplied`, `InvestmentDropped`, `OrderCompleted`,
//!   `OrderRejected`, `TokensRefunded`, `CycleCompleted`
//!
//! # Example
//!
//! ```rust
//! use tokenomics_emulator_core_rs::models::event::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::CycleStarted { cycle: 0, emission: 100, fund: 50 });
//!
//! assert_eq!(log.events_of_type("CycleStarted").len(), 1);
//! assert_eq!(log.events()[0].cycle(), 0);
//! ```

use crate::core::types::{
    Capacity, ConsumerId, OrderId, OrderingAgentId, Product, ProducerId, Score, Tokens, UnitPrice,
};
use crate::models::producing_agent::InvestmentKind;
use serde::{Deserialize, Serialize};

/// Engine event capturing a state change.
///
/// All events carry the cycle they occurred in and are logged in the order
/// they occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Tokens emitted and a new cycle opened for orders placement
    CycleStarted {
        cycle: u64,
        emission: Tokens,
        /// Investment fund after the refill
        fund: Tokens,
    },

    /// Consumer request accepted as a new order
    DemandPlaced {
        cycle: u64,
        order_id: OrderId,
        consumer_id: ConsumerId,
        product: Product,
        tokens: Tokens,
    },

    /// Consumer request for a product without process sheet; tokens refunded
    DemandDiscarded {
        cycle: u64,
        consumer_id: ConsumerId,
        product: Product,
        tokens: Tokens,
    },

    /// Producer started an investment, creating an unfunded order
    InvestmentRequested {
        cycle: u64,
        order_id: OrderId,
        producer_id: ProducerId,
        kind: InvestmentKind,
        product: Product,
    },

    /// Investment command accepted, including one that started nothing
    InvestmentCommandHandled {
        cycle: u64,
        producer_id: ProducerId,
        upgrade: bool,
        restoration: bool,
        orders: usize,
    },

    /// Investment order funded from the investment fund
    OrderFunded {
        cycle: u64,
        order_id: OrderId,
        producer_id: ProducerId,
        tokens: Tokens,
    },

    /// Inboxes populated, bidding open
    OrderingStarted {
        cycle: u64,
        /// Investment fund left after distribution (rounding dust)
        fund: Tokens,
        open_orders: usize,
    },

    /// Bidding command accepted, including one for an empty inbox
    BiddingCommandHandled {
        cycle: u64,
        agent_id: OrderingAgentId,
        orders: usize,
    },

    /// Bids of one ordering agent routed to one producer
    BidsPlaced {
        cycle: u64,
        agent_id: OrderingAgentId,
        producer_id: ProducerId,
        bids: usize,
        tokens: Tokens,
    },

    /// Producer ran its clearing pass
    ProductionCleared {
        cycle: u64,
        producer_id: ProducerId,
        capacity: Capacity,
        remaining_capacity: Capacity,
        completed: usize,
        processing: usize,
        rejected: usize,
        funds: Tokens,
        cut_off_price: Option<UnitPrice>,
    },

    /// Booking dropped because its order terminated
    BookingReleased {
        cycle: u64,
        producer_id: ProducerId,
        order_id: OrderId,
        outstanding: Capacity,
    },

    /// Completed investment applied to its producer
    InvestmentApplied {
        cycle: u64,
        producer_id: ProducerId,
        order_id: OrderId,
        kind: InvestmentKind,
        capacity: Capacity,
        max_capacity: Capacity,
    },

    /// Rejected investment dropped; its unspent tokens are burned
    InvestmentDropped {
        cycle: u64,
        producer_id: ProducerId,
        order_id: OrderId,
        kind: InvestmentKind,
        unspent: Tokens,
    },

    OrderCompleted {
        cycle: u64,
        order_id: OrderId,
        score: Score,
    },

    OrderRejected {
        cycle: u64,
        order_id: OrderId,
        score: Score,
        remaining: Tokens,
        /// Dropped after too many unresolved cycles
        timed_out: bool,
    },

    /// Unspent tokens returned to a consumer
    TokensRefunded {
        cycle: u64,
        consumer_id: ConsumerId,
        order_id: Option<OrderId>,
        tokens: Tokens,
    },

    CycleCompleted {
        cycle: u64,
        score: Score,
        completed: usize,
        rejected: usize,
    },
}

impl Event {
    /// Get the cycle this event occurred in
    pub fn cycle(&self) -> u64 {
        match self {
            Event::CycleStarted { cycle, .. }
            | Event::DemandPlaced { cycle, .. }
            | Event::DemandDiscarded { cycle, .. }
            | Event::InvestmentRequested { cycle, .. }
            | Event::InvestmentCommandHandled { cycle, .. }
            | Event::OrderFunded { cycle, .. }
            | Event::OrderingStarted { cycle, .. }
            | Event::BiddingCommandHandled { cycle, .. }
            | Event::BidsPlaced { cycle, .. }
            | Event::ProductionCleared { cycle, .. }
            | Event::BookingReleased { cycle, .. }
            | Event::InvestmentApplied { cycle, .. }
            | Event::InvestmentDropped { cycle, .. }
            | Event::OrderCompleted { cycle, .. }
            | Event::OrderRejected { cycle, .. }
            | Event::TokensRefunded { cycle, .. }
            | Event::CycleCompleted { cycle, .. } => *cycle,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::CycleStarted { .. } => "CycleStarted",
            Event::DemandPlaced { .. } => "DemandPlaced",
            Event::DemandDiscarded { .. } => "DemandDiscarded",
            Event::InvestmentRequested { .. } => "InvestmentRequested",
            Event::InvestmentCommandHandled { .. } => "InvestmentCommandHandled",
            Event::OrderFunded { .. } => "OrderFunded",
            Event::OrderingStarted { .. } => "OrderingStarted",
            Event::BiddingCommandHandled { .. } => "BiddingCommandHandled",
            Event::BidsPlaced { .. } => "BidsPlaced",
            Event::ProductionCleared { .. } => "ProductionCleared",
            Event::BookingReleased { .. } => "BookingReleased",
            Event::InvestmentApplied { .. } => "InvestmentApplied",
            Event::InvestmentDropped { .. } => "InvestmentDropped",
            Event::OrderCompleted { .. } => "OrderCompleted",
            Event::OrderRejected { .. } => "OrderRejected",
            Event::TokensRefunded { .. } => "TokensRefunded",
            Event::CycleCompleted { .. } => "CycleCompleted",
        }
    }

    /// Get order ID if event relates to a specific order
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Event::DemandPlaced { order_id, .. }
            | Event::InvestmentRequested { order_id, .. }
            | Event::OrderFunded { order_id, .. }
            | Event::BookingReleased { order_id, .. }
            | Event::InvestmentApplied { order_id, .. }
            | Event::InvestmentDropped { order_id, .. }
            | Event::OrderCompleted { order_id, .. }
            | Event::OrderRejected { order_id, .. } => Some(order_id),
            Event::TokensRefunded { order_id, .. } => order_id.as_ref(),
            _ => None,
        }
    }

    /// Get producer ID if event relates to a specific producer
    pub fn producer_id(&self) -> Option<&ProducerId> {
        match self {
            Event::InvestmentRequested { producer_id, .. }
            | Event::InvestmentCommandHandled { producer_id, .. }
            | Event::OrderFunded { producer_id, .. }
            | Event::BidsPlaced { producer_id, .. }
            | Event::ProductionCleared { producer_id, .. }
            | Event::BookingReleased { producer_id, .. }
            | Event::InvestmentApplied { producer_id, .. }
            | Event::InvestmentDropped { producer_id, .. } => Some(producer_id),
            _ => None,
        }
    }
}

/// Event log for storing and querying engine events.
///
/// The log keeps every event until it is drained. Long-running callers
/// must either drain it regularly or set a limit, in which case the oldest
/// events are discarded once the limit is exceeded.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,

    /// Maximum number of retained events
    limit: Option<usize>,

    /// Events discarded to stay within the limit
    discarded: u64,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log retaining at most `limit` events
    pub fn with_limit(limit: usize) -> Self {
        let mut log = Self::new();
        log.set_limit(Some(limit));
        log
    }

    /// Change the retention limit; `None` keeps everything
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.enforce_limit();
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Events dropped so far because of the limit
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.events.len() > limit {
            let excess = self.events.len() - limit;
            self.events.drain(..excess);
            self.discarded += excess as u64;
        }
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific cycle
    pub fn events_in_cycle(&self, cycle: u64) -> Vec<&Event> {
        self.events.iter().filter(|e| e.cycle() == cycle).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific order
    pub fn events_for_order(&self, order_id: &OrderId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.order_id() == Some(order_id))
            .collect()
    }

    /// Get events for a specific producer
    pub fn events_for_producer(&self, producer_id: &ProducerId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.producer_id() == Some(producer_id))
            .collect()
    }

    /// Take all events, leaving the log empty
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> EventLog {
        let mut log = EventLog::new();
        log.log(Event::CycleStarted {
            cycle: 0,
            emission: 100,
            fund: 50,
        });
        log.log(Event::InvestmentRequested {
            cycle: 0,
            order_id: OrderId::new("1"),
            producer_id: ProducerId::new("p1"),
            kind: InvestmentKind::Upgrade,
            product: 3,
        });
        log.log(Event::OrderCompleted {
            cycle: 1,
            order_id: OrderId::new("1"),
            score: 0,
        });
        log
    }

    #[test]
    fn test_queries() {
        let log = sample_log();

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_in_cycle(0).len(), 2);
        assert_eq!(log.events_for_order(&OrderId::new("1")).len(), 2);
        assert_eq!(log.events_for_producer(&ProducerId::new("p1")).len(), 1);
        assert_eq!(log.events_of_type("OrderCompleted")[0].cycle(), 1);
    }

    #[test]
    fn test_drain_empties_log() {
        let mut log = sample_log();
        let drained = log.drain();

        assert_eq!(drained.len(), 3);
        assert!(log.is_empty());
    }

    #[test]
    fn test_limit_keeps_newest_events() {
        let mut log = EventLog::with_limit(2);
        for cycle in 0..5 {
            log.log(Event::CycleStarted {
                cycle,
                emission: 10,
                fund: 5,
            });
        }

        assert_eq!(log.len(), 2);
        assert_eq!(log.discarded(), 3);
        assert_eq!(log.events()[0].cycle(), 3);
        assert_eq!(log.events()[1].cycle(), 4);
    }

    #[test]
    fn test_lowering_limit_trims_immediately() {
        let mut log = sample_log();
        log.set_limit(Some(1));

        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].event_type(), "OrderCompleted");

        log.set_limit(None);
        log.log(Event::CycleCompleted {
            cycle: 1,
            score: 0,
            completed: 1,
            rejected: 0,
        });
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_events_serialize_with_type_tag() {
        let event = Event::OrderCompleted {
            cycle: 2,
            order_id: OrderId::new("7"),
            score: 0,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "OrderCompleted");
        assert_eq!(json["order_id"], "7");
        assert_eq!(json["cycle"], 2);
    }
}
