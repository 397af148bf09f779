//! System - cycle state machine
//!
//! The system owns every producer, ordering agent and open order, and drives
//! them through a two-phase cycle:
//!
//! 1. **OrdersPlacement**: tokens were emitted and consumer demand placed.
//!    Producers may start investments.
//! 2. **Ordering**: investment orders are funded, inboxes are populated and
//!    requesters submit bidding commands.
//!
//! `complete_cycle` clears every producer, resolves every order and opens
//! the next cycle in OrdersPlacement.
//!
//! # Determinism
//!
//! All collections are ordered maps and consumers are called in id order.
//! Same configuration + same call sequence = identical event stream.
//!
//! # Error handling
//!
//! Recoverable errors (wrong phase, unknown id, invalid command) are raised
//! before any state changes. A contract violation stops the call where it
//! was detected; the system should then be rebuilt.

use crate::core::errors::ErrorKind;
use crate::core::ids::OrderIdGenerator;
use crate::core::types::{
    ConsumerId, OrderId, OrderingAgentId, Product, ProducerId, Score, Tokens,
};
use crate::models::consumer::Consumer;
use crate::models::event::{Event, EventLog};
use crate::models::order::{Order, OrderError, OrderEvent, OrderRequest, SCORE_TIMED_OUT};
use crate::models::ordering_agent::{
    OrderingAgent, OrderingAgentCommand, OrderingAgentError, OrderingAgentInfo, OrderingAgentView,
};
use crate::models::process_sheet::ProcessSheet;
use crate::models::producing_agent::{
    InvestmentKind, ProducerError, ProducerInfo, ProducingAgent, ProducingAgentCommand,
    ProducingAgentView, ProductionResult,
};
use crate::orchestrator::config::{ConfigError, Configuration};
use crate::orchestrator::funding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    OrdersPlacement,
    Ordering,
}

/// Result of a completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleResult {
    /// Cycle that was completed
    pub cycle: u64,

    /// Sum of the scores of every order open during the cycle
    pub score: Score,

    /// Orders completed this cycle
    pub completed: usize,

    /// Orders rejected this cycle (including timeouts)
    pub rejected: usize,
}

/// Aggregate system state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub phase: Phase,
    pub cycle: u64,
    pub investment_fund: Tokens,
    pub open_orders: usize,
    pub producers: usize,
    pub consumers: usize,
    /// Fingerprint of the configuration the system was built from
    pub config_fingerprint: String,
}

/// System error types
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("{operation} is not allowed in phase {phase:?}")]
    WrongPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("Producer not found: {0}")]
    ProducerNotFound(ProducerId),

    #[error("Ordering agent not found: {0}")]
    AgentNotFound(OrderingAgentId),

    /// An order referenced by a bid or event is not open
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A request refers to a consumer the system does not hold
    #[error("Consumer not found: {0}")]
    ConsumerNotFound(ConsumerId),

    #[error("No process sheet for product {0}")]
    ProductNotFound(Product),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    OrderingAgent(#[from] OrderingAgentError),
}

impl SystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SystemError::WrongPhase { .. } => ErrorKind::WrongState,
            SystemError::ProducerNotFound(_)
            | SystemError::AgentNotFound(_)
            | SystemError::ProductNotFound(_) => ErrorKind::NotFound,
            SystemError::OrderNotFound(_) | SystemError::ConsumerNotFound(_) => {
                ErrorKind::ContractViolation
            }
            SystemError::InvalidConfig(e) => e.kind(),
            SystemError::Order(e) => e.kind(),
            SystemError::Producer(e) => e.kind(),
            SystemError::OrderingAgent(e) => e.kind(),
        }
    }
}

// ============================================================================
// System
// ============================================================================

pub struct System {
    phase: Phase,

    /// Cycle counter, starting at 0
    cycle: u64,

    id_gen: Arc<dyn OrderIdGenerator>,

    cycle_emission: Tokens,

    /// Tokens available to fund investment orders
    investment_fund: Tokens,

    sheets: BTreeMap<Product, ProcessSheet>,

    producers: BTreeMap<ProducerId, ProducingAgent>,

    /// Producer directory shown to requesters, refreshed when ordering starts
    producer_infos: BTreeMap<ProducerId, ProducerInfo>,

    /// One agent per consumer and one per producer
    ordering_agents: BTreeMap<OrderingAgentId, OrderingAgent>,

    orders: BTreeMap<OrderId, Order>,

    consumers: BTreeMap<ConsumerId, Box<dyn Consumer>>,

    config_fingerprint: String,

    event_log: EventLog,
}

impl System {
    /// Build a system from a configuration and open cycle 0
    ///
    /// Validates the configuration, creates every producer and ordering
    /// agent, emits the first tokens and places the first demand.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use tokenomics_emulator_core_rs::core::ids::SequentialIdGenerator;
    /// use tokenomics_emulator_core_rs::orchestrator::{Configuration, Phase, System};
    ///
    /// let config = Configuration::from_json_str(r#"{
    ///     "cycleEmission": 100,
    ///     "processSheets": [{ "product": 1, "requirements": { "power": 10 } }],
    ///     "producerConfigs": [{
    ///         "id": "p1", "capacityType": "power", "capacity": 100, "degradationRate": 0,
    ///         "restoration": { "product": 1, "restores": 10 },
    ///         "upgrade": { "product": 1, "increases": 10 }
    ///     }]
    /// }"#).unwrap();
    ///
    /// let system = System::new(Arc::new(SequentialIdGenerator::new()), &config, Vec::new()).unwrap();
    /// assert_eq!(system.phase(), Phase::OrdersPlacement);
    /// assert_eq!(system.investment_fund(), 50);
    /// ```
    pub fn new(
        id_gen: Arc<dyn OrderIdGenerator>,
        config: &Configuration,
        consumers: Vec<Box<dyn Consumer>>,
    ) -> Result<Self, SystemError> {
        config.validate()?;
        let config_fingerprint = config.fingerprint()?;

        let mut consumer_map: BTreeMap<ConsumerId, Box<dyn Consumer>> = BTreeMap::new();
        for consumer in consumers {
            let id = consumer.id();
            if consumer_map.contains_key(&id) {
                return Err(ConfigError::Invalid(format!("Duplicate consumer ID: {}", id)).into());
            }
            consumer_map.insert(id, consumer);
        }

        let producers: BTreeMap<ProducerId, ProducingAgent> = config
            .producer_configs
            .iter()
            .map(|c| (c.id.clone(), c.build()))
            .collect();

        let mut ordering_agents = BTreeMap::new();
        for id in consumer_map.keys() {
            let agent = OrderingAgent::for_consumer(id);
            ordering_agents.insert(agent.id().clone(), agent);
        }
        for id in producers.keys() {
            let agent = OrderingAgent::for_producer(id);
            ordering_agents.insert(agent.id().clone(), agent);
        }

        let producer_infos = producers.iter().map(|(id, p)| (id.clone(), p.info())).collect();

        let mut system = Self {
            phase: Phase::OrdersPlacement,
            cycle: 0,
            id_gen,
            cycle_emission: config.cycle_emission,
            investment_fund: 0,
            sheets: config.sheets_by_product(),
            producers,
            producer_infos,
            ordering_agents,
            orders: BTreeMap::new(),
            consumers: consumer_map,
            config_fingerprint,
            event_log: EventLog::new(),
        };
        system.start_cycle();
        Ok(system)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn investment_fund(&self) -> Tokens {
        self.investment_fund
    }

    pub fn orders(&self) -> &BTreeMap<OrderId, Order> {
        &self.orders
    }

    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn producer(&self, id: &ProducerId) -> Option<&ProducingAgent> {
        self.producers.get(id)
    }

    pub fn ordering_agent(&self, id: &OrderingAgentId) -> Option<&OrderingAgent> {
        self.ordering_agents.get(id)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Take every event recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.event_log.drain()
    }

    /// Cap the number of retained events; older ones are discarded first
    pub fn set_event_limit(&mut self, limit: Option<usize>) {
        self.event_log.set_limit(limit);
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            phase: self.phase,
            cycle: self.cycle,
            investment_fund: self.investment_fund,
            open_orders: self.orders.len(),
            producers: self.producers.len(),
            consumers: self.consumers.len(),
            config_fingerprint: self.config_fingerprint.clone(),
        }
    }

    /// Live producer directory
    pub fn producer_infos(&self) -> BTreeMap<ProducerId, ProducerInfo> {
        self.producers
            .iter()
            .map(|(id, p)| (id.clone(), p.info()))
            .collect()
    }

    pub fn ordering_agent_infos(&self) -> Vec<OrderingAgentInfo> {
        self.ordering_agents.values().map(|a| a.info()).collect()
    }

    fn require_phase(&self, phase: Phase, operation: &'static str) -> Result<(), SystemError> {
        if self.phase != phase {
            return Err(SystemError::WrongPhase {
                operation,
                phase: self.phase,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Bidding view of one requester (Ordering phase only)
    pub fn ordering_agent_view(&self, id: &OrderingAgentId) -> Result<OrderingAgentView, SystemError> {
        self.require_phase(Phase::Ordering, "ordering_agent_view")?;
        let agent = self
            .ordering_agents
            .get(id)
            .ok_or_else(|| SystemError::AgentNotFound(id.clone()))?;
        Ok(agent.view(&self.producer_infos))
    }

    /// Capacity and production view of one producer
    pub fn producing_agent_view(&self, id: &ProducerId) -> Result<ProducingAgentView, SystemError> {
        let producer = self
            .producers
            .get(id)
            .ok_or_else(|| SystemError::ProducerNotFound(id.clone()))?;
        Ok(producer.view())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Submit an investment command for a producer (OrdersPlacement only)
    ///
    /// Every investment started creates an unfunded investment order owned
    /// by the producer's ordering agent. Returns the new order ids.
    pub fn producing_agent_action(
        &mut self,
        id: &ProducerId,
        cmd: ProducingAgentCommand,
    ) -> Result<Vec<OrderId>, SystemError> {
        self.require_phase(Phase::OrdersPlacement, "producing_agent_action")?;
        let producer = self
            .producers
            .get_mut(id)
            .ok_or_else(|| SystemError::ProducerNotFound(id.clone()))?;

        for (wanted, kind) in [
            (cmd.do_upgrade, InvestmentKind::Upgrade),
            (cmd.do_restoration, InvestmentKind::Restoration),
        ] {
            let product = producer.investment_product(kind);
            if wanted && !self.sheets.contains_key(&product) {
                return Err(SystemError::ProductNotFound(product));
            }
        }

        let requests = producer.handle_cmd(cmd)?;
        self.event_log.log(Event::InvestmentCommandHandled {
            cycle: self.cycle,
            producer_id: id.clone(),
            upgrade: cmd.do_upgrade,
            restoration: cmd.do_restoration,
            orders: requests.len(),
        });
        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            let sheet = self
                .sheets
                .get(&request.product)
                .ok_or(SystemError::ProductNotFound(request.product))?;
            let order_id = self.id_gen.next_id();
            self.event_log.log(Event::InvestmentRequested {
                cycle: self.cycle,
                order_id: order_id.clone(),
                producer_id: request.producer_id.clone(),
                kind: request.kind,
                product: request.product,
            });
            self.orders.insert(
                order_id.clone(),
                Order::new_investment(order_id.clone(), sheet, request),
            );
            created.push(order_id);
        }
        Ok(created)
    }

    /// Fund investment orders, populate inboxes and open bidding
    ///
    /// 1. Distribute the investment fund over unfunded orders
    /// 2. Refresh the producer directory shown to requesters
    /// 3. Push every open order's unserved parts into its agent's inbox
    pub fn start_ordering(&mut self) -> Result<(), SystemError> {
        self.require_phase(Phase::OrdersPlacement, "start_ordering")?;

        let mut claims = Vec::new();
        for order in self.orders.values().filter(|o| o.requires_funding()) {
            claims.push((order.id().clone(), order.cut_off_price()?));
        }
        let shares = funding::distribute(self.investment_fund, &claims);

        for (order_id, tokens) in shares {
            let order = self
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| SystemError::OrderNotFound(order_id.clone()))?;
            order.fund(tokens)?;
            self.investment_fund -= tokens;
            let producer_id = match order.request() {
                OrderRequest::Investment(r) => r.producer_id.clone(),
                OrderRequest::Consumer(_) => continue,
            };
            self.event_log.log(Event::OrderFunded {
                cycle: self.cycle,
                order_id,
                producer_id,
                tokens,
            });
        }

        self.producer_infos = self.producer_infos();

        for order in self.orders.values() {
            let agent_id = order.agent_id()?;
            let agent = self
                .ordering_agents
                .get_mut(&agent_id)
                .ok_or(SystemError::AgentNotFound(agent_id))?;
            agent.place_order(order.info()?);
        }

        self.phase = Phase::Ordering;
        self.event_log.log(Event::OrderingStarted {
            cycle: self.cycle,
            fund: self.investment_fund,
            open_orders: self.orders.len(),
        });
        Ok(())
    }

    /// Submit a bidding command for a requester (Ordering only)
    ///
    /// The agent validates the command against its inbox; the resulting bids
    /// are queued at their producers for the clearing pass.
    pub fn ordering_agent_action(
        &mut self,
        id: &OrderingAgentId,
        cmd: &OrderingAgentCommand,
    ) -> Result<(), SystemError> {
        self.require_phase(Phase::Ordering, "ordering_agent_action")?;
        let agent = self
            .ordering_agents
            .get_mut(id)
            .ok_or_else(|| SystemError::AgentNotFound(id.clone()))?;

        let bids = agent.handle_cmd(cmd, &self.producer_infos)?;
        self.event_log.log(Event::BiddingCommandHandled {
            cycle: self.cycle,
            agent_id: id.clone(),
            orders: cmd.bids.len(),
        });
        for (producer_id, bids) in bids {
            let producer = self
                .producers
                .get_mut(&producer_id)
                .ok_or_else(|| SystemError::ProducerNotFound(producer_id.clone()))?;
            let count = bids.len();
            let tokens = bids.iter().map(|b| b.tokens).fold(0, Tokens::saturating_add);
            producer.place_bids(bids)?;
            self.event_log.log(Event::BidsPlaced {
                cycle: self.cycle,
                agent_id: id.clone(),
                producer_id,
                bids: count,
                tokens,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Cycle Completion
    // ========================================================================

    /// Clear every producer, resolve every order and open the next cycle
    ///
    /// 1. Run each producer's clearing pass and apply the bid outcomes
    /// 2. Complete the cycle of every open order, summing scores
    /// 3. React to terminal order events and drop terminated orders
    /// 4. Empty the inboxes, emit tokens, place demand
    pub fn complete_cycle(&mut self) -> Result<CycleResult, SystemError> {
        self.require_phase(Phase::Ordering, "complete_cycle")?;
        let cycle = self.cycle;

        for (producer_id, producer) in self.producers.iter_mut() {
            let result = producer.produce();
            self.event_log.log(Event::ProductionCleared {
                cycle,
                producer_id: producer_id.clone(),
                capacity: producer.capacity(),
                remaining_capacity: producer.remaining_capacity(),
                completed: result.completed.len(),
                processing: result.processing.len(),
                rejected: result.rejected.len(),
                funds: producer.funds(),
                cut_off_price: producer.cut_off_price(),
            });
            apply_outcomes(&mut self.orders, &result)?;
        }

        let mut score: Score = 0;
        let mut completed = 0;
        let mut rejected = 0;

        let order_ids: Vec<OrderId> = self.orders.keys().cloned().collect();
        for order_id in order_ids {
            let order = self
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| SystemError::OrderNotFound(order_id.clone()))?;
            let (order_score, event) = order.complete_cycle()?;
            score = score.saturating_add(order_score);

            match event {
                OrderEvent::StillProcessing => continue,
                OrderEvent::ConsumerCompleted(request) => {
                    self.consumer_mut(&request.consumer_id)?
                        .request_completed(&request);
                    self.log_completed(&order_id, order_score);
                    completed += 1;
                }
                OrderEvent::InvestmentCompleted(request) => {
                    let producer = self.producer_mut(&request.producer_id)?;
                    producer.investment_completed(&request)?;
                    let (capacity, max_capacity) = (producer.capacity(), producer.max_capacity());
                    self.event_log.log(Event::InvestmentApplied {
                        cycle,
                        producer_id: request.producer_id.clone(),
                        order_id: order_id.clone(),
                        kind: request.kind,
                        capacity,
                        max_capacity,
                    });
                    self.log_completed(&order_id, order_score);
                    completed += 1;
                }
                OrderEvent::ConsumerRejected { remaining, request } => {
                    self.release_bookings(&order_id);
                    self.log_rejected(&order_id, order_score, remaining);
                    self.consumer_mut(&request.consumer_id)?.receive(remaining);
                    self.event_log.log(Event::TokensRefunded {
                        cycle,
                        consumer_id: request.consumer_id.clone(),
                        order_id: Some(order_id.clone()),
                        tokens: remaining,
                    });
                    rejected += 1;
                }
                OrderEvent::InvestmentRejected { remaining, request } => {
                    self.release_bookings(&order_id);
                    self.producer_mut(&request.producer_id)?
                        .investment_rejected(&request)?;
                    self.event_log.log(Event::InvestmentDropped {
                        cycle,
                        producer_id: request.producer_id.clone(),
                        order_id: order_id.clone(),
                        kind: request.kind,
                        unspent: remaining,
                    });
                    self.log_rejected(&order_id, order_score, remaining);
                    rejected += 1;
                }
            }
            self.orders.remove(&order_id);
        }

        for agent in self.ordering_agents.values_mut() {
            agent.complete_cycle();
        }

        self.event_log.log(Event::CycleCompleted {
            cycle,
            score,
            completed,
            rejected,
        });

        self.cycle += 1;
        self.start_cycle();

        Ok(CycleResult {
            cycle,
            score,
            completed,
            rejected,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Emit tokens, place demand and reopen orders placement
    ///
    /// The investment fund is reset to half the emission (floored); whatever
    /// it held is not carried over. The other half is split evenly (floored)
    /// across consumers.
    fn start_cycle(&mut self) {
        let to_fund = self.cycle_emission / 2;
        self.investment_fund = to_fund;
        if !self.consumers.is_empty() {
            let share = (self.cycle_emission - to_fund) / self.consumers.len() as Tokens;
            for consumer in self.consumers.values_mut() {
                consumer.receive(share);
            }
        }
        self.event_log.log(Event::CycleStarted {
            cycle: self.cycle,
            emission: self.cycle_emission,
            fund: self.investment_fund,
        });

        self.place_demand();
        self.phase = Phase::OrdersPlacement;
    }

    fn place_demand(&mut self) {
        let cycle = self.cycle;
        for (consumer_id, consumer) in self.consumers.iter_mut() {
            for mut request in consumer.demand(cycle) {
                request.consumer_id = consumer_id.clone();
                match self.sheets.get(&request.product) {
                    Some(sheet) => {
                        let order_id = self.id_gen.next_id();
                        self.event_log.log(Event::DemandPlaced {
                            cycle,
                            order_id: order_id.clone(),
                            consumer_id: consumer_id.clone(),
                            product: request.product,
                            tokens: request.tokens,
                        });
                        self.orders.insert(
                            order_id.clone(),
                            Order::new_consumer(order_id, sheet, request),
                        );
                    }
                    None => {
                        self.event_log.log(Event::DemandDiscarded {
                            cycle,
                            consumer_id: consumer_id.clone(),
                            product: request.product,
                            tokens: request.tokens,
                        });
                        consumer.receive(request.tokens);
                        self.event_log.log(Event::TokensRefunded {
                            cycle,
                            consumer_id: consumer_id.clone(),
                            order_id: None,
                            tokens: request.tokens,
                        });
                    }
                }
            }
        }
    }

    fn consumer_mut(&mut self, id: &ConsumerId) -> Result<&mut Box<dyn Consumer>, SystemError> {
        self.consumers
            .get_mut(id)
            .ok_or_else(|| SystemError::ConsumerNotFound(id.clone()))
    }

    fn producer_mut(&mut self, id: &ProducerId) -> Result<&mut ProducingAgent, SystemError> {
        self.producers
            .get_mut(id)
            .ok_or_else(|| SystemError::ProducerNotFound(id.clone()))
    }

    /// Drop every booking a terminated order still holds
    fn release_bookings(&mut self, order_id: &OrderId) {
        for (producer_id, producer) in self.producers.iter_mut() {
            if let Some(booking) = producer.release_booking(order_id) {
                self.event_log.log(Event::BookingReleased {
                    cycle: self.cycle,
                    producer_id: producer_id.clone(),
                    order_id: order_id.clone(),
                    outstanding: booking.outstanding,
                });
            }
        }
    }

    fn log_completed(&mut self, order_id: &OrderId, score: Score) {
        self.event_log.log(Event::OrderCompleted {
            cycle: self.cycle,
            order_id: order_id.clone(),
            score,
        });
    }

    fn log_rejected(&mut self, order_id: &OrderId, score: Score, remaining: Tokens) {
        self.event_log.log(Event::OrderRejected {
            cycle: self.cycle,
            order_id: order_id.clone(),
            score,
            remaining,
            timed_out: score == SCORE_TIMED_OUT,
        });
    }
}

/// Apply one producer's clearing outcome to the orders its bids belong to
fn apply_outcomes(
    orders: &mut BTreeMap<OrderId, Order>,
    result: &ProductionResult,
) -> Result<(), SystemError> {
    fn order_for<'a>(
        orders: &'a mut BTreeMap<OrderId, Order>,
        id: &OrderId,
    ) -> Result<&'a mut Order, SystemError> {
        orders
            .get_mut(id)
            .ok_or_else(|| SystemError::OrderNotFound(id.clone()))
    }

    for bid in &result.processing {
        order_for(orders, &bid.order_id)?.processing(&bid.capacity_type, bid.tokens)?;
    }
    for bid in &result.completed {
        order_for(orders, &bid.order_id)?.completed(&bid.capacity_type, bid.tokens)?;
    }
    for bid in &result.rejected {
        order_for(orders, &bid.order_id)?.rejected(&bid.capacity_type)?;
    }
    Ok(())
}
