//! Ordering agent model
//!
//! One ordering agent exists per requester (consumer or producer). Its inbox
//! holds the open orders the requester has to bid for this cycle. A bidding
//! command allocates each order's whole balance across producers; the agent
//! validates it against the inbox and turns it into bids.
//!
//! # Critical Invariants
//!
//! 1. At most one command is handled per cycle
//! 2. An accepted command covers every inbox order exactly once
//! 3. Every required part of an order receives exactly one bid
//! 4. The tokens bid for an order equal its remaining balance

use crate::core::errors::ErrorKind;
use crate::core::types::{
    CapacityType, ConsumerId, OrderId, OrderingAgentId, ProducerId, Tokens,
};
use crate::models::bid::Bid;
use crate::models::order::OrderInfo;
use crate::models::producing_agent::ProducerInfo;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Token allocation: order id -> producer id -> tokens offered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingAgentCommand {
    pub bids: BTreeMap<OrderId, BTreeMap<ProducerId, Tokens>>,
}

impl OrderingAgentCommand {
    /// Add a bid of `tokens` on `producer_id` for `order_id`
    pub fn bid(mut self, order_id: impl Into<OrderId>, producer_id: impl Into<ProducerId>, tokens: Tokens) -> Self {
        self.bids
            .entry(order_id.into())
            .or_default()
            .insert(producer_id.into(), tokens);
        self
    }
}

/// Requester-facing bidding view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderingAgentView {
    /// Open orders with their balance and unserved parts
    pub orders: BTreeMap<OrderId, OrderInfo>,
    /// Producers offering a capacity type some open order requires
    pub producers: BTreeMap<CapacityType, BTreeMap<ProducerId, ProducerInfo>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerKind {
    Consumer,
    Producer,
}

/// Directory entry for an ordering agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingAgentInfo {
    pub id: OrderingAgentId,
    pub owner: OwnerKind,
    pub open_orders: usize,
    pub handled: bool,
}

/// Why a bidding command was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandViolation {
    #[error("command covers {actual} orders, inbox holds {expected}")]
    OrderCountMismatch { expected: usize, actual: usize },

    #[error("order {order_id} has {expected} required parts, got {actual} bids")]
    BidCountMismatch {
        order_id: OrderId,
        expected: usize,
        actual: usize,
    },

    #[error("order {order_id} holds {expected} tokens, command bids {actual}")]
    TokenSumMismatch {
        order_id: OrderId,
        expected: Tokens,
        actual: u128,
    },

    #[error("order {order_id} does not require {capacity_type} offered by producer {producer_id}")]
    CapacityTypeNotRequired {
        order_id: OrderId,
        producer_id: ProducerId,
        capacity_type: CapacityType,
    },

    #[error("order {order_id} bids more than once for {capacity_type}")]
    DuplicateCapacityType {
        order_id: OrderId,
        capacity_type: CapacityType,
    },
}

/// Errors raised by ordering agent operations
#[derive(Debug, Error, PartialEq)]
pub enum OrderingAgentError {
    #[error("Ordering agent {agent_id} already handled a command this cycle")]
    AlreadyHandled { agent_id: OrderingAgentId },

    #[error("Ordering agent {agent_id} has no open order {order_id}")]
    OrderNotFound {
        agent_id: OrderingAgentId,
        order_id: OrderId,
    },

    #[error("Ordering agent {agent_id}: unknown producer {producer_id}")]
    ProducerNotFound {
        agent_id: OrderingAgentId,
        producer_id: ProducerId,
    },

    #[error("Ordering agent {agent_id} refused command: {cause}")]
    Invalid {
        agent_id: OrderingAgentId,
        cause: CommandViolation,
    },
}

impl OrderingAgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderingAgentError::AlreadyHandled { .. } => ErrorKind::ContractViolation,
            OrderingAgentError::OrderNotFound { .. }
            | OrderingAgentError::ProducerNotFound { .. } => ErrorKind::NotFound,
            OrderingAgentError::Invalid { .. } => ErrorKind::ValidationFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderingAgent {
    id: OrderingAgentId,
    owner: OwnerKind,
    inbox: BTreeMap<OrderId, OrderInfo>,
    handled: bool,
}

impl OrderingAgent {
    pub fn for_consumer(id: &ConsumerId) -> Self {
        Self::new(OrderingAgentId::from_consumer(id), OwnerKind::Consumer)
    }

    pub fn for_producer(id: &ProducerId) -> Self {
        Self::new(OrderingAgentId::from_producer(id), OwnerKind::Producer)
    }

    fn new(id: OrderingAgentId, owner: OwnerKind) -> Self {
        Self {
            id,
            owner,
            inbox: BTreeMap::new(),
            handled: false,
        }
    }

    pub fn id(&self) -> &OrderingAgentId {
        &self.id
    }

    pub fn inbox(&self) -> &BTreeMap<OrderId, OrderInfo> {
        &self.inbox
    }

    pub fn handled(&self) -> bool {
        self.handled
    }

    pub fn info(&self) -> OrderingAgentInfo {
        OrderingAgentInfo {
            id: self.id.clone(),
            owner: self.owner,
            open_orders: self.inbox.len(),
            handled: self.handled,
        }
    }

    /// Register an order to bid for; fully served orders are skipped
    pub fn place_order(&mut self, info: OrderInfo) {
        if info.required.is_empty() {
            return;
        }
        self.inbox.insert(info.id.clone(), info);
    }

    pub fn view(&self, producers: &BTreeMap<ProducerId, ProducerInfo>) -> OrderingAgentView {
        let required: BTreeSet<&CapacityType> = self
            .inbox
            .values()
            .flat_map(|info| info.required.keys())
            .collect();

        let mut by_type: BTreeMap<CapacityType, BTreeMap<ProducerId, ProducerInfo>> = BTreeMap::new();
        for (id, info) in producers {
            if required.contains(&info.capacity_type) {
                by_type
                    .entry(info.capacity_type.clone())
                    .or_default()
                    .insert(id.clone(), info.clone());
            }
        }

        OrderingAgentView {
            orders: self.inbox.clone(),
            producers: by_type,
        }
    }

    fn invalid(&self, cause: CommandViolation) -> OrderingAgentError {
        OrderingAgentError::Invalid {
            agent_id: self.id.clone(),
            cause,
        }
    }

    /// Validate a bidding command and convert it into bids per producer
    ///
    /// The whole command is checked before the agent is marked handled; a
    /// refused command leaves the agent untouched.
    pub fn handle_cmd(
        &mut self,
        cmd: &OrderingAgentCommand,
        producers: &BTreeMap<ProducerId, ProducerInfo>,
    ) -> Result<BTreeMap<ProducerId, Vec<Bid>>, OrderingAgentError> {
        if self.handled {
            return Err(OrderingAgentError::AlreadyHandled {
                agent_id: self.id.clone(),
            });
        }
        if cmd.bids.len() != self.inbox.len() {
            return Err(self.invalid(CommandViolation::OrderCountMismatch {
                expected: self.inbox.len(),
                actual: cmd.bids.len(),
            }));
        }

        let mut result: BTreeMap<ProducerId, Vec<Bid>> = BTreeMap::new();
        for (order_id, allocation) in &cmd.bids {
            let info = self
                .inbox
                .get(order_id)
                .ok_or_else(|| OrderingAgentError::OrderNotFound {
                    agent_id: self.id.clone(),
                    order_id: order_id.clone(),
                })?;

            if allocation.len() != info.required.len() {
                return Err(self.invalid(CommandViolation::BidCountMismatch {
                    order_id: order_id.clone(),
                    expected: info.required.len(),
                    actual: allocation.len(),
                }));
            }

            let sum: u128 = allocation.values().map(|t| *t as u128).sum();
            if sum != info.tokens as u128 {
                return Err(self.invalid(CommandViolation::TokenSumMismatch {
                    order_id: order_id.clone(),
                    expected: info.tokens,
                    actual: sum,
                }));
            }

            let mut covered = BTreeSet::new();
            for (producer_id, tokens) in allocation {
                let producer = producers.get(producer_id).ok_or_else(|| {
                    OrderingAgentError::ProducerNotFound {
                        agent_id: self.id.clone(),
                        producer_id: producer_id.clone(),
                    }
                })?;
                let capacity_type = &producer.capacity_type;
                let capacity = info.required.get(capacity_type).ok_or_else(|| {
                    self.invalid(CommandViolation::CapacityTypeNotRequired {
                        order_id: order_id.clone(),
                        producer_id: producer_id.clone(),
                        capacity_type: capacity_type.clone(),
                    })
                })?;
                if !covered.insert(capacity_type) {
                    return Err(self.invalid(CommandViolation::DuplicateCapacityType {
                        order_id: order_id.clone(),
                        capacity_type: capacity_type.clone(),
                    }));
                }

                result.entry(producer_id.clone()).or_default().push(Bid::new(
                    capacity_type.clone(),
                    *capacity,
                    *tokens,
                    order_id.clone(),
                ));
            }
        }

        self.handled = true;
        Ok(result)
    }

    /// Close the cycle: empty the inbox and accept a new command
    pub fn complete_cycle(&mut self) {
        self.inbox.clear();
        self.handled = false;
    }
}
