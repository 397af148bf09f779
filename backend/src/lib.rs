//! Tokenomics Emulator Core - Rust Engine
//!
//! Deterministic emulator of a tokenized production economy advancing in
//! discrete cycles.
//!
//! # Architecture
//!
//! - **core**: Scalar types, identifiers, id generators, error kinds
//! - **models**: Domain types (Order, ProducingAgent, OrderingAgent, Event)
//! - **orchestrator**: Configuration, cycle state machine, shared access
//! - **demand**: Consumer implementations generating requests
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All token and capacity values are unsigned integers
//! 2. All randomness is deterministic (seeded RNG)
//! 3. All keyed collections are ordered, so iteration is reproducible

// Module declarations
pub mod core;
pub mod demand;
pub mod models;
pub mod orchestrator;
pub mod rng;

// Re-exports for convenience
pub use core::errors::ErrorKind;
pub use core::ids::{OrderIdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use core::types::{
    Capacity, CapacityType, ConsumerId, OrderId, OrderingAgentId, Product, ProducerId, Score,
    Tokens, UnitPrice,
};
pub use demand::{Ledger, LedgerHandle, RandomConsumer, ScriptedConsumer};
pub use models::{
    bid::Bid,
    consumer::{Consumer, ConsumerRequest},
    event::{Event, EventLog},
    order::{Order, OrderError, OrderEvent, OrderInfo, OrderRequest, PartStatus},
    ordering_agent::{
        CommandViolation, OrderingAgent, OrderingAgentCommand, OrderingAgentError,
        OrderingAgentInfo, OrderingAgentView, OwnerKind,
    },
    process_sheet::ProcessSheet,
    producing_agent::{
        Booking, InvestmentKind, InvestmentRequest, ProducerError, ProducerInfo, ProducingAgent,
        ProducingAgentCommand, ProducingAgentView, ProductionResult, Restoration, Upgrade,
    },
};
pub use orchestrator::{
    ConfigError, Configuration, ConsumerFactory, CycleResult, Emulator, Phase, ProducerConfig,
    System, SystemError, SystemInfo,
};
pub use rng::RngManager;
