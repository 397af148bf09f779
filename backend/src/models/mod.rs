//! Domain models for the tokenomics emulator

pub mod bid;
pub mod consumer;
pub mod event;
pub mod order;
pub mod ordering_agent;
pub mod process_sheet;
pub mod producing_agent;

// Re-exports
pub use bid::Bid;
pub use consumer::{Consumer, ConsumerRequest};
pub use event::{Event, EventLog};
pub use order::{Order, OrderError, OrderEvent, OrderInfo, OrderRequest, PartStatus};
pub use ordering_agent::{
    CommandViolation, OrderingAgent, OrderingAgentCommand, OrderingAgentError, OrderingAgentInfo,
    OrderingAgentView, OwnerKind,
};
pub use process_sheet::ProcessSheet;
pub use producing_agent::{
    Booking, InvestmentKind, InvestmentRequest, ProducerError, ProducerInfo, ProducingAgent,
    ProducingAgentCommand, ProducingAgentView, ProductionResult, Restoration, Upgrade,
};
