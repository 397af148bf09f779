//! Orchestrator - configuration, cycle engine and shared access
//!
//! See `engine.rs` for the cycle state machine.

pub mod config;
pub mod emulator;
pub mod engine;
pub mod funding;

// Re-export main types for convenience
pub use config::{ConfigError, Configuration, ProducerConfig};
pub use emulator::{ConsumerFactory, Emulator};
pub use engine::{CycleResult, Phase, System, SystemError, SystemInfo};
