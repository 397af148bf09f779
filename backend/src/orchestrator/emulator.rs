//! Emulator - shared access to a running system
//!
//! The emulator serializes access to one [`System`]: views take the read
//! lock, commands take the write lock, so exactly one mutating call is in
//! flight at any time while any number of reads may proceed between them.
//!
//! It also owns what outlives a single system: the active configuration,
//! the order id generator (ids stay unique across resets) and the factory
//! that creates fresh consumers for every reset.
//!
//! Every call logs `emulator.<operation>.<stage>` through `tracing`.

use crate::core::ids::OrderIdGenerator;
use crate::core::types::{OrderId, OrderingAgentId, ProducerId};
use crate::models::consumer::Consumer;
use crate::models::event::Event;
use crate::models::ordering_agent::{OrderingAgentCommand, OrderingAgentInfo, OrderingAgentView};
use crate::models::producing_agent::{ProducerInfo, ProducingAgentCommand, ProducingAgentView};
use crate::orchestrator::config::Configuration;
use crate::orchestrator::engine::{CycleResult, System, SystemError, SystemInfo};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

/// Creates the consumers of a freshly built system
pub type ConsumerFactory = Box<dyn Fn() -> Vec<Box<dyn Consumer>> + Send + Sync>;

pub struct Emulator {
    system: RwLock<System>,
    config: RwLock<Configuration>,
    id_gen: Arc<dyn OrderIdGenerator>,
    consumers: ConsumerFactory,
}

fn trace_result<T>(operation: &str, result: Result<T, SystemError>) -> Result<T, SystemError> {
    match &result {
        Ok(_) => info!("emulator.{}.completed", operation),
        Err(e) if e.kind().is_recoverable() => {
            warn!(kind = %e.kind(), error = %e, "emulator.{}.failed", operation)
        }
        Err(e) => error!(kind = %e.kind(), error = %e, "emulator.{}.failed", operation),
    }
    result
}

impl Emulator {
    pub fn new(
        config: Configuration,
        id_gen: Arc<dyn OrderIdGenerator>,
        consumers: ConsumerFactory,
    ) -> Result<Self, SystemError> {
        let system = System::new(Arc::clone(&id_gen), &config, consumers())?;
        info!(
            fingerprint = %system.system_info().config_fingerprint,
            producers = config.producer_configs.len(),
            "emulator.new.completed"
        );
        Ok(Self {
            system: RwLock::new(system),
            config: RwLock::new(config),
            id_gen,
            consumers,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, System> {
        self.system.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, System> {
        self.system.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn ordering_agent_view(&self, id: &OrderingAgentId) -> Result<OrderingAgentView, SystemError> {
        self.read().ordering_agent_view(id)
    }

    pub fn producing_agent_view(&self, id: &ProducerId) -> Result<ProducingAgentView, SystemError> {
        self.read().producing_agent_view(id)
    }

    pub fn producer_infos(&self) -> BTreeMap<ProducerId, ProducerInfo> {
        self.read().producer_infos()
    }

    pub fn ordering_agent_infos(&self) -> Vec<OrderingAgentInfo> {
        self.read().ordering_agent_infos()
    }

    pub fn system_info(&self) -> SystemInfo {
        self.read().system_info()
    }

    /// Configuration the next reset builds from
    pub fn config(&self) -> Configuration {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events recorded since the last drain
    ///
    /// The log grows until drained; long runs should call [`drain_events`]
    /// every cycle or set a limit with [`set_event_limit`].
    ///
    /// [`drain_events`]: Emulator::drain_events
    /// [`set_event_limit`]: Emulator::set_event_limit
    pub fn events(&self) -> Vec<Event> {
        self.read().event_log().events().to_vec()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn ordering_agent_action(
        &self,
        id: &OrderingAgentId,
        cmd: &OrderingAgentCommand,
    ) -> Result<(), SystemError> {
        info!(agent = %id, orders = cmd.bids.len(), "emulator.ordering_agent_action.started");
        let result = self.write().ordering_agent_action(id, cmd);
        trace_result("ordering_agent_action", result)
    }

    pub fn producing_agent_action(
        &self,
        id: &ProducerId,
        cmd: ProducingAgentCommand,
    ) -> Result<Vec<OrderId>, SystemError> {
        info!(
            producer = %id,
            upgrade = cmd.do_upgrade,
            restoration = cmd.do_restoration,
            "emulator.producing_agent_action.started"
        );
        let result = self.write().producing_agent_action(id, cmd);
        trace_result("producing_agent_action", result)
    }

    pub fn start_ordering(&self) -> Result<(), SystemError> {
        info!("emulator.start_ordering.started");
        let result = self.write().start_ordering();
        trace_result("start_ordering", result)
    }

    pub fn complete_cycle(&self) -> Result<CycleResult, SystemError> {
        info!("emulator.complete_cycle.started");
        let result = self.write().complete_cycle();
        if let Ok(r) = &result {
            info!(
                cycle = r.cycle,
                score = r.score,
                completed = r.completed,
                rejected = r.rejected,
                "emulator.complete_cycle.scored"
            );
        }
        trace_result("complete_cycle", result)
    }

    /// Take the recorded events, leaving the log empty
    pub fn drain_events(&self) -> Vec<Event> {
        self.write().drain_events()
    }

    /// Cap the number of retained events, kept across resets
    pub fn set_event_limit(&self, limit: Option<usize>) {
        info!(?limit, "emulator.set_event_limit");
        self.write().set_event_limit(limit);
    }

    /// Rebuild the system from the stored configuration
    ///
    /// The new system starts at cycle 0 with fresh consumers; the id
    /// generator is kept.
    pub fn reset(&self) -> Result<(), SystemError> {
        info!("emulator.reset.started");
        let config = self.config();
        let result = System::new(Arc::clone(&self.id_gen), &config, (self.consumers)()).map(|mut system| {
            info!(fingerprint = %system.system_info().config_fingerprint, "emulator.reset.rebuilt");
            let mut current = self.write();
            system.set_event_limit(current.event_log().limit());
            *current = system;
        });
        trace_result("reset", result)
    }

    /// Validate and store a configuration for the next reset
    pub fn update_config(&self, config: Configuration) -> Result<(), SystemError> {
        info!("emulator.update_config.started");
        let result = config.validate().map_err(SystemError::from).map(|()| {
            *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        });
        trace_result("update_config", result)
    }
}
