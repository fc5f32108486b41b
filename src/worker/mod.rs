//! Cycle worker
//!
//! [`CycleOrchestrator`] runs one poll-store-deliver-prune cycle;
//! [`Scheduler`] triggers it on a fixed interval until shutdown.

pub mod runner;
pub mod scheduler;

pub use runner::{CycleError, CycleOrchestrator, CycleReport};
pub use scheduler::Scheduler;

use std::time::Duration;

use crate::reading::DeviceId;

/// Cycle configuration
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub devices: Vec<DeviceId>,
    /// Budget for polling, live delivery and resend within one cycle
    pub cycle_timeout: Duration,
    /// Retention window applied after each cycle
    pub max_age: chrono::Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            devices: [7, 8, 9, 10, 11].into_iter().map(DeviceId).collect(),
            cycle_timeout: Duration::from_secs(120),
            max_age: chrono::Duration::hours(crate::ledger::DEFAULT_MAX_AGE_HOURS),
        }
    }
}
