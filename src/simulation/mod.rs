//! Per-tick simulation phases and the orchestrator that sequences them

pub mod attacks;
pub mod driver;
pub mod expansion;
pub mod growth;
pub mod income;
pub mod tick;

use crate::core::config::EngineConfig;
use crate::core::types::{SessionId, Tick, Timestamp};
use crate::store::Store;

pub use attacks::{run_attack_phase, AttackResolution};
pub use driver::{SessionRun, TickDriver};
pub use expansion::{plan_expansion, run_expansion_phase, ExpansionPlan, SkipReason};
pub use growth::{effective_capacity, run_growth_phase, troop_growth};
pub use income::{energy_efficiency, resource_delta, run_income_phase};
pub use tick::{Engine, TickReport};

/// Everything a phase needs for one tick of one session
pub struct TickContext<'a, S: Store> {
    pub store: &'a S,
    pub config: &'a EngineConfig,
    pub session: SessionId,
    pub tick: Tick,
    pub now: Timestamp,
}
