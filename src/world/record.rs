//! Append-only audit rows for resolved combats and retreats

use serde::{Deserialize, Serialize};

use crate::core::types::{AttackId, NodeId, PlayerId, RecordId, SessionId, Tick, Timestamp};
use crate::world::node::Terrain;

/// Outcome of a resolved attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    AttackerVictory,
    DefenderVictory,
    Retreat,
}

impl CombatOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            CombatOutcome::AttackerVictory => "attacker_victory",
            CombatOutcome::DefenderVictory => "defender_victory",
            CombatOutcome::Retreat => "retreat",
        }
    }
}

/// Tactical flags in effect for a combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TacticalFlags {
    pub flanking: bool,
    pub elevation: bool,
    pub encircled: bool,
    pub defense_structure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRecord {
    pub id: RecordId,
    pub session: SessionId,
    pub attack: AttackId,
    pub tick: Tick,
    pub at: Timestamp,
    pub attacker: PlayerId,
    pub defender: Option<PlayerId>,
    pub source: NodeId,
    pub target: NodeId,
    pub attacker_force: u32,
    pub defender_force: u32,
    pub attacker_losses: u32,
    pub defender_losses: u32,
    pub attacker_survivors: u32,
    pub defender_survivors: u32,
    pub outcome: CombatOutcome,
    pub terrain: Terrain,
    pub flags: TacticalFlags,
}
