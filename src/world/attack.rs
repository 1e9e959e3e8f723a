//! In-flight attacks and their lifecycle
//!
//! ```text
//! InTransit ──► Retreating ──► Arrived
//!     └──────────────────────────▲
//! ```
//! `Arrived` is terminal. Any other transition is rejected.

use serde::{Deserialize, Serialize};

use crate::core::error::{ConquestError, Result};
use crate::core::types::{AttackId, NodeId, PlayerId, SessionId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttackStatus {
    InTransit,
    Retreating { returns_at: Timestamp },
    Arrived,
}

impl AttackStatus {
    pub fn name(&self) -> &'static str {
        match self {
            AttackStatus::InTransit => "in_transit",
            AttackStatus::Retreating { .. } => "retreating",
            AttackStatus::Arrived => "arrived",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttackStatus::Arrived)
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, to: AttackStatus) -> Result<AttackStatus> {
        match (self, to) {
            (AttackStatus::InTransit, AttackStatus::Retreating { .. })
            | (AttackStatus::InTransit, AttackStatus::Arrived)
            | (AttackStatus::Retreating { .. }, AttackStatus::Arrived) => Ok(to),
            _ => Err(ConquestError::InvalidTransition {
                from: self.name(),
                to: to.name(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub id: AttackId,
    pub session: SessionId,
    pub attacker: PlayerId,
    pub source: NodeId,
    pub target: NodeId,
    pub troops: u32,
    pub launched_at: Timestamp,
    pub arrives_at: Timestamp,
    pub status: AttackStatus,
}

impl Attack {
    pub fn travel_ms(&self) -> u64 {
        self.arrives_at.millis_since(self.launched_at)
    }

    /// True when the attack has work to do at `now`
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.status {
            AttackStatus::InTransit => now.has_reached(self.arrives_at),
            AttackStatus::Retreating { returns_at } => now.has_reached(returns_at),
            AttackStatus::Arrived => false,
        }
    }
}
