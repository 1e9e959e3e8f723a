//! Game session lifecycle

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, SessionId, Tick, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub status: SessionStatus,
    pub tick: Tick,
    /// Liveness signal; `None` until the first tick runs
    pub last_tick_at: Option<Timestamp>,
    /// Set when the session completes with a single owner
    pub winner: Option<PlayerId>,
}

impl GameSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            status: SessionStatus::Waiting,
            tick: 0,
            last_tick_at: None,
            winner: None,
        }
    }

    /// True when the simulation has not ticked for longer than `stale_after_ms`
    pub fn is_stale(&self, now: Timestamp, stale_after_ms: u64) -> bool {
        match self.last_tick_at {
            Some(at) => now.millis_since(at) > stale_after_ms,
            None => true,
        }
    }
}
