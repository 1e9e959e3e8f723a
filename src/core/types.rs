//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a game session
    SessionId
);
uuid_id!(
    /// Unique identifier for a territory node ("planet")
    NodeId
);
uuid_id!(
    /// Unique identifier for a player (human or bot)
    PlayerId
);
uuid_id!(
    /// Unique identifier for an attack
    AttackId
);
uuid_id!(
    /// Unique identifier for a territory sector
    SectorId
);
uuid_id!(
    /// Unique identifier for a structure
    StructureId
);
uuid_id!(
    /// Unique identifier for a combat record
    RecordId
);

impl PlayerId {
    /// Stable small integer derived from the identifier.
    ///
    /// Used to stagger per-player work so bots do not all act on the same tick.
    pub fn stagger_seed(&self) -> u64 {
        let bytes = self.0.as_bytes();
        bytes
            .iter()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u64))
    }
}

impl NodeId {
    /// Seed for per-node deterministic randomness
    pub fn seed(&self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo.rotate_left(17)
    }
}

/// Game tick counter (simulation time unit)
pub type Tick = u64;

/// 3D position in session space
pub type Position = glam::Vec3;

/// Wall-clock instant in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn plus_millis(&self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future)
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// True once `self` is at or after `deadline`
    pub fn has_reached(&self, deadline: Timestamp) -> bool {
        self.0 >= deadline.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
