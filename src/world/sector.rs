//! Expanded territory radiating from a node

use serde::{Deserialize, Serialize};

use crate::core::types::{NodeId, PlayerId, Position, SectorId, SessionId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritorySector {
    pub id: SectorId,
    pub session: SessionId,
    pub owner: Option<PlayerId>,
    pub position: Position,
    /// Node this sector radiates from
    pub node: NodeId,
    pub captured_at: Timestamp,
    /// 1..=3, by thirds of the maximum expansion radius
    pub tier: u8,
    pub wave: u32,
    pub distance: f32,
}
