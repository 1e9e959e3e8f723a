//! Territory nodes ("planets")

use serde::{Deserialize, Serialize};

use crate::core::types::{NodeId, PlayerId, Position, SessionId};

/// Terrain classification affecting defense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Open,
    Nebula,
    Asteroid,
}

impl Terrain {
    pub fn name(&self) -> &'static str {
        match self {
            Terrain::Open => "open",
            Terrain::Nebula => "nebula",
            Terrain::Asteroid => "asteroid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritoryNode {
    pub id: NodeId,
    pub session: SessionId,
    pub name: String,
    pub position: Position,
    pub owner: Option<PlayerId>,
    pub garrison: u32,
    /// Capacity before structure bonuses
    pub base_capacity: u32,
    pub energy_yield: u32,
    pub resource_rich: bool,
    pub terrain: Terrain,
}

impl TerritoryNode {
    pub fn new(session: SessionId, name: impl Into<String>, position: Position) -> Self {
        Self {
            id: NodeId::new(),
            session,
            name: name.into(),
            position,
            owner: None,
            garrison: 0,
            base_capacity: 500,
            energy_yield: 0,
            resource_rich: false,
            terrain: Terrain::Open,
        }
    }

    pub fn with_owner(mut self, owner: PlayerId, garrison: u32) -> Self {
        self.owner = Some(owner);
        self.garrison = garrison;
        self
    }

    pub fn with_terrain(mut self, terrain: Terrain) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn is_owned_by(&self, player: PlayerId) -> bool {
        self.owner == Some(player)
    }

    pub fn is_neutral(&self) -> bool {
        self.owner.is_none()
    }

    pub fn distance_to(&self, other: &TerritoryNode) -> f32 {
        self.position.distance(other.position)
    }
}
