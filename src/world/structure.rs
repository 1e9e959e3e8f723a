//! Structures built on nodes

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{NodeId, StructureId};
use crate::world::economy::Resources;

/// Type of structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    Trade,
    Mining,
    Colony,
    Defense,
    Missile,
    PointDefense,
}

impl StructureType {
    pub fn name(&self) -> &'static str {
        match self {
            StructureType::Trade => "trade",
            StructureType::Mining => "mining",
            StructureType::Colony => "colony",
            StructureType::Defense => "defense",
            StructureType::Missile => "missile",
            StructureType::PointDefense => "point_defense",
        }
    }

    /// Resources required to build this structure
    pub fn cost(&self) -> Resources {
        match self {
            StructureType::Trade => Resources::new(500, 0, 0),
            StructureType::Mining => Resources::new(400, 0, 0),
            StructureType::Colony => Resources::new(600, 200, 0),
            StructureType::Defense => Resources::new(800, 0, 100),
            StructureType::Missile => Resources::new(1_200, 0, 300),
            StructureType::PointDefense => Resources::new(900, 0, 200),
        }
    }

    /// Structures that feed the economy or raise capacity
    pub fn is_economic(&self) -> bool {
        matches!(
            self,
            StructureType::Trade | StructureType::Mining | StructureType::Colony
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub node: NodeId,
    pub kind: StructureType,
    pub level: u32,
    pub active: bool,
}

impl Structure {
    pub fn new(node: NodeId, kind: StructureType) -> Self {
        Self {
            id: StructureId::new(),
            node,
            kind,
            level: 1,
            active: true,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn is_active(&self, kind: StructureType) -> bool {
        self.active && self.kind == kind
    }
}

/// Structures of a session grouped by the node they sit on
#[derive(Debug, Clone, Default)]
pub struct StructureIndex {
    by_node: AHashMap<NodeId, Vec<Structure>>,
}

impl StructureIndex {
    pub fn new(structures: impl IntoIterator<Item = Structure>) -> Self {
        let mut by_node: AHashMap<NodeId, Vec<Structure>> = AHashMap::new();
        for s in structures {
            by_node.entry(s.node).or_default().push(s);
        }
        Self { by_node }
    }

    pub fn on(&self, node: NodeId) -> &[Structure] {
        self.by_node.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_active(&self, node: NodeId, kind: StructureType) -> bool {
        self.on(node).iter().any(|s| s.is_active(kind))
    }

    /// Sum of levels of the active structures of `kind` on `node`
    pub fn active_levels(&self, node: NodeId, kind: StructureType) -> u32 {
        self.on(node)
            .iter()
            .filter(|s| s.is_active(kind))
            .map(|s| s.level)
            .sum()
    }

    /// Every active structure of `kind`, in any node
    pub fn active_of_kind(&self, kind: StructureType) -> impl Iterator<Item = &Structure> + '_ {
        self.by_node
            .values()
            .flatten()
            .filter(move |s| s.is_active(kind))
    }
}
