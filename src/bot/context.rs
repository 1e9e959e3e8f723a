//! A bot's read-only view of the session for one decision

use ordered_float::OrderedFloat;

use crate::core::config::EngineConfig;
use crate::core::types::{PlayerId, Tick};
use crate::simulation::growth::effective_capacity;
use crate::spatial::within_radius;
use crate::store::OwnerFilter;
use crate::world::{Difficulty, Resources, StructureIndex, TerritoryNode};

pub struct BotContext<'a> {
    pub player: PlayerId,
    pub tick: Tick,
    pub difficulty: Difficulty,
    /// Difficulty efficiency, scales commitment and build chance
    pub multiplier: f64,
    pub nodes: &'a [TerritoryNode],
    pub structures: &'a StructureIndex,
    pub balance: Resources,
    pub config: &'a EngineConfig,
    /// Uniform roll in [0, 1) drawn for this bot and tick
    pub build_roll: f64,
}

impl<'a> BotContext<'a> {
    pub fn own_nodes(&self) -> Vec<&'a TerritoryNode> {
        self.nodes
            .iter()
            .filter(|n| n.is_owned_by(self.player))
            .collect()
    }

    pub fn capacity(&self, node: &TerritoryNode) -> u32 {
        effective_capacity(node, self.structures, &self.config.growth)
    }

    /// Troops committed from a garrison at this bot's efficiency
    pub fn commitment(&self, garrison: u32) -> u32 {
        let fraction = self.config.bots.commit_fraction * self.multiplier;
        ((garrison as f64 * fraction + 1e-9).floor() as u32).min(garrison)
    }

    /// Distance from `node` to the closest node this bot owns
    pub fn distance_to_territory(&self, node: &TerritoryNode) -> Option<f32> {
        self.nodes
            .iter()
            .filter(|n| n.is_owned_by(self.player))
            .map(|n| OrderedFloat(n.distance_to(node)))
            .min()
            .map(|d| d.0)
    }

    /// Foreign nodes matching `filter` within bot range of any owned node
    pub fn targets(&self, filter: OwnerFilter) -> Vec<&'a TerritoryNode> {
        let own = self.own_nodes();
        let range = self.config.bots.range;
        self.nodes
            .iter()
            .filter(|n| !n.is_owned_by(self.player) && filter.matches(n.owner))
            .filter(|n| own.iter().any(|o| within_radius(o.position, n.position, range)))
            .collect()
    }

    /// The owned node with the largest garrison in range of `target`
    pub fn strongest_source_for(&self, target: &TerritoryNode) -> Option<&'a TerritoryNode> {
        let range = self.config.bots.range;
        self.own_nodes()
            .into_iter()
            .filter(|n| within_radius(n.position, target.position, range))
            .max_by_key(|n| (n.garrison, std::cmp::Reverse(n.id)))
    }
}
