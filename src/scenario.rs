//! Seeded session setup for demos, benches and tests
//!
//! Creating sessions belongs to the lobby layer; this is the minimal
//! stand-in that puts a playable session into a store.

use ordered_float::OrderedFloat;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::config::EngineConfig;
use crate::core::error::{ConquestError, Result};
use crate::core::types::{NodeId, PlayerId, Position, SessionId};
use crate::store::Store;
use crate::world::{
    BotProfile, Difficulty, GameSession, PlayerEconomy, Resources, SessionStatus, Terrain,
    TerritoryNode,
};

const STAR_NAMES: [&str; 12] = [
    "Achernar", "Bellatrix", "Capella", "Deneb", "Electra", "Fomalhaut", "Gienah", "Hadar",
    "Izar", "Jabbah", "Kochab", "Lesath",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSpec {
    pub seed: u64,
    pub node_count: usize,
    pub humans: usize,
    pub bots: Vec<Difficulty>,
    /// Nodes are placed in a cube of this half-width around the origin
    pub extent: f32,
    pub home_garrison: u32,
    /// Neutral garrisons are drawn from 0..=this
    pub max_neutral_garrison: u32,
    pub starting_resources: Resources,
    pub nebula_chance: f32,
    pub asteroid_chance: f32,
    pub resource_rich_chance: f32,
}

impl Default for ScenarioSpec {
    fn default() -> Self {
        Self {
            seed: 42,
            node_count: 40,
            humans: 1,
            bots: vec![Difficulty::Easy, Difficulty::Normal, Difficulty::Hard],
            extent: 800.0,
            home_garrison: 100,
            max_neutral_garrison: 40,
            starting_resources: Resources::new(1_000, 500, 0),
            nebula_chance: 0.2,
            asteroid_chance: 0.15,
            resource_rich_chance: 0.25,
        }
    }
}

/// Ids of what [`seed_session`] created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededSession {
    pub session: SessionId,
    pub humans: Vec<PlayerId>,
    pub bots: Vec<PlayerId>,
    pub nodes: Vec<NodeId>,
}

impl SeededSession {
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.humans.iter().chain(self.bots.iter()).copied()
    }
}

fn random_terrain(spec: &ScenarioSpec, rng: &mut ChaCha8Rng) -> Terrain {
    let roll: f32 = rng.gen();
    if roll < spec.nebula_chance {
        Terrain::Nebula
    } else if roll < spec.nebula_chance + spec.asteroid_chance {
        Terrain::Asteroid
    } else {
        Terrain::Open
    }
}

/// Pick home nodes far apart: each next home maximises its distance to the
/// homes already chosen.
fn spread_homes(positions: &[Position], count: usize) -> Vec<usize> {
    let mut homes = Vec::with_capacity(count);
    if positions.is_empty() || count == 0 {
        return homes;
    }
    homes.push(0);
    while homes.len() < count {
        let next = (0..positions.len())
            .filter(|i| !homes.contains(i))
            .max_by_key(|&i| {
                let nearest = homes
                    .iter()
                    .map(|&h| OrderedFloat(positions[h].distance(positions[i])))
                    .min()
                    .unwrap_or(OrderedFloat(0.0));
                (nearest, std::cmp::Reverse(i))
            });
        match next {
            Some(i) => homes.push(i),
            None => break,
        }
    }
    homes
}

/// Create an active session with nodes, one home node per player,
/// economies and bot profiles.
pub async fn seed_session<S: Store>(
    store: &S,
    config: &EngineConfig,
    spec: &ScenarioSpec,
) -> Result<SeededSession> {
    let player_count = spec.humans + spec.bots.len();
    if player_count == 0 || spec.node_count < player_count {
        return Err(ConquestError::Config(format!(
            "scenario needs at least one node per player ({} nodes, {} players)",
            spec.node_count, player_count
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
    let session_id = SessionId::new();
    let humans: Vec<PlayerId> = (0..spec.humans).map(|_| PlayerId::new()).collect();
    let bots: Vec<PlayerId> = spec.bots.iter().map(|_| PlayerId::new()).collect();

    let mut nodes: Vec<TerritoryNode> = (0..spec.node_count)
        .map(|i| {
            let position = Position::new(
                rng.gen_range(-spec.extent..=spec.extent),
                rng.gen_range(-spec.extent..=spec.extent),
                rng.gen_range(-spec.extent..=spec.extent),
            );
            let name = format!(
                "{} {}",
                STAR_NAMES[i % STAR_NAMES.len()],
                i / STAR_NAMES.len() + 1
            );
            let mut node = TerritoryNode::new(session_id, name, position)
                .with_terrain(random_terrain(spec, &mut rng));
            node.base_capacity = config.growth.base_capacity;
            node.energy_yield = rng.gen_range(5..=20);
            node.resource_rich = rng.gen::<f32>() < spec.resource_rich_chance;
            node.garrison = rng.gen_range(0..=spec.max_neutral_garrison);
            node
        })
        .collect();

    let positions: Vec<Position> = nodes.iter().map(|n| n.position).collect();
    let homes = spread_homes(&positions, player_count);
    let players: Vec<PlayerId> = humans.iter().chain(bots.iter()).copied().collect();
    for (&home, &player) in homes.iter().zip(&players) {
        let node = &mut nodes[home];
        node.owner = Some(player);
        node.garrison = spec.home_garrison.min(node.base_capacity);
        node.terrain = Terrain::Open;
    }

    store.insert_session(GameSession::new(session_id)).await?;

    let node_ids = nodes.iter().map(|n| n.id).collect();
    for node in nodes {
        store.insert_node(node).await?;
    }
    for &player in &players {
        store
            .insert_economy(PlayerEconomy::new(session_id, player, spec.starting_resources))
            .await?;
    }
    for (&player, &difficulty) in bots.iter().zip(&spec.bots) {
        store
            .insert_bot_profile(BotProfile {
                session: session_id,
                player,
                difficulty,
            })
            .await?;
    }
    store
        .set_session_status(session_id, SessionStatus::Active, None)
        .await?;

    info!(
        session = %session_id,
        nodes = spec.node_count,
        humans = spec.humans,
        bots = spec.bots.len(),
        seed = spec.seed,
        "session seeded"
    );
    Ok(SeededSession {
        session: session_id,
        humans,
        bots,
        nodes: node_ids,
    })
}
