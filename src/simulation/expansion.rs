//! Territory expansion: nodes grow a shell of sectors around themselves
//!
//! Each wave samples a sphere of radius `sqrt(sectors + 1) * sector_size`
//! around the node on a latitude/longitude grid (plus both poles), drops any
//! candidate within `sector_size` of an existing sector, and persists the
//! rest. A node's sector set only ever grows; capture re-owns it.
//!
//! Planning is pure and runs in parallel over nodes. Commits are sequential
//! and re-check each planned sector against everything accepted so far, so
//! two nodes planning overlapping shells in the same wave never both win.

use std::f32::consts::{PI, TAU};

use ahash::AHashMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::core::config::ExpansionConfig;
use crate::core::error::Result;
use crate::core::types::{NodeId, PlayerId, Position, SectorId, Tick, Timestamp};
use crate::simulation::TickContext;
use crate::spatial::SparseHashGrid;
use crate::store::Store;
use crate::world::{TerritoryNode, TerritorySector};

/// Why a node produced no sectors this wave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Neutral,
    /// Oldest sector captured inside the guard window
    Guarded,
    /// Next shell would exceed the maximum radius
    Saturated,
    /// Every candidate collided with an existing sector
    Crowded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionPlan {
    Expand(Vec<TerritorySector>),
    Skip(SkipReason),
}

/// Radius of the next shell for a node that already holds `sector_count`
pub fn shell_radius(sector_count: usize, config: &ExpansionConfig) -> f32 {
    ((sector_count + 1) as f32).sqrt() * config.sector_size
}

/// Tier 1, 2 or 3 by which third of the maximum radius the shell falls in
pub fn tier_for_radius(radius: f32, config: &ExpansionConfig) -> u8 {
    let fraction = radius / config.max_radius;
    if fraction <= 1.0 / 3.0 {
        1
    } else if fraction <= 2.0 / 3.0 {
        2
    } else {
        3
    }
}

// Angular step whose chord on a circle of `radius` is at least `spacing`
fn angular_step(spacing: f32, radius: f32) -> f32 {
    2.0 * (spacing / (2.0 * radius)).min(1.0).asin()
}

/// Latitude/longitude sample of a sphere plus both poles (Y is the polar
/// axis). Neighbouring samples are at least `spacing` apart.
pub fn sphere_candidates(center: Position, radius: f32, spacing: f32) -> Vec<Position> {
    if radius <= 0.0 || spacing <= 0.0 {
        return Vec::new();
    }
    let mut points = vec![
        center + Position::new(0.0, radius, 0.0),
        center - Position::new(0.0, radius, 0.0),
    ];

    let lat_steps = ((PI / angular_step(spacing, radius)).floor() as usize).max(1);
    for i in 1..lat_steps {
        let theta = PI * i as f32 / lat_steps as f32;
        let ring = radius * theta.sin();
        let y = radius * theta.cos();
        let lon_steps = ((TAU / angular_step(spacing, ring)).floor() as usize).max(1);
        for j in 0..lon_steps {
            let phi = TAU * j as f32 / lon_steps as f32;
            points.push(center + Position::new(ring * phi.cos(), y, ring * phi.sin()));
        }
    }
    points
}

/// Plan one wave for one node against the sectors already persisted.
///
/// `own` are the node's current sectors, `existing` indexes every sector of
/// the session.
pub fn plan_expansion(
    node: &TerritoryNode,
    own: &[TerritorySector],
    existing: &SparseHashGrid,
    tick: Tick,
    now: Timestamp,
    config: &ExpansionConfig,
) -> ExpansionPlan {
    let Some(owner) = node.owner else {
        return ExpansionPlan::Skip(SkipReason::Neutral);
    };

    if let Some(oldest) = own.iter().map(|s| s.captured_at).min() {
        if now.millis_since(oldest) < config.guard_window_ms {
            return ExpansionPlan::Skip(SkipReason::Guarded);
        }
    }

    let radius = shell_radius(own.len(), config);
    if radius > config.max_radius {
        return ExpansionPlan::Skip(SkipReason::Saturated);
    }

    let mut candidates = sphere_candidates(node.position, radius, config.sector_size);
    let mut rng = ChaCha8Rng::seed_from_u64(node.id.seed() ^ tick);
    candidates.shuffle(&mut rng);

    let tier = tier_for_radius(radius, config);
    let wave = own.iter().map(|s| s.wave).max().unwrap_or(0) + 1;

    let mut accepted = SparseHashGrid::new(config.sector_size);
    let mut sectors = Vec::new();
    for position in candidates {
        if sectors.len() >= config.max_sectors_per_wave {
            break;
        }
        if existing.any_within(position, config.sector_size)
            || accepted.any_within(position, config.sector_size)
        {
            continue;
        }
        accepted.insert(position);
        sectors.push(TerritorySector {
            id: SectorId::new(),
            session: node.session,
            owner: Some(owner),
            position,
            node: node.id,
            captured_at: now,
            tier,
            wave,
            distance: radius,
        });
    }

    if sectors.is_empty() {
        ExpansionPlan::Skip(SkipReason::Crowded)
    } else {
        ExpansionPlan::Expand(sectors)
    }
}

/// Run one expansion wave if this tick is on the interval.
/// Returns the number of sectors created.
pub async fn run_expansion_phase<S: Store>(ctx: &TickContext<'_, S>) -> Result<usize> {
    let config = &ctx.config.expansion;
    if ctx.tick % config.interval_ticks != 0 {
        return Ok(0);
    }

    let nodes = ctx.store.nodes(ctx.session).await?;
    let sectors = ctx.store.sectors(ctx.session).await?;
    reconcile_owners(ctx, &nodes, &sectors).await;

    let mut by_node: AHashMap<NodeId, Vec<TerritorySector>> = AHashMap::new();
    let mut committed = SparseHashGrid::new(config.sector_size);
    for sector in sectors {
        committed.insert(sector.position);
        by_node.entry(sector.node).or_default().push(sector);
    }

    let empty = Vec::new();
    let plans: Vec<(NodeId, ExpansionPlan)> = nodes
        .par_iter()
        .filter(|n| n.owner.is_some())
        .map(|node| {
            let own = by_node.get(&node.id).unwrap_or(&empty);
            let plan = plan_expansion(node, own, &committed, ctx.tick, ctx.now, config);
            (node.id, plan)
        })
        .collect();

    let mut created = 0;
    for (node, plan) in plans {
        let planned = match plan {
            ExpansionPlan::Expand(sectors) => sectors,
            ExpansionPlan::Skip(reason) => {
                debug!(node = %node, ?reason, "no expansion");
                continue;
            }
        };

        let mut batch = Vec::with_capacity(planned.len());
        for sector in planned {
            if committed.any_within(sector.position, config.sector_size) {
                continue;
            }
            committed.insert(sector.position);
            batch.push(sector);
        }
        if batch.is_empty() {
            continue;
        }

        let count = batch.len();
        match ctx.store.insert_sectors(batch).await {
            Ok(()) => created += count,
            Err(e) => warn!(node = %node, error = %e, "sector insert failed"),
        }
    }
    Ok(created)
}

/// Re-own sectors left behind by a capture whose reassignment failed
async fn reconcile_owners<S: Store>(
    ctx: &TickContext<'_, S>,
    nodes: &[TerritoryNode],
    sectors: &[TerritorySector],
) {
    let owners: AHashMap<NodeId, Option<PlayerId>> =
        nodes.iter().map(|n| (n.id, n.owner)).collect();
    let mut stale: Vec<NodeId> = sectors
        .iter()
        .filter(|s| owners.get(&s.node).is_some_and(|owner| *owner != s.owner))
        .map(|s| s.node)
        .collect();
    stale.sort();
    stale.dedup();

    for node in stale {
        let owner = owners.get(&node).copied().flatten();
        if let Err(e) = ctx.store.reassign_sectors(node, owner, ctx.now).await {
            warn!(node = %node, error = %e, "sector reconcile failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PlayerId, SessionId};
    use glam::Vec3;

    fn config() -> ExpansionConfig {
        ExpansionConfig::default()
    }

    fn owned_node() -> TerritoryNode {
        TerritoryNode::new(SessionId::new(), "Rigel", Vec3::new(100.0, 0.0, -50.0))
            .with_owner(PlayerId::new(), 50)
    }

    fn min_pairwise(points: &[Position]) -> f32 {
        let mut min = f32::MAX;
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                min = min.min(a.distance(*b));
            }
        }
        min
    }

    #[test]
    fn test_shell_radius_grows_with_sqrt() {
        let c = config();
        assert!((shell_radius(0, &c) - 20.0).abs() < 1e-4);
        assert!((shell_radius(3, &c) - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_tiers_by_thirds() {
        let c = config();
        assert_eq!(tier_for_radius(20.0, &c), 1);
        assert_eq!(tier_for_radius(100.0, &c), 2);
        assert_eq!(tier_for_radius(180.0, &c), 3);
    }

    #[test]
    fn test_sphere_candidates_lie_on_shell_and_include_poles() {
        let center = Vec3::new(5.0, 5.0, 5.0);
        let points = sphere_candidates(center, 60.0, 20.0);

        assert!(points.len() > 2);
        for p in &points {
            assert!((p.distance(center) - 60.0).abs() < 1e-3);
        }
        assert!(points.contains(&(center + Vec3::new(0.0, 60.0, 0.0))));
        assert!(points.contains(&(center - Vec3::new(0.0, 60.0, 0.0))));
    }

    #[test]
    fn test_first_wave_is_spaced_and_owned() {
        let node = owned_node();
        let plan = plan_expansion(
            &node,
            &[],
            &SparseHashGrid::new(20.0),
            10,
            Timestamp(1_000),
            &config(),
        );

        let sectors = match plan {
            ExpansionPlan::Expand(sectors) => sectors,
            other => panic!("expected expansion, got {:?}", other),
        };
        assert!(!sectors.is_empty());
        assert!(sectors.len() <= config().max_sectors_per_wave);
        assert!(sectors.iter().all(|s| s.owner == node.owner && s.wave == 1 && s.tier == 1));

        let positions: Vec<Position> = sectors.iter().map(|s| s.position).collect();
        assert!(min_pairwise(&positions) > 20.0 - 1e-3);
    }

    #[test]
    fn test_plan_is_deterministic_for_node_and_tick() {
        let node = owned_node();
        let grid = SparseHashGrid::new(20.0);
        let a = plan_expansion(&node, &[], &grid, 20, Timestamp(0), &config());
        let b = plan_expansion(&node, &[], &grid, 20, Timestamp(0), &config());

        let (ExpansionPlan::Expand(a), ExpansionPlan::Expand(b)) = (a, b) else {
            panic!("expected expansions");
        };
        let pa: Vec<Position> = a.iter().map(|s| s.position).collect();
        let pb: Vec<Position> = b.iter().map(|s| s.position).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_existing_sectors_block_candidates() {
        let node = owned_node();
        let c = config();
        let all = sphere_candidates(node.position, shell_radius(0, &c), c.sector_size);
        let grid = SparseHashGrid::from_positions(c.sector_size, all);

        let plan = plan_expansion(&node, &[], &grid, 10, Timestamp(0), &c);
        assert_eq!(plan, ExpansionPlan::Skip(SkipReason::Crowded));
    }

    #[test]
    fn test_guard_window_and_saturation() {
        let node = owned_node();
        let c = config();
        let sector = |captured_at: u64| TerritorySector {
            id: SectorId::new(),
            session: node.session,
            owner: node.owner,
            position: node.position + Vec3::new(0.0, 20.0, 0.0),
            node: node.id,
            captured_at: Timestamp(captured_at),
            tier: 1,
            wave: 1,
            distance: 20.0,
        };
        let grid = SparseHashGrid::new(c.sector_size);

        let fresh = vec![sector(10_000)];
        assert_eq!(
            plan_expansion(&node, &fresh, &grid, 10, Timestamp(20_000), &c),
            ExpansionPlan::Skip(SkipReason::Guarded)
        );

        // sqrt(100 + 1) * 20 > 200
        let full: Vec<TerritorySector> = (0..100).map(|_| sector(0)).collect();
        assert_eq!(
            plan_expansion(&node, &full, &grid, 10, Timestamp(100_000), &c),
            ExpansionPlan::Skip(SkipReason::Saturated)
        );
    }

    #[test]
    fn test_neutral_node_never_expands() {
        let node = TerritoryNode::new(SessionId::new(), "Deneb", Vec3::ZERO);
        let grid = SparseHashGrid::new(20.0);
        let plan = plan_expansion(&node, &[], &grid, 10, Timestamp(0), &config());
        assert_eq!(plan, ExpansionPlan::Skip(SkipReason::Neutral));
    }
}
