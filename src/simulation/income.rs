//! Per-tick resource generation
//!
//! Energy follows a capacity-efficiency curve that peaks at
//! `efficiency_peak` of the cap and sags toward `efficiency_floor` on both
//! sides. Credits scale with planet count plus trade links. Minerals come
//! only from mining structures on resource-rich nodes.

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::core::config::EconomyConfig;
use crate::core::error::Result;
use crate::core::types::PlayerId;
use crate::simulation::TickContext;
use crate::spatial::within_radius;
use crate::store::Store;
use crate::world::{ResourceCaps, Resources, StructureIndex, StructureType, TerritoryNode};

/// Energy efficiency for the current fill ratio of the energy store
pub fn energy_efficiency(current: u64, max: u64, config: &EconomyConfig) -> f64 {
    let floor = config.efficiency_floor;
    let peak = config.efficiency_peak;
    if max == 0 {
        return floor;
    }
    let ratio = (current as f64 / max as f64).clamp(0.0, 1.0);
    if ratio <= peak {
        floor + (1.0 - floor) * (ratio / peak)
    } else {
        1.0 - (1.0 - floor) * ((ratio - peak) / (1.0 - peak))
    }
}

pub fn energy_income(planet_count: usize, current_energy: u64, config: &EconomyConfig) -> u64 {
    let raw = config.energy_base
        + (planet_count as f64).powf(config.energy_exponent) * config.energy_per_planet;
    let efficiency = energy_efficiency(current_energy, config.max_energy, config);
    (raw * efficiency + 1e-9).floor().max(0.0) as u64
}

/// Planet credits plus the trade bonus: every active trade structure pays
/// `trade_bonus * level` for each other owned node within `trade_range`.
pub fn credit_income(
    owned: &[&TerritoryNode],
    structures: &StructureIndex,
    config: &EconomyConfig,
) -> u64 {
    let mut credits = owned.len() as u64 * config.credits_per_planet;
    for hub in owned {
        let levels = structures.active_levels(hub.id, StructureType::Trade) as u64;
        if levels == 0 {
            continue;
        }
        let partners = owned
            .iter()
            .filter(|n| n.id != hub.id)
            .filter(|n| within_radius(hub.position, n.position, config.trade_range))
            .count() as u64;
        credits += partners * config.trade_bonus * levels;
    }
    credits
}

pub fn mineral_income(
    owned: &[&TerritoryNode],
    structures: &StructureIndex,
    config: &EconomyConfig,
) -> u64 {
    owned
        .iter()
        .filter(|n| n.resource_rich)
        .map(|n| structures.active_levels(n.id, StructureType::Mining) as u64 * config.mining_yield)
        .sum()
}

/// Full per-tick delta for one player
pub fn resource_delta(
    owned: &[&TerritoryNode],
    structures: &StructureIndex,
    current: &Resources,
    config: &EconomyConfig,
) -> Resources {
    Resources {
        credits: credit_income(owned, structures, config),
        energy: energy_income(owned.len(), current.energy, config),
        minerals: mineral_income(owned, structures, config),
    }
}

/// Credit every player that still holds at least one node
pub async fn run_income_phase<S: Store>(ctx: &TickContext<'_, S>) -> Result<usize> {
    let nodes = ctx.store.nodes(ctx.session).await?;
    let structures = StructureIndex::new(ctx.store.structures(ctx.session).await?);
    let economies = ctx.store.economies(ctx.session).await?;
    let caps = ResourceCaps::from_config(&ctx.config.economy);

    let mut owned: AHashMap<PlayerId, Vec<&TerritoryNode>> = AHashMap::new();
    for node in &nodes {
        if let Some(owner) = node.owner {
            owned.entry(owner).or_default().push(node);
        }
    }

    let mut credited = 0;
    for economy in &economies {
        let Some(holdings) = owned.get(&economy.player) else {
            continue;
        };
        let delta = resource_delta(holdings, &structures, &economy.balance, &ctx.config.economy);
        match ctx
            .store
            .apply_resource_delta(ctx.session, economy.player, delta, caps)
            .await
        {
            Ok(balance) => {
                credited += 1;
                debug!(player = %economy.player, ?delta, ?balance, "income");
            }
            Err(e) => warn!(player = %economy.player, error = %e, "income failed"),
        }
    }
    Ok(credited)
}
