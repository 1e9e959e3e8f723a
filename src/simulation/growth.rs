//! Troop growth on owned nodes
//!
//! Growth slows as a node fills up and stops at capacity:
//! `base = 10 + g^0.73 / 4`, `growth = floor(base * (1 - g / C))`.

use tracing::{debug, warn};

use crate::core::config::GrowthConfig;
use crate::core::error::Result;
use crate::simulation::TickContext;
use crate::store::Store;
use crate::world::{StructureIndex, StructureType, TerritoryNode};

/// Base capacity plus the bonus from active colony structures
pub fn effective_capacity(
    node: &TerritoryNode,
    structures: &StructureIndex,
    config: &GrowthConfig,
) -> u32 {
    let colony_levels = structures.active_levels(node.id, StructureType::Colony);
    node.base_capacity
        .saturating_add(colony_levels.saturating_mul(config.colony_bonus_per_level))
}

/// Next-tick garrison. A garrison at or above capacity is left as is.
pub fn troop_growth(garrison: u32, capacity: u32) -> u32 {
    if garrison >= capacity {
        return garrison;
    }
    let g = garrison as f64;
    let base = 10.0 + g.powf(0.73) / 4.0;
    let ratio = 1.0 - g / capacity as f64;
    let growth = (base * ratio).floor().max(0.0) as u32;
    garrison.saturating_add(growth).min(capacity)
}

/// Grow every owned node of the session. Returns how many nodes changed.
///
/// A garrison left above capacity (a colony went inactive) is pulled back
/// down to capacity so the end-of-tick bound holds.
pub async fn run_growth_phase<S: Store>(ctx: &TickContext<'_, S>) -> Result<usize> {
    let nodes = ctx.store.nodes(ctx.session).await?;
    let structures = StructureIndex::new(ctx.store.structures(ctx.session).await?);

    let mut changed = 0;
    for node in nodes.iter().filter(|n| n.owner.is_some()) {
        let capacity = effective_capacity(node, &structures, &ctx.config.growth);
        let next = if node.garrison > capacity {
            capacity
        } else {
            troop_growth(node.garrison, capacity)
        };
        if next == node.garrison {
            continue;
        }

        // A concurrent decrement wins; this node simply grows next tick
        match ctx
            .store
            .compare_and_set_garrison(node.id, node.garrison, next)
            .await
        {
            Ok(true) => changed += 1,
            Ok(false) => debug!(node = %node.id, "garrison moved under growth, skipped"),
            Err(e) => warn!(node = %node.id, error = %e, "growth failed"),
        }
    }
    Ok(changed)
}
