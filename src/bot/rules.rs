//! Ordered decision rules; the first rule that yields an action wins
//!
//! 1. build a resource or capacity structure
//! 2. finish off a nearly encircled enemy node
//! 3. expand into the weakest nearby neutral node
//! 4. strike an enemy node we clearly outmatch
//! 5. reinforce the weakest own node from the strongest

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bot::context::BotContext;
use crate::combat::encirclement_coverage;
use crate::core::types::NodeId;
use crate::spatial::within_radius;
use crate::store::OwnerFilter;
use crate::world::{StructureType, TerritoryNode};

/// Why a bot is sending troops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotIntent {
    Encircle,
    Expand,
    Strike,
    Reinforce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotAction {
    Build {
        node: NodeId,
        kind: StructureType,
    },
    Attack {
        intent: BotIntent,
        source: NodeId,
        target: NodeId,
        troops: u32,
    },
}

pub type Rule = fn(&BotContext<'_>) -> Option<BotAction>;

pub const RULES: [(&str, Rule); 5] = [
    ("build", build_rule),
    ("encircle", encircle_rule),
    ("expand", expand_rule),
    ("strike", strike_rule),
    ("reinforce", reinforce_rule),
];

/// First applicable action in priority order
pub fn decide(ctx: &BotContext<'_>) -> Option<BotAction> {
    RULES.iter().find_map(|(name, rule)| {
        let action = rule(ctx)?;
        debug!(player = %ctx.player, rule = *name, ?action, "bot decision");
        Some(action)
    })
}

// Commit troops from `source`; the garrison left behind is never negative
fn attack_from(
    ctx: &BotContext<'_>,
    source: &TerritoryNode,
    target: &TerritoryNode,
    intent: BotIntent,
) -> Option<BotAction> {
    let troops = ctx.commitment(source.garrison);
    if troops == 0 || source.garrison.checked_sub(troops).is_none() {
        return None;
    }
    Some(BotAction::Attack {
        intent,
        source: source.id,
        target: target.id,
        troops,
    })
}

pub fn build_rule(ctx: &BotContext<'_>) -> Option<BotAction> {
    if ctx.build_roll >= ctx.config.bots.build_chance * ctx.multiplier {
        return None;
    }
    let own = ctx.own_nodes();
    let wants = |node: &TerritoryNode, kind: StructureType| {
        !ctx.structures.has_active(node.id, kind) && ctx.balance.covers(&kind.cost())
    };
    let build = |node: &TerritoryNode, kind| BotAction::Build {
        node: node.id,
        kind,
    };

    // Capacity first: a node close to full gets a colony
    let fill = ctx.config.bots.colony_fill_ratio;
    if let Some(node) = own.iter().find(|n| {
        wants(n, StructureType::Colony) && n.garrison as f64 >= ctx.capacity(n) as f64 * fill
    }) {
        return Some(build(node, StructureType::Colony));
    }

    if let Some(node) = own
        .iter()
        .find(|n| n.resource_rich && wants(n, StructureType::Mining))
    {
        return Some(build(node, StructureType::Mining));
    }

    // Trade only pays with partners in range
    let trade_range = ctx.config.economy.trade_range;
    own.iter()
        .filter(|n| wants(n, StructureType::Trade))
        .map(|hub| {
            let partners = own
                .iter()
                .filter(|o| o.id != hub.id && within_radius(hub.position, o.position, trade_range))
                .count();
            (hub, partners)
        })
        .filter(|(_, partners)| *partners > 0)
        .max_by_key(|(hub, partners)| (*partners, Reverse(hub.id)))
        .map(|(hub, _)| build(hub, StructureType::Trade))
}

pub fn encircle_rule(ctx: &BotContext<'_>) -> Option<BotAction> {
    let own = ctx.own_nodes();
    let radius = ctx.config.tactics.encirclement_radius;
    let needed = ctx.config.bots.nearly_encircled_buckets;

    let mut candidates: Vec<(&TerritoryNode, usize)> = ctx
        .targets(OwnerFilter::Hostile(ctx.player))
        .into_iter()
        .map(|target| {
            let around = own
                .iter()
                .filter(|n| within_radius(target.position, n.position, radius))
                .map(|n| n.position);
            (target, encirclement_coverage(target.position, around).count())
        })
        .filter(|(_, covered)| *covered >= needed)
        .collect();
    // Most surrounded first, then the weakest
    candidates.sort_by_key(|(t, covered)| (Reverse(*covered), t.garrison, t.id));

    candidates.into_iter().find_map(|(target, _)| {
        let source = ctx.strongest_source_for(target)?;
        attack_from(ctx, source, target, BotIntent::Encircle)
    })
}

pub fn expand_rule(ctx: &BotContext<'_>) -> Option<BotAction> {
    let mut neutral = ctx.targets(OwnerFilter::Neutral);
    neutral.sort_by_key(|t| {
        let distance = ctx.distance_to_territory(t).unwrap_or(f32::MAX);
        (t.garrison, OrderedFloat(distance), t.id)
    });

    neutral.into_iter().find_map(|target| {
        let source = ctx.strongest_source_for(target)?;
        match attack_from(ctx, source, target, BotIntent::Expand)? {
            action @ BotAction::Attack { troops, .. } if troops > target.garrison => Some(action),
            _ => None,
        }
    })
}

pub fn strike_rule(ctx: &BotContext<'_>) -> Option<BotAction> {
    let threshold = ctx.config.bots.attack_ratio_threshold / ctx.multiplier;

    ctx.targets(OwnerFilter::Hostile(ctx.player))
        .into_iter()
        .filter_map(|target| {
            let source = ctx.strongest_source_for(target)?;
            let ratio = source.garrison as f64 / target.garrison.max(1) as f64;
            (ratio > threshold).then_some((source, target, ratio))
        })
        .max_by_key(|(_, target, ratio)| (OrderedFloat(*ratio), Reverse(target.id)))
        .and_then(|(source, target, _)| attack_from(ctx, source, target, BotIntent::Strike))
}

pub fn reinforce_rule(ctx: &BotContext<'_>) -> Option<BotAction> {
    let own = ctx.own_nodes();
    if own.len() < 2 {
        return None;
    }
    let strongest = own.iter().max_by_key(|n| (n.garrison, Reverse(n.id)))?;
    let weakest = own.iter().min_by_key(|n| (n.garrison, n.id))?;
    if strongest.id == weakest.id {
        return None;
    }
    if (strongest.garrison as f64) < weakest.garrison.max(1) as f64 * ctx.config.bots.reinforce_ratio
    {
        return None;
    }

    let room = ctx.capacity(weakest).saturating_sub(weakest.garrison);
    let troops = ctx.commitment(strongest.garrison).min(room);
    if troops == 0 {
        return None;
    }
    Some(BotAction::Attack {
        intent: BotIntent::Reinforce,
        source: strongest.id,
        target: weakest.id,
        troops,
    })
}
