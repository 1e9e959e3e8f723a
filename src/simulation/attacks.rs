//! Attack lifecycle: arrival, reinforcement, retreat, encirclement, combat
//!
//! For every attack whose arrival time has passed, in order:
//! 1. own target: merge troops (capped) and finish
//! 2. hopelessly outnumbered: retreat, 80% head home, record it
//! 3. target encircled on all six sides: capture without a fight
//! 4. otherwise: resolve combat with tactical flags
//!
//! The node effect, the record and the status change of a resolution go to
//! the store as one [`AttackCommit`]. A failed or stale commit writes nothing,
//! so the next tick re-derives the resolution from unchanged state.

use ahash::AHashMap;
use tracing::{debug, info, warn};

use crate::combat::{
    analyze, is_encircled, resolve_combat, retreat_survivors, should_retreat, CombatInput,
};
use crate::core::error::{ConquestError, Result};
use crate::core::types::{AttackId, NodeId, Position, RecordId};
use crate::simulation::growth::effective_capacity;
use crate::simulation::TickContext;
use crate::store::{AttackCommit, CommitOutcome, NodeEffect, OwnerFilter, Store};
use crate::world::{
    Attack, AttackStatus, CombatOutcome, CombatRecord, StructureIndex, StructureType,
    TacticalFlags, TerritoryNode,
};

/// What happened to one due attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackResolution {
    Reinforced { garrison: u32 },
    Retreated { returned: u32 },
    Captured { encircled: bool },
    Repelled,
    /// A retreating force got home
    Returned,
    /// Ownership or garrison moved between read and write; retried next tick
    Deferred,
    /// Nothing to do, an earlier invocation finished it
    AlreadyResolved,
}

/// Snapshot shared by every attack resolved in one phase
struct AttackPhase<'a, S: Store> {
    ctx: &'a TickContext<'a, S>,
    open: &'a [Attack],
    positions: &'a AHashMap<NodeId, Position>,
    structures: &'a StructureIndex,
}

impl<'a, S: Store> AttackPhase<'a, S> {
    fn capacity(&self, node: &TerritoryNode) -> u32 {
        effective_capacity(node, self.structures, &self.ctx.config.growth)
    }

    fn position(&self, node: NodeId) -> Result<Position> {
        self.positions
            .get(&node)
            .copied()
            .ok_or_else(|| ConquestError::not_found("node", node))
    }

    /// Sources of every attack by the same attacker still converging on the
    /// same target, this one included
    fn converging_origins(&self, attack: &Attack) -> Vec<Position> {
        self.open
            .iter()
            .filter(|a| a.attacker == attack.attacker && a.target == attack.target)
            .filter(|a| a.status == AttackStatus::InTransit)
            .filter_map(|a| self.positions.get(&a.source).copied())
            .collect()
    }
}

/// Resolve every due attack of the session. Returns how many changed state.
pub async fn run_attack_phase<S: Store>(ctx: &TickContext<'_, S>) -> Result<usize> {
    let open = ctx.store.open_attacks(ctx.session).await?;
    let due: Vec<AttackId> = open
        .iter()
        .filter(|a| a.is_due(ctx.now))
        .map(|a| a.id)
        .collect();
    if due.is_empty() {
        return Ok(0);
    }

    let nodes = ctx.store.nodes(ctx.session).await?;
    let positions: AHashMap<NodeId, Position> =
        nodes.iter().map(|n| (n.id, n.position)).collect();
    let structures = StructureIndex::new(ctx.store.structures(ctx.session).await?);
    let phase = AttackPhase {
        ctx,
        open: &open,
        positions: &positions,
        structures: &structures,
    };

    let mut resolved = 0;
    for id in due {
        match resolve_attack(&phase, id).await {
            Ok(AttackResolution::AlreadyResolved) => {}
            Ok(AttackResolution::Deferred) => debug!(attack = %id, "attack deferred"),
            Ok(outcome) => {
                resolved += 1;
                debug!(attack = %id, ?outcome, "attack resolved");
            }
            Err(e) if e.is_missing() => debug!(attack = %id, error = %e, "attack skipped"),
            Err(e) => warn!(attack = %id, error = %e, "attack resolution failed"),
        }
    }
    Ok(resolved)
}

async fn resolve_attack<S: Store>(phase: &AttackPhase<'_, S>, id: AttackId) -> Result<AttackResolution> {
    let store = phase.ctx.store;
    let now = phase.ctx.now;

    // Re-read: a concurrent invocation may already have moved it on
    let attack = store
        .attack(id)
        .await?
        .ok_or_else(|| ConquestError::not_found("attack", id))?;
    if !attack.is_due(now) {
        return Ok(AttackResolution::AlreadyResolved);
    }

    match attack.status {
        AttackStatus::Retreating { .. } => {
            return finish(phase, &attack, AttackStatus::Arrived, AttackResolution::Returned).await;
        }
        AttackStatus::Arrived => return Ok(AttackResolution::AlreadyResolved),
        AttackStatus::InTransit => {}
    }

    let target = store
        .node(attack.target)
        .await?
        .ok_or_else(|| ConquestError::not_found("node", attack.target))?;

    if target.is_owned_by(attack.attacker) {
        return reinforce(phase, &attack, &target).await;
    }
    if should_retreat(attack.troops, target.garrison, &phase.ctx.config.combat) {
        return retreat(phase, &attack, &target).await;
    }
    if let Some(outcome) = try_encirclement(phase, &attack, &target).await? {
        return Ok(outcome);
    }
    fight(phase, &attack, &target).await
}

async fn reinforce<S: Store>(
    phase: &AttackPhase<'_, S>,
    attack: &Attack,
    target: &TerritoryNode,
) -> Result<AttackResolution> {
    let cap = phase.capacity(target);
    let effect = NodeEffect::AddCapped {
        node: target.id,
        owner: attack.attacker,
        amount: attack.troops,
        cap,
    };
    let garrison = target.garrison.saturating_add(attack.troops).min(cap.max(target.garrison));
    commit(
        phase,
        attack,
        AttackStatus::Arrived,
        Some(effect),
        None,
        AttackResolution::Reinforced { garrison },
    )
    .await
}

async fn retreat<S: Store>(
    phase: &AttackPhase<'_, S>,
    attack: &Attack,
    target: &TerritoryNode,
) -> Result<AttackResolution> {
    let store = phase.ctx.store;
    let survivors = retreat_survivors(attack.troops, &phase.ctx.config.combat);

    let effect = match store.node(attack.source).await? {
        Some(source) if source.is_owned_by(attack.attacker) => Some(NodeEffect::AddCapped {
            node: source.id,
            owner: attack.attacker,
            amount: survivors,
            cap: phase.capacity(&source),
        }),
        _ => {
            debug!(attack = %attack.id, "source lost during retreat, survivors scattered");
            None
        }
    };
    let returned = if effect.is_some() { survivors } else { 0 };

    let mut record = new_record(phase, attack, target, CombatOutcome::Retreat);
    record.attacker_losses = attack.troops - survivors;
    record.attacker_survivors = survivors;
    record.defender_survivors = target.garrison;

    let returns_at = phase.ctx.now.plus_millis(attack.travel_ms());
    commit(
        phase,
        attack,
        AttackStatus::Retreating { returns_at },
        effect,
        Some(record),
        AttackResolution::Retreated { returned },
    )
    .await
}

async fn try_encirclement<S: Store>(
    phase: &AttackPhase<'_, S>,
    attack: &Attack,
    target: &TerritoryNode,
) -> Result<Option<AttackResolution>> {
    let ctx = phase.ctx;
    let neighbours: Vec<Position> = ctx
        .store
        .nodes_within_radius(
            ctx.session,
            target.position,
            ctx.config.tactics.encirclement_radius,
            OwnerFilter::Player(attack.attacker),
        )
        .await?
        .into_iter()
        .filter(|n| n.id != target.id)
        .map(|n| n.position)
        .collect();
    if !is_encircled(target.position, &neighbours) {
        return Ok(None);
    }

    let garrison = attack.troops.min(phase.capacity(target));
    let mut record = new_record(phase, attack, target, CombatOutcome::AttackerVictory);
    record.defender_losses = target.garrison;
    record.attacker_survivors = garrison;
    record.flags.encircled = true;

    let outcome = commit(
        phase,
        attack,
        AttackStatus::Arrived,
        Some(capture_effect(attack, target, garrison)),
        Some(record),
        AttackResolution::Captured { encircled: true },
    )
    .await?;
    if outcome == (AttackResolution::Captured { encircled: true }) {
        reassign_sectors(phase, attack, target).await;
    }
    Ok(Some(outcome))
}

async fn fight<S: Store>(
    phase: &AttackPhase<'_, S>,
    attack: &Attack,
    target: &TerritoryNode,
) -> Result<AttackResolution> {
    let ctx = phase.ctx;
    let source_position = phase.position(attack.source)?;
    let origins = phase.converging_origins(attack);
    let tactics = analyze(source_position, &origins, target.position, &ctx.config.tactics);
    let defense_structure = has_defense_cover(phase, target).await?;

    let input = CombatInput {
        attacker_force: attack.troops,
        defender_force: target.garrison,
        terrain: target.terrain,
        defense_structure,
        flanking: tactics.flanking,
        elevation: tactics.elevation,
    };
    let result = resolve_combat(&input, &ctx.config.combat);

    let (outcome, effect, resolution) = if result.attacker_wins {
        let garrison = result.attacker_survivors.min(phase.capacity(target));
        (
            CombatOutcome::AttackerVictory,
            capture_effect(attack, target, garrison),
            AttackResolution::Captured { encircled: false },
        )
    } else {
        let effect = NodeEffect::SetGarrison {
            node: target.id,
            expected: target.garrison,
            new: result.defender_survivors,
        };
        (CombatOutcome::DefenderVictory, effect, AttackResolution::Repelled)
    };

    let mut record = new_record(phase, attack, target, outcome);
    record.attacker_losses = result.attacker_losses.min(attack.troops);
    record.defender_losses = result.defender_losses.min(target.garrison);
    record.attacker_survivors = result.attacker_survivors;
    record.defender_survivors = result.defender_survivors;
    record.flags.flanking = tactics.flanking;
    record.flags.elevation = tactics.elevation;
    record.flags.defense_structure = defense_structure;

    let committed = commit(
        phase,
        attack,
        AttackStatus::Arrived,
        Some(effect),
        Some(record),
        resolution,
    )
    .await?;
    if committed == (AttackResolution::Captured { encircled: false }) {
        reassign_sectors(phase, attack, target).await;
    }
    Ok(committed)
}

/// Active defense structure on the target, or on a defender node in range
async fn has_defense_cover<S: Store>(
    phase: &AttackPhase<'_, S>,
    target: &TerritoryNode,
) -> Result<bool> {
    if phase.structures.has_active(target.id, StructureType::Defense) {
        return Ok(true);
    }
    let range = phase.ctx.config.combat.defense_range;
    let Some(defender) = target.owner else {
        return Ok(false);
    };
    if range <= 0.0 {
        return Ok(false);
    }
    let covering = phase
        .ctx
        .store
        .nodes_within_radius(
            phase.ctx.session,
            target.position,
            range,
            OwnerFilter::Player(defender),
        )
        .await?;
    Ok(covering
        .iter()
        .any(|n| phase.structures.has_active(n.id, StructureType::Defense)))
}

fn capture_effect(attack: &Attack, target: &TerritoryNode, garrison: u32) -> NodeEffect {
    NodeEffect::Capture {
        node: target.id,
        expected_owner: target.owner,
        new_owner: attack.attacker,
        garrison,
    }
}

/// Re-own the sectors of a captured node. The expansion phase reconciles
/// sector owners if this fails.
async fn reassign_sectors<S: Store>(phase: &AttackPhase<'_, S>, attack: &Attack, target: &TerritoryNode) {
    match phase
        .ctx
        .store
        .reassign_sectors(target.id, Some(attack.attacker), phase.ctx.now)
        .await
    {
        Ok(sectors) => info!(
            node = %target.id,
            attacker = %attack.attacker,
            previous = ?target.owner,
            sectors,
            "node captured"
        ),
        Err(e) => warn!(node = %target.id, error = %e, "sector reassignment failed"),
    }
}

async fn commit<S: Store>(
    phase: &AttackPhase<'_, S>,
    attack: &Attack,
    to: AttackStatus,
    effect: Option<NodeEffect>,
    record: Option<CombatRecord>,
    resolution: AttackResolution,
) -> Result<AttackResolution> {
    let outcome = phase
        .ctx
        .store
        .commit_attack(AttackCommit {
            attack: attack.id,
            from: attack.status,
            to,
            effect,
            record,
        })
        .await?;
    Ok(match outcome {
        CommitOutcome::Committed => resolution,
        CommitOutcome::AttackMoved => AttackResolution::AlreadyResolved,
        CommitOutcome::NodeChanged => AttackResolution::Deferred,
    })
}

/// Status-only move for attacks that need no effect
async fn finish<S: Store>(
    phase: &AttackPhase<'_, S>,
    attack: &Attack,
    to: AttackStatus,
    resolution: AttackResolution,
) -> Result<AttackResolution> {
    let moved = phase
        .ctx
        .store
        .transition_attack(attack.id, attack.status, to)
        .await?;
    if moved {
        Ok(resolution)
    } else {
        Ok(AttackResolution::AlreadyResolved)
    }
}

fn new_record<S: Store>(
    phase: &AttackPhase<'_, S>,
    attack: &Attack,
    target: &TerritoryNode,
    outcome: CombatOutcome,
) -> CombatRecord {
    CombatRecord {
        id: RecordId::new(),
        session: attack.session,
        attack: attack.id,
        tick: phase.ctx.tick,
        at: phase.ctx.now,
        attacker: attack.attacker,
        defender: target.owner,
        source: attack.source,
        target: target.id,
        attacker_force: attack.troops,
        defender_force: target.garrison,
        attacker_losses: 0,
        defender_losses: 0,
        attacker_survivors: 0,
        defender_survivors: 0,
        outcome,
        terrain: target.terrain,
        flags: TacticalFlags::default(),
    }
}
