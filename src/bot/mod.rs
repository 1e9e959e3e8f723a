//! Bot decision engine for non-human players
//!
//! Each bot acts once every `interval_ticks`, offset by a per-player stagger
//! so bots do not all fire on the same tick. A decision is a pure function
//! of a [`BotContext`] snapshot; the chosen action is then committed through
//! the same commands a human player uses, so the store's atomic checks apply.

pub mod context;
pub mod rules;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::command::{build_structure, launch_attack, AttackOrder};
use crate::core::error::{ConquestError, Result};
use crate::core::types::{PlayerId, Tick};
use crate::simulation::TickContext;
use crate::store::Store;
use crate::world::{BotProfile, StructureIndex, TerritoryNode};

pub use context::BotContext;
pub use rules::{decide, BotAction, BotIntent, RULES};

/// True on the ticks this player's bot gets to act
pub fn acts_on_tick(player: PlayerId, tick: Tick, interval: u64) -> bool {
    if interval <= 1 {
        return true;
    }
    (tick + player.stagger_seed() % interval) % interval == 0
}

/// Uniform [0, 1) roll, reproducible for a given player and tick
pub fn build_roll(player: PlayerId, tick: Tick) -> f64 {
    let seed = player.stagger_seed() ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    ChaCha8Rng::seed_from_u64(seed).gen()
}

/// Let every bot due this tick decide and commit one action.
/// Returns the number of actions committed.
pub async fn run_bot_phase<S: Store>(ctx: &TickContext<'_, S>) -> Result<usize> {
    let interval = ctx.config.bots.interval_ticks;
    let profiles = ctx.store.bot_profiles(ctx.session).await?;
    let acting: Vec<&BotProfile> = profiles
        .iter()
        .filter(|p| acts_on_tick(p.player, ctx.tick, interval))
        .collect();
    if acting.is_empty() {
        return Ok(0);
    }

    let nodes = ctx.store.nodes(ctx.session).await?;
    let structures = StructureIndex::new(ctx.store.structures(ctx.session).await?);

    let mut committed = 0;
    for profile in acting {
        match run_bot(ctx, profile, &nodes, &structures).await {
            Ok(Some(action)) => {
                committed += 1;
                debug!(player = %profile.player, ?action, "bot acted");
            }
            Ok(None) => {}
            Err(
                e @ (ConquestError::InsufficientTroops { .. }
                | ConquestError::InsufficientResources { .. }
                | ConquestError::AccessDenied { .. }
                | ConquestError::NotFound { .. }),
            ) => debug!(player = %profile.player, error = %e, "bot action rejected"),
            Err(e) => warn!(player = %profile.player, error = %e, "bot failed"),
        }
    }
    Ok(committed)
}

async fn run_bot<S: Store>(
    ctx: &TickContext<'_, S>,
    profile: &BotProfile,
    nodes: &[TerritoryNode],
    structures: &StructureIndex,
) -> Result<Option<BotAction>> {
    let Some(economy) = ctx.store.economy(ctx.session, profile.player).await? else {
        return Ok(None);
    };
    if !nodes.iter().any(|n| n.is_owned_by(profile.player)) {
        return Ok(None);
    }

    let bot = BotContext {
        player: profile.player,
        tick: ctx.tick,
        difficulty: profile.difficulty,
        multiplier: profile.difficulty.multiplier(&ctx.config.bots),
        nodes,
        structures,
        balance: economy.balance,
        config: ctx.config,
        build_roll: build_roll(profile.player, ctx.tick),
    };
    let Some(action) = decide(&bot) else {
        return Ok(None);
    };

    match action {
        BotAction::Build { node, kind } => {
            build_structure(ctx.store, ctx.config, ctx.session, profile.player, node, kind)
                .await?;
        }
        BotAction::Attack {
            source,
            target,
            troops,
            ..
        } => {
            let order = AttackOrder {
                session: ctx.session,
                player: profile.player,
                source,
                target,
                troops,
            };
            launch_attack(ctx.store, ctx.config, ctx.now, order).await?;
        }
    }
    Ok(Some(action))
}
