//! Tick orchestration - one full pass of every phase for one session
//!
//! growth -> attacks -> expansion -> income -> bots -> completion
//!
//! The tick counter advance is the first write and is a compare-and-swap, so
//! two overlapping invocations for the same session never both run the
//! phases. Every phase re-derives its inputs from the store, which is what
//! makes a failed tick safe to simply follow with the next one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};

use crate::bot::run_bot_phase;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::EngineConfig;
use crate::core::error::{ConquestError, Result};
use crate::core::types::{PlayerId, SessionId, Tick, Timestamp};
use crate::simulation::attacks::run_attack_phase;
use crate::simulation::expansion::run_expansion_phase;
use crate::simulation::growth::run_growth_phase;
use crate::simulation::income::run_income_phase;
use crate::simulation::TickContext;
use crate::store::Store;
use crate::world::SessionStatus;

/// What one `advance_tick` invocation did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub session: SessionId,
    pub tick_number: Tick,
    /// The phases did not run: the session is not active, or a concurrent
    /// invocation advanced the tick first
    pub skipped: bool,
    pub grown_nodes: usize,
    pub resolved_attacks: usize,
    pub sectors_created: usize,
    pub credited_players: usize,
    pub bot_actions: usize,
    pub completed: bool,
    pub winner: Option<PlayerId>,
}

impl TickReport {
    fn skipped(session: SessionId, tick_number: Tick, completed: bool) -> Self {
        Self {
            session,
            tick_number,
            skipped: true,
            completed,
            ..Default::default()
        }
    }
}

/// The simulation core, bound to a store and a clock
pub struct Engine<S, C = SystemClock> {
    store: Arc<S>,
    clock: C,
    config: EngineConfig,
}

impl<S: Store, C: Clock> Engine<S, C> {
    pub fn new(store: Arc<S>, clock: C, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Advance one session by one tick. Safe to call repeatedly and
    /// concurrently; callers stop once the report says `completed`.
    pub async fn advance_tick(&self, session: SessionId) -> Result<TickReport> {
        self.run_tick(session)
            .instrument(info_span!("tick", session = %session))
            .await
    }

    async fn run_tick(&self, id: SessionId) -> Result<TickReport> {
        let session = self
            .store
            .session(id)
            .await?
            .ok_or_else(|| ConquestError::not_found("session", id))?;
        if session.status != SessionStatus::Active {
            let mut report =
                TickReport::skipped(id, session.tick, session.status == SessionStatus::Completed);
            report.winner = session.winner;
            return Ok(report);
        }

        let now = self.clock.now();
        let Some(tick) = self
            .store
            .advance_session_tick(id, session.tick, now)
            .await?
        else {
            debug!(expected = session.tick, "tick already advanced elsewhere");
            let current = self
                .store
                .session(id)
                .await?
                .map(|s| s.tick)
                .unwrap_or(session.tick);
            return Ok(TickReport::skipped(id, current, false));
        };

        let ctx = TickContext {
            store: self.store.as_ref(),
            config: &self.config,
            session: id,
            tick,
            now,
        };

        let mut report = TickReport {
            session: id,
            tick_number: tick,
            ..Default::default()
        };
        report.grown_nodes = run_growth_phase(&ctx).await?;
        report.resolved_attacks = run_attack_phase(&ctx).await?;
        report.sectors_created = run_expansion_phase(&ctx).await?;
        report.credited_players = run_income_phase(&ctx).await?;
        report.bot_actions = run_bot_phase(&ctx).await?;

        if let Some(winner) = self.check_completion(&ctx).await? {
            report.completed = true;
            report.winner = Some(winner);
        }

        debug!(
            tick,
            grown = report.grown_nodes,
            attacks = report.resolved_attacks,
            sectors = report.sectors_created,
            bots = report.bot_actions,
            "tick done"
        );
        Ok(report)
    }

    /// Complete the session once a single player holds every owned node.
    /// Needs at least two competitors, so a solo sandbox never ends.
    async fn check_completion(&self, ctx: &TickContext<'_, S>) -> Result<Option<PlayerId>> {
        let economies = self.store.economies(ctx.session).await?;
        if economies.len() < 2 {
            return Ok(None);
        }
        let nodes = self.store.nodes(ctx.session).await?;
        let mut owners = nodes.iter().filter_map(|n| n.owner);
        let Some(leader) = owners.next() else {
            return Ok(None);
        };
        if !owners.all(|o| o == leader) {
            return Ok(None);
        }

        self.store
            .set_session_status(ctx.session, SessionStatus::Completed, Some(leader))
            .await?;
        info!(tick = ctx.tick, winner = %leader, "session completed");
        Ok(Some(leader))
    }
}
