//! Fixed-cadence tick driver for a set of sessions
//!
//! Each session ticks in its own task. A session whose previous tick is
//! still running skips the slot instead of stacking a second invocation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::clock::Clock;
use crate::core::error::Result;
use crate::core::types::SessionId;
use crate::simulation::tick::{Engine, TickReport};
use crate::store::Store;

/// Per-session outcome of a driver run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRun {
    pub session: SessionId,
    /// Invocations that ran the phases
    pub ticks: u64,
    pub skipped: u64,
    pub errors: u64,
    pub last: Option<TickReport>,
}

impl SessionRun {
    pub fn completed(&self) -> bool {
        self.last.as_ref().is_some_and(|r| r.completed)
    }
}

type InFlight = Arc<Mutex<AHashSet<SessionId>>>;

/// Marks a session as ticking until dropped
struct InFlightGuard {
    set: InFlight,
    session: SessionId,
}

impl InFlightGuard {
    fn acquire(set: &InFlight, session: SessionId) -> Option<Self> {
        let mut sessions = set.lock().ok()?;
        if !sessions.insert(session) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            session,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.set.lock() {
            sessions.remove(&self.session);
        }
    }
}

pub struct TickDriver<S, C> {
    engine: Arc<Engine<S, C>>,
    period: Duration,
    in_flight: InFlight,
}

impl<S, C> TickDriver<S, C>
where
    S: Store,
    C: Clock + 'static,
{
    pub fn new(engine: Arc<Engine<S, C>>) -> Self {
        let period = Duration::from_millis(engine.config().driver.tick_interval_ms);
        Self {
            engine,
            period,
            in_flight: Arc::new(Mutex::new(AHashSet::new())),
        }
    }

    pub fn engine(&self) -> &Arc<Engine<S, C>> {
        &self.engine
    }

    /// Tick every session until it completes or has run `max_ticks` ticks
    /// (unbounded when `None`).
    pub async fn run(&self, sessions: &[SessionId], max_ticks: Option<u64>) -> Vec<SessionRun> {
        // A session stays in flight until its result has been counted
        let (tx, mut rx) =
            mpsc::unbounded_channel::<(SessionId, Result<TickReport>, InFlightGuard)>();
        let mut runs: AHashMap<SessionId, SessionRun> = sessions
            .iter()
            .map(|&session| {
                (
                    session,
                    SessionRun {
                        session,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let mut active: Vec<SessionId> = sessions.to_vec();
        let mut pending = 0usize;

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(sessions = sessions.len(), period_ms = self.period.as_millis() as u64, "driver started");

        while !active.is_empty() || pending > 0 {
            tokio::select! {
                _ = ticker.tick(), if !active.is_empty() => {
                    for &session in &active {
                        let Some(guard) = InFlightGuard::acquire(&self.in_flight, session) else {
                            debug!(session = %session, "previous tick still running, slot skipped");
                            continue;
                        };
                        let engine = Arc::clone(&self.engine);
                        let tx = tx.clone();
                        pending += 1;
                        tokio::spawn(async move {
                            let result = engine.advance_tick(session).await;
                            let _ = tx.send((session, result, guard));
                        });
                    }
                }
                Some((session, result, _guard)) = rx.recv() => {
                    pending -= 1;
                    let Some(run) = runs.get_mut(&session) else {
                        continue;
                    };
                    let finished = match result {
                        Ok(report) => {
                            if report.skipped {
                                run.skipped += 1;
                            } else {
                                run.ticks += 1;
                            }
                            let done = report.completed
                                || max_ticks.is_some_and(|max| run.ticks >= max);
                            run.last = Some(report);
                            done
                        }
                        Err(e) => {
                            run.errors += 1;
                            warn!(session = %session, error = %e, "tick failed");
                            e.is_missing()
                        }
                    };
                    if finished {
                        active.retain(|s| *s != session);
                    }
                }
            }
        }

        let mut results: Vec<SessionRun> = runs.into_values().collect();
        results.sort_by_key(|r| r.session);
        results
    }
}
