//! Launching attacks

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::config::{AttackConfig, EngineConfig};
use crate::core::error::{ConquestError, Result};
use crate::core::types::{AttackId, NodeId, PlayerId, Position, SessionId, Timestamp};
use crate::store::Store;
use crate::world::{Attack, AttackStatus};

/// Send `troops` from `source` toward `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOrder {
    pub session: SessionId,
    pub player: PlayerId,
    pub source: NodeId,
    pub target: NodeId,
    pub troops: u32,
}

/// Flight time between two points, never below the configured minimum
pub fn travel_time_ms(from: Position, to: Position, config: &AttackConfig) -> u64 {
    let seconds = from.distance(to) / config.travel_speed;
    ((seconds as f64 * 1000.0).ceil() as u64).max(config.min_travel_ms)
}

/// Validate the order, take the troops off the source atomically and put
/// the attack in flight.
///
/// Errors: `InvalidCommand` for zero troops, a self-attack or cross-session
/// nodes; `NotFound`; and whatever the atomic decrement rejects
/// (`AccessDenied`, `InsufficientTroops`).
pub async fn launch_attack<S: Store>(
    store: &S,
    config: &EngineConfig,
    now: Timestamp,
    order: AttackOrder,
) -> Result<Attack> {
    if order.troops == 0 {
        return Err(ConquestError::InvalidCommand(
            "an attack needs at least one troop".into(),
        ));
    }
    if order.source == order.target {
        return Err(ConquestError::InvalidCommand(
            "source and target are the same node".into(),
        ));
    }

    let source = store
        .node(order.source)
        .await?
        .ok_or_else(|| ConquestError::not_found("node", order.source))?;
    let target = store
        .node(order.target)
        .await?
        .ok_or_else(|| ConquestError::not_found("node", order.target))?;
    if source.session != order.session || target.session != order.session {
        return Err(ConquestError::InvalidCommand(
            "nodes belong to another session".into(),
        ));
    }

    let remaining = store
        .decrement_garrison(order.source, order.player, order.troops)
        .await?;

    let travel = travel_time_ms(source.position, target.position, &config.attacks);
    let attack = Attack {
        id: AttackId::new(),
        session: order.session,
        attacker: order.player,
        source: order.source,
        target: order.target,
        troops: order.troops,
        launched_at: now,
        arrives_at: now.plus_millis(travel),
        status: AttackStatus::InTransit,
    };

    if let Err(e) = store.insert_attack(attack.clone()).await {
        // Put the troops back, at most up to where the garrison stood
        let cap = remaining.saturating_add(order.troops);
        if let Err(refund) = store
            .add_garrison_capped(order.source, order.player, order.troops, cap)
            .await
        {
            warn!(node = %order.source, error = %refund, "troop refund failed");
        }
        return Err(e);
    }

    debug!(
        attack = %attack.id,
        source = %order.source,
        target = %order.target,
        troops = order.troops,
        travel_ms = travel,
        "attack launched"
    );
    Ok(attack)
}
