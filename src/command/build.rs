//! Building structures

use tracing::{debug, warn};

use crate::core::config::EngineConfig;
use crate::core::error::{ConquestError, Result};
use crate::core::types::{NodeId, PlayerId, SessionId};
use crate::store::Store;
use crate::world::{ResourceCaps, Structure, StructureType};

/// Build a level-1 structure on a node the player owns, paying its cost
/// atomically. One active structure of each type per node.
pub async fn build_structure<S: Store>(
    store: &S,
    config: &EngineConfig,
    session: SessionId,
    player: PlayerId,
    node: NodeId,
    kind: StructureType,
) -> Result<Structure> {
    let target = store
        .node(node)
        .await?
        .ok_or_else(|| ConquestError::not_found("node", node))?;
    if target.session != session {
        return Err(ConquestError::InvalidCommand(
            "node belongs to another session".into(),
        ));
    }
    if !target.is_owned_by(player) {
        return Err(ConquestError::AccessDenied { player, node });
    }
    if store
        .structures_on(node)
        .await?
        .iter()
        .any(|s| s.is_active(kind))
    {
        return Err(ConquestError::InvalidCommand(format!(
            "node {} already has an active {} structure",
            node,
            kind.name()
        )));
    }

    let cost = kind.cost();
    store.spend_resources(session, player, cost).await?;

    let structure = Structure::new(node, kind);
    if let Err(e) = store.insert_structure(structure.clone()).await {
        let caps = ResourceCaps::from_config(&config.economy);
        if let Err(refund) = store.apply_resource_delta(session, player, cost, caps).await {
            warn!(player = %player, error = %refund, "build refund failed");
        }
        return Err(e);
    }

    debug!(node = %node, kind = kind.name(), "structure built");
    Ok(structure)
}
