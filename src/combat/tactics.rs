//! Tactical analysis derived from the spatial layout of nodes
//!
//! These are advisory flags. Nothing here mutates state.

use crate::core::config::TacticsConfig;
use crate::core::types::Position;
use crate::spatial::DirectionSet;

/// Flags computed for one arriving attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TacticalAnalysis {
    pub flanking: bool,
    pub elevation: bool,
}

/// True if any two origin-to-target approach vectors are more than 90° apart.
///
/// Needs at least two origins. Origins sitting on the target contribute no
/// direction and are ignored.
pub fn is_flanking(origins: &[Position], target: Position) -> bool {
    if origins.len() < 2 {
        return false;
    }
    let approaches: Vec<Position> = origins
        .iter()
        .map(|o| target - *o)
        .filter(|v| v.length_squared() > 0.0)
        .collect();

    // cos(angle) < 0 exactly when the angle exceeds 90°
    for (i, a) in approaches.iter().enumerate() {
        for b in &approaches[i + 1..] {
            if a.dot(*b) < 0.0 {
                return true;
            }
        }
    }
    false
}

/// Directional buckets around `target` covered by `neighbours`
pub fn encirclement_coverage(
    target: Position,
    neighbours: impl IntoIterator<Item = Position>,
) -> DirectionSet {
    DirectionSet::covered_by(target, neighbours)
}

/// Encircled only when at least six neighbours cover all six buckets
pub fn is_encircled(target: Position, neighbours: &[Position]) -> bool {
    if neighbours.len() < 6 {
        return false;
    }
    encirclement_coverage(target, neighbours.iter().copied()).is_complete()
}

/// Source sits higher (Y axis) than the target by more than the threshold
pub fn has_elevation_advantage(source: Position, target: Position, config: &TacticsConfig) -> bool {
    source.y - target.y > config.elevation_threshold
}

/// Flanking and elevation for an attack from `source` with the attacker's
/// other converging origins
pub fn analyze(
    source: Position,
    origins: &[Position],
    target: Position,
    config: &TacticsConfig,
) -> TacticalAnalysis {
    TacticalAnalysis {
        flanking: is_flanking(origins, target),
        elevation: has_elevation_advantage(source, target, config),
    }
}
