//! Spatial queries shared by expansion, encirclement and bot targeting
//!
//! Every "is X near Y" question in the crate goes through [`within_radius`]
//! so all callers agree on distance semantics (Euclidean, inclusive).

pub mod sparse_hash;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::types::Position;

pub use sparse_hash::SparseHashGrid;

/// Inclusive Euclidean proximity test
#[inline]
pub fn within_radius(center: Position, point: Position, radius: f32) -> bool {
    center.distance_squared(point) <= radius * radius
}

/// Keep the items whose position lies within `radius` of `center`
pub fn filter_within_radius<'a, T, F>(
    items: impl IntoIterator<Item = &'a T>,
    center: Position,
    radius: f32,
    position: F,
) -> Vec<&'a T>
where
    T: 'a,
    F: Fn(&T) -> Position,
{
    items
        .into_iter()
        .filter(|item| within_radius(center, position(item), radius))
        .collect()
}

/// One of the six axis-aligned directions around a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
    ];

    /// Bucket a displacement by its axis of greatest magnitude and that
    /// axis' sign. Ties resolve X before Y before Z. A zero displacement has
    /// no direction.
    ///
    /// Only the dominant axis counts, so a neighbour sitting near a 45°
    /// diagonal covers a single bucket even though it borders two.
    pub fn dominant(delta: Vec3) -> Option<Direction> {
        let abs = delta.abs();
        if abs.max_element() == 0.0 {
            return None;
        }
        let dir = if abs.x >= abs.y && abs.x >= abs.z {
            if delta.x > 0.0 {
                Direction::PosX
            } else {
                Direction::NegX
            }
        } else if abs.y >= abs.z {
            if delta.y > 0.0 {
                Direction::PosY
            } else {
                Direction::NegY
            }
        } else if delta.z > 0.0 {
            Direction::PosZ
        } else {
            Direction::NegZ
        };
        Some(dir)
    }
}

/// Set of covered directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dir: Direction) {
        self.0 |= 1 << dir as u8;
    }

    pub fn contains(&self, dir: Direction) -> bool {
        self.0 & (1 << dir as u8) != 0
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_complete(&self) -> bool {
        self.count() == Direction::ALL.len()
    }

    /// Directions covered by `points` as seen from `center`
    pub fn covered_by(center: Position, points: impl IntoIterator<Item = Position>) -> Self {
        let mut set = Self::new();
        for p in points {
            if let Some(dir) = Direction::dominant(p - center) {
                set.insert(dir);
            }
        }
        set
    }
}
