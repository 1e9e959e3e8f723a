//! Sparse hash grid for proximity checks in 3D

use ahash::AHashMap;

use crate::core::types::Position;
use crate::spatial::within_radius;

/// Sparse hash grid over 3D positions.
///
/// Queries inspect the 3x3x3 neighbourhood of the query cell, so they are
/// exact for any radius up to `cell_size`.
pub struct SparseHashGrid {
    cell_size: f32,
    cells: AHashMap<(i32, i32, i32), Vec<Position>>,
}

impl SparseHashGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: AHashMap::new(),
        }
    }

    #[inline]
    fn cell_coord(&self, pos: Position) -> (i32, i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn insert(&mut self, pos: Position) {
        let coord = self.cell_coord(pos);
        self.cells.entry(coord).or_default().push(pos);
    }

    /// Query all positions in neighboring cells (3x3x3 neighborhood)
    pub fn query_neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        let (cx, cy, cz) = self.cell_coord(pos);

        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).flat_map(move |dz| {
                    self.cells
                        .get(&(cx + dx, cy + dy, cz + dz))
                        .into_iter()
                        .flatten()
                        .copied()
                })
            })
        })
    }

    /// True if any stored position lies within `radius` (capped at the cell size)
    pub fn any_within(&self, pos: Position, radius: f32) -> bool {
        let radius = radius.min(self.cell_size);
        self.query_neighbors(pos).any(|p| within_radius(pos, p, radius))
    }

    /// Build a grid from positions
    pub fn from_positions(cell_size: f32, positions: impl IntoIterator<Item = Position>) -> Self {
        let mut grid = Self::new(cell_size);
        for pos in positions {
            grid.insert(pos);
        }
        grid
    }
}
