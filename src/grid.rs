use glam::UVec3;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// Integer coordinates of one cluster cell.
///
/// `x` grows to the right and `y` grows downward from the top-left corner of
/// the screen; `z` grows away from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellIndex {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl CellIndex {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn as_uvec3(self) -> UVec3 {
        UVec3::new(self.x, self.y, self.z)
    }
}

impl From<UVec3> for CellIndex {
    fn from(value: UVec3) -> Self {
        Self::new(value.x, value.y, value.z)
    }
}

/// Partition of the view volume into `x * y * z` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UVec3", into = "UVec3")]
pub struct SliceGrid {
    counts: UVec3,
}

impl SliceGrid {
    /// Creates a grid, rejecting any zero slice count.
    pub fn new(x: u32, y: u32, z: u32) -> Result<Self, ClusterError> {
        if x == 0 || y == 0 || z == 0 {
            return Err(ClusterError::EmptyGrid { x, y, z });
        }
        if x.checked_mul(y).and_then(|xy| xy.checked_mul(z)).is_none() {
            return Err(ClusterError::GridTooLarge { x, y, z });
        }
        Ok(Self {
            counts: UVec3::new(x, y, z),
        })
    }

    /// A single cell covering the whole clustering volume.
    pub const fn single() -> Self {
        Self {
            counts: UVec3::ONE,
        }
    }

    pub fn counts(&self) -> UVec3 {
        self.counts
    }

    pub fn x(&self) -> u32 {
        self.counts.x
    }

    pub fn y(&self) -> u32 {
        self.counts.y
    }

    pub fn z(&self) -> u32 {
        self.counts.z
    }

    /// Total number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.counts.x as usize * self.counts.y as usize * self.counts.z as usize
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        cell.x < self.counts.x && cell.y < self.counts.y && cell.z < self.counts.z
    }

    /// Linearizes a cell as `x + y * countX + z * countX * countY`.
    pub fn linear_index(&self, cell: CellIndex) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let x = self.counts.x as usize;
        let y = self.counts.y as usize;
        Some(cell.x as usize + cell.y as usize * x + cell.z as usize * x * y)
    }

    /// Inverse of [`SliceGrid::linear_index`].
    pub fn cell_at(&self, linear: usize) -> Option<CellIndex> {
        if linear >= self.cell_count() {
            return None;
        }
        let x = self.counts.x as usize;
        let xy = x * self.counts.y as usize;
        Some(CellIndex::new(
            (linear % x) as u32,
            ((linear % xy) / x) as u32,
            (linear / xy) as u32,
        ))
    }

    /// Iterates every cell with `z` outermost and `x` innermost, which is
    /// also linear index order.
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> {
        let counts = self.counts;
        (0..counts.z).flat_map(move |z| {
            (0..counts.y).flat_map(move |y| (0..counts.x).map(move |x| CellIndex::new(x, y, z)))
        })
    }

    /// Block consisting of exactly one cell.
    pub fn unit(&self, cell: CellIndex) -> Result<CellBlock, ClusterError> {
        self.block(cell, UVec3::ONE)
    }

    /// Block starting at `origin` and spanning `size` cells on each axis.
    pub fn block(&self, origin: CellIndex, size: UVec3) -> Result<CellBlock, ClusterError> {
        let end = origin.as_uvec3().saturating_add(size);
        if size.cmpeq(UVec3::ZERO).any() || end.cmpgt(self.counts).any() {
            return Err(ClusterError::BlockOutOfRange {
                x: origin.x,
                y: origin.y,
                z: origin.z,
                sx: size.x,
                sy: size.y,
                sz: size.z,
            });
        }
        Ok(CellBlock {
            grid: *self,
            origin,
            size,
        })
    }

    /// Block covering the entire grid.
    pub fn whole(&self) -> CellBlock {
        CellBlock {
            grid: *self,
            origin: CellIndex::default(),
            size: self.counts,
        }
    }
}

impl Default for SliceGrid {
    fn default() -> Self {
        Self {
            counts: UVec3::splat(25),
        }
    }
}

impl TryFrom<UVec3> for SliceGrid {
    type Error = ClusterError;

    fn try_from(value: UVec3) -> Result<Self, Self::Error> {
        Self::new(value.x, value.y, value.z)
    }
}

impl From<SliceGrid> for UVec3 {
    fn from(value: SliceGrid) -> Self {
        value.counts
    }
}

/// Rectangular run of cells, validated against the grid that produced it.
///
/// The block remembers that grid, so its whole extent always lies inside
/// the grid its geometry is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBlock {
    grid: SliceGrid,
    origin: CellIndex,
    size: UVec3,
}

impl CellBlock {
    pub fn grid(&self) -> SliceGrid {
        self.grid
    }

    pub fn origin(&self) -> CellIndex {
        self.origin
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }
}
