use bytemuck::{bytes_of, Pod, Zeroable};
use log::info;

use crate::camera::Camera;
use crate::error::ClusterError;
use crate::grid::{CellIndex, SliceGrid};

/// Fixed-capacity light lists for every cell of a [`SliceGrid`].
///
/// Storage is one flat run of `u32` slots with `capacity + 1` slots per cell:
/// the first slot holds the cell's light count and the following slots hold
/// light indices. Slots past the count are stale and are never handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterBuffer {
    grid: SliceGrid,
    capacity: u32,
    slots: Vec<u32>,
}

impl ClusterBuffer {
    /// Allocates an empty buffer for `grid` holding up to `capacity` lights
    /// per cell.
    pub fn new(grid: SliceGrid, capacity: u32) -> Result<Self, ClusterError> {
        let len = Self::slot_count(grid, capacity)?;
        info!(
            "Allocating cluster buffer for {}x{}x{} cells ({} lights per cell)",
            grid.x(),
            grid.y(),
            grid.z(),
            capacity
        );
        Ok(Self {
            grid,
            capacity,
            slots: vec![0; len],
        })
    }

    /// Number of `u32` slots a buffer for `grid` and `capacity` occupies.
    pub fn slot_count(grid: SliceGrid, capacity: u32) -> Result<usize, ClusterError> {
        let cells = grid.cell_count();
        usize::try_from(capacity)
            .ok()
            .and_then(|capacity| capacity.checked_add(1))
            .and_then(|stride| stride.checked_mul(cells))
            .filter(|len| len.checked_mul(std::mem::size_of::<u32>()).is_some())
            .ok_or(ClusterError::BufferTooLarge { cells, capacity })
    }

    pub fn grid(&self) -> SliceGrid {
        self.grid
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn stride(&self) -> usize {
        self.capacity as usize + 1
    }

    /// Sets every cell's light count to zero.
    pub fn reset(&mut self) {
        let stride = self.stride();
        for count in self.slots.iter_mut().step_by(stride) {
            *count = 0;
        }
    }

    /// Discards all contents and reallocates for `grid`.
    pub fn resize(&mut self, grid: SliceGrid) -> Result<(), ClusterError> {
        *self = Self::new(grid, self.capacity)?;
        Ok(())
    }

    /// Appends `light` to the cell's list.
    ///
    /// Returns `false` without modifying the cell when it is already full.
    ///
    /// # Panics
    ///
    /// Panics if `cell` lies outside the grid.
    pub fn append(&mut self, cell: CellIndex, light: u32) -> bool {
        let Some(linear) = self.grid.linear_index(cell) else {
            panic!("cell {cell:?} is outside the {:?} grid", self.grid.counts());
        };
        self.append_linear(linear, light)
    }

    pub(crate) fn append_linear(&mut self, linear: usize, light: u32) -> bool {
        let base = linear * self.stride();
        let count = self.slots[base];
        if count >= self.capacity {
            return false;
        }
        self.slots[base + 1 + count as usize] = light;
        self.slots[base] += 1;
        true
    }

    /// Returns the light indices recorded for `cell`, in append order.
    pub fn get(&self, cell: CellIndex) -> Option<&[u32]> {
        self.grid
            .linear_index(cell)
            .map(|linear| self.record(linear))
    }

    fn record(&self, linear: usize) -> &[u32] {
        let base = linear * self.stride();
        let count = self.slots[base] as usize;
        &self.slots[base + 1..base + 1 + count]
    }

    /// Iterates cells that hold at least one light, in linear index order.
    pub fn iter(&self) -> impl Iterator<Item = (CellIndex, &[u32])> + '_ {
        self.grid
            .cells()
            .enumerate()
            .map(|(linear, cell)| (cell, self.record(linear)))
            .filter(|(_, lights)| !lights.is_empty())
    }

    pub fn occupied_cells(&self) -> usize {
        self.iter().count()
    }

    /// Total number of light indices stored across all cells.
    pub fn total_entries(&self) -> usize {
        self.slots
            .iter()
            .step_by(self.stride())
            .map(|count| *count as usize)
            .sum()
    }

    /// Raw slot layout, ready to be copied into a shading-stage buffer.
    pub fn as_slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.slots)
    }
}

/// Grid description a shader needs to find its cell in the slot buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClusterUniform {
    pub view: [[f32; 4]; 4],
    /// Slice counts in `xyz`, per-cell capacity in `w`.
    pub slices: [u32; 4],
    /// Near distance, far distance, slice thickness.
    pub depth: [f32; 4],
    /// Half extents of the view at unit distance.
    pub half_extents: [f32; 4],
}

impl ClusterUniform {
    pub fn new(camera: &Camera, buffer: &ClusterBuffer) -> Self {
        let grid = buffer.grid();
        let depth = camera.depth();
        let half = camera.half_extents();
        Self {
            view: camera.view_matrix().to_cols_array_2d(),
            slices: [grid.x(), grid.y(), grid.z(), buffer.capacity()],
            depth: [depth.near(), depth.far(), depth.tile_depth(grid.z()), 0.0],
            half_extents: [half.x, half.y, 0.0, 0.0],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::camera::DepthRange;

    fn grid() -> SliceGrid {
        SliceGrid::new(2, 2, 2).unwrap()
    }

    #[test]
    fn storage_holds_count_and_capacity_slots_per_cell() {
        let buffer = ClusterBuffer::new(grid(), 3).unwrap();
        assert_eq!(buffer.as_slots().len(), 8 * 4);
        assert_eq!(buffer.as_bytes().len(), 8 * 4 * 4);
    }

    #[test]
    fn append_respects_capacity() {
        let mut buffer = ClusterBuffer::new(grid(), 2).unwrap();
        let cell = CellIndex::new(1, 0, 1);
        assert!(buffer.append(cell, 4));
        assert!(buffer.append(cell, 9));
        assert!(!buffer.append(cell, 11));
        assert_eq!(buffer.get(cell), Some(&[4, 9][..]));
        assert_eq!(buffer.get(CellIndex::new(0, 0, 0)), Some(&[][..]));
        assert_eq!(buffer.get(CellIndex::new(2, 0, 0)), None);
    }

    #[test]
    fn reset_hides_stale_indices() {
        let mut buffer = ClusterBuffer::new(grid(), 2).unwrap();
        let cell = CellIndex::new(0, 1, 0);
        buffer.append(cell, 7);
        buffer.append(cell, 8);
        buffer.reset();
        assert_eq!(buffer.get(cell), Some(&[][..]));
        assert_eq!(buffer.total_entries(), 0);
        buffer.append(cell, 3);
        assert_eq!(buffer.get(cell), Some(&[3][..]));
    }

    #[test]
    fn zero_capacity_never_accepts_lights() {
        let mut buffer = ClusterBuffer::new(SliceGrid::single(), 0).unwrap();
        assert!(!buffer.append(CellIndex::default(), 0));
        assert_eq!(buffer.as_slots(), &[0]);
    }

    #[test]
    fn resize_reallocates_and_clears() {
        let mut buffer = ClusterBuffer::new(grid(), 1).unwrap();
        buffer.append(CellIndex::new(1, 1, 1), 5);
        let larger = SliceGrid::new(3, 3, 3).unwrap();
        buffer.resize(larger).unwrap();
        assert_eq!(buffer.grid(), larger);
        assert_eq!(buffer.as_slots().len(), 27 * 2);
        assert_eq!(buffer.occupied_cells(), 0);
    }

    #[test]
    fn iter_reports_occupied_cells_in_linear_order() {
        let mut buffer = ClusterBuffer::new(grid(), 4).unwrap();
        buffer.append(CellIndex::new(1, 1, 1), 2);
        buffer.append(CellIndex::new(0, 0, 0), 1);
        buffer.append(CellIndex::new(1, 1, 1), 6);
        let cells: Vec<_> = buffer.iter().collect();
        assert_eq!(
            cells,
            vec![
                (CellIndex::new(0, 0, 0), &[1][..]),
                (CellIndex::new(1, 1, 1), &[2, 6][..]),
            ]
        );
        assert_eq!(buffer.total_entries(), 3);
    }

    #[test]
    #[should_panic]
    fn append_outside_grid_panics() {
        let mut buffer = ClusterBuffer::new(grid(), 1).unwrap();
        buffer.append(CellIndex::new(0, 0, 2), 0);
    }

    #[test]
    fn oversized_buffers_are_rejected() {
        let huge = SliceGrid::new(65_535, 65_535, 1).unwrap();
        assert_eq!(
            ClusterBuffer::slot_count(huge, u32::MAX),
            Err(ClusterError::BufferTooLarge {
                cells: huge.cell_count(),
                capacity: u32::MAX
            })
        );
        assert_eq!(ClusterBuffer::slot_count(grid(), 3), Ok(32));
    }

    #[test]
    fn uniform_describes_grid_and_depth() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Quat::IDENTITY, 90.0, 2.0)
            .unwrap()
            .with_depth_range(DepthRange::new(1.0, 9.0).unwrap());
        let buffer = ClusterBuffer::new(SliceGrid::new(4, 2, 8).unwrap(), 6).unwrap();
        let uniform = ClusterUniform::new(&camera, &buffer);
        assert_eq!(uniform.slices, [4, 2, 8, 6]);
        assert_eq!(uniform.depth, [1.0, 9.0, 1.0, 0.0]);
        assert!((uniform.half_extents[0] - 2.0).abs() < 1e-5);
        assert!((uniform.view[3][2] + 5.0).abs() < 1e-5);
        assert_eq!(uniform.as_bytes().len(), 112);
    }
}
