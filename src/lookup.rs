use glam::Vec3;

use crate::camera::Camera;
use crate::grid::{CellIndex, SliceGrid};

/// Finds the cell a shaded world-space point reads its lights from.
///
/// Uses the same conventions as binning: `x`/`y` come from the projected
/// position with the origin at the top-left of the screen, `z` from the
/// linear depth partition. Depths before the first or past the last slice
/// clamp to it. Points behind the eye or outside the screen have no cell.
///
/// Pass the camera returned by [`ClusterBinner::clustering_camera`] so depth
/// is sliced with the same range the buffer was binned with.
///
/// [`ClusterBinner::clustering_camera`]: crate::binner::ClusterBinner::clustering_camera
pub fn cell_for_point(camera: &Camera, grid: &SliceGrid, point: Vec3) -> Option<CellIndex> {
    let view = camera.world_to_view(point);
    let ndc = camera.view_to_ndc(view)?;
    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
        return None;
    }
    let x = screen_slice((ndc.x + 1.0) * 0.5, grid.x());
    let y = screen_slice((1.0 - ndc.y) * 0.5, grid.y());
    let depth = camera.depth().slice_coordinate(grid.z(), -view.z);
    let z = depth.floor().clamp(0.0, (grid.z() - 1) as f32) as u32;
    Some(CellIndex::new(x, y, z))
}

fn screen_slice(fraction: f32, count: u32) -> u32 {
    ((fraction * count as f32).floor() as u32).min(count - 1)
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;
    use crate::camera::DepthRange;

    fn camera() -> Camera {
        Camera::new(Vec3::ZERO, Quat::IDENTITY, 90.0, 1.0)
            .unwrap()
            .with_depth_range(DepthRange::new(1.0, 11.0).unwrap())
    }

    #[test]
    fn screen_origin_is_top_left() {
        let grid = SliceGrid::new(4, 4, 5).unwrap();
        let top_left = cell_for_point(&camera(), &grid, Vec3::new(-3.0, 3.0, -4.0));
        assert_eq!(top_left, Some(CellIndex::new(0, 0, 1)));
        let bottom_right = cell_for_point(&camera(), &grid, Vec3::new(3.0, -3.0, -4.0));
        assert_eq!(bottom_right, Some(CellIndex::new(3, 3, 1)));
    }

    #[test]
    fn depth_clamps_to_the_outer_slices() {
        let grid = SliceGrid::new(2, 2, 5).unwrap();
        let near = cell_for_point(&camera(), &grid, Vec3::new(0.1, 0.1, -0.5));
        assert_eq!(near.map(|cell| cell.z), Some(0));
        let far = cell_for_point(&camera(), &grid, Vec3::new(0.1, 0.1, -50.0));
        assert_eq!(far.map(|cell| cell.z), Some(4));
    }

    #[test]
    fn points_off_screen_or_behind_have_no_cell() {
        let grid = SliceGrid::new(2, 2, 2).unwrap();
        assert_eq!(cell_for_point(&camera(), &grid, Vec3::new(0.0, 0.0, 3.0)), None);
        assert_eq!(cell_for_point(&camera(), &grid, Vec3::new(9.0, 0.0, -3.0)), None);
    }
}
