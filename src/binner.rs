//! Per-frame assignment of lights to cluster cells.
//!
//! Each light's bounding sphere is boxed in camera space, the box is
//! projected to fractional grid coordinates and every cell in the covered
//! integer range receives the light. This over-approximates the cells a
//! sphere really touches in exchange for O(1) work per culled light and O(K)
//! work per light covering K cells.

use glam::{UVec3, Vec2, Vec3};
use log::{debug, warn};

use crate::buffer::ClusterBuffer;
use crate::camera::Camera;
use crate::config::{BinningMode, ClusterSettings};
use crate::error::ClusterError;
use crate::frustum::{Sphere, SubFrustum};
use crate::grid::{CellIndex, SliceGrid};
use crate::scene::PointLight;

/// Counters describing the most recent binning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinStats {
    /// Lights considered.
    pub lights: usize,
    /// Lights outside the clustered volume.
    pub culled: usize,
    /// Light indices written into cells.
    pub appended: usize,
    /// Assignments lost because a cell was already full.
    pub dropped: usize,
    /// Candidate cells discarded by the six-plane test in refined mode.
    pub refined_out: usize,
}

/// Inclusive-exclusive range of cells `[min, end)` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min: UVec3,
    pub end: UVec3,
}

impl CellRange {
    pub fn len(&self) -> usize {
        let span = self.end - self.min;
        span.x as usize * span.y as usize * span.z as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        let cell = cell.as_uvec3();
        cell.cmpge(self.min).all() && cell.cmplt(self.end).all()
    }

    /// Iterates the range with `z` outermost and `x` innermost.
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> {
        let CellRange { min, end } = *self;
        (min.z..end.z).flat_map(move |z| {
            (min.y..end.y)
                .flat_map(move |y| (min.x..end.x).map(move |x| CellIndex::new(x, y, z)))
        })
    }
}

/// Computes the cells a sphere's camera-space bounding box projects onto.
///
/// Fractional coordinates are floored on both ends; the exclusive end is
/// `floor(max) + 1` clamped to the slice count, so a zero-radius sphere
/// still lands in exactly one cell. Returns `None` when the box misses the
/// grid on any axis.
pub fn candidate_cells(
    camera: &Camera,
    grid: &SliceGrid,
    sphere: &Sphere,
) -> Option<CellRange> {
    if !sphere.center.is_finite() || !(sphere.radius >= 0.0) {
        return None;
    }
    let center = camera.world_to_view(sphere.center);
    let radius = sphere.radius;
    let depth = camera.depth();

    // View space looks down -Z, so the nearest forward distance comes from
    // the box's largest z.
    let nearest = -(center.z + radius);
    let farthest = -(center.z - radius);
    let (z_min, z_end) = axis_range(
        depth.slice_coordinate(grid.z(), nearest),
        depth.slice_coordinate(grid.z(), farthest),
        grid.z(),
    )?;

    let (x_min, x_end, y_min, y_end) = if nearest <= f32::EPSILON {
        // The box straddles the eye plane and projects to the whole screen.
        (0, grid.x(), 0, grid.y())
    } else {
        let (lo, hi) = projected_bounds(camera, grid, center, radius)?;
        let (x_min, x_end) = axis_range(lo.x, hi.x, grid.x())?;
        let (y_min, y_end) = axis_range(lo.y, hi.y, grid.y())?;
        (x_min, x_end, y_min, y_end)
    };

    Some(CellRange {
        min: UVec3::new(x_min, y_min, z_min),
        end: UVec3::new(x_end, y_end, z_end),
    })
}

/// Fractional grid x/y bounds of a camera-space box lying fully in front of
/// the eye. Grid `y` runs downward, opposite to NDC `y`.
fn projected_bounds(
    camera: &Camera,
    grid: &SliceGrid,
    center: Vec3,
    radius: f32,
) -> Option<(Vec2, Vec2)> {
    let slices = Vec2::new(grid.x() as f32, grid.y() as f32);
    let mut lo = Vec2::splat(f32::INFINITY);
    let mut hi = Vec2::splat(f32::NEG_INFINITY);
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                let corner = center + Vec3::new(sx, sy, sz) * radius;
                let ndc = camera.view_to_ndc(corner)?;
                let cell = Vec2::new(ndc.x + 1.0, 1.0 - ndc.y) * 0.5 * slices;
                lo = lo.min(cell);
                hi = hi.max(cell);
            }
        }
    }
    Some((lo, hi))
}

fn axis_range(min: f32, max: f32, count: u32) -> Option<(u32, u32)> {
    if !(max >= 0.0) || !(min < count as f32) {
        return None;
    }
    let first = min.floor().max(0.0) as u32;
    let end = (max.floor() + 1.0).min(count as f32) as u32;
    Some((first, end))
}

/// Owns the cluster buffer and rebuilds it from scratch every frame.
#[derive(Debug, Clone)]
pub struct ClusterBinner {
    settings: ClusterSettings,
    buffer: ClusterBuffer,
    stats: BinStats,
}

impl ClusterBinner {
    pub fn new(settings: ClusterSettings) -> Result<Self, ClusterError> {
        Ok(Self {
            buffer: ClusterBuffer::new(settings.slices, settings.capacity)?,
            settings,
            stats: BinStats::default(),
        })
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    /// Applies new settings, reallocating the buffer when the grid or the
    /// capacity changed.
    ///
    /// On error the previous settings and buffer stay in place.
    pub fn configure(&mut self, settings: ClusterSettings) -> Result<(), ClusterError> {
        if settings.capacity != self.settings.capacity {
            self.buffer = ClusterBuffer::new(settings.slices, settings.capacity)?;
        } else if settings.slices != self.settings.slices {
            self.buffer.resize(settings.slices)?;
        }
        self.settings = settings;
        Ok(())
    }

    /// `camera` with its depth range replaced by the configured one.
    ///
    /// Binning always slices depth with this camera, so lookups and shader
    /// uniforms for the same buffer must use it too.
    pub fn clustering_camera(&self, camera: &Camera) -> Camera {
        camera.with_depth_range(self.settings.depth)
    }

    pub fn buffer(&self) -> &ClusterBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> ClusterBuffer {
        self.buffer
    }

    pub fn stats(&self) -> BinStats {
        self.stats
    }

    /// Resets the buffer and bins `lights` in index order.
    ///
    /// Depth is sliced with the configured range rather than the camera's
    /// own, see [`ClusterBinner::clustering_camera`].
    pub fn bin(&mut self, camera: &Camera, lights: &[PointLight]) -> &ClusterBuffer {
        let camera = &self.clustering_camera(camera);
        self.buffer.reset();
        let grid = self.settings.slices;
        let refine = self.settings.mode == BinningMode::Refined;
        let mut stats = BinStats {
            lights: lights.len(),
            ..BinStats::default()
        };

        for (index, light) in lights.iter().enumerate() {
            let sphere = light.bounding_sphere();
            let Some(range) = candidate_cells(camera, &grid, &sphere) else {
                stats.culled += 1;
                continue;
            };
            for cell in range.cells() {
                if refine && !cell_overlaps(camera, &grid, cell, &sphere) {
                    stats.refined_out += 1;
                    continue;
                }
                let Some(linear) = grid.linear_index(cell) else {
                    continue;
                };
                if self.buffer.append_linear(linear, index as u32) {
                    stats.appended += 1;
                } else {
                    stats.dropped += 1;
                }
            }
        }

        debug!(
            "Binned {} lights into {}x{}x{} clusters: {} culled, {} appended, {} dropped at capacity {}",
            stats.lights,
            grid.x(),
            grid.y(),
            grid.z(),
            stats.culled,
            stats.appended,
            stats.dropped,
            self.settings.capacity
        );
        if stats.dropped > 0 {
            warn!(
                "{} light assignments dropped, cells hold at most {} lights",
                stats.dropped, self.settings.capacity
            );
        }
        self.stats = stats;
        &self.buffer
    }
}

fn cell_overlaps(camera: &Camera, grid: &SliceGrid, cell: CellIndex, sphere: &Sphere) -> bool {
    grid.unit(cell)
        .map(|block| SubFrustum::new(camera, &block).intersects_sphere(sphere))
        .unwrap_or(false)
}
