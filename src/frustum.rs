//! Sub-frustum geometry for cluster cells and the sphere overlap test.
//!
//! A cell block's side planes all pass through the eye and are derived from
//! the four corner rays of the block on the unit-distance plane in front of
//! the camera. Its near and far planes are perpendicular to the viewing
//! direction at the block's depth-slice boundaries.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::grid::CellBlock;

/// Bounding sphere of a light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Corner rays of a block in camera space, on the `z = -1` plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubFrustumCorners {
    pub nw: Vec3,
    pub ne: Vec3,
    pub se: Vec3,
    pub sw: Vec3,
}

/// World-space unit normals of a block's six bounding planes.
///
/// Every normal points into the block's interior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubFrustumPlanes {
    pub top: Vec3,
    pub right: Vec3,
    pub bottom: Vec3,
    pub left: Vec3,
    pub near: Vec3,
    pub far: Vec3,
}

impl SubFrustumPlanes {
    fn sides(&self) -> [Vec3; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

/// Computes the corner rays of `block`, sliced by the grid it belongs to.
///
/// The screen is indexed from its top-left corner, so increasing `y` moves
/// the block down.
pub fn sub_frustum_corners(camera: &Camera, block: &CellBlock) -> SubFrustumCorners {
    let grid = block.grid();
    let half = camera.half_extents();
    let tile_width = 2.0 * half.x / grid.x() as f32;
    let tile_height = 2.0 * half.y / grid.y() as f32;

    let origin = block.origin();
    let size = block.size();
    let x_left = -half.x + origin.x as f32 * tile_width;
    let x_right = x_left + tile_width * size.x as f32;
    let y_top = half.y - origin.y as f32 * tile_height;
    let y_bottom = y_top - tile_height * size.y as f32;

    SubFrustumCorners {
        nw: Vec3::new(x_left, y_top, -1.0),
        ne: Vec3::new(x_right, y_top, -1.0),
        se: Vec3::new(x_right, y_bottom, -1.0),
        sw: Vec3::new(x_left, y_bottom, -1.0),
    }
}

/// Computes the six inward plane normals of `block` in world space.
pub fn sub_frustum_planes(camera: &Camera, block: &CellBlock) -> SubFrustumPlanes {
    let SubFrustumCorners { nw, ne, se, sw } = sub_frustum_corners(camera, block);
    let orientation = camera.orientation();
    let forward = camera.forward();

    SubFrustumPlanes {
        top: (orientation * nw.cross(ne)).normalize(),
        right: (orientation * ne.cross(se)).normalize(),
        bottom: (orientation * se.cross(sw)).normalize(),
        left: (orientation * sw.cross(nw)).normalize(),
        near: forward,
        far: -forward,
    }
}

/// Signed distance of `point` from a plane, positive on the side `normal`
/// points to.
pub fn signed_distance(point: Vec3, normal: Vec3, plane_origin: Vec3) -> f32 {
    (point - plane_origin).dot(normal)
}

/// Tolerant sphere test against six planes.
///
/// Side planes are anchored at `eye`, the depth planes at `near_origin` and
/// `far_origin`. The sphere is rejected only when it lies entirely outside
/// some plane, so spheres near a corner of the volume may be accepted even
/// though they miss it.
pub fn intersects(
    planes: &SubFrustumPlanes,
    eye: Vec3,
    near_origin: Vec3,
    far_origin: Vec3,
    sphere: &Sphere,
) -> bool {
    let inside = |normal: Vec3, origin: Vec3| {
        -signed_distance(sphere.center, normal, origin) < sphere.radius
    };
    planes.sides().into_iter().all(|normal| inside(normal, eye))
        && inside(planes.near, near_origin)
        && inside(planes.far, far_origin)
}

/// Fully resolved sub-frustum of one cell block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubFrustum {
    pub planes: SubFrustumPlanes,
    pub eye: Vec3,
    pub near_origin: Vec3,
    pub far_origin: Vec3,
}

impl SubFrustum {
    pub fn new(camera: &Camera, block: &CellBlock) -> Self {
        let planes = sub_frustum_planes(camera, block);
        let eye = camera.position();
        let forward = camera.forward();
        let (near_z, far_z) = camera
            .depth()
            .slice_bounds(block.grid().z(), block.origin().z, block.size().z);
        Self {
            planes,
            eye,
            near_origin: eye + forward * near_z,
            far_origin: eye + forward * far_z,
        }
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        intersects(&self.planes, self.eye, self.near_origin, self.far_origin, sphere)
    }
}
