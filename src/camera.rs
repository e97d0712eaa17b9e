use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// Depth interval partitioned into z slices.
///
/// Independent of the renderer's clip planes: it only controls how finely
/// lights are grouped along the view direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDepthRange")]
pub struct DepthRange {
    near: f32,
    far: f32,
}

impl DepthRange {
    pub fn new(near: f32, far: f32) -> Result<Self, ClusterError> {
        if !near.is_finite() || !far.is_finite() || near < 0.0 || far <= near {
            return Err(ClusterError::InvalidDepthRange { near, far });
        }
        Ok(Self { near, far })
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Thickness of one of `slices` equal depth slices.
    pub fn tile_depth(&self, slices: u32) -> f32 {
        (self.far - self.near) / slices as f32
    }

    /// Near and far forward distances of a run of `span` slices starting at
    /// slice `first`.
    pub fn slice_bounds(&self, slices: u32, first: u32, span: u32) -> (f32, f32) {
        let tile = self.tile_depth(slices);
        let near = self.near + first as f32 * tile;
        (near, near + tile * span as f32)
    }

    /// Fractional slice coordinate of a forward distance.
    pub fn slice_coordinate(&self, slices: u32, depth: f32) -> f32 {
        (depth - self.near) / self.tile_depth(slices)
    }
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            near: 1.0,
            far: 1000.0,
        }
    }
}

#[derive(Deserialize)]
struct RawDepthRange {
    near: f32,
    far: f32,
}

impl TryFrom<RawDepthRange> for DepthRange {
    type Error = ClusterError;

    fn try_from(value: RawDepthRange) -> Result<Self, Self::Error> {
        Self::new(value.near, value.far)
    }
}

/// Immutable per-frame camera snapshot.
///
/// Camera space is right handed with the camera looking down `-Z` and `+Y`
/// up. Every constructor validates its inputs, so a `Camera` always has
/// well-defined frustum geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vec3,
    orientation: Quat,
    fov_y_degrees: f32,
    aspect: f32,
    depth: DepthRange,
}

impl Camera {
    /// Creates a camera from a world-space position and orientation.
    ///
    /// `orientation` rotates camera space into world space and is normalized
    /// on the way in.
    pub fn new(
        position: Vec3,
        orientation: Quat,
        fov_y_degrees: f32,
        aspect: f32,
    ) -> Result<Self, ClusterError> {
        if !position.is_finite() {
            return Err(ClusterError::InvalidPosition);
        }
        if !orientation.is_finite() || orientation.length_squared() <= f32::EPSILON {
            return Err(ClusterError::InvalidOrientation);
        }
        validate_fov(fov_y_degrees)?;
        validate_aspect(aspect)?;
        Ok(Self {
            position,
            orientation: orientation.normalize(),
            fov_y_degrees,
            aspect,
            depth: DepthRange::default(),
        })
    }

    /// Creates a camera at `eye` aimed at `target`.
    pub fn looking_at(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
    ) -> Result<Self, ClusterError> {
        let forward = target - eye;
        if !forward.is_finite() || forward.length_squared() <= f32::EPSILON {
            return Err(ClusterError::DegenerateLookAt);
        }
        let forward = forward.normalize();
        let right = forward.cross(up);
        if !right.is_finite() || right.length_squared() <= f32::EPSILON {
            return Err(ClusterError::DegenerateLookAt);
        }
        let right = right.normalize();
        let up = right.cross(forward);
        let orientation = Quat::from_mat3(&Mat3::from_cols(right, up, -forward));
        Self::new(eye, orientation, fov_y_degrees, aspect)
    }

    /// Creates a camera from Euler angles in degrees, applied X then Y then Z.
    pub fn from_euler_degrees(
        position: Vec3,
        rotation: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
    ) -> Result<Self, ClusterError> {
        let orientation = Quat::from_rotation_z(rotation.z.to_radians())
            * Quat::from_rotation_y(rotation.y.to_radians())
            * Quat::from_rotation_x(rotation.x.to_radians());
        Self::new(position, orientation, fov_y_degrees, aspect)
    }

    pub fn with_depth_range(mut self, depth: DepthRange) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Result<Self, ClusterError> {
        validate_aspect(aspect)?;
        self.aspect = aspect;
        Ok(self)
    }

    /// Applies `rotation` in camera space on top of the current orientation.
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.orientation = (self.orientation * rotation).normalize();
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn fov_y_degrees(&self) -> f32 {
        self.fov_y_degrees
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn depth(&self) -> DepthRange {
        self.depth
    }

    /// World-space viewing direction.
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    /// Half width and half height of the view at unit forward distance.
    pub fn half_extents(&self) -> Vec2 {
        let half_height = (self.fov_y_degrees.to_radians() * 0.5).tan();
        Vec2::new(half_height * self.aspect, half_height)
    }

    /// Transforms a world-space point into camera space.
    pub fn world_to_view(&self, point: Vec3) -> Vec3 {
        self.orientation.inverse() * (point - self.position)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    /// Projects a camera-space point onto normalized device x/y.
    ///
    /// Returns `None` for points on or behind the eye plane.
    pub fn view_to_ndc(&self, point: Vec3) -> Option<Vec2> {
        let depth = -point.z;
        if depth <= f32::EPSILON {
            return None;
        }
        let half = self.half_extents();
        Some(Vec2::new(point.x, point.y) / (half * depth))
    }
}

fn validate_fov(fov_y_degrees: f32) -> Result<(), ClusterError> {
    if fov_y_degrees.is_finite() && fov_y_degrees > 0.0 && fov_y_degrees < 180.0 {
        Ok(())
    } else {
        Err(ClusterError::InvalidFieldOfView(fov_y_degrees))
    }
}

fn validate_aspect(aspect: f32) -> Result<(), ClusterError> {
    if aspect.is_finite() && aspect > 0.0 {
        Ok(())
    } else {
        Err(ClusterError::InvalidAspectRatio(aspect))
    }
}
