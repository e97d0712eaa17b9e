use thiserror::Error;

/// Precondition violations detected while building clustering inputs.
///
/// These indicate a caller bug rather than a runtime condition, so they are
/// reported when a [`Camera`](crate::Camera) or grid is constructed and never
/// from inside a binning pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("vertical field of view must be within (0, 180) degrees, got {0}")]
    InvalidFieldOfView(f32),
    #[error("aspect ratio must be positive and finite, got {0}")]
    InvalidAspectRatio(f32),
    #[error("camera orientation must be a finite, non-zero quaternion")]
    InvalidOrientation,
    #[error("camera position must be finite")]
    InvalidPosition,
    #[error("look-at target coincides with the eye or is parallel to the up vector")]
    DegenerateLookAt,
    #[error("clustering depth range must satisfy 0 <= near < far, got near={near} far={far}")]
    InvalidDepthRange { near: f32, far: f32 },
    #[error("slice counts must all be positive, got {x}x{y}x{z}")]
    EmptyGrid { x: u32, y: u32, z: u32 },
    #[error("a {x}x{y}x{z} grid has more cells than a u32 can index")]
    GridTooLarge { x: u32, y: u32, z: u32 },
    #[error("{cells} cells holding {capacity} lights each do not fit in memory")]
    BufferTooLarge { cells: usize, capacity: u32 },
    #[error("cell block at ({x}, {y}, {z}) spanning {sx}x{sy}x{sz} lies outside the grid")]
    BlockOutOfRange {
        x: u32,
        y: u32,
        z: u32,
        sx: u32,
        sy: u32,
        sz: u32,
    },
}
