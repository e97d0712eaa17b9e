//! Clustered light assignment for forward shading.
//!
//! The view frustum is cut into a grid of cells (sub-frusta) and every point
//! light is written into the cells its sphere of influence may touch. A
//! shader then reads the short per-cell list instead of looping over every
//! light in the scene. Rendering itself stays outside of the crate so the
//! geometry and binning can be tested headlessly.

pub mod app;
pub mod binner;
pub mod buffer;
pub mod camera;
pub mod config;
pub mod error;
pub mod frustum;
pub mod grid;
pub mod lookup;
pub mod scene;
pub mod shared;

pub use app::{cluster_scene, ClusterFrame, Overrides};
pub use binner::{candidate_cells, BinStats, CellRange, ClusterBinner};
pub use buffer::{ClusterBuffer, ClusterUniform};
pub use camera::{Camera, DepthRange};
pub use config::{BinningMode, ClusterSettings, DEFAULT_LIGHTS_PER_CLUSTER};
pub use error::ClusterError;
pub use frustum::{Sphere, SubFrustum, SubFrustumCorners, SubFrustumPlanes};
pub use grid::{CellBlock, CellIndex, SliceGrid};
pub use lookup::cell_for_point;
pub use scene::{PointLight, Scene, SceneObject};
pub use shared::SharedClusters;
