use serde::{Deserialize, Serialize};

use crate::buffer::ClusterBuffer;
use crate::camera::DepthRange;
use crate::error::ClusterError;
use crate::grid::SliceGrid;

/// Default number of light indices stored per cell.
pub const DEFAULT_LIGHTS_PER_CLUSTER: u32 = 100;

/// How candidate cells for a light are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinningMode {
    /// Every cell overlapped by the light's projected bounding box.
    #[default]
    BoundingBox,
    /// Bounding-box candidates confirmed with the six-plane sphere test.
    Refined,
}

impl BinningMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bbox" | "bounding_box" => Some(Self::BoundingBox),
            "refined" => Some(Self::Refined),
            _ => None,
        }
    }
}

/// Per-configuration clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterSettings {
    #[serde(default)]
    pub slices: SliceGrid,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub depth: DepthRange,
    #[serde(default)]
    pub mode: BinningMode,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            slices: SliceGrid::default(),
            capacity: DEFAULT_LIGHTS_PER_CLUSTER,
            depth: DepthRange::default(),
            mode: BinningMode::default(),
        }
    }
}

impl ClusterSettings {
    /// Checks that a cluster buffer for these settings can be allocated.
    pub fn validate(&self) -> Result<(), ClusterError> {
        ClusterBuffer::slot_count(self.slices, self.capacity).map(|_| ())
    }
}

fn default_capacity() -> u32 {
    DEFAULT_LIGHTS_PER_CLUSTER
}
