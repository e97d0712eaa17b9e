use std::io::{self, Write};

use anyhow::{Context, Result};
use log::info;

use crate::binner::{BinStats, ClusterBinner};
use crate::buffer::{ClusterBuffer, ClusterUniform};
use crate::camera::Camera;
use crate::config::{BinningMode, ClusterSettings};
use crate::grid::SliceGrid;
use crate::scene::Scene;
use crate::shared::SharedClusters;

/// Command-line overrides applied on top of the scene's `<clusters>` block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overrides {
    pub slices: Option<SliceGrid>,
    pub capacity: Option<u32>,
    pub aspect: Option<f32>,
    pub refine: bool,
}

impl Overrides {
    pub fn apply(&self, settings: ClusterSettings) -> ClusterSettings {
        ClusterSettings {
            slices: self.slices.unwrap_or(settings.slices),
            capacity: self.capacity.unwrap_or(settings.capacity),
            mode: if self.refine {
                BinningMode::Refined
            } else {
                settings.mode
            },
            ..settings
        }
    }
}

/// One finished clustering pass over a scene.
#[derive(Debug, Clone)]
pub struct ClusterFrame {
    pub camera: Camera,
    pub settings: ClusterSettings,
    pub buffer: ClusterBuffer,
    pub stats: BinStats,
}

/// Clusters the scene's lights against its camera.
pub fn cluster_scene(scene: &Scene, overrides: &Overrides) -> Result<ClusterFrame> {
    let settings = overrides.apply(scene.settings);
    let camera = scene
        .camera(overrides.aspect)
        .context("failed to build clustering camera")?;
    let mut binner = ClusterBinner::new(settings).context("invalid cluster settings")?;
    let camera = binner.clustering_camera(&camera);
    binner.bin(&camera, &scene.lights);
    let stats = binner.stats();
    info!(
        "Clustered {} lights, {} cell entries",
        stats.lights, stats.appended
    );
    Ok(ClusterFrame {
        camera,
        settings,
        buffer: binner.into_buffer(),
        stats,
    })
}

impl ClusterFrame {
    /// Hands the frame's buffer to a shared handle for concurrent readers.
    pub fn publish(&self, shared: &SharedClusters) -> u64 {
        shared.publish(&self.buffer, self.stats)
    }

    pub fn uniform(&self) -> ClusterUniform {
        ClusterUniform::new(&self.camera, &self.buffer)
    }
}

pub fn write_summary<W: Write>(out: &mut W, frame: &ClusterFrame) -> io::Result<()> {
    let grid = frame.settings.slices;
    let mode = match frame.settings.mode {
        BinningMode::BoundingBox => "bbox",
        BinningMode::Refined => "refined",
    };
    writeln!(
        out,
        "Grid {}x{}x{} ({} cells), capacity {}, depth {:.2}..{:.2}, mode {mode}",
        grid.x(),
        grid.y(),
        grid.z(),
        grid.cell_count(),
        frame.settings.capacity,
        frame.settings.depth.near(),
        frame.settings.depth.far()
    )?;
    writeln!(
        out,
        "Lights: {} binned, {} culled",
        frame.stats.lights - frame.stats.culled,
        frame.stats.culled
    )?;
    writeln!(
        out,
        "Entries: {} in {} occupied cells, {} dropped at capacity",
        frame.stats.appended,
        frame.buffer.occupied_cells(),
        frame.stats.dropped
    )
}

/// Writes one line per occupied cell, in buffer order.
pub fn write_cells<W: Write>(out: &mut W, buffer: &ClusterBuffer) -> io::Result<()> {
    for (cell, lights) in buffer.iter() {
        let list = lights
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, " - ({}, {}, {}): {list}", cell.x, cell.y, cell.z)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellIndex;

    const SCENE: &str = r#"
    <scene>
        <clusters>
            <slices>2 2 2</slices>
            <capacity>4</capacity>
            <near>1</near>
            <far>11</far>
        </clusters>
        <object>
            <name>Camera</name>
            <type>camera</type>
            <position>0 0 0</position>
            <fov>90</fov>
            <aspect>1</aspect>
        </object>
        <object>
            <name>Ahead</name>
            <type>light</type>
            <position>2 2 -3</position>
            <radius>0.5</radius>
        </object>
        <object>
            <name>Behind</name>
            <type>light</type>
            <position>0 0 20</position>
            <radius>1</radius>
        </object>
    </scene>
    "#;

    #[test]
    fn overrides_replace_scene_settings() {
        let overrides = Overrides {
            slices: Some(SliceGrid::new(8, 4, 2).unwrap()),
            capacity: Some(7),
            aspect: None,
            refine: true,
        };
        let settings = overrides.apply(ClusterSettings::default());
        assert_eq!(settings.slices.counts().to_array(), [8, 4, 2]);
        assert_eq!(settings.capacity, 7);
        assert_eq!(settings.mode, BinningMode::Refined);
        assert_eq!(Overrides::default().apply(settings), settings);
    }

    #[test]
    fn oversized_capacity_override_is_an_error() {
        let scene = Scene::from_xml(SCENE).unwrap();
        let overrides = Overrides {
            slices: Some(SliceGrid::new(65_535, 65_535, 1).unwrap()),
            capacity: Some(u32::MAX),
            ..Overrides::default()
        };
        assert!(cluster_scene(&scene, &overrides).is_err());
    }

    #[test]
    fn cluster_scene_bins_visible_lights() {
        let scene = Scene::from_xml(SCENE).unwrap();
        let frame = cluster_scene(&scene, &Overrides::default()).unwrap();
        assert_eq!(frame.stats.lights, 2);
        assert_eq!(frame.stats.culled, 1);
        assert_eq!(frame.buffer.get(CellIndex::new(1, 0, 0)), Some(&[0][..]));
        assert_eq!(frame.buffer.occupied_cells(), 1);
    }

    #[test]
    fn summary_and_cells_are_printed() {
        let scene = Scene::from_xml(SCENE).unwrap();
        let frame = cluster_scene(&scene, &Overrides::default()).unwrap();
        let mut out = Vec::new();
        write_summary(&mut out, &frame).unwrap();
        write_cells(&mut out, &frame.buffer).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Grid 2x2x2 (8 cells), capacity 4"));
        assert!(text.contains("Lights: 1 binned, 1 culled"));
        assert!(text.contains(" - (1, 0, 0): 0"));
    }

    #[test]
    fn uniform_matches_frame_settings() {
        let scene = Scene::from_xml(SCENE).unwrap();
        let frame = cluster_scene(&scene, &Overrides::default()).unwrap();
        let uniform = frame.uniform();
        assert_eq!(uniform.slices, [2, 2, 2, 4]);
        assert_eq!(uniform.depth[..3], [1.0, 11.0, 5.0]);
    }

    #[test]
    fn published_frames_are_visible_to_readers() {
        let scene = Scene::from_xml(SCENE).unwrap();
        let frame = cluster_scene(&scene, &Overrides::default()).unwrap();
        let shared = SharedClusters::new(ClusterBuffer::new(frame.settings.slices, 4).unwrap());
        assert_eq!(frame.publish(&shared), 1);
        assert_eq!(shared.lights_in(CellIndex::new(1, 0, 0)), Some(vec![0]));
    }
}
