use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, DepthRange};
use crate::config::{BinningMode, ClusterSettings};
use crate::frustum::Sphere;
use crate::grid::SliceGrid;

/// Aspect ratio used when neither the scene nor the caller provides one.
pub const DEFAULT_ASPECT: f32 = 16.0 / 9.0;

/// Scene description consumed by the clustering frame driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub lights: Vec<PointLight>,
    #[serde(default)]
    pub settings: ClusterSettings,
}

impl Scene {
    /// Parses a scene XML document.
    ///
    /// `<object>` elements describe the camera and point lights in document
    /// order; an optional `<clusters>` element overrides the clustering
    /// defaults.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let mut objects = Vec::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let mut object = SceneObject::default();
            object.name = required_text(&node, "name")?;
            object.object_type =
                optional_text(&node, "type").unwrap_or_else(|| "light".to_string());
            object.color = parse_color(optional_text(&node, "color"), object.color)
                .with_context(|| format!("object {}", object.name))?;
            object.position = parse_vec3(optional_text(&node, "position"), object.position)
                .with_context(|| format!("object {}", object.name))?;
            object.rotation = parse_vec3(optional_text(&node, "rotation"), object.rotation)
                .with_context(|| format!("object {}", object.name))?;
            object.target = optional_text(&node, "target")
                .map(|text| parse_vec3(Some(text), Vec3::ZERO))
                .transpose()
                .with_context(|| format!("object {}", object.name))?;
            object.fov = parse_f32(optional_text(&node, "fov"), object.fov)?;
            object.aspect = optional_text(&node, "aspect")
                .map(|text| parse_f32(Some(text), DEFAULT_ASPECT))
                .transpose()?;
            object.radius = parse_f32(optional_text(&node, "radius"), object.radius)?;
            objects.push(object);
        }

        let lights = objects
            .iter()
            .filter(|obj| obj.object_type == "light")
            .map(|obj| PointLight {
                position: obj.position,
                radius: obj.radius,
                color: obj.color,
            })
            .collect();

        let settings = match document.descendants().find(|n| n.has_tag_name("clusters")) {
            Some(node) => parse_settings(&node).context("invalid <clusters> settings")?,
            None => ClusterSettings::default(),
        };

        Ok(Self {
            objects,
            lights,
            settings,
        })
    }

    /// Builds the clustering camera from the first camera object.
    ///
    /// `aspect` overrides the object's own aspect ratio. Without a camera
    /// object the view sits at `(0, 2, 6)` looking at the origin.
    pub fn camera(&self, aspect: Option<f32>) -> Result<Camera> {
        let object = self.objects.iter().find(|o| o.object_type == "camera");
        let aspect = aspect
            .or_else(|| object.and_then(|o| o.aspect))
            .unwrap_or(DEFAULT_ASPECT);

        let camera = match object {
            Some(object) => match object.target {
                Some(target) => {
                    Camera::looking_at(object.position, target, Vec3::Y, object.fov, aspect)
                }
                None => {
                    Camera::from_euler_degrees(object.position, object.rotation, object.fov, aspect)
                }
            },
            None => {
                Camera::looking_at(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, Vec3::Y, 60.0, aspect)
            }
        }
        .context("invalid camera")?;
        Ok(camera.with_depth_range(self.settings.depth))
    }
}

/// Scene object as described in the XML document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3>,
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<f32>,
    #[serde(default = "default_radius")]
    pub radius: f32,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_type: String::new(),
            color: default_color(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            target: None,
            fov: default_fov(),
            aspect: None,
            radius: default_radius(),
        }
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_fov() -> f32 {
    45.0
}

fn default_radius() -> f32 {
    5.0
}

/// Point light whose influence ends at `radius`.
///
/// `color` is carried for the shading stage and ignored by clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub radius: f32,
    #[serde(default = "default_color")]
    pub color: Vec3,
}

impl PointLight {
    pub fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.position, self.radius)
    }
}

fn parse_settings(node: &Node<'_, '_>) -> Result<ClusterSettings> {
    let defaults = ClusterSettings::default();
    let slices = match optional_text(node, "slices") {
        Some(text) => {
            let [x, y, z] = parse_components::<u32, 3>(&text, "slices")?;
            SliceGrid::new(x, y, z)?
        }
        None => defaults.slices,
    };
    let capacity = match optional_text(node, "capacity") {
        Some(text) => text
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse capacity: {err}"))?,
        None => defaults.capacity,
    };
    let near = parse_f32(optional_text(node, "near"), defaults.depth.near())?;
    let far = parse_f32(optional_text(node, "far"), defaults.depth.far())?;
    let mode = match optional_text(node, "mode") {
        Some(name) => {
            BinningMode::from_name(&name).ok_or_else(|| anyhow!("unknown binning mode {name}"))?
        }
        None => defaults.mode,
    };
    let settings = ClusterSettings {
        slices,
        capacity,
        depth: DepthRange::new(near, far)?,
        mode,
    };
    settings.validate()?;
    Ok(settings)
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components<T, const N: usize>(value: &str, what: &str) -> Result<[T; N]>
where
    T: std::str::FromStr + Copy + Default,
    T::Err: std::fmt::Display,
{
    let mut out = [T::default(); N];
    let mut parts = value.split_whitespace();
    for slot in out.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| anyhow!("{what} is missing components"))?;
        *slot = part
            .parse::<T>()
            .map_err(|err| anyhow!("failed to parse {what} component {part:?}: {err}"))?;
    }
    Ok(out)
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    Ok(Vec3::from_array(parse_components::<f32, 3>(&value, "vector")?))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let rgb = parse_components::<f32, 3>(&value, "color")?;
    Ok(Vec3::from_array(rgb) / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <clusters>
            <slices>16 9 24</slices>
            <capacity>32</capacity>
            <near>0.5</near>
            <far>200</far>
            <mode>refined</mode>
        </clusters>
        <object>
            <name>Camera</name>
            <type>camera</type>
            <position>0 5 10</position>
            <target>0 0 0</target>
            <fov>90</fov>
            <aspect>2</aspect>
        </object>
        <object>
            <name>Lamp</name>
            <type>light</type>
            <radius>2.5</radius>
            <position>0 5 0</position>
            <color>255 128 0</color>
        </object>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_objects_lights_and_settings() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.objects.len(), 2);
        let camera = scene.objects.iter().find(|o| o.name == "Camera").unwrap();
        assert_eq!(camera.object_type, "camera");
        assert_eq!(camera.fov, 90.0);
        assert_eq!(camera.target, Some(Vec3::ZERO));
        assert_eq!(scene.lights.len(), 1);
        let light = scene.lights[0];
        assert_eq!(light.position, Vec3::new(0.0, 5.0, 0.0));
        assert!((light.radius - 2.5).abs() < f32::EPSILON);
        assert_eq!(light.color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(scene.settings.slices, SliceGrid::new(16, 9, 24).unwrap());
        assert_eq!(scene.settings.capacity, 32);
        assert_eq!(scene.settings.depth, DepthRange::new(0.5, 200.0).unwrap());
        assert_eq!(scene.settings.mode, BinningMode::Refined);
    }

    #[test]
    fn camera_uses_target_and_depth_settings() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        let camera = scene.camera(None).unwrap();
        assert_eq!(camera.aspect(), 2.0);
        assert_eq!(camera.depth().far(), 200.0);
        let expected = Vec3::new(0.0, -5.0, -10.0).normalize();
        assert!(camera.forward().abs_diff_eq(expected, 1e-5));
        assert_eq!(scene.camera(Some(1.5)).unwrap().aspect(), 1.5);
    }

    #[test]
    fn missing_camera_falls_back_to_default_view() {
        let scene = Scene::from_xml("<scene></scene>").unwrap();
        let camera = scene.camera(None).unwrap();
        assert_eq!(camera.position(), Vec3::new(0.0, 2.0, 6.0));
        assert_eq!(camera.aspect(), DEFAULT_ASPECT);
        assert_eq!(scene.settings, ClusterSettings::default());
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><type>light</type></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn invalid_cluster_settings_are_errors() {
        let zero = "<scene><clusters><slices>4 0 4</slices></clusters></scene>";
        assert!(Scene::from_xml(zero).is_err());
        let inverted = "<scene><clusters><near>10</near><far>5</far></clusters></scene>";
        assert!(Scene::from_xml(inverted).is_err());
        let mode = "<scene><clusters><mode>exact</mode></clusters></scene>";
        assert!(Scene::from_xml(mode).is_err());
        let negative = "<scene><clusters><capacity>-1</capacity></clusters></scene>";
        assert!(Scene::from_xml(negative).is_err());
        let oversized = "<scene><clusters><slices>65535 65535 1</slices>\
                         <capacity>4294967295</capacity></clusters></scene>";
        assert!(Scene::from_xml(oversized).is_err());
    }

    #[test]
    fn degenerate_camera_is_reported() {
        let xml = "<scene><object><name>Cam</name><type>camera</type><fov>0</fov></object></scene>";
        let scene = Scene::from_xml(xml).unwrap();
        assert!(scene.camera(None).is_err());
    }
}
