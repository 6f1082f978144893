use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::mesh::MAX_PLANE_RESOLUTION;

/// Scene used when no file is given: a sand surface lit by an orbiting
/// light, with a small cube marking the light.
pub const DEFAULT_SCENE: &str = r#"
<scene>
    <object>
        <name>Camera</name>
        <type>camera</type>
        <position>1 1.2 1.5</position>
        <rotation>-30 0 0</rotation>
        <fov>90</fov>
    </object>
    <object>
        <name>Light</name>
        <type>light</type>
        <position>1.5 0.2 -1.5</position>
        <color>255 255 255</color>
        <intensity>0.3</intensity>
        <orbit>0.5 100</orbit>
        <marker>0.01</marker>
    </object>
    <object>
        <name>Sand</name>
        <type>surface</type>
        <rotation>-90 0 0</rotation>
        <scale>2 2 2</scale>
        <resolution>256</resolution>
        <color>230 200 150</color>
    </object>
</scene>
"#;

/// Object kinds understood by the scene file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Surface,
    Flat,
    Light,
    Camera,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Surface => "surface",
            ObjectType::Flat => "flat",
            ObjectType::Light => "light",
            ObjectType::Camera => "camera",
        }
    }

    fn parse(value: &str) -> Result<Self, SceneError> {
        match value {
            "surface" => Ok(ObjectType::Surface),
            "flat" | "mesh" => Ok(ObjectType::Flat),
            "light" => Ok(ObjectType::Light),
            "camera" => Ok(ObjectType::Camera),
            other => Err(SceneError::UnknownObjectType(other.to_string())),
        }
    }
}

/// Runtime representation of a scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub lights: Vec<Light>,
    /// Directory relative asset paths resolve against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Scene {
    pub fn builtin() -> Self {
        // The built-in document is covered by tests; a failure here is a bug.
        Self::from_xml(DEFAULT_SCENE).unwrap_or_default()
    }

    /// Reads a scene file; relative asset paths resolve against its directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?;
        let mut scene = Self::from_xml(&xml)
            .with_context(|| format!("failed to parse scene {}", path.display()))?;
        scene.base_dir = path.parent().map(Path::to_path_buf);
        Ok(scene)
    }

    pub fn from_xml(xml: &str) -> Result<Self, SceneError> {
        let document = Document::parse(xml)?;
        let mut objects = Vec::new();
        let mut names = HashSet::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let object = parse_object(&node)?;
            if !names.insert(object.name.clone()) {
                return Err(SceneError::DuplicateName(object.name));
            }
            objects.push(object);
        }

        let lights = objects
            .iter()
            .filter(|obj| obj.object_type == ObjectType::Light)
            .map(|obj| Light {
                position: obj.position,
                color: obj.color,
                intensity: obj.intensity,
            })
            .collect();

        Ok(Self {
            objects,
            lights,
            base_dir: None,
        })
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(relative),
            None => PathBuf::from(relative),
        }
    }

    pub fn find(&self, object_type: ObjectType) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.object_type == object_type)
    }
}

/// Object as described by the scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffuse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<String>,
    /// Orbit radius and speed in degrees per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbit: Option<Vec2>,
    /// Scale of a cube that tracks this light.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<f32>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_type: ObjectType::Flat,
            mesh: None,
            color: default_color(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: default_scale(),
            fov: default_fov(),
            intensity: default_intensity(),
            resolution: default_resolution(),
            diffuse: None,
            normal: None,
            orbit: None,
            marker: None,
        }
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_fov() -> f32 {
    90.0
}

fn default_intensity() -> f32 {
    1.0
}

fn default_resolution() -> u32 {
    128
}

/// Light extracted from the scene object list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

fn parse_object(node: &Node<'_, '_>) -> Result<SceneObject, SceneError> {
    let mut object = SceneObject {
        name: optional_text(node, "name").ok_or(SceneError::MissingTag("name"))?,
        ..SceneObject::default()
    };
    if let Some(kind) = optional_text(node, "type") {
        object.object_type = ObjectType::parse(&kind)?;
    }
    object.mesh = optional_text(node, "mesh");
    object.diffuse = optional_text(node, "diffuse");
    object.normal = optional_text(node, "normal");
    if let Some(color) = optional_text(node, "color") {
        object.color = parse_floats::<3>(&color, "color").map(|[r, g, b]| {
            Vec3::new(r, g, b) / 255.0
        })?;
    }
    if let Some(position) = optional_text(node, "position") {
        object.position = Vec3::from_array(parse_floats(&position, "position")?);
    }
    if let Some(rotation) = optional_text(node, "rotation") {
        object.rotation = Vec3::from_array(parse_floats(&rotation, "rotation")?);
    }
    if let Some(scale) = optional_text(node, "scale") {
        object.scale = Vec3::from_array(parse_floats(&scale, "scale")?);
    }
    if let Some(fov) = optional_text(node, "fov") {
        object.fov = parse_number(&fov, "fov")?;
    }
    if let Some(intensity) = optional_text(node, "intensity") {
        object.intensity = parse_number(&intensity, "intensity")?;
    }
    if let Some(resolution) = optional_text(node, "resolution") {
        object.resolution = parse_number(&resolution, "resolution")?;
        if object.resolution == 0 {
            return Err(SceneError::ZeroResolution);
        }
        if object.resolution > MAX_PLANE_RESOLUTION {
            return Err(SceneError::ResolutionTooLarge {
                value: object.resolution,
                max: MAX_PLANE_RESOLUTION,
            });
        }
    }
    if let Some(orbit) = optional_text(node, "orbit") {
        object.orbit = Some(Vec2::from_array(parse_floats(&orbit, "orbit")?));
    }
    if let Some(marker) = optional_text(node, "marker") {
        object.marker = Some(parse_number(&marker, "marker")?);
    }
    Ok(object)
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_number<T: std::str::FromStr>(value: &str, tag: &'static str) -> Result<T, SceneError> {
    value.parse::<T>().map_err(|_| SceneError::InvalidNumber {
        tag,
        value: value.to_string(),
    })
}

fn parse_floats<const N: usize>(value: &str, tag: &'static str) -> Result<[f32; N], SceneError> {
    let mut out = [0.0; N];
    let mut components = value.split_whitespace();
    for slot in &mut out {
        let component = components
            .next()
            .ok_or(SceneError::MissingComponents { tag })?;
        *slot = parse_number(component, tag)?;
    }
    Ok(out)
}
