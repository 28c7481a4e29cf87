//! Node in the scene graph.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use super::Transform;

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Linear RGBA color, components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

/// Surface appearance of a node's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub diffuse: Color,
    pub double_sided: bool,
}

impl Material {
    pub fn diffuse(color: Color) -> Self {
        Self { diffuse: color, double_sided: false }
    }
}

/// Shape attached to a node. Parameters are mutated in place on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Plane { width: f32, height: f32 },
    Box { width: f32, height: f32, length: f32, chamfer_radius: f32 },
    /// Deformable face mesh, regenerated from the tracker's mesh data.
    FaceMesh { mesh_version: u64, fill_mesh: bool },
    Sphere { radius: f32 },
    Text { text: String, extrusion_depth: f32 },
}

/// Everything needed to create a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSpec {
    pub name: Option<String>,
    pub geometry: Option<Geometry>,
    pub material: Option<Material>,
    pub transform: Transform,
}

impl NodeSpec {
    pub fn empty(transform: Transform) -> Self {
        Self { transform, ..Default::default() }
    }

    pub fn with_geometry(geometry: Geometry, material: Material, transform: Transform) -> Self {
        Self {
            name: None,
            geometry: Some(geometry),
            material: Some(material),
            transform,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A node in the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
    pub name: Option<String>,
    pub geometry: Option<Geometry>,
    pub material: Option<Material>,
    pub transform: Transform,
    /// Bumped on every in-place geometry mutation.
    pub geometry_revision: u64,
}

impl Node {
    pub fn new(id: NodeId, parent: Option<NodeId>, spec: NodeSpec) -> Self {
        Self {
            id,
            parent,
            children: SmallVec::new(),
            name: spec.name,
            geometry: spec.geometry,
            material: spec.material,
            transform: spec.transform,
            geometry_revision: 0,
        }
    }

    pub fn has_child(&self, id: NodeId) -> bool {
        self.children.contains(&id)
    }
}
