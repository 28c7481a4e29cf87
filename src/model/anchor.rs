//! Anchors as reported by the tracking system.

use serde::{Deserialize, Serialize};
use super::{Size2, Vec3};

/// Opaque anchor identifier, assigned by the tracker and stable for the
/// anchor's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorId(pub String);

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnchorId {
    fn from(s: &str) -> Self {
        AnchorId(s.to_string())
    }
}

impl From<String> for AnchorId {
    fn from(s: String) -> Self {
        AnchorId(s)
    }
}

/// Orientation of a detected plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaneAlignment {
    Horizontal,
    Vertical,
}

/// What an anchor is, with the shape data its representation depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnchorKind {
    /// A detected plane. `extent` is measured in the anchor's local frame:
    /// x is width, z is depth, y is unused.
    Plane {
        alignment: PlaneAlignment,
        extent: Vec3,
        center: Vec3,
    },
    /// A recognized reference image.
    Image { physical_size: Size2 },
    /// A recognized reference object.
    Object { extent: Vec3, center: Vec3 },
    /// A tracked face. `mesh_version` changes whenever the tracker has new
    /// mesh vertices for it.
    Face { mesh_version: u64 },
}

/// Discriminant of `AnchorKind`, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorKindTag {
    Plane,
    Image,
    Object,
    Face,
}

impl AnchorKind {
    pub fn tag(&self) -> AnchorKindTag {
        match self {
            AnchorKind::Plane { .. } => AnchorKindTag::Plane,
            AnchorKind::Image { .. } => AnchorKindTag::Image,
            AnchorKind::Object { .. } => AnchorKindTag::Object,
            AnchorKind::Face { .. } => AnchorKindTag::Face,
        }
    }
}

impl std::fmt::Display for AnchorKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnchorKindTag::Plane => "plane",
            AnchorKindTag::Image => "image",
            AnchorKindTag::Object => "object",
            AnchorKindTag::Face => "face",
        };
        f.write_str(name)
    }
}
