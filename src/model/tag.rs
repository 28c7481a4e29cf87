//! Classification results and the tags that display them.

use serde::{Deserialize, Serialize};
use super::{NodeId, Transform};

/// A single classifier observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self { label: label.into(), confidence }
    }
}

/// A label pinned at the world position where it was first recognized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationTag {
    pub label: String,
    pub confidence: f32,
    pub world_transform: Transform,
    pub node: NodeId,
}

impl ClassificationTag {
    /// The label as rendered: classifier labels are often synonym lists
    /// (`"coffee mug, mug"`) and only the first entry is shown.
    pub fn display_text(&self) -> &str {
        display_text(&self.label)
    }
}

pub(crate) fn display_text(label: &str) -> &str {
    label.split(", ").next().unwrap_or(label)
}
