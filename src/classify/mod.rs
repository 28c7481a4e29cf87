//! # Classification Tags
//!
//! Pins classifier labels into the scene at the point the camera was
//! looking at, keeping at most one tag per label.
//!
//! | Incoming result | Existing tag for label | Outcome |
//! |-----------------|------------------------|---------|
//! | below threshold | any | discarded |
//! | above threshold | none | new tag |
//! | above threshold | lower confidence | old tag removed, new tag created |
//! | above threshold | equal or higher confidence | discarded |
//!
//! Inference itself runs off the render thread through
//! [`ClassificationPipeline`], guarded by a single-flight [`InferenceGate`].

pub mod gate;
pub mod pipeline;

use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::config::SyncConfig;
use crate::model::tag::display_text;
use crate::model::*;
use crate::scene::SceneGraph;
use crate::Result;

pub use gate::{InferenceGate, InflightGuard};
pub use pipeline::{ClassificationPipeline, Classifier};

const TEXT_EXTRUSION_DEPTH: f32 = 0.01;
const MARKER_RADIUS: f32 = 0.01;

/// What one classification result did to the tag set.
#[derive(Debug, Clone, PartialEq)]
pub enum TagOutcome {
    Created(ClassificationTag),
    /// A better result for a label that was already tagged.
    Replaced { previous: ClassificationTag, tag: ClassificationTag },
    BelowThreshold { label: String, confidence: f32 },
    /// The label is already tagged with `existing` confidence or better.
    Superseded { label: String, confidence: f32, existing: f32 },
    /// Tracking was not normal, so no hit test was attempted.
    TrackingLimited { label: String },
    /// Nothing under the screen center to pin the tag to.
    NoHit { label: String },
}

/// One tag per label, keeping the most confident result seen so far.
#[derive(Debug)]
pub struct ClassificationDeduplicator {
    tags: HashMap<String, ClassificationTag>,
    threshold: f32,
    tag_color: Color,
}

impl ClassificationDeduplicator {
    pub fn new(threshold: f32, tag_color: Color) -> Self {
        Self { tags: HashMap::new(), threshold, tag_color }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.confidence_threshold, config.tag_color)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// The outcome `on_classification` would produce without touching the
    /// scene, or None if the result would be placed.
    pub fn rejection(&self, label: &str, confidence: f32) -> Option<TagOutcome> {
        // NaN never clears the threshold
        if !(confidence >= self.threshold) {
            return Some(TagOutcome::BelowThreshold { label: label.to_string(), confidence });
        }
        match self.tags.get(label) {
            Some(existing) if existing.confidence >= confidence => Some(TagOutcome::Superseded {
                label: label.to_string(),
                confidence,
                existing: existing.confidence,
            }),
            _ => None,
        }
    }

    pub fn would_accept(&self, label: &str, confidence: f32) -> bool {
        self.rejection(label, confidence).is_none()
    }

    /// Apply one classification result observed at `world_transform`.
    pub fn on_classification<S: SceneGraph>(
        &mut self,
        scene: &S,
        label: &str,
        confidence: f32,
        world_transform: Transform,
    ) -> Result<TagOutcome> {
        if let Some(rejected) = self.rejection(label, confidence) {
            trace!(label, confidence, "classification discarded");
            return Ok(rejected);
        }

        let node = self.spawn_tag(scene, label, world_transform)?;
        let tag = ClassificationTag {
            label: label.to_string(),
            confidence,
            world_transform,
            node,
        };

        if let Some(previous) = self.tags.get(label) {
            if let Err(err) = scene.detach(previous.node) {
                let _ = scene.detach(node);
                return Err(err);
            }
        }

        match self.tags.insert(label.to_string(), tag.clone()) {
            Some(previous) => {
                debug!(label, was = previous.confidence, now = confidence, "tag replaced");
                Ok(TagOutcome::Replaced { previous, tag })
            }
            None => {
                debug!(label, confidence, "tag created");
                Ok(TagOutcome::Created(tag))
            }
        }
    }

    /// Tags currently in the scene, ordered by label.
    pub fn current_tags(&self) -> Vec<&ClassificationTag> {
        let mut tags: Vec<&ClassificationTag> = self.tags.values().collect();
        tags.sort_by(|a, b| a.label.cmp(&b.label));
        tags
    }

    pub fn tag(&self, label: &str) -> Option<&ClassificationTag> {
        self.tags.get(label)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Detach every tag node. Returns how many were removed.
    pub fn remove_all<S: SceneGraph>(&mut self, scene: &S) -> Result<usize> {
        let mut removed = 0;
        for (_, tag) in self.tags.drain() {
            if scene.contains(tag.node) {
                scene.detach(tag.node)?;
            }
            removed += 1;
        }
        Ok(removed)
    }

    /// Tag container at the hit point with a billboard label and a marker.
    fn spawn_tag<S: SceneGraph>(&self, scene: &S, label: &str, world_transform: Transform) -> Result<NodeId> {
        let node = scene.add_node(
            scene.root(),
            NodeSpec::empty(world_transform).named(format!("tag:{label}")),
        )?;

        let text = NodeSpec::with_geometry(
            Geometry::Text {
                text: display_text(label).to_string(),
                extrusion_depth: TEXT_EXTRUSION_DEPTH,
            },
            Material { diffuse: Color::WHITE, double_sided: true },
            Transform::IDENTITY,
        )
        .named("tag-text");
        let marker = NodeSpec::with_geometry(
            Geometry::Sphere { radius: MARKER_RADIUS },
            Material::diffuse(self.tag_color),
            Transform::IDENTITY,
        )
        .named("tag-marker");

        let built = scene.add_node(node, text).and_then(|_| scene.add_node(node, marker));
        if let Err(err) = built {
            let _ = scene.detach(node);
            return Err(err);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    fn at(x: f32) -> Transform {
        Transform::from_position(Vec3::new(x, 0.0, 0.0))
    }

    fn dedup() -> ClassificationDeduplicator {
        ClassificationDeduplicator::from_config(&SyncConfig::default())
    }

    #[test]
    fn test_below_threshold_is_discarded() {
        let scene = MemoryScene::new();
        let mut tags = dedup();
        let outcome = tags.on_classification(&scene, "cup", 0.3, at(0.0)).unwrap();
        assert_eq!(outcome, TagOutcome::BelowThreshold { label: "cup".into(), confidence: 0.3 });
        assert!(tags.is_empty());
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_nan_confidence_is_discarded() {
        let scene = MemoryScene::new();
        let mut tags = dedup();
        let outcome = tags.on_classification(&scene, "cup", f32::NAN, at(0.0)).unwrap();
        assert!(matches!(outcome, TagOutcome::BelowThreshold { .. }));
    }

    #[test]
    fn test_tag_node_shape() {
        let scene = MemoryScene::new();
        let mut tags = dedup();
        let TagOutcome::Created(tag) = tags.on_classification(&scene, "coffee mug, mug", 0.7, at(1.0)).unwrap() else {
            panic!("expected a new tag");
        };

        let node = scene.node(tag.node).unwrap();
        assert_eq!(node.parent, Some(scene.root()));
        assert_eq!(node.transform, at(1.0));

        let geometries: Vec<_> = scene.children(tag.node).into_iter()
            .filter_map(|c| scene.geometry(c).unwrap())
            .collect();
        assert!(geometries.contains(&Geometry::Text { text: "coffee mug".into(), extrusion_depth: TEXT_EXTRUSION_DEPTH }));
        assert!(geometries.contains(&Geometry::Sphere { radius: MARKER_RADIUS }));
    }

    #[test]
    fn test_better_result_replaces_tag() {
        let scene = MemoryScene::new();
        let mut tags = dedup();
        tags.on_classification(&scene, "cup", 0.6, at(0.0)).unwrap();
        let first = tags.tag("cup").unwrap().node;

        let outcome = tags.on_classification(&scene, "cup", 0.9, at(2.0)).unwrap();

        assert!(matches!(outcome, TagOutcome::Replaced { ref previous, .. } if previous.confidence == 0.6));
        assert!(!scene.contains(first));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.tag("cup").unwrap().world_transform, at(2.0));
    }

    #[test]
    fn test_equal_confidence_keeps_existing() {
        let scene = MemoryScene::new();
        let mut tags = dedup();
        tags.on_classification(&scene, "cup", 0.6, at(0.0)).unwrap();
        let outcome = tags.on_classification(&scene, "cup", 0.6, at(5.0)).unwrap();
        assert_eq!(outcome, TagOutcome::Superseded { label: "cup".into(), confidence: 0.6, existing: 0.6 });
        assert_eq!(tags.tag("cup").unwrap().world_transform, at(0.0));
    }

    #[test]
    fn test_remove_all_detaches_nodes() {
        let scene = MemoryScene::new();
        let mut tags = dedup();
        tags.on_classification(&scene, "cup", 0.6, at(0.0)).unwrap();
        tags.on_classification(&scene, "keyboard", 0.8, at(1.0)).unwrap();

        assert_eq!(tags.remove_all(&scene).unwrap(), 2);
        assert!(tags.is_empty());
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_current_tags_sorted_by_label() {
        let scene = MemoryScene::new();
        let mut tags = dedup();
        tags.on_classification(&scene, "mouse", 0.6, at(0.0)).unwrap();
        tags.on_classification(&scene, "cup", 0.6, at(0.0)).unwrap();
        let labels: Vec<&str> = tags.current_tags().iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["cup", "mouse"]);
    }
}
