//! State export: dump live anchors and tags as JSON.
//!
//! Feeds a debug overlay or a bug report. The output is a snapshot of the
//! render thread's view, not a saved session; it cannot be loaded back.
//!
//! ```text
//! AnchorRegistry + ClassificationDeduplicator → export_state_json()
//!   → {"epoch": .., "mapping": .., "tracking": .., "anchors": [..], "tags": [..]}
//! ```

use std::io::Write;
use serde::Serialize;

use crate::classify::ClassificationDeduplicator;
use crate::model::*;
use crate::registry::{AnchorRecord, AnchorRegistry};
use crate::tracking::FrameStatus;
use crate::Result;

#[derive(Serialize)]
struct StateDump<'a> {
    epoch: u64,
    mapping: &'static str,
    tracking: &'static str,
    anchors: Vec<&'a AnchorRecord>,
    tags: Vec<&'a ClassificationTag>,
}

/// Write the current anchors and tags as pretty-printed JSON.
///
/// Anchors are ordered by id and tags by label so two dumps of the same
/// state compare equal.
pub fn export_state_json(
    registry: &AnchorRegistry,
    tags: &ClassificationDeduplicator,
    status: FrameStatus,
    writer: &mut dyn Write,
) -> Result<()> {
    let mut anchors: Vec<&AnchorRecord> = registry.records().collect();
    anchors.sort_by(|a, b| a.id.cmp(&b.id));

    let dump = StateDump {
        epoch: status.epoch,
        mapping: status.mapping.description(),
        tracking: status.tracking.description(),
        anchors,
        tags: tags.current_tags(),
    };
    serde_json::to_writer_pretty(&mut *writer, &dump)?;
    writeln!(writer)?;
    Ok(())
}

/// [`export_state_json`] into a string.
pub fn state_json_string(
    registry: &AnchorRegistry,
    tags: &ClassificationDeduplicator,
    status: FrameStatus,
) -> Result<String> {
    let mut buf = Vec::new();
    export_state_json(registry, tags, status, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::scene::{MemoryScene, SceneGraph};
    use crate::sync::VisualPolicy;

    #[test]
    fn test_export_lists_anchors_and_tags() {
        let scene = MemoryScene::new();
        let policy = VisualPolicy::default();
        let mut registry = AnchorRegistry::new();
        for id in ["B", "A"] {
            let kind = AnchorKind::Face { mesh_version: 0 };
            let representation = policy.representation(&kind);
            registry
                .register(&scene, scene.root(), id.into(), kind, Transform::IDENTITY, representation)
                .unwrap();
        }
        let mut tags = ClassificationDeduplicator::from_config(&SyncConfig::default());
        tags.on_classification(&scene, "cup", 0.8, Transform::IDENTITY).unwrap();

        let json = state_json_string(&registry, &tags, FrameStatus::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["anchors"].as_array().unwrap().len(), 2);
        assert_eq!(value["anchors"][0]["id"], "A");
        assert_eq!(value["anchors"][0]["kind"]["type"], "Face");
        assert_eq!(value["tags"][0]["label"], "cup");
        assert_eq!(value["mapping"], WorldMappingStatus::NotAvailable.description());
    }

    #[test]
    fn test_empty_state() {
        let registry = AnchorRegistry::new();
        let tags = ClassificationDeduplicator::from_config(&SyncConfig::default());
        let json = state_json_string(&registry, &tags, FrameStatus::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["anchors"].as_array().unwrap().is_empty());
        assert!(value["tags"].as_array().unwrap().is_empty());
    }
}
