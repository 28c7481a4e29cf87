//! # Anchor Registry
//!
//! Maps tracker anchor ids to the scene nodes that represent them. This is
//! the single source of truth for "which node depicts which anchor":
//! an entry exists iff its container node is attached to the scene.
//!
//! Each binding is a two-level subtree under a caller-supplied parent:
//!
//! ```text
//! parent
//!  └─ container        (posed at the anchor's transform)
//!      └─ representation (kind-specific geometry, mutated in place)
//! ```

use hashbrown::HashMap;
use serde::Serialize;

use crate::model::*;
use crate::scene::SceneGraph;
use crate::{Error, Result};

/// Nodes owned on behalf of one anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeBinding {
    pub anchor: AnchorId,
    pub container: NodeId,
    pub representation: NodeId,
}

/// Everything the registry knows about one live anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorRecord {
    pub id: AnchorId,
    pub kind: AnchorKind,
    pub transform: Transform,
    pub binding: NodeBinding,
}

/// Anchor id → record table. Mutated only from the render thread.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    records: HashMap<AnchorId, AnchorRecord>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new anchor and create its nodes under `parent`.
    ///
    /// Fails with `DuplicateAnchor` if `id` is already registered. If the
    /// representation node cannot be created, the container is detached
    /// again so no orphan is left behind.
    pub fn register<S: SceneGraph>(
        &mut self,
        scene: &S,
        parent: NodeId,
        id: AnchorId,
        kind: AnchorKind,
        transform: Transform,
        representation: NodeSpec,
    ) -> Result<NodeBinding> {
        if self.records.contains_key(&id) {
            return Err(Error::DuplicateAnchor(id));
        }

        let container = scene.add_node(parent, NodeSpec::empty(transform).named(format!("anchor:{id}")))?;
        let representation = match scene.add_node(container, representation) {
            Ok(node) => node,
            Err(err) => {
                scene.detach(container)?;
                return Err(err);
            }
        };

        let binding = NodeBinding { anchor: id.clone(), container, representation };
        self.records.insert(id.clone(), AnchorRecord {
            id,
            kind,
            transform,
            binding: binding.clone(),
        });
        Ok(binding)
    }

    /// Move a registered anchor's container and change its kind. Nodes are
    /// never reallocated.
    ///
    /// `refresh` receives the binding, the stored kind and the new kind, and
    /// reshapes the representation. The new kind is stored only if it
    /// succeeds, so a record's kind always matches its geometry. The pose is
    /// stored as soon as the container has moved.
    pub fn update<S, R, F>(
        &mut self,
        scene: &S,
        id: &AnchorId,
        kind: AnchorKind,
        transform: Transform,
        refresh: F,
    ) -> Result<R>
    where
        S: SceneGraph,
        F: FnOnce(&NodeBinding, &AnchorKind, &AnchorKind) -> Result<R>,
    {
        let record = self.records.get_mut(id)
            .ok_or_else(|| Error::UnknownAnchor(id.clone()))?;

        if record.transform != transform {
            scene.set_transform(record.binding.container, transform)?;
            record.transform = transform;
        }
        let refreshed = refresh(&record.binding, &record.kind, &kind)?;
        record.kind = kind;
        Ok(refreshed)
    }

    /// Remove an anchor and detach its container (and representation).
    pub fn unregister<S: SceneGraph>(&mut self, scene: &S, id: &AnchorId) -> Result<NodeBinding> {
        let record = self.records.remove(id)
            .ok_or_else(|| Error::UnknownAnchor(id.clone()))?;

        if scene.contains(record.binding.container) {
            scene.detach(record.binding.container)?;
        }
        Ok(record.binding)
    }

    /// Remove every anchor. Returns the bindings that were torn down.
    pub fn clear<S: SceneGraph>(&mut self, scene: &S) -> Result<Vec<NodeBinding>> {
        let mut bindings = Vec::with_capacity(self.records.len());
        for (_, record) in self.records.drain() {
            if scene.contains(record.binding.container) {
                scene.detach(record.binding.container)?;
            }
            bindings.push(record.binding);
        }
        Ok(bindings)
    }

    pub fn lookup(&self, id: &AnchorId) -> Option<&NodeBinding> {
        self.records.get(id).map(|r| &r.binding)
    }

    pub fn record(&self, id: &AnchorId) -> Option<&AnchorRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &AnchorId) -> bool {
        self.records.contains_key(id)
    }

    /// Registered ids, sorted for stable output.
    pub fn ids(&self) -> Vec<AnchorId> {
        let mut ids: Vec<AnchorId> = self.records.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn records(&self) -> impl Iterator<Item = &AnchorRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    fn plane(width: f32, depth: f32) -> AnchorKind {
        AnchorKind::Plane {
            alignment: PlaneAlignment::Horizontal,
            extent: Vec3::new(width, 0.0, depth),
            center: Vec3::ZERO,
        }
    }

    fn spec() -> NodeSpec {
        NodeSpec::with_geometry(
            Geometry::Plane { width: 1.0, height: 1.0 },
            Material::diffuse(Color::YELLOW),
            Transform::IDENTITY,
        )
    }

    #[test]
    fn test_register_creates_container_and_representation() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();

        let binding = registry.register(
            &scene, scene.root(), "P1".into(), plane(1.0, 1.0), Transform::IDENTITY, spec(),
        ).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&"P1".into()), Some(&binding));
        assert_eq!(scene.node(binding.representation).unwrap().parent, Some(binding.container));
        assert_eq!(scene.node(binding.container).unwrap().parent, Some(scene.root()));
    }

    #[test]
    fn test_duplicate_register_fails() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();
        registry.register(&scene, scene.root(), "P1".into(), plane(1.0, 1.0), Transform::IDENTITY, spec()).unwrap();

        let result = registry.register(&scene, scene.root(), "P1".into(), plane(1.0, 1.0), Transform::IDENTITY, spec());
        assert!(matches!(result, Err(Error::DuplicateAnchor(_))));
        assert_eq!(registry.len(), 1);
        // no second container was created
        assert_eq!(scene.node_count(), 3);
    }

    #[test]
    fn test_register_under_missing_parent_leaves_nothing() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();
        let result = registry.register(&scene, NodeId(42), "P1".into(), plane(1.0, 1.0), Transform::IDENTITY, spec());
        assert!(result.is_err());
        assert!(registry.is_empty());
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_update_moves_container_without_reallocating() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();
        let binding = registry.register(&scene, scene.root(), "P1".into(), plane(1.0, 1.0), Transform::IDENTITY, spec()).unwrap();

        let moved = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));
        let previous = registry
            .update(&scene, &"P1".into(), plane(2.0, 1.0), moved, |_, was, _| Ok(was.clone()))
            .unwrap();

        assert_eq!(previous, plane(1.0, 1.0));
        assert_eq!(registry.lookup(&"P1".into()), Some(&binding));
        assert_eq!(scene.node(binding.container).unwrap().transform, moved);
        assert_eq!(registry.record(&"P1".into()).unwrap().kind, plane(2.0, 1.0));
    }

    #[test]
    fn test_update_unknown_fails() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();
        let result = registry.update(&scene, &"nope".into(), plane(1.0, 1.0), Transform::IDENTITY, |_, _, _| Ok(()));
        assert!(matches!(result, Err(Error::UnknownAnchor(_))));
    }

    #[test]
    fn test_failed_refresh_keeps_kind() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();
        registry.register(&scene, scene.root(), "P1".into(), plane(1.0, 1.0), Transform::IDENTITY, spec()).unwrap();

        let result = registry.update(&scene, &"P1".into(), plane(2.0, 1.0), Transform::IDENTITY, |_, _, _| {
            Err::<(), _>(Error::Scene("representation is gone".into()))
        });

        assert!(matches!(result, Err(Error::Scene(_))));
        assert_eq!(registry.record(&"P1".into()).unwrap().kind, plane(1.0, 1.0));
    }

    #[test]
    fn test_unregister_detaches() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();
        let binding = registry.register(&scene, scene.root(), "P1".into(), plane(1.0, 1.0), Transform::IDENTITY, spec()).unwrap();

        let removed = registry.unregister(&scene, &"P1".into()).unwrap();

        assert_eq!(removed, binding);
        assert!(registry.is_empty());
        assert!(!scene.contains(binding.container));
        assert!(!scene.contains(binding.representation));
        assert!(matches!(registry.unregister(&scene, &"P1".into()), Err(Error::UnknownAnchor(_))));
    }

    #[test]
    fn test_clear_detaches_everything() {
        let scene = MemoryScene::new();
        let mut registry = AnchorRegistry::new();
        for id in ["A", "B", "C"] {
            registry.register(&scene, scene.root(), id.into(), plane(1.0, 1.0), Transform::IDENTITY, spec()).unwrap();
        }

        let torn_down = registry.clear(&scene).unwrap();

        assert_eq!(torn_down.len(), 3);
        assert!(registry.is_empty());
        assert_eq!(scene.node_count(), 1);
    }
}
