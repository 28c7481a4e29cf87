//! In-memory scene graph.
//!
//! This is the reference implementation of `SceneGraph`.
//! It keeps a flat map of nodes protected by a RwLock, plus parent/child
//! links. Cloning a `MemoryScene` clones the handle, not the tree, so tests
//! can inspect the scene while a synchronizer owns it.
//!
//! ## Limitations
//!
//! - **No rendering**: geometry and materials are plain data.
//! - **No world transforms**: only local poses are stored.
//!
//! Use this scene for:
//! - Testing the registry, synchronizer and tag layer
//! - Embedding the synchronizer where the real scene lives behind FFI

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::RwLock;

use crate::model::*;
use crate::{Error, Result};
use super::SceneGraph;

// ============================================================================
// MemoryScene
// ============================================================================

/// In-memory scene graph.
#[derive(Clone)]
pub struct MemoryScene {
    inner: Arc<SceneInner>,
}

struct SceneInner {
    root: NodeId,
    nodes: RwLock<HashMap<NodeId, Node>>,
    next_node_id: AtomicU64,
    /// Total in-place geometry mutations across all nodes.
    geometry_mutations: AtomicU64,
}

impl MemoryScene {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(root, None, NodeSpec::empty(Transform::IDENTITY).named("root")));
        Self {
            inner: Arc::new(SceneInner {
                root,
                nodes: RwLock::new(nodes),
                next_node_id: AtomicU64::new(1),
                geometry_mutations: AtomicU64::new(0),
            }),
        }
    }

    /// Number of attached nodes, root included.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    /// Total in-place geometry mutations performed so far.
    pub fn geometry_mutations(&self) -> u64 {
        self.inner.geometry_mutations.load(Ordering::Relaxed)
    }

    /// All attached nodes in the subtree rooted at `id`, `id` included.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let nodes = self.inner.nodes.read();
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = nodes.get(&next) {
                out.push(next);
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SceneGraph impl
// ============================================================================

impl SceneGraph for MemoryScene {
    fn root(&self) -> NodeId {
        self.inner.root
    }

    fn add_node(&self, parent: NodeId, spec: NodeSpec) -> Result<NodeId> {
        let mut nodes = self.inner.nodes.write();
        let parent_node = nodes.get_mut(&parent)
            .ok_or_else(|| Error::Scene(format!("Parent node {parent} is not attached")))?;

        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        parent_node.children.push(id);
        nodes.insert(id, Node::new(id, Some(parent), spec));
        Ok(id)
    }

    fn node(&self, id: NodeId) -> Option<Node> {
        self.inner.nodes.read().get(&id).cloned()
    }

    fn set_transform(&self, id: NodeId, transform: Transform) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::Scene(format!("Node {id} is not attached")))?;
        node.transform = transform;
        Ok(())
    }

    fn mutate_geometry(&self, id: NodeId, f: &mut dyn FnMut(&mut Geometry)) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::Scene(format!("Node {id} is not attached")))?;
        let geometry = node.geometry.as_mut()
            .ok_or_else(|| Error::Scene(format!("Node {id} has no geometry")))?;
        f(geometry);
        node.geometry_revision += 1;
        self.inner.geometry_mutations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_material(&self, id: NodeId, material: Material) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::Scene(format!("Node {id} is not attached")))?;
        node.material = Some(material);
        Ok(())
    }

    fn detach(&self, id: NodeId) -> Result<()> {
        if id == self.inner.root {
            return Err(Error::Scene("Cannot detach the root node".into()));
        }

        let mut nodes = self.inner.nodes.write();
        let parent = nodes.get(&id)
            .ok_or_else(|| Error::Scene(format!("Node {id} is not attached")))?
            .parent;

        if let Some(parent) = parent.and_then(|p| nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }

        // Drop the whole subtree
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = nodes.remove(&next) {
                stack.extend(node.children.iter().copied());
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
