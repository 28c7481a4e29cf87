//! # Scene Graph Trait
//!
//! The contract between this crate and whatever renders the scene.
//! Every node operation the synchronizer and the tag layer need is defined
//! here; geometry is always mutated in place so that node identity and any
//! state hanging off it (materials, shader uniforms) survive updates.
//!
//! ## Implementations
//!
//! | Scene | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryScene` | `memory` | In-memory node tree for testing/embedding |
//!
//! Implementations are not required to be `Send`: a scene belongs to the
//! render thread and is only ever touched from there.

pub mod memory;

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryScene;

/// The scene-graph contract.
///
/// Methods take `&self`; implementations use interior mutability the way
/// a retained-mode scene framework does.
pub trait SceneGraph {
    /// The root node every other node descends from.
    fn root(&self) -> NodeId;

    /// Create a node under `parent`. Fails if `parent` does not exist.
    fn add_node(&self, parent: NodeId, spec: NodeSpec) -> Result<NodeId>;

    /// Snapshot of a node. Returns None if it is not attached.
    fn node(&self, id: NodeId) -> Option<Node>;

    /// Replace a node's local pose.
    fn set_transform(&self, id: NodeId, transform: Transform) -> Result<()>;

    /// Mutate a node's geometry in place. Fails if the node has none.
    fn mutate_geometry(&self, id: NodeId, f: &mut dyn FnMut(&mut Geometry)) -> Result<()>;

    /// Replace a node's material.
    fn set_material(&self, id: NodeId, material: Material) -> Result<()>;

    /// Detach a node and its whole subtree from the scene.
    fn detach(&self, id: NodeId) -> Result<()>;

    /// Whether a node is currently attached.
    fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Current geometry of a node, if any.
    fn geometry(&self, id: NodeId) -> Result<Option<Geometry>> {
        self.node(id)
            .map(|n| n.geometry)
            .ok_or_else(|| Error::Scene(format!("Node {id} is not attached")))
    }

    /// Direct children of a node. Empty if the node is not attached.
    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.to_vec()).unwrap_or_default()
    }
}
