//! # Scene Model
//!
//! Clean DTOs that describe anchors, poses, scene nodes and tags.
//! These types cross every boundary: tracker ↔ synchronizer ↔ scene ↔ UI.
//!
//! Design rule: NO engine types here.
//! This module is pure data: no I/O, no state, no async.

pub mod math;
pub mod anchor;
pub mod node;
pub mod tag;
pub mod status;

pub use math::{Vec3, Quat, Transform, Size2};
pub use anchor::{AnchorId, AnchorKind, AnchorKindTag, PlaneAlignment};
pub use node::{NodeId, Node, NodeSpec, Geometry, Material, Color};
pub use tag::{Classification, ClassificationTag};
pub use status::{WorldMappingStatus, TrackingState, LimitedReason};
