//! # anchor-sync — Anchor Lifecycle Synchronization
//!
//! Keeps a scene graph consistent with the anchors an AR tracking system
//! reports: planes, recognized images, recognized objects and faces arrive
//! as an add/update/remove stream on the tracker's own thread, and every
//! anchor must end up with exactly one visual representative in the scene.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `SceneGraph` and `TrackingSession` are the contracts
//!    with the renderer and the tracker; nothing here knows a real engine.
//! 2. **Clean DTOs**: `AnchorKind`, `Transform`, `Geometry` cross all boundaries.
//! 3. **One writer**: only the render thread (the owner of `NodeSynchronizer`)
//!    mutates scene state. Everything else talks to it through channels.
//! 4. **Errors are values**: registry misuse, storage failures and map
//!    readiness all surface as `Error`, never as panics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anchor_sync::{open_memory, AnchorId, AnchorKind, PlaneAlignment, SyncConfig, Transform, Vec3};
//!
//! # async fn example() -> anchor_sync::Result<()> {
//! let mut session = open_memory(SyncConfig::default())?;
//! session.controller.start().await?;
//!
//! // The tracker reports a plane on its own thread...
//! session.tracker.add_anchor(
//!     AnchorId::from("P1"),
//!     AnchorKind::Plane {
//!         alignment: PlaneAlignment::Horizontal,
//!         extent: Vec3::new(1.0, 0.0, 1.0),
//!         center: Vec3::ZERO,
//!     },
//!     Transform::IDENTITY,
//! );
//!
//! // ...and the render thread applies it once per frame.
//! session.controller.process_frame();
//! assert_eq!(session.controller.synchronizer().registry().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! | Component | Module | Description |
//! |-----------|--------|-------------|
//! | `AnchorRegistry` | `registry` | Anchor id → node binding, the single source of truth |
//! | `NodeSynchronizer` | `sync` | Applies observation events with per-kind visual policy |
//! | `MapPersistence` | `persistence` | World-map capture, atomic save, load and restore |
//! | `ClassificationDeduplicator` | `classify` | Confidence-ranked tags with single-flight inference |
//! | `SessionController` | `session` | UI-facing façade over all of the above |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod scene;
pub mod registry;
pub mod sync;
pub mod tracking;
pub mod persistence;
pub mod classify;
pub mod session;
pub mod config;
pub mod export;

use std::sync::Arc;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    AnchorId, AnchorKind, AnchorKindTag, PlaneAlignment,
    Vec3, Quat, Transform, Size2,
    NodeId, Node, NodeSpec, Geometry, Material, Color,
    Classification, ClassificationTag,
    WorldMappingStatus, TrackingState, LimitedReason,
};

// ============================================================================
// Re-exports: Components
// ============================================================================

pub use scene::{SceneGraph, MemoryScene};
pub use registry::{AnchorRegistry, AnchorRecord, NodeBinding};
pub use sync::{AnchorEvent, EventSink, NodeSynchronizer, SyncOutcome, VisualPolicy};
pub use tracking::{
    TrackingSession, TrackingConfiguration, PlaneDetection, SessionMonitor, FrameStatus,
    HitTester, HitTestKind, HitResult, ScreenPoint, MemoryTracker,
};
pub use persistence::{MapPersistence, WorldMapSnapshot};
pub use classify::{
    ClassificationDeduplicator, ClassificationPipeline, Classifier,
    InferenceGate, InflightGuard, TagOutcome,
};
pub use session::SessionController;
pub use config::SyncConfig;
pub use export::export_state_json;

// ============================================================================
// In-memory wiring
// ============================================================================

/// A fully wired in-memory session: scripted tracker, memory scene and the
/// controller driving them. Used for tests and for embedding without a real
/// AR runtime.
pub struct MemorySession {
    pub controller: SessionController<MemoryTracker, MemoryScene>,
    pub tracker: Arc<MemoryTracker>,
    pub scene: MemoryScene,
}

/// Wire a `MemoryTracker` and a `MemoryScene` into a `SessionController`.
///
/// Fails with `Error::Config` if `config` does not validate.
pub fn open_memory(config: SyncConfig) -> Result<MemorySession> {
    let monitor = SessionMonitor::new();
    let (sink, queue) = sync::event_queue(&monitor);
    let tracker = Arc::new(MemoryTracker::new(sink, monitor.clone()));
    let scene = MemoryScene::new();
    let synchronizer = NodeSynchronizer::new(scene.clone(), VisualPolicy::from_config(&config), queue);
    let controller = SessionController::new(tracker.clone(), synchronizer, monitor, &config)?;
    Ok(MemorySession { controller, tracker, scene })
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Anchor {0} is already registered")]
    DuplicateAnchor(AnchorId),

    #[error("Anchor {0} is not registered")]
    UnknownAnchor(AnchorId),

    #[error("Map not ready: {0}")]
    MapNotReady(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Scene error: {0}")]
    Scene(String),

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
