//! # Tracking Session Contract
//!
//! What this crate consumes from the AR tracking system: a way to (re)start
//! a session, a way to ask for the current world map, hit-testing against
//! what the tracker knows, and a per-frame status feed.
//!
//! ## Implementations
//!
//! | Tracker | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryTracker` | `memory` | Scripted tracker for tests and demos |

pub mod memory;

use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::model::*;
use crate::persistence::WorldMapSnapshot;
use crate::Result;

pub use memory::MemoryTracker;

// ============================================================================
// Session configuration
// ============================================================================

/// Which plane orientations the tracker should detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaneDetection {
    pub horizontal: bool,
    pub vertical: bool,
}

impl PlaneDetection {
    pub const NONE: PlaneDetection = PlaneDetection { horizontal: false, vertical: false };
    pub const HORIZONTAL: PlaneDetection = PlaneDetection { horizontal: true, vertical: false };
    pub const ALL: PlaneDetection = PlaneDetection { horizontal: true, vertical: true };
}

/// The mode a tracking session runs in. Switching modes restarts the
/// session and tears down every anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum TrackingConfiguration {
    /// Six-degree-of-freedom world tracking. The only mode that builds a
    /// world map worth saving.
    World {
        plane_detection: PlaneDetection,
        detection_images: Vec<String>,
        detection_objects: Vec<String>,
    },
    /// Tracks known images only, no world map.
    ImageTracking { images: Vec<String> },
    /// Front-camera face tracking.
    Face,
}

impl Default for TrackingConfiguration {
    fn default() -> Self {
        TrackingConfiguration::World {
            plane_detection: PlaneDetection::HORIZONTAL,
            detection_images: Vec::new(),
            detection_objects: Vec::new(),
        }
    }
}

impl TrackingConfiguration {
    pub fn builds_world_map(&self) -> bool {
        matches!(self, TrackingConfiguration::World { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackingConfiguration::World { .. } => "world",
            TrackingConfiguration::ImageTracking { .. } => "image",
            TrackingConfiguration::Face => "face",
        }
    }
}

// ============================================================================
// TrackingSession trait
// ============================================================================

/// The tracker's session control surface.
#[async_trait]
pub trait TrackingSession: Send + Sync + 'static {
    /// Start, or restart, tracking with `configuration`. Restarting resets
    /// tracking and drops every existing anchor; with a `seed`, the tracker
    /// relocalizes against the saved map and re-reports its anchors.
    async fn run(
        &self,
        configuration: &TrackingConfiguration,
        seed: Option<WorldMapSnapshot>,
    ) -> Result<()>;

    /// Capture the tracker's current world map.
    async fn request_current_map(&self) -> Result<WorldMapSnapshot>;

    /// Decode `snapshot` without touching the running session. Fails if
    /// `run` would reject it as a seed.
    async fn validate_map(&self, snapshot: &WorldMapSnapshot) -> Result<()>;
}

// ============================================================================
// Hit-testing
// ============================================================================

/// A point in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// What a hit-test ray may intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitTestKind {
    FeaturePoint,
    EstimatedHorizontalPlane,
    EstimatedVerticalPlane,
    ExistingPlane,
    ExistingPlaneUsingExtent,
    ExistingPlaneUsingGeometry,
}

/// One intersection, nearest first in a result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    pub kind: HitTestKind,
    pub distance: f32,
    pub world_transform: Transform,
    pub anchor: Option<AnchorId>,
}

/// Ray casts from the view into the tracker's understanding of the world.
pub trait HitTester {
    /// Intersections of kinds in `kinds`, nearest first.
    fn hit_test(&self, point: ScreenPoint, kinds: &[HitTestKind]) -> Vec<HitResult>;
}

// ============================================================================
// Session monitor
// ============================================================================

/// Per-frame tracker status plus the session epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStatus {
    /// Bumped on every session restart.
    pub epoch: u64,
    pub mapping: WorldMappingStatus,
    pub tracking: TrackingState,
}

/// Shared view of the current session: which epoch it is and what the
/// tracker last reported. The tracker writes; everyone else observes.
#[derive(Clone)]
pub struct SessionMonitor {
    tx: Arc<watch::Sender<FrameStatus>>,
}

impl SessionMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FrameStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn status(&self) -> FrameStatus {
        *self.tx.borrow()
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    pub fn mapping(&self) -> WorldMappingStatus {
        self.tx.borrow().mapping
    }

    pub fn tracking(&self) -> TrackingState {
        self.tx.borrow().tracking
    }

    /// True iff the world map is `Mapped` and could be captured now.
    pub fn save_enabled(&self) -> bool {
        self.mapping().is_mapped()
    }

    pub fn report_mapping(&self, mapping: WorldMappingStatus) {
        self.tx.send_if_modified(|status| {
            let changed = status.mapping != mapping;
            status.mapping = mapping;
            changed
        });
    }

    pub fn report_tracking(&self, tracking: TrackingState) {
        self.tx.send_if_modified(|status| {
            let changed = status.tracking != tracking;
            status.tracking = tracking;
            changed
        });
    }

    /// Start a new epoch. Mapping and tracking fall back to `NotAvailable`
    /// until the new session reports otherwise.
    pub fn begin_session(&self) -> u64 {
        let mut epoch = 0;
        self.tx.send_modify(|status| {
            status.epoch += 1;
            status.mapping = WorldMappingStatus::NotAvailable;
            status.tracking = TrackingState::NotAvailable;
            epoch = status.epoch;
        });
        epoch
    }

    pub fn subscribe(&self) -> watch::Receiver<FrameStatus> {
        self.tx.subscribe()
    }
}

impl Default for SessionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_enabled_tracks_mapping() {
        let monitor = SessionMonitor::new();
        assert!(!monitor.save_enabled());
        monitor.report_mapping(WorldMappingStatus::Extending);
        assert!(!monitor.save_enabled());
        monitor.report_mapping(WorldMappingStatus::Mapped);
        assert!(monitor.save_enabled());
    }

    #[test]
    fn test_begin_session_resets_status() {
        let monitor = SessionMonitor::new();
        monitor.report_mapping(WorldMappingStatus::Mapped);
        monitor.report_tracking(TrackingState::Normal);

        assert_eq!(monitor.begin_session(), 1);

        let status = monitor.status();
        assert_eq!(status.epoch, 1);
        assert_eq!(status.mapping, WorldMappingStatus::NotAvailable);
        assert_eq!(status.tracking, TrackingState::NotAvailable);
    }

    #[test]
    fn test_only_world_tracking_builds_a_map() {
        assert!(TrackingConfiguration::default().builds_world_map());
        assert!(!TrackingConfiguration::Face.builds_world_map());
        assert!(!TrackingConfiguration::ImageTracking { images: vec!["namecard".into()] }.builds_world_map());
    }
}
