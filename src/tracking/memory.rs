//! Scripted in-memory tracker.
//!
//! Tests drive it by hand: add, update and remove anchors, report mapping
//! and tracking status, and stage hit-test results. Everything it reports
//! goes through the same `EventSink` and `SessionMonitor` a real tracker
//! binding would use.
//!
//! Its world map is the JSON list of anchors it currently tracks, so a
//! capture → save → load → run round trip brings the same anchors back.

use std::collections::BTreeMap;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::*;
use crate::persistence::WorldMapSnapshot;
use crate::sync::EventSink;
use crate::{Error, Result};
use super::{HitResult, HitTestKind, HitTester, ScreenPoint, SessionMonitor, TrackingConfiguration, TrackingSession};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MappedAnchor {
    id: AnchorId,
    kind: AnchorKind,
    transform: Transform,
}

#[derive(Default)]
struct TrackerState {
    anchors: BTreeMap<AnchorId, MappedAnchor>,
    configuration: Option<TrackingConfiguration>,
    runs: u32,
    map_delay: Option<Duration>,
    fail_next_run: bool,
    hits: Vec<HitResult>,
}

/// A tracker whose observations are scripted by the caller.
pub struct MemoryTracker {
    sink: EventSink,
    monitor: SessionMonitor,
    state: Mutex<TrackerState>,
}

impl MemoryTracker {
    pub fn new(sink: EventSink, monitor: SessionMonitor) -> Self {
        Self {
            sink,
            monitor,
            state: Mutex::new(TrackerState::default()),
        }
    }

    // ========================================================================
    // Observations
    // ========================================================================

    pub fn add_anchor(&self, id: AnchorId, kind: AnchorKind, transform: Transform) {
        self.state.lock().anchors.insert(id.clone(), MappedAnchor {
            id: id.clone(),
            kind: kind.clone(),
            transform,
        });
        self.sink.anchor_added(id, kind, transform);
    }

    pub fn update_anchor(&self, id: AnchorId, kind: AnchorKind, transform: Transform) {
        self.state.lock().anchors.insert(id.clone(), MappedAnchor {
            id: id.clone(),
            kind: kind.clone(),
            transform,
        });
        self.sink.anchor_updated(id, kind, transform);
    }

    pub fn remove_anchor(&self, id: AnchorId) {
        self.state.lock().anchors.remove(&id);
        self.sink.anchor_removed(id);
    }

    pub fn report_mapping(&self, mapping: WorldMappingStatus) {
        self.monitor.report_mapping(mapping);
    }

    pub fn report_tracking(&self, tracking: TrackingState) {
        self.monitor.report_tracking(tracking);
    }

    // ========================================================================
    // Scripting knobs
    // ========================================================================

    /// Make `request_current_map` take this long.
    pub fn set_map_delay(&self, delay: Option<Duration>) {
        self.state.lock().map_delay = delay;
    }

    /// Make the next `run` fail.
    pub fn fail_next_run(&self) {
        self.state.lock().fail_next_run = true;
    }

    /// Results returned by `hit_test`, filtered by kind and sorted by distance.
    pub fn set_hit_results(&self, hits: Vec<HitResult>) {
        self.state.lock().hits = hits;
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn runs(&self) -> u32 {
        self.state.lock().runs
    }

    pub fn configuration(&self) -> Option<TrackingConfiguration> {
        self.state.lock().configuration.clone()
    }

    pub fn anchor_ids(&self) -> Vec<AnchorId> {
        self.state.lock().anchors.keys().cloned().collect()
    }
}

// ============================================================================
// TrackingSession impl
// ============================================================================

#[async_trait]
impl TrackingSession for MemoryTracker {
    async fn run(
        &self,
        configuration: &TrackingConfiguration,
        seed: Option<WorldMapSnapshot>,
    ) -> Result<()> {
        let restored = match &seed {
            Some(snapshot) => decode_map(snapshot)
                .map_err(|e| Error::Tracking(format!("world map could not be decoded: {e}")))?,
            None => Vec::new(),
        };

        {
            let mut state = self.state.lock();
            if std::mem::take(&mut state.fail_next_run) {
                return Err(Error::Tracking("session failed to start".into()));
            }
            state.anchors.clear();
            state.configuration = Some(configuration.clone());
            state.runs += 1;
        }

        info!(configuration = configuration.name(), seeded = seed.is_some(), "memory tracker running");

        for anchor in restored {
            self.add_anchor(anchor.id, anchor.kind, anchor.transform);
        }
        Ok(())
    }

    async fn request_current_map(&self) -> Result<WorldMapSnapshot> {
        let delay = self.state.lock().map_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        match &state.configuration {
            Some(configuration) if configuration.builds_world_map() => {}
            _ => return Err(Error::MapNotReady("session is not building a world map".into())),
        }
        let anchors: Vec<&MappedAnchor> = state.anchors.values().collect();
        Ok(WorldMapSnapshot::from(serde_json::to_vec(&anchors)?))
    }

    async fn validate_map(&self, snapshot: &WorldMapSnapshot) -> Result<()> {
        decode_map(snapshot)
            .map(|_| ())
            .map_err(|e| Error::Storage(format!("world map could not be decoded: {e}")))
    }
}

fn decode_map(snapshot: &WorldMapSnapshot) -> serde_json::Result<Vec<MappedAnchor>> {
    serde_json::from_slice(snapshot.as_bytes())
}

impl HitTester for MemoryTracker {
    fn hit_test(&self, _point: ScreenPoint, kinds: &[HitTestKind]) -> Vec<HitResult> {
        let mut hits: Vec<HitResult> = self.state.lock().hits.iter()
            .filter(|h| kinds.contains(&h.kind))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}
