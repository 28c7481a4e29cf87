//! # Session Controller
//!
//! The façade a UI talks to. It owns the synchronizer and the tag set (the
//! render thread's state) and drives the tracker and the map file.
//!
//! | UI action | Method | Effect |
//! |-----------|--------|--------|
//! | every frame | `process_frame` | apply queued anchor events |
//! | every frame | `place_classifications` | place finished inference results |
//! | save button | `request_save` | capture + atomic save, returns status text |
//! | load button | `request_load` | load + teardown + seeded restart |
//! | reset button | `reset` | teardown + fresh session |
//! | mode switch | `switch_configuration` | teardown + restart in the new mode |
//!
//! Save is only offered while `save_enabled()` holds, i.e. the world map is
//! `Mapped` and the session is world tracking.

use std::sync::Arc;
use tracing::{info, warn};

use crate::classify::{ClassificationDeduplicator, ClassificationPipeline, Classifier, TagOutcome};
use crate::config::SyncConfig;
use crate::export;
use crate::model::*;
use crate::persistence::{MapPersistence, WorldMapSnapshot};
use crate::scene::SceneGraph;
use crate::sync::{NodeSynchronizer, SyncOutcome};
use crate::tracking::{HitTester, SessionMonitor, TrackingConfiguration, TrackingSession};
use crate::{Error, Result};

pub struct SessionController<T: TrackingSession, S: SceneGraph> {
    tracker: Arc<T>,
    synchronizer: NodeSynchronizer<S>,
    monitor: SessionMonitor,
    persistence: MapPersistence,
    tags: ClassificationDeduplicator,
    configuration: TrackingConfiguration,
}

impl<T: TrackingSession, S: SceneGraph> SessionController<T, S> {
    /// Fails with `Error::Config` if `config` does not validate.
    pub fn new(
        tracker: Arc<T>,
        synchronizer: NodeSynchronizer<S>,
        monitor: SessionMonitor,
        config: &SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tracker,
            synchronizer,
            monitor,
            persistence: MapPersistence::from_config(config),
            tags: ClassificationDeduplicator::from_config(config),
            configuration: TrackingConfiguration::default(),
        })
    }

    /// Use `configuration` for the next `start`.
    pub fn with_configuration(mut self, configuration: TrackingConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    pub async fn start(&mut self) -> Result<()> {
        self.restart(None).await
    }

    /// Drop every anchor and tag and start tracking from scratch.
    pub async fn reset(&mut self) -> Result<()> {
        self.restart(None).await
    }

    pub async fn switch_configuration(&mut self, configuration: TrackingConfiguration) -> Result<()> {
        info!(from = self.configuration.name(), to = configuration.name(), "switching configuration");
        self.configuration = configuration;
        self.restart(None).await
    }

    async fn restart(&mut self, seed: Option<WorldMapSnapshot>) -> Result<()> {
        let torn_down = self.synchronizer.teardown()?;
        let tags = self.tags.remove_all(self.synchronizer.scene())?;
        let seeded = seed.is_some();
        self.tracker.run(&self.configuration, seed).await?;
        info!(configuration = self.configuration.name(), torn_down, tags, seeded, "session started");
        Ok(())
    }

    // ========================================================================
    // Per-frame work
    // ========================================================================

    /// Apply every anchor event queued since the last frame.
    pub fn process_frame(&mut self) -> Vec<SyncOutcome> {
        self.synchronizer.drain()
    }

    /// Place finished classifications, hit-testing against `hit_tester`.
    pub fn place_classifications<C, H>(
        &mut self,
        pipeline: &mut ClassificationPipeline<C>,
        hit_tester: &H,
    ) -> Result<Vec<TagOutcome>>
    where
        C: Classifier,
        H: HitTester + ?Sized,
    {
        let tracking = self.monitor.tracking();
        pipeline.drain(&mut self.tags, self.synchronizer.scene(), hit_tester, tracking)
    }

    // ========================================================================
    // Save / load
    // ========================================================================

    pub fn save_enabled(&self) -> bool {
        self.configuration.builds_world_map() && self.monitor.save_enabled()
    }

    pub fn load_available(&self) -> bool {
        self.persistence.exists()
    }

    /// Capture the world map and save it.
    pub async fn save(&self) -> Result<WorldMapSnapshot> {
        if !self.configuration.builds_world_map() {
            return Err(Error::MapNotReady(format!(
                "{} tracking does not build a world map",
                self.configuration.name()
            )));
        }
        let snapshot = self.persistence.capture(self.tracker.as_ref(), &self.monitor).await?;
        self.persistence.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Load the saved map and restart seeded with it. Returns false if no
    /// map has been saved. Nothing is torn down unless the file was read
    /// and the tracker accepted its contents.
    pub async fn load(&mut self) -> Result<bool> {
        let Some(snapshot) = self.persistence.load()? else {
            return Ok(false);
        };
        let configuration = if self.configuration.builds_world_map() {
            self.configuration.clone()
        } else {
            TrackingConfiguration::default()
        };
        self.persistence
            .restore_session(self.tracker.as_ref(), &mut self.synchronizer, &configuration, snapshot)
            .await?;
        self.configuration = configuration;
        self.tags.remove_all(self.synchronizer.scene())?;
        Ok(true)
    }

    /// `save` for a button: returns the text to show.
    pub async fn request_save(&self) -> String {
        match self.save().await {
            Ok(snapshot) => {
                info!(bytes = snapshot.len(), "save requested and completed");
                "World map saved.".to_string()
            }
            Err(Error::MapNotReady(reason)) => {
                warn!(reason = %reason, "world map capture failed");
                format!("Map not ready: {reason}")
            }
            Err(err) => {
                warn!(error = %err, "world map save failed");
                format!("Save failed: {err}")
            }
        }
    }

    /// `load` for a button: returns the text to show.
    pub async fn request_load(&mut self) -> String {
        match self.load().await {
            Ok(true) => "World map loaded.".to_string(),
            Ok(false) => {
                info!(path = %self.persistence.location().display(), "no saved world map");
                "No saved world map.".to_string()
            }
            Err(err) => {
                warn!(error = %err, "world map load failed");
                format!("Load failed: {err}")
            }
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn mapping_description(&self) -> &'static str {
        self.monitor.mapping().description()
    }

    pub fn tracking_description(&self) -> &'static str {
        self.monitor.tracking().description()
    }

    pub fn current_tags(&self) -> Vec<&ClassificationTag> {
        self.tags.current_tags()
    }

    pub fn tags(&self) -> &ClassificationDeduplicator {
        &self.tags
    }

    pub fn configuration(&self) -> &TrackingConfiguration {
        &self.configuration
    }

    pub fn synchronizer(&self) -> &NodeSynchronizer<S> {
        &self.synchronizer
    }

    pub fn monitor(&self) -> &SessionMonitor {
        &self.monitor
    }

    pub fn persistence(&self) -> &MapPersistence {
        &self.persistence
    }

    pub fn tracker(&self) -> &Arc<T> {
        &self.tracker
    }

    /// JSON dump of live anchors and tags.
    pub fn export_state_json(&self) -> Result<String> {
        export::state_json_string(self.synchronizer.registry(), &self.tags, self.monitor.status())
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn session_in(dir: &std::path::Path) -> MemorySession {
        let config = SyncConfig { map_file: dir.join("map.arexperience"), ..SyncConfig::default() };
        open_memory(config).unwrap()
    }

    fn face() -> AnchorKind {
        AnchorKind::Face { mesh_version: 0 }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SyncConfig { confidence_threshold: 2.0, ..SyncConfig::default() };
        assert!(matches!(open_memory(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_start_runs_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.controller.start().await.unwrap();
        assert_eq!(session.tracker.runs(), 1);
        assert_eq!(session.tracker.configuration(), Some(TrackingConfiguration::default()));
    }

    #[tokio::test]
    async fn test_reset_drops_anchors() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.controller.start().await.unwrap();
        session.tracker.add_anchor("F".into(), face(), Transform::IDENTITY);
        session.controller.process_frame();
        assert_eq!(session.controller.synchronizer().registry().len(), 1);

        session.controller.reset().await.unwrap();

        assert!(session.controller.synchronizer().registry().is_empty());
        assert_eq!(session.scene.node_count(), 1);
        assert_eq!(session.tracker.runs(), 2);
    }

    #[tokio::test]
    async fn test_save_disabled_outside_world_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.controller.switch_configuration(TrackingConfiguration::Face).await.unwrap();
        session.tracker.report_mapping(WorldMappingStatus::Mapped);

        assert!(!session.controller.save_enabled());
        let status = session.controller.request_save().await;
        assert!(status.starts_with("Map not ready"), "{status}");
        assert!(!session.controller.load_available());
    }

    #[tokio::test]
    async fn test_load_without_saved_map() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.controller.start().await.unwrap();
        assert_eq!(session.controller.request_load().await, "No saved world map.");
        assert_eq!(session.tracker.runs(), 1);
    }

    #[tokio::test]
    async fn test_failed_start_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.tracker.fail_next_run();
        assert!(matches!(session.controller.start().await, Err(Error::Tracking(_))));
    }

    #[tokio::test]
    async fn test_status_descriptions_follow_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        session.tracker.report_tracking(TrackingState::Normal);
        session.tracker.report_mapping(WorldMappingStatus::Extending);
        assert_eq!(session.controller.tracking_description(), TrackingState::Normal.description());
        assert_eq!(session.controller.mapping_description(), WorldMappingStatus::Extending.description());
    }
}
