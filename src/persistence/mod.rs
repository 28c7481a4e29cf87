//! # World-Map Persistence
//!
//! Capture the tracker's world map, keep it in a single file, and re-seed a
//! session from it later.
//!
//! The map itself is opaque: its bytes belong to the tracking system and
//! are never inspected here. What this module guarantees is the lifecycle
//! around them:
//!
//! - **capture** waits for the tracker to report `Mapped`, and fails rather
//!   than returning stale data if the session restarts underneath it;
//! - **save** replaces the file atomically (temp file + rename), so the old
//!   map is either fully replaced or fully intact;
//! - **load** treats a missing file as "nothing saved", never as an error;
//! - **restore** tears every anchor down before the seeded session starts.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::model::WorldMappingStatus;
use crate::scene::SceneGraph;
use crate::sync::NodeSynchronizer;
use crate::tracking::{FrameStatus, SessionMonitor, TrackingConfiguration, TrackingSession};
use crate::{Error, Result};

// ============================================================================
// WorldMapSnapshot
// ============================================================================

/// Opaque serialized world map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldMapSnapshot {
    data: Bytes,
}

impl WorldMapSnapshot {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for WorldMapSnapshot {
    fn from(data: Vec<u8>) -> Self {
        Self { data: Bytes::from(data) }
    }
}

impl From<Bytes> for WorldMapSnapshot {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

// ============================================================================
// MapPersistence
// ============================================================================

/// Capture/save/load/restore for one named map location.
#[derive(Debug, Clone)]
pub struct MapPersistence {
    location: PathBuf,
    capture_timeout: Duration,
}

impl MapPersistence {
    pub fn new(location: impl Into<PathBuf>, capture_timeout: Duration) -> Self {
        Self { location: location.into(), capture_timeout }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.map_file.clone(), config.capture_timeout())
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Whether a saved map is present.
    pub fn exists(&self) -> bool {
        self.location.is_file()
    }

    /// Capture the current world map.
    ///
    /// Suspends while the map is `Limited` or `Extending` and captures once
    /// it is `Mapped`. Fails with `MapNotReady` if mapping is unavailable,
    /// if the session restarts before the map arrives, or if the capture
    /// timeout elapses.
    pub async fn capture<T>(&self, session: &T, monitor: &SessionMonitor) -> Result<WorldMapSnapshot>
    where
        T: TrackingSession + ?Sized,
    {
        let mut rx = monitor.subscribe();
        let epoch = rx.borrow_and_update().epoch;

        let work = async {
            wait_until_mapped(&mut rx, epoch).await?;
            tokio::select! {
                map = session.request_current_map() => map,
                _ = wait_for_restart(&mut rx, epoch) => Err(restarted()),
            }
        };

        let snapshot = match tokio::time::timeout(self.capture_timeout, work).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::MapNotReady(format!(
                    "map was not captured within {} ms",
                    self.capture_timeout.as_millis()
                )));
            }
        };

        if snapshot.is_empty() {
            return Err(Error::MapNotReady("tracker returned an empty world map".into()));
        }
        debug!(bytes = snapshot.len(), "world map captured");
        Ok(snapshot)
    }

    pub fn save(&self, snapshot: &WorldMapSnapshot) -> Result<()> {
        save_snapshot(snapshot, &self.location)
    }

    pub fn load(&self) -> Result<Option<WorldMapSnapshot>> {
        load_snapshot(&self.location)
    }

    /// Check that `session` can decode `snapshot`. Any failure is reported
    /// as `Error::Storage`: the file holds a map the tracker cannot use.
    pub async fn verify<T>(&self, session: &T, snapshot: &WorldMapSnapshot) -> Result<()>
    where
        T: TrackingSession + ?Sized,
    {
        session.validate_map(snapshot).await.map_err(|err| match err {
            Error::Storage(_) => err,
            other => Error::Storage(format!("world map is corrupt: {other}")),
        })
    }

    /// Verify `snapshot`, tear down every anchor, then restart `session`
    /// seeded with it. Returns the number of anchors torn down.
    ///
    /// A snapshot that fails verification leaves the synchronizer and the
    /// running session untouched.
    pub async fn restore_session<T, S>(
        &self,
        session: &T,
        synchronizer: &mut NodeSynchronizer<S>,
        configuration: &TrackingConfiguration,
        snapshot: WorldMapSnapshot,
    ) -> Result<usize>
    where
        T: TrackingSession + ?Sized,
        S: SceneGraph,
    {
        if let Err(err) = self.verify(session, &snapshot).await {
            warn!(error = %err, "world map rejected before restore");
            return Err(err);
        }
        let torn_down = synchronizer.teardown()?;
        session.run(configuration, Some(snapshot)).await?;
        info!(torn_down, "session restored from world map");
        Ok(torn_down)
    }
}

fn restarted() -> Error {
    Error::MapNotReady("session restarted during capture".into())
}

async fn wait_until_mapped(rx: &mut watch::Receiver<FrameStatus>, epoch: u64) -> Result<()> {
    loop {
        let status = *rx.borrow_and_update();
        if status.epoch != epoch {
            return Err(restarted());
        }
        match status.mapping {
            WorldMappingStatus::Mapped => return Ok(()),
            WorldMappingStatus::NotAvailable => {
                return Err(Error::MapNotReady(status.mapping.description().into()));
            }
            WorldMappingStatus::Limited | WorldMappingStatus::Extending => {
                debug!(mapping = ?status.mapping, "waiting for world map");
                if rx.changed().await.is_err() {
                    return Err(Error::MapNotReady("session monitor closed".into()));
                }
            }
        }
    }
}

/// Resolves once the session epoch moves past `epoch`.
async fn wait_for_restart(rx: &mut watch::Receiver<FrameStatus>, epoch: u64) {
    loop {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if rx.borrow_and_update().epoch != epoch {
            return;
        }
    }
}

// ============================================================================
// File I/O
// ============================================================================

/// Atomically write `snapshot` to `location`.
///
/// The bytes go to a temporary file in the same directory, are synced, and
/// the temporary file is renamed over `location`. On any failure the
/// temporary file is removed and `location` is left as it was.
pub fn save_snapshot(snapshot: &WorldMapSnapshot, location: &Path) -> Result<()> {
    if snapshot.is_empty() {
        return Err(Error::Storage("refusing to save an empty world map".into()));
    }

    let dir = match location.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let write = || -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(snapshot.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(location).map_err(|e| e.error)?;
        Ok(())
    };

    write().map_err(|e| {
        warn!(path = %location.display(), error = %e, "world map save failed");
        Error::Storage(format!("failed to write world map to {}: {e}", location.display()))
    })?;

    info!(path = %location.display(), bytes = snapshot.len(), "world map saved");
    Ok(())
}

/// Read a saved map. `None` if nothing has been saved at `location`.
pub fn load_snapshot(location: &Path) -> Result<Option<WorldMapSnapshot>> {
    match std::fs::read(location) {
        Ok(bytes) if bytes.is_empty() => Err(Error::Storage(format!(
            "world map at {} is empty",
            location.display()
        ))),
        Ok(bytes) => {
            debug!(path = %location.display(), bytes = bytes.len(), "world map loaded");
            Ok(Some(WorldMapSnapshot::from(bytes)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Storage(format!(
            "failed to read world map from {}: {e}",
            location.display()
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
