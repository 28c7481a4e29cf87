//! # Node Synchronizer
//!
//! Turns the tracker's observation stream into registry calls and scene
//! mutations.
//!
//! ```text
//! tracker thread                         render thread
//! ──────────────                         ─────────────
//! EventSink::anchor_added ──┐
//! EventSink::anchor_updated ├─ channel ─▶ NodeSynchronizer::drain
//! EventSink::anchor_removed ┘             ├─ AnchorRegistry
//!                                         └─ VisualPolicy ─▶ SceneGraph
//! ```
//!
//! Events are stamped with the session epoch when they are sent. Restarting
//! a session bumps the epoch, so anything the previous session still had in
//! flight is dropped instead of resurrecting nodes after the teardown.

pub mod policy;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::model::*;
use crate::registry::{AnchorRegistry, NodeBinding};
use crate::scene::SceneGraph;
use crate::tracking::SessionMonitor;
use crate::{Error, Result};

pub use policy::VisualPolicy;

// ============================================================================
// Events
// ============================================================================

/// One observation from the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorEvent {
    Added { id: AnchorId, kind: AnchorKind, transform: Transform },
    Updated { id: AnchorId, kind: AnchorKind, transform: Transform },
    Removed { id: AnchorId },
}

impl AnchorEvent {
    pub fn id(&self) -> &AnchorId {
        match self {
            AnchorEvent::Added { id, .. }
            | AnchorEvent::Updated { id, .. }
            | AnchorEvent::Removed { id } => id,
        }
    }
}

#[derive(Debug)]
struct Stamped {
    epoch: u64,
    event: AnchorEvent,
}

/// What applying one event did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A new anchor got its nodes.
    Added(NodeBinding),
    /// An update for an anchor nobody had added yet; it was added instead.
    MergedUpdate(NodeBinding),
    /// An existing anchor was updated. `geometry_changed` is false when the
    /// size guard found nothing to do.
    Updated { id: AnchorId, geometry_changed: bool },
    /// The anchor's nodes were detached.
    Removed(NodeBinding),
    /// Remove for an anchor that was never registered.
    IgnoredRemove(AnchorId),
    /// The scene rejected an operation; the registry is unchanged for `id`.
    Failed { id: AnchorId, reason: String },
}

// ============================================================================
// Tracker side
// ============================================================================

/// Handle the tracker uses to report observations. Cheap to clone and safe
/// to use from any thread.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Stamped>,
    monitor: SessionMonitor,
}

impl EventSink {
    /// Queue an event for the render thread. Returns false if the
    /// synchronizer is gone.
    pub fn send(&self, event: AnchorEvent) -> bool {
        let epoch = self.monitor.epoch();
        self.tx.send(Stamped { epoch, event }).is_ok()
    }

    pub fn anchor_added(&self, id: AnchorId, kind: AnchorKind, transform: Transform) -> bool {
        self.send(AnchorEvent::Added { id, kind, transform })
    }

    pub fn anchor_updated(&self, id: AnchorId, kind: AnchorKind, transform: Transform) -> bool {
        self.send(AnchorEvent::Updated { id, kind, transform })
    }

    pub fn anchor_removed(&self, id: AnchorId) -> bool {
        self.send(AnchorEvent::Removed { id })
    }
}

/// Render-thread end of the event channel.
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<Stamped>,
    monitor: SessionMonitor,
}

/// Create a connected sink/queue pair sharing `monitor`'s session epoch.
pub fn event_queue(monitor: &SessionMonitor) -> (EventSink, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSink { tx, monitor: monitor.clone() },
        EventQueue { rx, monitor: monitor.clone() },
    )
}

// ============================================================================
// NodeSynchronizer
// ============================================================================

/// Owns the registry and the scene; the only writer of anchor nodes.
pub struct NodeSynchronizer<S: SceneGraph> {
    scene: S,
    parent: NodeId,
    registry: AnchorRegistry,
    policy: VisualPolicy,
    queue: EventQueue,
}

impl<S: SceneGraph> NodeSynchronizer<S> {
    /// Anchor containers are created directly under the scene root.
    pub fn new(scene: S, policy: VisualPolicy, queue: EventQueue) -> Self {
        let parent = scene.root();
        Self::with_parent(scene, parent, policy, queue)
    }

    /// Anchor containers are created under `parent`.
    pub fn with_parent(scene: S, parent: NodeId, policy: VisualPolicy, queue: EventQueue) -> Self {
        Self {
            scene,
            parent,
            registry: AnchorRegistry::new(),
            policy,
            queue,
        }
    }

    pub fn registry(&self) -> &AnchorRegistry {
        &self.registry
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn policy(&self) -> &VisualPolicy {
        &self.policy
    }

    /// Apply every queued event from the current session. Call once per
    /// frame on the render thread.
    pub fn drain(&mut self) -> Vec<SyncOutcome> {
        let current = self.queue.monitor.epoch();
        let mut outcomes = Vec::new();
        while let Ok(Stamped { epoch, event }) = self.queue.rx.try_recv() {
            if epoch != current {
                trace!(anchor = %event.id(), epoch, current, "dropping event from a previous session");
                continue;
            }
            outcomes.push(self.apply(event));
        }
        outcomes
    }

    /// Apply one event. Registry misuse is absorbed here: an update for an
    /// unknown anchor becomes an add, a duplicate add becomes an update and
    /// a remove for an unknown anchor does nothing.
    pub fn apply(&mut self, event: AnchorEvent) -> SyncOutcome {
        match event {
            AnchorEvent::Added { id, kind, transform } => {
                match self.add(id.clone(), kind.clone(), transform) {
                    Ok(binding) => {
                        debug!(anchor = %id, kind = %kind.tag(), "anchor added");
                        SyncOutcome::Added(binding)
                    }
                    Err(Error::DuplicateAnchor(_)) => {
                        warn!(anchor = %id, "duplicate add treated as update");
                        self.update_outcome(id, kind, transform)
                    }
                    Err(err) => failed(id, err),
                }
            }
            AnchorEvent::Updated { id, kind, transform } => {
                if !self.registry.contains(&id) {
                    warn!(anchor = %id, "update before add, adding anchor");
                    return match self.add(id.clone(), kind, transform) {
                        Ok(binding) => SyncOutcome::MergedUpdate(binding),
                        Err(err) => failed(id, err),
                    };
                }
                self.update_outcome(id, kind, transform)
            }
            AnchorEvent::Removed { id } => match self.registry.unregister(&self.scene, &id) {
                Ok(binding) => {
                    debug!(anchor = %id, "anchor removed");
                    SyncOutcome::Removed(binding)
                }
                Err(Error::UnknownAnchor(_)) => {
                    debug!(anchor = %id, "remove for unknown anchor ignored");
                    SyncOutcome::IgnoredRemove(id)
                }
                Err(err) => failed(id, err),
            },
        }
    }

    /// Detach every anchor node and start a new session epoch. Events
    /// already queued by the previous session will be discarded.
    ///
    /// Returns the number of anchors torn down.
    pub fn teardown(&mut self) -> Result<usize> {
        self.queue.monitor.begin_session();
        while self.queue.rx.try_recv().is_ok() {}
        let torn_down = self.registry.clear(&self.scene)?.len();
        info!(torn_down, "anchor state torn down");
        Ok(torn_down)
    }

    fn add(&mut self, id: AnchorId, kind: AnchorKind, transform: Transform) -> Result<NodeBinding> {
        let representation = self.policy.representation(&kind);
        self.registry.register(&self.scene, self.parent, id, kind, transform, representation)
    }

    fn update_outcome(&mut self, id: AnchorId, kind: AnchorKind, transform: Transform) -> SyncOutcome {
        match self.update(&id, kind, transform) {
            Ok(geometry_changed) => {
                trace!(anchor = %id, geometry_changed, "anchor updated");
                SyncOutcome::Updated { id, geometry_changed }
            }
            Err(err) => failed(id, err),
        }
    }

    fn update(&mut self, id: &AnchorId, kind: AnchorKind, transform: Transform) -> Result<bool> {
        let (scene, policy) = (&self.scene, &self.policy);
        self.registry.update(scene, id, kind, transform, |binding, previous, current| {
            policy.refresh(scene, binding.representation, previous, current)
        })
    }
}

fn failed(id: AnchorId, err: Error) -> SyncOutcome {
    warn!(anchor = %id, error = %err, "anchor event failed");
    SyncOutcome::Failed { id, reason: err.to_string() }
}

// ============================================================================
// Tests
// ============================================================================
