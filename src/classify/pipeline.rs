//! Off-thread inference feeding the tag deduplicator.
//!
//! `request` runs the classifier on the tokio runtime; results come back
//! over a channel and are placed by `drain` on the render thread, which owns
//! the tag set and is the only place tag nodes are created.

use std::sync::Arc;
use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::model::*;
use crate::scene::SceneGraph;
use crate::tracking::{HitResult, HitTestKind, HitTester, ScreenPoint};
use crate::{Error, Result};
use super::{ClassificationDeduplicator, InferenceGate, TagOutcome};

/// Planes first; feature points only when no plane is under the point.
const PLANE_HITS: &[HitTestKind] = &[HitTestKind::ExistingPlaneUsingExtent, HitTestKind::EstimatedHorizontalPlane];
const FEATURE_HITS: &[HitTestKind] = &[HitTestKind::FeaturePoint];

/// Image classifier over the current camera frame.
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    /// Best classification of the current frame, or None if nothing was
    /// recognized.
    async fn classify(&self) -> Result<Option<Classification>>;
}

pub struct ClassificationPipeline<C: Classifier> {
    classifier: Arc<C>,
    gate: InferenceGate,
    results_tx: mpsc::UnboundedSender<Classification>,
    results_rx: mpsc::UnboundedReceiver<Classification>,
    screen_center: ScreenPoint,
}

impl<C: Classifier> ClassificationPipeline<C> {
    pub fn new(classifier: C, screen_center: ScreenPoint) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            classifier: Arc::new(classifier),
            gate: InferenceGate::new(),
            results_tx,
            results_rx,
            screen_center,
        }
    }

    pub fn gate(&self) -> &InferenceGate {
        &self.gate
    }

    pub fn set_screen_center(&mut self, point: ScreenPoint) {
        self.screen_center = point;
    }

    /// Start one inference if none is in flight.
    ///
    /// Returns false when the request was dropped because another is still
    /// running. Must be called from within a tokio runtime.
    pub fn request(&self) -> Result<bool> {
        let Some(guard) = self.gate.try_begin() else {
            trace!("inference in flight, request dropped");
            return Ok(false);
        };
        let handle = Handle::try_current()
            .map_err(|e| Error::Inference(format!("no async runtime for inference: {e}")))?;

        let classifier = Arc::clone(&self.classifier);
        let results = self.results_tx.clone();
        handle.spawn(async move {
            let _guard = guard;
            match classifier.classify().await {
                Ok(Some(classification)) => {
                    let _ = results.send(classification);
                }
                Ok(None) => trace!("classifier recognized nothing"),
                Err(err) => warn!(error = %err, "classification failed"),
            }
        });
        Ok(true)
    }

    /// Place every completed classification into `tags`. Call on the
    /// render thread.
    pub fn drain<S, H>(
        &mut self,
        tags: &mut ClassificationDeduplicator,
        scene: &S,
        hit_tester: &H,
        tracking: TrackingState,
    ) -> Result<Vec<TagOutcome>>
    where
        S: SceneGraph,
        H: HitTester + ?Sized,
    {
        let mut outcomes = Vec::new();
        while let Ok(classification) = self.results_rx.try_recv() {
            outcomes.push(self.place(tags, scene, hit_tester, tracking, classification)?);
        }
        Ok(outcomes)
    }

    fn place<S, H>(
        &self,
        tags: &mut ClassificationDeduplicator,
        scene: &S,
        hit_tester: &H,
        tracking: TrackingState,
        classification: Classification,
    ) -> Result<TagOutcome>
    where
        S: SceneGraph,
        H: HitTester + ?Sized,
    {
        let Classification { label, confidence } = classification;

        if let Some(rejected) = tags.rejection(&label, confidence) {
            return Ok(rejected);
        }
        if !tracking.is_normal() {
            debug!(label = %label, tracking = %tracking, "tracking limited, tag not placed");
            return Ok(TagOutcome::TrackingLimited { label });
        }
        let Some(hit) = self.hit_screen_center(hit_tester) else {
            debug!(label = %label, "nothing under screen center");
            return Ok(TagOutcome::NoHit { label });
        };

        tags.on_classification(scene, &label, confidence, hit.world_transform)
    }

    fn hit_screen_center<H: HitTester + ?Sized>(&self, hit_tester: &H) -> Option<HitResult> {
        hit_tester
            .hit_test(self.screen_center, PLANE_HITS)
            .into_iter()
            .next()
            .or_else(|| hit_tester.hit_test(self.screen_center, FEATURE_HITS).into_iter().next())
    }
}
