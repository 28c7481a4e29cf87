//! Self-reported tracker quality: world mapping progress and camera
//! tracking state.

use std::fmt;
use serde::{Deserialize, Serialize};

/// How much of the environment the tracker has mapped.
///
/// Progresses `NotAvailable -> Limited -> Extending -> Mapped`, and may fall
/// back at any time. A map is only worth capturing once `Mapped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorldMappingStatus {
    #[default]
    NotAvailable,
    Limited,
    Extending,
    Mapped,
}

impl WorldMappingStatus {
    pub fn is_mapped(&self) -> bool {
        matches!(self, WorldMappingStatus::Mapped)
    }

    pub fn description(&self) -> &'static str {
        match self {
            WorldMappingStatus::NotAvailable => "World mapping is not available.",
            WorldMappingStatus::Limited => "World mapping is available but has limited features.",
            WorldMappingStatus::Extending => {
                "World mapping is actively extending the map with the user's motion."
            }
            WorldMappingStatus::Mapped => "World mapping has adequately mapped the visible area.",
        }
    }
}

impl fmt::Display for WorldMappingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Why tracking quality is limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitedReason {
    Initializing,
    ExcessiveMotion,
    InsufficientFeatures,
    Relocalizing,
}

/// Camera tracking quality. Anything other than `Normal` is a degraded mode
/// in which hit-testing and tag placement are suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingState {
    #[default]
    NotAvailable,
    Limited(LimitedReason),
    Normal,
}

impl TrackingState {
    pub fn is_normal(&self) -> bool {
        matches!(self, TrackingState::Normal)
    }

    pub fn description(&self) -> &'static str {
        match self {
            TrackingState::NotAvailable => "Tracking unavailable.",
            TrackingState::Normal => "Tracking normal.",
            TrackingState::Limited(LimitedReason::Initializing) => "Initializing.",
            TrackingState::Limited(LimitedReason::ExcessiveMotion) => {
                "Too much motion. Move the device more slowly."
            }
            TrackingState::Limited(LimitedReason::InsufficientFeatures) => {
                "Not enough surface detail. Point the device at a textured area."
            }
            TrackingState::Limited(LimitedReason::Relocalizing) => {
                "Relocalizing. Return to where the map was saved."
            }
        }
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_mapped_is_mapped() {
        assert!(!WorldMappingStatus::NotAvailable.is_mapped());
        assert!(!WorldMappingStatus::Limited.is_mapped());
        assert!(!WorldMappingStatus::Extending.is_mapped());
        assert!(WorldMappingStatus::Mapped.is_mapped());
    }

    #[test]
    fn test_limited_is_degraded() {
        assert!(TrackingState::Normal.is_normal());
        assert!(!TrackingState::Limited(LimitedReason::ExcessiveMotion).is_normal());
        assert!(!TrackingState::NotAvailable.is_normal());
    }
}
