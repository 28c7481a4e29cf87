//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! map_file = "map.arexperience"
//! capture_timeout_ms = 10000
//! confidence_threshold = 0.5
//! plane_alpha = 0.5
//! face_fill_mesh = false
//! tag_color = { r = 0.0, g = 1.0, b = 0.0, a = 1.0 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::model::Color;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Where the world map is saved.
    pub map_file: PathBuf,
    /// Upper bound on waiting for a `Mapped` world map.
    pub capture_timeout_ms: u64,
    /// Classifications below this are discarded.
    pub confidence_threshold: f32,
    /// Alpha for plane overlays.
    pub plane_alpha: f32,
    pub image_color: Color,
    pub object_color: Color,
    pub face_color: Color,
    pub tag_color: Color,
    pub face_fill_mesh: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            map_file: PathBuf::from("map.arexperience"),
            capture_timeout_ms: 10_000,
            confidence_threshold: 0.5,
            plane_alpha: 0.5,
            image_color: Color::BLUE.with_alpha(0.5),
            object_color: Color::BLUE.with_alpha(0.5),
            face_color: Color::GREEN,
            tag_color: Color::GREEN,
            face_fill_mesh: false,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.map_file.as_os_str().is_empty() {
            return Err(Error::Config("map_file must not be empty".into()));
        }
        if self.capture_timeout_ms == 0 {
            return Err(Error::Config("capture_timeout_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence_threshold must be within 0..=1, got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.plane_alpha) {
            return Err(Error::Config(format!(
                "plane_alpha must be within 0..=1, got {}",
                self.plane_alpha
            )));
        }
        let colors = [
            ("image_color", self.image_color),
            ("object_color", self.object_color),
            ("face_color", self.face_color),
            ("tag_color", self.tag_color),
        ];
        for (name, color) in colors {
            if [color.r, color.g, color.b, color.a].iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(Error::Config(format!("{name} components must be within 0..=1")));
            }
        }
        Ok(())
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = SyncConfig::from_toml_str(
            r#"
            map_file = "/tmp/office.arexperience"
            confidence_threshold = 0.7
            tag_color = { r = 1.0, g = 0.0, b = 0.0, a = 1.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.map_file, PathBuf::from("/tmp/office.arexperience"));
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.tag_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(config.capture_timeout_ms, 10_000);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(matches!(SyncConfig::from_toml_str("confidence_threshold = 1.5"), Err(Error::Config(_))));
        assert!(matches!(SyncConfig::from_toml_str("plane_alpha = -0.1"), Err(Error::Config(_))));
        assert!(matches!(SyncConfig::from_toml_str("capture_timeout_ms = 0"), Err(Error::Config(_))));
        assert!(matches!(SyncConfig::from_toml_str("map_file = \"\""), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(SyncConfig::from_toml_str("map_file = "), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anchor-sync.toml");
        std::fs::write(&path, "face_fill_mesh = true\n").unwrap();
        assert!(SyncConfig::from_file(&path).unwrap().face_fill_mesh);
        assert!(matches!(SyncConfig::from_file(&dir.path().join("missing.toml")), Err(Error::Config(_))));
    }
}
