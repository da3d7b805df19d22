// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine settings.
//!
//! Stored as RON next to the project. Covers:
//! - Undo history depth
//! - Auto-layout spacing
//! - Which node types are composites (must own children)
//! - Defaults applied to new documents

use crate::layout::LayoutConfig;
use crate::validation::NodeRuleRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "graph_engine.ron";

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON for these settings
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be encoded
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// File was written by a newer build
    #[error("Settings version {found} is newer than supported version {supported}")]
    NewerVersion {
        /// Version in the file
        found: u32,
        /// Version this build writes
        supported: u32,
    },
}

/// Configuration for the graph engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphEngineSettings {
    /// Settings format version
    pub version: u32,
    /// Undo steps kept per document
    pub history_depth: usize,
    /// Auto-layout parameters. The direction is taken from each document.
    pub layout: LayoutConfig,
    /// Node types that must own at least one child
    pub composite_node_types: Vec<String>,
    /// Author written into new documents
    pub default_author: String,
    /// Pretty-print saved JSON
    pub pretty_json: bool,
}

impl Default for GraphEngineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            history_depth: crate::history::MAX_HISTORY,
            layout: LayoutConfig::default(),
            composite_node_types: vec!["BT_Selector".to_string(), "BT_Sequence".to_string()],
            default_author: "Unknown".to_string(),
            pretty_json: true,
        }
    }
}

impl GraphEngineSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: GraphEngineSettings = ron::from_str(&content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::NewerVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        tracing::info!("Loaded graph engine settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults if the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(err) => {
                tracing::warn!("Using default graph settings: {err}");
                Self::default()
            }
        }
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validation rules derived from these settings
    pub fn rule_registry(&self) -> NodeRuleRegistry {
        NodeRuleRegistry::with_composites(self.composite_node_types.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor_state::LayoutDirection;

    #[test]
    fn test_default_settings() {
        let settings = GraphEngineSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert_eq!(settings.history_depth, 100);
        assert!(settings.rule_registry().has_rules("BT_Selector"));
        assert!(settings.rule_registry().has_rules("BT_Sequence"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        let mut settings = GraphEngineSettings::default();
        settings.history_depth = 25;
        settings.layout.direction = LayoutDirection::BottomToTop;
        settings.composite_node_types.push("BT_Parallel".to_string());
        settings.save(&path).unwrap();

        let loaded = GraphEngineSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: GraphEngineSettings = ron::from_str("(history_depth: 8)").unwrap();
        assert_eq!(settings.history_depth, 8);
        assert_eq!(settings.layout, LayoutConfig::default());
        assert!(settings.pretty_json);
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "(version: 99)").unwrap();

        assert!(matches!(
            GraphEngineSettings::load(&path),
            Err(SettingsError::NewerVersion { found: 99, .. })
        ));
        assert_eq!(
            GraphEngineSettings::load_or_default(&path),
            GraphEngineSettings::default()
        );
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let settings = GraphEngineSettings::load_or_default(&dir.path().join("absent.ron"));
        assert_eq!(settings, GraphEngineSettings::default());
    }
}
