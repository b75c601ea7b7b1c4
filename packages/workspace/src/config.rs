use redline_editor::EditMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{WorkspaceError, WorkspaceResult};

pub const DEFAULT_CONFIG_NAME: &str = "redline.config.json";

/// Redline configuration file format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Number of documents kept resident before the least recent is evicted
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,

    /// Author used when none was given and no session author exists yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_author: Option<String>,

    /// Mode for edits that do not pass one
    #[serde(default)]
    pub edit_mode: EditMode,

    /// Last resort when the environment names no user either
    #[serde(default = "default_fallback_author")]
    pub fallback_author: String,
}

fn default_max_documents() -> usize {
    10
}

fn default_fallback_author() -> String {
    "Reviewer".to_string()
}

impl WorkspaceConfig {
    /// Load config from a directory
    pub fn load(dir: &Path) -> WorkspaceResult<Self> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content).map_err(|err| WorkspaceError::Config {
                path: config_path.clone(),
                message: err.to_string(),
            })?
        } else {
            // Return default config if none exists
            WorkspaceConfig::default()
        };

        if config.max_documents == 0 {
            return Err(WorkspaceError::Config {
                path: config_path,
                message: "maxDocuments must be at least 1".to_string(),
            });
        }
        tracing::debug!(?config, "loaded workspace config");
        Ok(config)
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            default_author: None,
            edit_mode: EditMode::default(),
            fallback_author: default_fallback_author(),
        }
    }
}
