//! Engine configuration
//!
//! Defaults, optionally overlaid with a JSON file and with `QA_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::CheckContext;
use crate::error::{QaError, Result};
use crate::undo::DEFAULT_UNDO_LEVELS;
use crate::workflow::RunOptions;

pub const PERSISTENCE_ENABLED_VAR: &str = "QA_PERSISTENCE_ENABLED";
pub const UNDO_LEVELS_VAR: &str = "QA_UNDO_LEVELS";
pub const LOG_CHECK_PROGRESS_VAR: &str = "QA_LOG_CHECK_PROGRESS";
pub const WORKFLOW_DIR_VAR: &str = "QA_WORKFLOW_DIR";

/// Configuration of the check engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QaConfig {
    /// Persist cached results to the blob store
    pub persistence_enabled: bool,
    /// Number of undo chunks kept per context
    pub undo_levels: usize,
    /// Log each check outcome at info level instead of debug
    pub log_check_progress: bool,
    /// Directory scanned for workflow description files
    pub workflow_dir: Option<PathBuf>,
    /// Reject batches mixing checks of several workflows
    pub single_workflow: bool,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            persistence_enabled: false,
            undo_levels: DEFAULT_UNDO_LEVELS,
            log_check_progress: false,
            workflow_dir: None,
            single_workflow: false,
        }
    }
}

impl QaConfig {
    /// Defaults overlaid with the `QA_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read a JSON config file; missing fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Overlay values from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(PERSISTENCE_ENABLED_VAR) {
            self.persistence_enabled = parse_bool(PERSISTENCE_ENABLED_VAR, &value)?;
        }
        if let Some(value) = lookup(UNDO_LEVELS_VAR) {
            self.undo_levels = value.trim().parse().map_err(|_| {
                QaError::Config(format!("{} must be a number, got '{}'", UNDO_LEVELS_VAR, value))
            })?;
        }
        if let Some(value) = lookup(LOG_CHECK_PROGRESS_VAR) {
            self.log_check_progress = parse_bool(LOG_CHECK_PROGRESS_VAR, &value)?;
        }
        if let Some(value) = lookup(WORKFLOW_DIR_VAR) {
            self.workflow_dir = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        Ok(())
    }

    /// Run options for a query pass that reuses cached results
    pub fn run_options(&self) -> RunOptions {
        RunOptions::default().with_single_workflow(self.single_workflow)
    }

    /// A fresh context with the configured undo depth
    pub fn context(&self) -> CheckContext {
        CheckContext::with_undo_levels(self.undo_levels)
    }
}

/// Accepts 1/0, true/false, yes/no and on/off
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(QaError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}
