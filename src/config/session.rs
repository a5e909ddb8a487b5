//! Session state persistence
//!
//! Remembers the last opened course and the position within each course so
//! the CLI can resume where the learner left off.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Config;
use crate::course::ItemKey;

/// All session state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Currently open course ID (if any)
    pub current_course_id: Option<String>,
    /// Last position per course (key is course ID)
    #[serde(default)]
    pub positions: HashMap<String, ItemKey>,
}

impl Session {
    /// Load session from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::session_path()?)
    }

    /// Load session from a specific file, empty if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session from {:?}", path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse session.json")
        } else {
            Ok(Self::default())
        }
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::session_path()?)
    }

    /// Save session to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize session")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write session to {:?}", path))?;

        Ok(())
    }

    /// Get the path to the session file
    pub fn session_path() -> Result<PathBuf> {
        Ok(Config::data_dir()?.join("session.json"))
    }

    /// Make a course current, keeping any position saved for it
    pub fn open(&mut self, course_id: &str) {
        self.current_course_id = Some(course_id.to_string());
    }

    /// Record the position within a course
    pub fn set_position(&mut self, course_id: &str, key: ItemKey) {
        self.positions.insert(course_id.to_string(), key);
    }

    /// Saved position for a course (if any)
    pub fn position(&self, course_id: &str) -> Option<&ItemKey> {
        self.positions.get(course_id)
    }
}
