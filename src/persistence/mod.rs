//! Durable client-side storage: two independent JSON slots, one for the
//! session collection and one for the theme preference.
//!
//! Loads never fail: a missing slot or an unparsable payload yields the
//! empty default, so a future incompatible schema degrades to a fresh start
//! instead of an error. Saves replace the whole slot atomically; last write
//! wins. There is no transactionality across the two slots.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::session::ChatSession;

const SESSIONS_SLOT: &str = "chat-history.json";
const THEME_SLOT: &str = "theme.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePreference {
    pub mode: ThemeMode,
}

impl Default for ThemePreference {
    fn default() -> Self {
        ThemePreference {
            mode: ThemeMode::Dark,
        }
    }
}

#[derive(Debug)]
pub enum PersistenceError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            PersistenceError::Serialize { path, source } => {
                write!(f, "Failed to serialize {}: {}", path.display(), source)
            }
        }
    }
}

impl StdError for PersistenceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PersistenceError::Io { source, .. } => Some(source),
            PersistenceError::Serialize { source, .. } => Some(source),
        }
    }
}

/// Handle on the storage directory holding both slots.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    /// Store rooted at the platform data directory.
    pub fn open() -> Self {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "causerie")
            .expect("Failed to determine data directory");
        HistoryStore {
            root: proj_dirs.data_dir().to_path_buf(),
        }
    }

    /// Store rooted at an explicit directory. Used by tests and anything
    /// that wants an isolated history.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        HistoryStore { root: root.into() }
    }

    pub fn load_sessions(&self) -> Vec<ChatSession> {
        self.load_slot(SESSIONS_SLOT)
    }

    pub fn save_sessions(&self, sessions: &[ChatSession]) -> Result<(), PersistenceError> {
        self.save_slot(SESSIONS_SLOT, &sessions)
    }

    pub fn load_theme(&self) -> ThemePreference {
        self.load_slot(THEME_SLOT)
    }

    pub fn save_theme(&self, theme: &ThemePreference) -> Result<(), PersistenceError> {
        self.save_slot(THEME_SLOT, theme)
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.root.join(slot)
    }

    fn load_slot<T: DeserializeOwned + Default>(&self, slot: &str) -> T {
        let path = self.slot_path(slot);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(_) => return T::default(),
        };

        match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "discarding unparsable slot");
                T::default()
            }
        }
    }

    fn save_slot<T: Serialize>(&self, slot: &str, value: &T) -> Result<(), PersistenceError> {
        let path = self.slot_path(slot);
        fs::create_dir_all(&self.root).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;

        let contents =
            serde_json::to_string(value).map_err(|source| PersistenceError::Serialize {
                path: path.clone(),
                source,
            })?;

        let io_err = |source| PersistenceError::Io {
            path: path.clone(),
            source,
        };

        let mut temp_file = NamedTempFile::new_in(&self.root).map_err(io_err)?;
        temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file.persist(&path).map_err(|e| PersistenceError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}
