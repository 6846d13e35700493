//! Durable storage of the device state document.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;

use crate::config::{Config, STATE_FILE_NAME};
use crate::error::{AutolightError, Result};
use crate::state::DeviceState;
use crate::validate::validate_update;

/// Load/save contract for [`DeviceState`].
pub trait StateStore {
    /// Load the stored state. Never fails: problems come back as warnings
    /// alongside whatever could be recovered (defaults at worst).
    fn load(&self) -> (DeviceState, Vec<String>);

    fn save(&mut self, state: &DeviceState) -> Result<()>;
}

/// Write `contents` to `path` via a sibling temp file and a rename.
fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Rename can fail across filesystems; fall back to direct write + cleanup
            let result = std::fs::write(path, contents);
            let _ = std::fs::remove_file(&tmp);
            result
        }
    }
}

// ── JSON file ──

/// State stored as a pretty-printed JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    /// `<config dir>/rgbLightState.json`.
    pub fn default_path() -> Option<PathBuf> {
        Config::dir().map(|d| d.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the state file, if it exists.
    pub fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    /// Read the raw document, without validation.
    pub fn read_document(&self) -> Result<Value> {
        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            AutolightError::Document(format!("{}: {e}", self.path.display()))
        })
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> (DeviceState, Vec<String>) {
        let doc = match self.read_document() {
            Ok(doc) => doc,
            Err(AutolightError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return (DeviceState::default(), vec![]);
            }
            Err(e) => {
                let warning = format!("state file unreadable, using defaults: {e}");
                return (DeviceState::default(), vec![warning]);
            }
        };
        let update = match validate_update(&doc) {
            Ok(update) => update,
            Err(e) => {
                let warning = format!(
                    "state file {} rejected, using defaults: {e}",
                    self.path.display()
                );
                return (DeviceState::default(), vec![warning]);
            }
        };
        let warnings = update
            .rejected
            .iter()
            .map(|r| format!("state file {}: dropped {r}", self.path.display()))
            .collect();
        let mut state = DeviceState::default();
        state.merge(update);
        (state, warnings)
    }

    fn save(&mut self, state: &DeviceState) -> Result<()> {
        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| AutolightError::Document(e.to_string()))?;
        write_atomically(&self.path, &contents)?;
        log::debug!("[state] saved {}", self.path.display());
        Ok(())
    }
}

// ── In memory ──

/// Volatile store for tests and dry runs. Counts saves.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub state: Option<DeviceState>,
    pub saves: usize,
    /// If true, `save` fails with an I/O error.
    pub fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state`, as if it had been saved earlier.
    pub fn with_state(state: DeviceState) -> Self {
        MemoryStore {
            state: Some(state),
            ..Self::default()
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> (DeviceState, Vec<String>) {
        (self.state.clone().unwrap_or_default(), vec![])
    }

    fn save(&mut self, state: &DeviceState) -> Result<()> {
        if self.fail_saves {
            return Err(io::Error::other("memory store save failure").into());
        }
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}
