use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use kmol_core::TextEncoding;
use kmol_project::{OutlineOptions, ParserOptions, TangleOptions};

use crate::recent::RecentProjects;

const PREFERENCES_VERSION: u32 = 1;
const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// User configuration: parser and serializer behaviour, file handling, macros,
/// and the projects to reopen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub parser: ParserOptions,
    #[serde(default)]
    pub tangle: TangleOptions,
    #[serde(default)]
    pub files: FilePreferences,
    #[serde(default)]
    pub macros: MacroPreferences,
    #[serde(default)]
    pub recent: RecentProjects,
    /// Roots open at the end of the last session, in tree order.
    #[serde(default)]
    pub prev_open: Vec<PathBuf>,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            parser: ParserOptions::default(),
            tangle: TangleOptions::default(),
            files: FilePreferences::default(),
            macros: MacroPreferences::default(),
            recent: RecentProjects::default(),
            prev_open: Vec::new(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.files.sanitize();
        self.macros.sanitize();
        self.recent.sanitize();
        let mut seen = Vec::with_capacity(self.prev_open.len());
        self.prev_open.retain(|path| {
            if path.as_os_str().is_empty() || seen.contains(path) {
                return false;
            }
            seen.push(path.clone());
            true
        });
    }

    /// Load/save options for an [`kmol_project::Outline`].
    pub fn outline_options(&self) -> OutlineOptions {
        OutlineOptions {
            parser: self.parser,
            tangle: self.tangle,
            read_encoding: self.files.read_encoding,
        }
    }

    /// Records the roots open at exit.
    pub fn remember_open<I, P>(&mut self, roots: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.prev_open = roots.into_iter().map(Into::into).collect();
        self.sanitize();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePreferences {
    /// Decoding fallback for files that are not UTF-8; unset lets the detector guess.
    #[serde(default)]
    pub read_encoding: Option<TextEncoding>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    1000
}

impl Default for FilePreferences {
    fn default() -> Self {
        Self {
            read_encoding: None,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl FilePreferences {
    fn sanitize(&mut self) {
        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = default_poll_interval();
        }
        self.poll_interval_ms = self
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroPreferences {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_interpreter_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_interpreter_args() -> Vec<String> {
    vec!["-".to_string()]
}

impl Default for MacroPreferences {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            args: default_interpreter_args(),
            timeout_secs: None,
        }
    }
}

impl MacroPreferences {
    fn sanitize(&mut self) {
        if self.interpreter.trim().is_empty() {
            self.interpreter = default_interpreter();
            self.args = default_interpreter_args();
        }
        if self.timeout_secs == Some(0) {
            self.timeout_secs = None;
        }
    }
}

#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        Self {
            path: path.into(),
            data: preferences,
        }
    }

    /// Missing files yield sanitized defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(
                "event=preferences_default module=settings path={}",
                path.display()
            );
            let mut data = Preferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: Preferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        info!(
            "event=preferences_loaded module=settings path={} recent={}",
            path.display(),
            data.recent.len()
        );
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), PreferencesError>
    where
        F: FnMut(&mut Preferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    /// Writes through a temp file and a rename.
    pub fn save(&self) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            PreferencesError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(
            "event=preferences_saved module=settings path={}",
            self.path.display()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
