//! Log settings for artifact processes
//!
//! A [`LogConfig`] picks the base level, the console and file sinks and any
//! per-target overrides. Presets cover an interactive run, a deployment
//! writing JSONL files, a single artifact with its own log file, and tests.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name prefix when none is given
pub const DEFAULT_PREFIX: &str = "artifact";

/// Target of the in-memory network, which logs every routed stanza
pub const TRANSPORT_TARGET: &str = "artifact_core::memory_transport";

/// Target of the dispatch bridge, which logs every dropped stanza
pub const DISPATCH_TARGET: &str = "artifact_node::dispatch";

/// What to log and where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Base filter directive, ignored when `RUST_LOG` is set
    pub level: String,

    pub console: ConsoleConfig,

    /// Rolling or single JSONL file, off when `None`
    pub file: Option<FileConfig>,

    /// Shape of JSONL records, on console and in files
    pub jsonl: JsonlConfig,

    /// Per-target levels, e.g. `artifact_node::dispatch = "trace"`
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleConfig::jsonl(),
            file: None,
            jsonl: JsonlConfig::default(),
            targets: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Readable, colored console at debug
    ///
    /// Per-stanza routing chatter from the in-memory network stays at info.
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: ConsoleConfig::pretty(),
            ..Default::default()
        }
        .with_target(TRANSPORT_TARGET, "info")
    }

    /// JSONL files under `log_dir`, nothing on the console
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig::disabled(),
            file: Some(FileConfig {
                directory: log_dir,
                max_files: Some(14),
                ..FileConfig::default()
            }),
            ..Default::default()
        }
    }

    /// One artifact writing to its own daily file under `log_dir`
    ///
    /// The file is named after `name`, so several artifacts can share a
    /// directory.
    pub fn per_artifact(log_dir: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            console: ConsoleConfig::disabled(),
            file: Some(FileConfig::for_artifact(log_dir, name)),
            ..Default::default()
        }
    }

    /// Warnings only, plain console
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// Set the level for a single target
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.targets.insert(target.into(), level.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    pub ansi: bool,
}

impl ConsoleConfig {
    /// JSONL records on stdout
    pub fn jsonl() -> Self {
        Self {
            enabled: true,
            pretty: false,
            ansi: false,
        }
    }

    pub fn pretty() -> Self {
        Self {
            enabled: true,
            pretty: true,
            ansi: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::jsonl()
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self::jsonl()
    }
}

/// JSONL log files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Created on init if missing
    pub directory: PathBuf,
    /// File name before the date and `.log`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Rotated files kept, all when `None`
    pub max_files: Option<usize>,
}

impl FileConfig {
    /// Daily files prefixed `artifact-<name>`
    ///
    /// Characters outside `[A-Za-z0-9_-]` in `name` become `_`, so a full
    /// address such as `bot@example.org` is a valid prefix.
    pub fn for_artifact(directory: impl Into<PathBuf>, name: &str) -> Self {
        let name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        Self {
            directory: directory.into(),
            prefix: format!("{}-{}", DEFAULT_PREFIX, name),
            ..Self::default()
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: DEFAULT_PREFIX.to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One `<prefix>.log`, truncated on init
    Never,
}

/// Which span and source details each JSONL record carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlConfig {
    /// Event fields at the top level rather than under `fields`
    pub flatten_events: bool,
    pub include_spans: bool,
    pub include_current_span: bool,
    pub include_thread_info: bool,
    /// Source file and line
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_current_span: true,
            include_thread_info: false,
            include_location: true,
        }
    }
}
