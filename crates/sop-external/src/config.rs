//! Adapter configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where per-invocation scratch directories are created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TempDirLocation {
    /// The platform temp dir (`$TMPDIR`, `/tmp`, ...)
    #[default]
    System,
    /// Inside a caller-supplied directory. A unique subdirectory is still created.
    In(PathBuf),
}

/// How the external `sop` binary is invoked.
#[derive(Debug, Clone)]
pub struct ExternalConfig {
    /// Path (or `$PATH` name) of the backend executable
    pub binary: PathBuf,
    /// Extra variables merged over the ambient environment of every invocation
    pub environment: BTreeMap<String, String>,
    pub temp_dir: TempDirLocation,
    /// Working directory of the child; inherited when unset
    pub working_dir: Option<PathBuf>,
    /// Deadline for one whole invocation, after which the child is killed
    pub timeout: Option<Duration>,
    /// Maximum stderr bytes kept for diagnostics
    pub stderr_limit: usize,
}

impl ExternalConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            environment: BTreeMap::new(),
            temp_dir: TempDirLocation::System,
            working_dir: None,
            timeout: None,
            stderr_limit: 64 * 1024, // 64KB
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_temp_dir(mut self, location: TempDirLocation) -> Self {
        self.temp_dir = location;
        self
    }

    pub fn in_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
