//! Side channels - auxiliary outputs written by the backend to files
//!
//! Every invocation gets its own private directory (created on first
//! reservation). Reserved files are removed when consumed and whatever is left
//! is removed when the [`SideChannels`] guard is dropped, so error paths clean
//! up the same way as the happy path.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::TempDirLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideChannel {
    SessionKeyOut,
    VerifyOut,
    SignaturesOut,
    MicAlgOut,
}

impl SideChannel {
    pub fn file_name(self) -> &'static str {
        match self {
            SideChannel::SessionKeyOut => "session-key-out",
            SideChannel::VerifyOut => "verify-out",
            SideChannel::SignaturesOut => "signatures-out",
            SideChannel::MicAlgOut => "micalg-out",
        }
    }
}

/// Scoped owner of one invocation's side-channel files.
#[derive(Debug)]
pub struct SideChannels {
    location: TempDirLocation,
    dir: Option<TempDir>,
    reserved: Vec<(SideChannel, PathBuf)>,
}

impl SideChannels {
    pub fn new(location: TempDirLocation) -> Self {
        Self {
            location,
            dir: None,
            reserved: Vec::new(),
        }
    }

    fn dir(&mut self) -> io::Result<&Path> {
        if self.dir.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("sop-");
            let dir = match &self.location {
                TempDirLocation::System => builder.tempdir()?,
                TempDirLocation::In(parent) => builder.tempdir_in(parent)?,
            };
            debug!(dir = %dir.path().display(), "created side-channel directory");
            self.dir = Some(dir);
        }
        match &self.dir {
            Some(dir) => Ok(dir.path()),
            None => Err(io::Error::new(io::ErrorKind::Other, "side-channel directory missing")),
        }
    }

    /// Path the backend should write `channel` to. Any stale file is removed first.
    pub fn reserve(&mut self, channel: SideChannel) -> io::Result<PathBuf> {
        if let Some(path) = self.path(channel) {
            return Ok(path.to_path_buf());
        }

        let path = self.dir()?.join(channel.file_name());
        discard(&path)?;
        self.reserved.push((channel, path.clone()));
        Ok(path)
    }

    pub fn path(&self, channel: SideChannel) -> Option<&Path> {
        self.reserved
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, p)| p.as_path())
    }

    /// Read and delete what the backend wrote. `None` when it wrote nothing or
    /// the channel was never reserved.
    pub fn consume(&mut self, channel: SideChannel) -> io::Result<Option<Zeroizing<Vec<u8>>>> {
        let Some(index) = self.reserved.iter().position(|(c, _)| *c == channel) else {
            return Ok(None);
        };
        let (_, path) = self.reserved.remove(index);

        let read = std::fs::read(&path);
        discard(&path)?;
        match read {
            Ok(data) => Ok(Some(Zeroizing::new(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for SideChannels {
    fn drop(&mut self) {
        for (channel, path) in self.reserved.drain(..) {
            if let Err(e) = discard(&path) {
                debug!(channel = channel.file_name(), error = %e, "failed to remove side-channel file");
            }
        }
        // The TempDir removes the directory itself.
    }
}

/// Remove `path` if it exists. Removing a missing file is not an error.
pub fn discard(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
