//! File-backed serial mirror.

use std::io::Write;
use std::path::{Path, PathBuf};

use gw_service::SerialLog;
use gw_types::ChannelId;

/// Appends every raw fragment to `{directory}/{prefix}serial_{channel}.log`,
/// wrapped as `>>fragment<< `.
#[derive(Debug, Clone)]
pub struct FileSerialLog {
    directory: PathBuf,
    prefix: String,
}

impl FileSerialLog {
    /// Create the mirror, creating `directory` if needed.
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> std::io::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            prefix: prefix.into(),
        })
    }

    /// Mirror file of one channel.
    pub fn path_for(&self, channel: &ChannelId) -> PathBuf {
        self.directory
            .join(format!("{}serial_{}.log", self.prefix, channel))
    }

    /// Directory of the mirror files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl SerialLog for FileSerialLog {
    fn append(&self, channel: &ChannelId, fragment: &[u8]) -> std::io::Result<()> {
        let mut entry = Vec::with_capacity(fragment.len() + 5);
        entry.extend_from_slice(b">>");
        entry.extend_from_slice(fragment);
        entry.extend_from_slice(b"<< ");

        // One write per fragment so appends from concurrent feeds stay whole.
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(channel))?
            .write_all(&entry)
    }
}
