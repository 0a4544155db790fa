//! Input side of the pipeline: serial mirroring and per-channel buffers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use gw_core::{LineBuffer, DEFAULT_MAX_PENDING};
use gw_types::ChannelId;

/// Append-only sink mirroring every raw fragment, tagged by channel.
pub trait SerialLog: Send + Sync {
    /// Append one raw fragment.
    fn append(&self, channel: &ChannelId, fragment: &[u8]) -> std::io::Result<()>;
}

/// Sink that discards fragments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSerialLog;

impl SerialLog for NullSerialLog {
    fn append(&self, _channel: &ChannelId, _fragment: &[u8]) -> std::io::Result<()> {
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySerialLog {
    entries: Arc<Mutex<Vec<(ChannelId, Vec<u8>)>>>,
}

impl MemorySerialLog {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ChannelId, Vec<u8>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All fragments appended so far.
    pub fn entries(&self) -> Vec<(ChannelId, Vec<u8>)> {
        self.lock().clone()
    }

    /// Fragments appended for one channel, concatenated.
    pub fn stream(&self, channel: &ChannelId) -> Vec<u8> {
        self.lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .flat_map(|(_, fragment)| fragment.iter().copied())
            .collect()
    }
}

impl SerialLog for MemorySerialLog {
    fn append(&self, channel: &ChannelId, fragment: &[u8]) -> std::io::Result<()> {
        self.lock().push((channel.clone(), fragment.to_vec()));
        Ok(())
    }
}

/// Per-channel line buffers, created on first use.
#[derive(Debug)]
pub struct ChannelHub {
    buffers: DashMap<ChannelId, Arc<tokio::sync::Mutex<LineBuffer>>>,
    max_pending: usize,
}

impl ChannelHub {
    /// Create a hub whose buffers use the given pending-tail limit.
    pub fn new(max_pending: usize) -> Self {
        Self {
            buffers: DashMap::new(),
            max_pending,
        }
    }

    /// Buffer for `channel`, created if needed.
    ///
    /// Holding the returned lock gives exclusive, FIFO access to the channel.
    pub fn buffer(&self, channel: &ChannelId) -> Arc<tokio::sync::Mutex<LineBuffer>> {
        self.buffers
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(LineBuffer::new(self.max_pending))))
            .clone()
    }

    /// Number of channels seen.
    pub fn channel_count(&self) -> usize {
        self.buffers.len()
    }

    /// Channels seen so far.
    pub fn channels(&self) -> Vec<ChannelId> {
        self.buffers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_keeps_channels_apart() {
        let log = MemorySerialLog::new();
        let a = ChannelId::from("ttyUSB0");
        let b = ChannelId::from("ttyUSB1");
        log.append(&a, b"{\"x\":").unwrap();
        log.append(&b, b"noise").unwrap();
        log.append(&a, b"1}\n").unwrap();

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.stream(&a), b"{\"x\":1}\n");
        assert_eq!(log.stream(&b), b"noise");
    }

    #[tokio::test]
    async fn hub_creates_buffers_lazily() {
        let hub = ChannelHub::new(16);
        assert_eq!(hub.channel_count(), 0);

        let channel = ChannelId::generic();
        let first = hub.buffer(&channel);
        first.lock().await.feed(b"part").unwrap();

        let again = hub.buffer(&channel);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.lock().await.pending_len(), 4);
        assert_eq!(again.lock().await.max_pending(), 16);
        assert_eq!(hub.channel_count(), 1);
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let hub = ChannelHub::default();
        let a = hub.buffer(&ChannelId::from("a"));
        let b = hub.buffer(&ChannelId::from("b"));

        a.lock().await.feed(b"{\"from\":").unwrap();
        let lines = b.lock().await.feed(b"{}\n").unwrap();
        assert_eq!(lines, vec!["{}"]);
        assert_eq!(a.lock().await.pending_len(), 8);
        assert_eq!(hub.channels().len(), 2);
    }
}
