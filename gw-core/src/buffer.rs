//! Line reassembly for one input channel.
//!
//! The controller writes JSON lines to a serial port, and the transport
//! hands them over in arbitrary fragments. [`LineBuffer`] accumulates the
//! fragments and releases lines only when the latest fragment ends with a
//! terminator:
//! - a fragment not ending in `\n` is retained, even if the accumulated
//!   bytes already contain terminators
//! - a fragment ending in `\n` flushes the whole buffer as lines
//! - the unterminated tail is bounded; overflow drops it
//!
//! Bytes are buffered raw so a UTF-8 sequence split across fragments is
//! decoded intact once the line completes.

use crate::ReassemblyError;

/// Default bound for the unterminated tail, in bytes.
pub const DEFAULT_MAX_PENDING: usize = 64 * 1024;

const TERMINATOR: u8 = b'\n';

/// Reassembly buffer for a single channel.
#[derive(Debug)]
pub struct LineBuffer {
    /// Bytes received since the last flush.
    pending: Vec<u8>,
    /// Maximum size of `pending` while unterminated.
    max_pending: usize,
}

impl LineBuffer {
    /// Create a buffer with the given pending-tail limit.
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_pending,
        }
    }

    /// Append a fragment and return any completed lines.
    ///
    /// Lines are returned without their terminator. An overflowing
    /// unterminated tail is discarded and reported; the buffer is then empty
    /// and ready for the next fragment.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Vec<String>, ReassemblyError> {
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        self.pending.extend_from_slice(fragment);

        if fragment.last() != Some(&TERMINATOR) {
            if self.pending.len() > self.max_pending {
                let discarded = self.pending.len();
                self.pending.clear();
                return Err(ReassemblyError::Overflow {
                    discarded,
                    limit: self.max_pending,
                });
            }
            return Ok(Vec::new());
        }

        let bytes = std::mem::take(&mut self.pending);
        let body = &bytes[..bytes.len() - 1];
        Ok(body
            .split(|b| *b == TERMINATOR)
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect())
    }

    /// Number of bytes waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no bytes are pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Configured pending-tail limit.
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}
