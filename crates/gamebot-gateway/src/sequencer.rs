//! Sequencer
//!
//! Reorders inbound EVENT envelopes so they leave strictly in increasing `sn`
//! order. Out-of-order frames wait in a bounded buffer; when the buffer grows
//! past its capacity the gap is treated as unrecoverable and delivery skips
//! ahead to the lowest buffered frame. Submission never awaits: whatever is
//! ready is returned from the same call.

use crate::protocol::Envelope;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;

/// An envelope waiting for lower sequence numbers
#[derive(Debug, Clone)]
pub struct BufferedFrame {
    pub envelope: Envelope,
    pub received_at: Instant,
}

/// Read-only view of the sequencer buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferStatus {
    /// Highest sequence number delivered in order
    pub last_delivered: u64,
    /// Frames currently held
    pub buffered: usize,
    pub capacity: usize,
    pub lowest_buffered: Option<u64>,
    pub highest_buffered: Option<u64>,
    /// Sequence numbers given up on by skip-ahead, over the client's lifetime
    pub skipped: u64,
}

/// In-order delivery buffer
#[derive(Debug)]
pub struct Sequencer {
    buffer: BTreeMap<u64, BufferedFrame>,
    last_delivered: u64,
    capacity: usize,
    skipped: u64,
}

impl Sequencer {
    /// Create a sequencer holding at most `capacity` out-of-order frames
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BTreeMap::new(),
            last_delivered: 0,
            capacity,
            skipped: 0,
        }
    }

    #[must_use]
    pub fn last_delivered(&self) -> u64 {
        self.last_delivered
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Snapshot of the buffer
    #[must_use]
    pub fn status(&self) -> BufferStatus {
        BufferStatus {
            last_delivered: self.last_delivered,
            buffered: self.buffer.len(),
            capacity: self.capacity,
            lowest_buffered: self.buffer.keys().next().copied(),
            highest_buffered: self.buffer.keys().next_back().copied(),
            skipped: self.skipped,
        }
    }

    /// Accept an envelope and return everything now deliverable, in order
    ///
    /// Envelopes without `sn` cannot be ordered and are passed straight through.
    pub fn submit(&mut self, envelope: Envelope) -> Vec<Envelope> {
        let Some(sn) = envelope.sn else {
            tracing::debug!("Event without sequence number, delivering unordered");
            return vec![envelope];
        };

        if sn <= self.last_delivered {
            tracing::debug!(
                sn = sn,
                last_delivered = self.last_delivered,
                "Dropping stale or duplicate event"
            );
            return Vec::new();
        }
        if self.buffer.contains_key(&sn) {
            tracing::debug!(sn = sn, "Dropping duplicate buffered event");
            return Vec::new();
        }

        self.buffer.insert(
            sn,
            BufferedFrame {
                envelope,
                received_at: Instant::now(),
            },
        );

        let mut delivered = self.drain_ready();

        if self.buffer.len() > self.capacity {
            self.skip_ahead();
            delivered.extend(self.drain_ready());
        }

        if !self.buffer.is_empty() {
            tracing::trace!(
                last_delivered = self.last_delivered,
                buffered = self.buffer.len(),
                "Waiting for missing events"
            );
        }

        delivered
    }

    /// Deliver every buffered frame in `sn` order, gaps included
    ///
    /// Used before the session is abandoned so received data is not lost.
    pub fn force_drain(&mut self) -> Vec<Envelope> {
        if self.buffer.is_empty() {
            return Vec::new();
        }

        let buffer = std::mem::take(&mut self.buffer);
        if let Some(&highest) = buffer.keys().next_back() {
            tracing::info!(
                frames = buffer.len(),
                from = self.last_delivered,
                to = highest,
                "Force-draining sequencer buffer"
            );
            self.last_delivered = self.last_delivered.max(highest);
        }
        buffer.into_values().map(|frame| frame.envelope).collect()
    }

    /// Restart numbering after `last_delivered`; drops anything still buffered
    pub fn reset(&mut self, last_delivered: u64) {
        if !self.buffer.is_empty() {
            tracing::debug!(dropped = self.buffer.len(), "Discarding buffered events on reset");
        }
        self.buffer.clear();
        self.last_delivered = last_delivered;
    }

    fn drain_ready(&mut self) -> Vec<Envelope> {
        let mut ready = Vec::new();
        while let Some(next) = self.last_delivered.checked_add(1) {
            let Some(frame) = self.buffer.remove(&next) else {
                break;
            };
            self.last_delivered = next;
            ready.push(frame.envelope);
        }
        ready
    }

    fn skip_ahead(&mut self) {
        let Some((&lowest, frame)) = self.buffer.iter().next() else {
            return;
        };
        let gap = lowest - self.last_delivered - 1;
        tracing::warn!(
            last_delivered = self.last_delivered,
            resume_at = lowest,
            gap = gap,
            waited_ms = frame.received_at.elapsed().as_millis(),
            "Sequencer buffer full, skipping missing events"
        );
        self.skipped += gap;
        self.last_delivered = lowest - 1;
    }
}
