//! Request log sinks.
//!
//! The request server reports every handled request to a [`RequestSink`]
//! handed to it at construction. [`TracingRequestSink`] forwards to the
//! process-wide `tracing` subscriber; [`MemoryRequestSink`] keeps the most
//! recent records in a bounded ring buffer.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::info;

/// One handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// Name of the service that answered.
    pub service: &'static str,
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Destination for request log lines.
pub trait RequestSink: Send + Sync {
    fn record(&self, record: &RequestRecord);
}

/// Emits one `info` event per request, tagged with the service name.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestSink;

impl RequestSink for TracingRequestSink {
    fn record(&self, record: &RequestRecord) {
        info!(
            service = record.service,
            method = %record.method,
            path = %record.path,
            status = record.status,
            "[{}] {} {}",
            record.service,
            record.method,
            record.path
        );
    }
}

/// Keeps the last `capacity` request records in memory.
#[derive(Debug)]
pub struct MemoryRequestSink {
    records: Mutex<VecDeque<RequestRecord>>,
    capacity: usize,
}

impl MemoryRequestSink {
    /// Create a sink retaining at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Snapshot of the retained records, oldest first.
    pub fn records(&self) -> Vec<RequestRecord> {
        self.records
            .lock()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RequestSink for MemoryRequestSink {
    fn record(&self, record: &RequestRecord) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut buf) = self.records.lock() {
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(record.clone());
        }
    }
}
