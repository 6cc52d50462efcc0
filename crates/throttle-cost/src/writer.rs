// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Non-blocking front end for the routing log.
//!
//! Request handlers call [`LogWriter::append`], which only enqueues. A single
//! background task owns the inserts, so a slow disk never stalls a response.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::ledger::{LogEntry, RoutingLog};

/// Default number of entries that may wait for the writer task.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Cloneable, synchronous handle used to append log entries.
#[derive(Debug, Clone)]
pub struct LogWriter {
    tx: mpsc::Sender<LogEntry>,
}

impl LogWriter {
    /// Spawn the writer task on the current runtime.
    ///
    /// The task exits once every `LogWriter` clone is dropped and the queue is
    /// drained; await the returned handle to flush on shutdown.
    pub fn spawn(log: RoutingLog, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<LogEntry>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = log.insert(&entry).await {
                    error!(request_id = %entry.request_id, error = %e, "failed to write routing log entry");
                }
            }
            debug!("routing log writer drained");
        });
        (Self { tx }, handle)
    }

    /// Enqueue an entry without waiting.
    ///
    /// Returns `false` (and drops the entry) if the queue is full or the writer
    /// task has stopped.
    pub fn append(&self, entry: LogEntry) -> bool {
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(entry)) => {
                warn!(request_id = %entry.request_id, "routing log queue full, dropping entry");
                false
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                warn!(request_id = %entry.request_id, "routing log writer stopped, dropping entry");
                false
            }
        }
    }
}
