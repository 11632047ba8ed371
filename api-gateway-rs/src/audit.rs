//! Audit dispatch
//!
//! [`AuditLogger::log`] writes an entry and waits for the sink.
//! [`AuditLogger::log_async`] hands the entry to a background task and returns
//! at once. Sink failures on either path are logged locally and never reach
//! the caller.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collaborators::{AuditEntry, AuditError, AuditSink};

pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    sender: Mutex<Option<mpsc::UnboundedSender<AuditEntry>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditLogger {
    /// Starts the background dispatcher. Must be called inside a tokio runtime.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditEntry>();
        let worker_sink = sink.clone();
        let worker = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                deliver(worker_sink.as_ref(), &entry).await;
            }
            debug!("Audit dispatcher drained");
        });

        Self {
            sink,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Writes `entry` and waits for the sink to accept or reject it
    pub async fn log(&self, entry: AuditEntry) {
        deliver(self.sink.as_ref(), &entry).await;
    }

    /// Queues `entry` for background delivery
    pub fn log_async(&self, entry: AuditEntry) {
        let sender = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        let result = match sender.as_ref() {
            Some(tx) => tx.send(entry).map_err(|_| AuditError::Closed),
            None => Err(AuditError::Closed),
        };
        if let Err(err) = result {
            counter!("gateway.audit.dropped", 1);
            warn!(error = %err, "Audit entry dropped");
        }
    }

    /// Stops accepting entries and waits until queued ones are delivered
    pub async fn shutdown(&self) {
        self.sender.lock().unwrap_or_else(|p| p.into_inner()).take();
        let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "Audit dispatcher task failed");
            }
        }
    }
}

async fn deliver(sink: &dyn AuditSink, entry: &AuditEntry) {
    if let Err(err) = sink.log(entry).await {
        counter!("gateway.audit.failures", 1);
        warn!(event = %entry.event, user_id = %entry.user_id, error = %err, "Failed to write audit entry");
    }
}

/// Writes audit entries to the `audit` tracing target
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        info!(
            target: "audit",
            event = %entry.event,
            user_id = %entry.user_id,
            resource_id = ?entry.resource_id,
            severity = ?entry.severity,
            details = %entry.details,
            "Audit event"
        );
        Ok(())
    }
}

/// Keeps audit entries in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.event).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn log(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::AuditSeverity;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn log(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
            Err(AuditError::Rejected("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_log_async_is_delivered_by_shutdown() {
        let sink = Arc::new(MemoryAuditSink::default());
        let logger = AuditLogger::new(sink.clone());

        for i in 0..5 {
            logger.log_async(AuditEntry::new(format!("event_{}", i), "u1", AuditSeverity::Info));
        }
        logger.shutdown().await;

        assert_eq!(sink.events(), vec!["event_0", "event_1", "event_2", "event_3", "event_4"]);
    }

    #[tokio::test]
    async fn test_sink_failures_are_swallowed() {
        let logger = AuditLogger::new(Arc::new(FailingSink));
        logger.log(AuditEntry::new("command_blocked", "u1", AuditSeverity::Critical)).await;
        logger.log_async(AuditEntry::new("command_queued", "u1", AuditSeverity::Info));
        logger.shutdown().await;
    }

    #[tokio::test]
    async fn test_entries_after_shutdown_are_dropped() {
        let sink = Arc::new(MemoryAuditSink::default());
        let logger = AuditLogger::new(sink.clone());
        logger.shutdown().await;

        logger.log_async(AuditEntry::new("late", "u1", AuditSeverity::Info));
        assert!(sink.entries().is_empty());
    }
}
