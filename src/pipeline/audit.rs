//! Audit trail of document generation.
//!
//! Entries carry identifiers and outcomes only, never answer content. The
//! orchestrator hands entries to a bounded queue; a background task drains
//! it into an [`AuditSink`]. A full queue drops the entry and counts it, so
//! a slow sink never stalls generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PdfGenerationStart,
    PdfSectionError,
    PdfGenerationSuccess,
    PdfGenerationError,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::PdfGenerationStart => "PDF_GENERATION_START",
            AuditAction::PdfSectionError => "PDF_SECTION_ERROR",
            AuditAction::PdfGenerationSuccess => "PDF_GENERATION_SUCCESS",
            AuditAction::PdfGenerationError => "PDF_GENERATION_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub user_id: String,
    pub response_id: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    /// Action-specific fields: checksum and size, error code, section name.
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, user_id: &str, response_id: &str, request_id: &str) -> Self {
        Self {
            action,
            user_id: user_id.to_string(),
            response_id: response_id.to_string(),
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Where drained audit entries end up.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Writes each entry as one structured log line on the `audit` target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            action = event.action.as_str(),
            user_id = %event.user_id,
            response_id = %event.response_id,
            request_id = %event.request_id,
            details = %event.details,
            "{}",
            event.action.as_str()
        );
    }
}

/// Keeps entries in memory, for embedding and tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events().iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) {
        let mut guard = match self.events.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(event);
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    recorded: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub accepted: u64,
    pub recorded: u64,
    pub dropped: u64,
}

/// Bounded audit queue with a background writer.
#[derive(Clone)]
pub struct AuditQueue {
    tx: mpsc::Sender<AuditEvent>,
    counters: Arc<Counters>,
}

impl AuditQueue {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(capacity.max(1));
        let counters = Arc::new(Counters::default());

        let writer_counters = Arc::clone(&counters);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.record(event).await;
                writer_counters.recorded.fetch_add(1, Ordering::SeqCst);
            }
        });

        Self { tx, counters }
    }

    /// Queue an entry without waiting. Returns false when it was dropped.
    pub fn submit(&self, event: AuditEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(mpsc::error::TrySendError::Full(event))
            | Err(mpsc::error::TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    action = event.action.as_str(),
                    request_id = %event.request_id,
                    "Audit entry dropped"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            recorded: self.counters.recorded.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
        }
    }

    /// Wait until every accepted entry has reached the sink.
    pub async fn flush(&self) {
        loop {
            let stats = self.stats();
            if stats.recorded >= stats.accepted {
                return;
            }
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StuckSink;

    #[async_trait]
    impl AuditSink for StuckSink {
        async fn record(&self, _event: AuditEvent) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn entries_reach_the_sink_in_order() {
        let sink = Arc::new(MemoryAuditSink::new());
        let queue = AuditQueue::spawn(sink.clone(), 16);

        assert!(queue.submit(AuditEvent::new(AuditAction::PdfGenerationStart, "u1", "resp_1", "pdf_1_resp_1")));
        assert!(queue.submit(
            AuditEvent::new(AuditAction::PdfGenerationSuccess, "u1", "resp_1", "pdf_1_resp_1")
                .with_details(json!({"checksum": "abcd", "size_bytes": 1200}))
        ));
        queue.flush().await;

        assert_eq!(
            sink.actions(),
            vec![AuditAction::PdfGenerationStart, AuditAction::PdfGenerationSuccess]
        );
        assert_eq!(sink.events()[1].details["size_bytes"], 1200);
        assert_eq!(queue.stats(), AuditStats { accepted: 2, recorded: 2, dropped: 0 });
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let queue = AuditQueue::spawn(Arc::new(StuckSink), 1);
        let event = || AuditEvent::new(AuditAction::PdfSectionError, "u1", "resp_1", "pdf_1_resp_1");

        // The writer holds at most one entry, the buffer one more.
        assert!(queue.submit(event()));
        tokio::task::yield_now().await;
        let kept = (0..9).filter(|_| queue.submit(event())).count();

        let stats = queue.stats();
        assert!(kept <= 1);
        assert_eq!(stats.accepted + stats.dropped, 10);
        assert!(stats.dropped >= 8);
        assert_eq!(stats.recorded, 0);
    }

    #[test]
    fn action_names_match_log_markers() {
        assert_eq!(AuditAction::PdfGenerationError.as_str(), "PDF_GENERATION_ERROR");
        assert_eq!(
            serde_json::to_value(AuditAction::PdfGenerationStart).unwrap(),
            json!("PDF_GENERATION_START")
        );
    }
}
