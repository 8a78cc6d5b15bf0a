// Audit sink that writes each entry as one `tracing` event under the
// `audit` target, so `RUST_LOG=audit=info` isolates the trail.

use crate::core::notifier::{AuditEntry, AuditSink};

pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        match serde_json::to_string(&entry) {
            Ok(line) => tracing::info!(
                target: "audit",
                actor = %entry.actor,
                action = ?entry.action,
                "{}",
                line
            ),
            Err(e) => tracing::error!(target: "audit", "Failed to serialize audit entry: {}", e),
        }
    }
}
