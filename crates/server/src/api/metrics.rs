//! Prometheus metrics recording.
//!
//! Per-request counters and latency histograms, labeled by method, path
//! template, and status. The exporter handle lives in `AppState`; the
//! `/metrics` endpoint renders it.

use metrics::{counter, gauge, histogram};
use shelfdb_core::Database;
use std::time::Duration;

/// Record one completed HTTP request.
pub fn record_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("shelfdb_http_requests_total", &labels).increment(1);
    histogram!("shelfdb_http_request_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

/// Refresh per-collection gauges; called from a background task.
pub fn update_collection_metrics(db: &Database) {
    let counts = [
        ("libraries", db.libraries.len().unwrap_or(0)),
        ("documents", db.documents.len().unwrap_or(0)),
        ("chunks", db.chunks.len().unwrap_or(0)),
    ];
    for (name, count) in counts {
        let labels = [("collection", name.to_string())];
        gauge!("shelfdb_records", &labels).set(count as f64);
    }
    for (kind, len) in db.chunks.index_sizes() {
        let labels = [("index", kind.to_string())];
        gauge!("shelfdb_index_entries", &labels).set(len as f64);
    }
}
