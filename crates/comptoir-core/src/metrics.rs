// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use metrics::{describe_counter, describe_histogram};

/// Register all Comptoir metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "comptoir_messages_ingested_total",
        "Messages durably persisted, by source kind"
    );
    describe_counter!(
        "comptoir_messages_duplicate_total",
        "Re-deliveries absorbed by the provider-id dedup"
    );
    describe_counter!(
        "comptoir_messages_malformed_total",
        "Payloads skipped because they could not be parsed"
    );
    describe_counter!(
        "comptoir_webhook_rejected_total",
        "Webhook requests rejected before persistence, by reason"
    );
    describe_counter!("comptoir_poll_cycles_total", "Completed poll cycles");
    describe_counter!(
        "comptoir_poll_errors_total",
        "Poll attempts that ended in an error"
    );
    describe_counter!("comptoir_llm_requests_total", "Outbound LLM requests");
    describe_counter!(
        "comptoir_llm_failures_total",
        "LLM requests that failed after retry"
    );
    describe_histogram!(
        "comptoir_llm_latency_seconds",
        "LLM request latency in seconds"
    );
}

/// Record a durably persisted message.
pub fn record_ingested(kind: &str) {
    metrics::counter!("comptoir_messages_ingested_total", "kind" => kind.to_string())
        .increment(1);
}

/// Record a re-delivery absorbed as a no-op.
pub fn record_duplicate(kind: &str) {
    metrics::counter!("comptoir_messages_duplicate_total", "kind" => kind.to_string())
        .increment(1);
}

/// Record a skipped unparseable payload.
pub fn record_malformed(kind: &str) {
    metrics::counter!("comptoir_messages_malformed_total", "kind" => kind.to_string())
        .increment(1);
}

/// Record a rejected webhook request.
pub fn record_webhook_rejected(reason: &'static str) {
    metrics::counter!("comptoir_webhook_rejected_total", "reason" => reason).increment(1);
}

/// Record a completed poll cycle.
pub fn record_poll_cycle() {
    metrics::counter!("comptoir_poll_cycles_total").increment(1);
}

/// Record a failed poll attempt.
pub fn record_poll_error() {
    metrics::counter!("comptoir_poll_errors_total").increment(1);
}

/// Record an outbound LLM request and its latency.
pub fn record_llm_request(seconds: f64) {
    metrics::counter!("comptoir_llm_requests_total").increment(1);
    metrics::histogram!("comptoir_llm_latency_seconds").record(seconds);
}

/// Record an LLM request that failed after its retry.
pub fn record_llm_failure() {
    metrics::counter!("comptoir_llm_failures_total").increment(1);
}
