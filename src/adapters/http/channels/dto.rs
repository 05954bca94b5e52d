//! HTTP DTOs for channel endpoints.
//!
//! Field names follow the public wire contract (camelCase), not Rust naming.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::channel::BroadcastOutcome;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Query string accepted on `/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelQuery {
    pub channel: Option<String>,
    #[serde(rename = "lastEventId")]
    pub last_event_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Body returned for an accepted broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub success: bool,
    pub clients: usize,
    pub message_id: String,
    pub metrics: BroadcastMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMetrics {
    /// Fan-out duration in milliseconds.
    pub duration: u64,
    pub success_count: usize,
    pub failure_count: usize,
    pub stale_count: usize,
}

impl From<BroadcastOutcome> for BroadcastResponse {
    fn from(outcome: BroadcastOutcome) -> Self {
        Self {
            success: true,
            clients: outcome.clients,
            message_id: outcome.message_id.to_string(),
            metrics: BroadcastMetrics {
                duration: outcome.duration_ms,
                success_count: outcome.success,
                failure_count: outcome.failure,
                stale_count: outcome.stale,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Channels with a running actor.
    pub channels: usize,
}

/// Counter snapshot: totals across channels plus a per-channel breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub totals: BTreeMap<String, u64>,
    pub channels: BTreeMap<String, BTreeMap<String, u64>>,
}

impl MetricsResponse {
    pub fn from_channels(channels: BTreeMap<String, BTreeMap<String, u64>>) -> Self {
        let mut totals = BTreeMap::new();
        for counters in channels.values() {
            for (name, value) in counters {
                *totals.entry(name.clone()).or_insert(0) += value;
            }
        }
        Self { totals, channels }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
