// Metrics - Message rate and heartbeat latency
//
// Read-only for the presentation layer; protocol decisions never look at
// these numbers. The window resets whenever a new peer joins through hello.

use crate::sync::clock::seconds_between;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Running counters since the start of the current window
#[derive(Clone, Debug, PartialEq)]
pub struct Metrics {
    messages_count: u64,
    latency_sum: f64,
    latency_samples: u64,
    window_start: DateTime<Utc>,
}

/// Point-in-time view of the metrics, for display
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_count: u64,
    pub latency_sum: f64,
    pub average_latency: Option<f64>,
    pub throughput: f64,
    pub window_secs: f64,
}

impl Metrics {
    /// Start a fresh window at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            messages_count: 0,
            latency_sum: 0.0,
            latency_samples: 0,
            window_start: now,
        }
    }

    /// Count one received message
    pub fn record_message(&mut self) {
        self.messages_count = self.messages_count.saturating_add(1);
    }

    /// Add one round-trip sample, in seconds
    pub fn record_latency(&mut self, seconds: f64) {
        self.latency_sum += seconds.max(0.0);
        self.latency_samples = self.latency_samples.saturating_add(1);
    }

    /// Zero the counters and restart the window
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }

    pub fn messages_count(&self) -> u64 {
        self.messages_count
    }

    pub fn latency_sum(&self) -> f64 {
        self.latency_sum
    }

    pub fn latency_samples(&self) -> u64 {
        self.latency_samples
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Mean round-trip time over the window
    pub fn average_latency(&self) -> Option<f64> {
        if self.latency_samples == 0 {
            return None;
        }
        Some(self.latency_sum / self.latency_samples as f64)
    }

    /// Messages per second since the window started
    pub fn throughput(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = seconds_between(self.window_start, now);
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.messages_count as f64 / elapsed
    }

    /// Capture the current values
    pub fn snapshot(&self, now: DateTime<Utc>) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_count: self.messages_count,
            latency_sum: self.latency_sum,
            average_latency: self.average_latency(),
            throughput: self.throughput(now),
            window_secs: seconds_between(self.window_start, now),
        }
    }
}
