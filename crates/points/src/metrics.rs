// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Internal counters for the proxy. Each handler registers one [`PointCounters`] set under its
//! own prefix; forwarders belonging to the handler share it.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PointCounters {
    received: AtomicU64,
    sent: AtomicU64,
    blocked: AtomicU64,
    queued: AtomicU64,
    flush_timer: Mutex<TimerStats>,
}

/// Snapshot of a flush timer, in milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct TimerStats {
    pub count: u64,
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl TimerStats {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    fn record(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        if self.count == 0 {
            self.min = ms;
            self.max = ms;
        } else {
            self.min = self.min.min(ms);
            self.max = self.max.max(ms);
        }
        self.count += 1;
        self.total += ms;
    }
}

impl PointCounters {
    pub fn add_received(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_sent(&self, n: u64) {
        self.sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_blocked(&self, n: u64) {
        self.blocked.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_queued(&self, n: u64) {
        self.queued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn blocked(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn record_flush(&self, elapsed: Duration) {
        #[allow(clippy::expect_used)]
        self.flush_timer
            .lock()
            .expect("lock poisoned")
            .record(elapsed);
    }

    #[allow(clippy::expect_used)]
    pub fn flush_stats(&self) -> TimerStats {
        *self.flush_timer.lock().expect("lock poisoned")
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: Mutex<BTreeMap<String, Arc<PointCounters>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter set registered under `prefix`, creating it on first use.
    pub fn counters(&self, prefix: &str) -> Arc<PointCounters> {
        #[allow(clippy::expect_used)]
        let mut counters = self.counters.lock().expect("lock poisoned");
        Arc::clone(counters.entry(prefix.to_string()).or_default())
    }

    /// Flat JSON object of every registered counter, keyed by metric name.
    pub fn to_json(&self) -> Value {
        #[allow(clippy::expect_used)]
        let counters = self.counters.lock().expect("lock poisoned");

        let mut report = Map::new();
        for (prefix, set) in counters.iter() {
            for (name, value) in [
                ("received", set.received()),
                ("sent", set.sent()),
                ("blocked", set.blocked()),
                ("queued", set.queued()),
            ] {
                report.insert(format!("points.{prefix}.{name}"), Value::from(value));
            }

            let stats = set.flush_stats();
            report.insert(
                format!("flush.{prefix}.duration.count"),
                Value::from(stats.count),
            );
            report.insert(format!("flush.{prefix}.duration.min"), Value::from(stats.min));
            report.insert(format!("flush.{prefix}.duration.max"), Value::from(stats.max));
            report.insert(
                format!("flush.{prefix}.duration.mean"),
                Value::from(stats.mean()),
            );
        }
        Value::Object(report)
    }
}
