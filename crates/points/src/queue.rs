// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Destinations for points drained out of an overflowing forwarder buffer.

use std::sync::Mutex;
use tracing::warn;

pub trait OverflowSink: Send + Sync {
    fn queue_points(&self, points: Vec<String>);
}

/// Drops overflowed points, logging how many were lost.
#[derive(Debug, Default)]
pub struct DiscardingSink;

impl OverflowSink for DiscardingSink {
    fn queue_points(&self, points: Vec<String>) {
        warn!("Dropping points of length: {}", points.len());
    }
}

/// Keeps overflowed points in memory so they can be inspected or replayed.
#[derive(Debug, Default)]
pub struct MemorySink {
    points: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything queued so far.
    pub fn take(&self) -> Vec<String> {
        #[allow(clippy::expect_used)]
        let mut points = self.points.lock().expect("lock poisoned");
        std::mem::take(&mut *points)
    }

    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.points.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OverflowSink for MemorySink {
    fn queue_points(&self, mut points: Vec<String>) {
        #[allow(clippy::expect_used)]
        self.points
            .lock()
            .expect("lock poisoned")
            .append(&mut points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_discarding_sink_logs_count() {
        DiscardingSink.queue_points(vec!["a".to_string(), "b".to_string()]);
        assert!(logs_contain("Dropping points of length: 2"));
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.queue_points(vec!["a".to_string(), "b".to_string()]);
        sink.queue_points(vec!["c".to_string()]);
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.take(), vec!["a", "b", "c"]);
        assert!(sink.is_empty());
    }
}
