// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::api::PointSender;
use crate::metrics::PointCounters;
use crate::queue::OverflowSink;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub struct ForwarderConfig {
    pub work_unit_id: String,
    pub format: String,
    pub max_buffer_size: usize,
    pub max_flush_size: usize,
    pub flush_interval: Duration,
}

/// One shard of a handler: a buffer of wire lines flushed to the sender on a fixed interval.
///
/// Lines are delivered at least once. A batch that fails to post goes back to the head of the
/// buffer and is retried on the next tick, ahead of anything added in the meantime.
pub struct Forwarder {
    buffer: Mutex<VecDeque<String>>,
    work_unit_id: String,
    format: String,
    max_buffer_size: usize,
    max_flush_size: usize,
    flush_interval: Duration,
    counters: Arc<PointCounters>,
    sender: Arc<dyn PointSender>,
    sink: Arc<dyn OverflowSink>,
    cancel_token: CancellationToken,
}

impl Forwarder {
    pub fn new(
        config: ForwarderConfig,
        counters: Arc<PointCounters>,
        sender: Arc<dyn PointSender>,
        sink: Arc<dyn OverflowSink>,
        cancel_token: CancellationToken,
    ) -> Self {
        Forwarder {
            buffer: Mutex::new(VecDeque::new()),
            work_unit_id: config.work_unit_id,
            format: config.format,
            max_buffer_size: config.max_buffer_size,
            max_flush_size: config.max_flush_size,
            flush_interval: config.flush_interval,
            counters,
            sender,
            sink,
            cancel_token,
        }
    }

    pub fn add_point(&self, line: String) {
        {
            #[allow(clippy::expect_used)]
            let mut buffer = self.buffer.lock().expect("lock poisoned");
            buffer.push_back(line);
        }
        self.counters.add_received(1);
    }

    pub fn increment_blocked(&self) {
        self.counters.add_blocked(1);
    }

    /// Sends up to `max_flush_size` of the oldest lines.
    pub async fn flush(&self) {
        let batch: Vec<String> = {
            #[allow(clippy::expect_used)]
            let mut buffer = self.buffer.lock().expect("lock poisoned");
            let n = buffer.len().min(self.max_flush_size);
            buffer.drain(..n).collect()
        };
        if batch.is_empty() {
            return;
        }

        let n = batch.len();
        debug!("Flushing {n} points");
        let start = Instant::now();
        let result = self
            .sender
            .post_data(&self.work_unit_id, &self.format, batch.join("\n"))
            .await;
        self.counters.record_flush(start.elapsed());

        match result {
            Ok(()) => {
                debug!("Successfully flushed {n} points");
                self.counters.add_sent(n as u64);
            }
            Err(e) => {
                error!("Failed to flush {n} points, keeping them for retry: {e}");
                {
                    #[allow(clippy::expect_used)]
                    let mut buffer = self.buffer.lock().expect("lock poisoned");
                    for line in batch.into_iter().rev() {
                        buffer.push_front(line);
                    }
                }
                self.check_overflow();
            }
        }
    }

    /// Moves the oldest lines to the overflow sink when the buffer is over its limit, leaving
    /// room for one more flush.
    pub fn check_overflow(&self) {
        let overflow: Vec<String> = {
            #[allow(clippy::expect_used)]
            let mut buffer = self.buffer.lock().expect("lock poisoned");
            let len = buffer.len();
            if len <= self.max_buffer_size {
                return;
            }
            let n = (len - self.max_buffer_size + self.max_flush_size).min(len);
            buffer.drain(..n).collect()
        };

        let n = overflow.len();
        warn!(
            "Buffer over limit of {}, queueing {n} points",
            self.max_buffer_size
        );
        self.counters.add_queued(n as u64);
        self.sink.queue_points(overflow);
    }

    /// Spawns the flush loop. It runs until [`Forwarder::stop`] is called.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let forwarder = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(
                tokio::time::Instant::now() + forwarder.flush_interval,
                forwarder.flush_interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => forwarder.flush().await,
                    () = forwarder.cancel_token.cancelled() => {
                        debug!("Forwarder for {} stopped", forwarder.work_unit_id);
                        break;
                    }
                }
            }
        })
    }

    /// Stops the flush loop. Buffered lines are not drained.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    #[allow(clippy::expect_used)]
    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().expect("lock poisoned").len()
    }

    /// Copy of the buffered lines, oldest first.
    #[allow(clippy::expect_used)]
    pub fn snapshot(&self) -> Vec<String> {
        self.buffer
            .lock()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
