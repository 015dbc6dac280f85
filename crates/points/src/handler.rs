// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::api::PointSender;
use crate::constants::{MAX_FORWARDERS, MIN_FLUSH_INTERVAL, MIN_FORWARDERS, SUMMARY_INTERVAL};
use crate::forwarder::{Forwarder, ForwarderConfig};
use crate::metrics::{MetricsRegistry, PointCounters};
use crate::point::Point;
use crate::queue::OverflowSink;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerConfig {
    /// Name the handler reports under, usually the listener port.
    pub handle: String,
    pub work_unit_id: String,
    pub format: String,
    pub num_forwarders: usize,
    pub flush_interval: Duration,
    pub max_buffer_size: usize,
    pub max_flush_size: usize,
}

/// Spreads points over a fixed set of forwarders.
pub struct Handler {
    handle: String,
    forwarders: Vec<Arc<Forwarder>>,
    counters: Arc<PointCounters>,
    cancel_token: CancellationToken,
}

impl Handler {
    pub fn new(
        config: HandlerConfig,
        sender: Arc<dyn PointSender>,
        sink: Arc<dyn OverflowSink>,
        metrics: &MetricsRegistry,
    ) -> Self {
        let num_forwarders = if (MIN_FORWARDERS..=MAX_FORWARDERS).contains(&config.num_forwarders)
        {
            config.num_forwarders
        } else {
            warn!(
                "Invalid number of forwarders {} for {}, using {MIN_FORWARDERS}",
                config.num_forwarders, config.handle
            );
            MIN_FORWARDERS
        };
        let flush_interval = if config.flush_interval < MIN_FLUSH_INTERVAL {
            warn!(
                "Flush interval {:?} for {} is below the minimum, using {MIN_FLUSH_INTERVAL:?}",
                config.flush_interval, config.handle
            );
            MIN_FLUSH_INTERVAL
        } else {
            config.flush_interval
        };

        let counters = metrics.counters(&config.handle);
        let cancel_token = CancellationToken::new();
        let forwarders = (0..num_forwarders)
            .map(|_| {
                Arc::new(Forwarder::new(
                    ForwarderConfig {
                        work_unit_id: config.work_unit_id.clone(),
                        format: config.format.clone(),
                        max_buffer_size: config.max_buffer_size,
                        max_flush_size: config.max_flush_size,
                        flush_interval,
                    },
                    Arc::clone(&counters),
                    Arc::clone(&sender),
                    Arc::clone(&sink),
                    cancel_token.child_token(),
                ))
            })
            .collect();

        Handler {
            handle: config.handle,
            forwarders,
            counters,
            cancel_token,
        }
    }

    /// Starts every forwarder's flush loop and the periodic summary.
    pub fn start(&self) {
        for forwarder in &self.forwarders {
            forwarder.start();
        }

        let handle = self.handle.clone();
        let counters = Arc::clone(&self.counters);
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + SUMMARY_INTERVAL, SUMMARY_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => log_summary(&handle, &counters),
                    () = cancel_token.cancelled() => break,
                }
            }
        });
    }

    pub fn report_point(&self, point: &Point) {
        let forwarder = self.random_forwarder();
        forwarder.add_point(point.to_wire_line());
        forwarder.check_overflow();
    }

    pub fn report_points(&self, points: &[Point]) {
        for point in points {
            self.report_point(point);
        }
    }

    /// Records a line that could not be decoded.
    pub fn handle_blocked_point(&self, line: &str) {
        info!("[{}] blocked input: [{line}]", self.handle);
        self.random_forwarder().increment_blocked();
    }

    /// Stops all forwarders and the summary. Buffered points are not flushed.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn forwarders(&self) -> &[Arc<Forwarder>] {
        &self.forwarders
    }

    pub fn counters(&self) -> &Arc<PointCounters> {
        &self.counters
    }

    fn random_forwarder(&self) -> &Forwarder {
        let idx = rand::rng().random_range(0..self.forwarders.len());
        &self.forwarders[idx]
    }
}

fn log_summary(handle: &str, counters: &PointCounters) {
    info!(
        "[{handle}] points received: {}, sent: {}, blocked: {}, queued: {}",
        counters.received(),
        counters.sent(),
        counters.blocked(),
        counters.queued()
    );
}
