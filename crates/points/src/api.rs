// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of serialized point batches to the remote collector.

use crate::errors::ShippingError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error};

pub const FORMAT_GRAPHITE_V2: &str = "graphite_v2";
pub const GRAPHITE_BLOCK_WORK_UNIT: &str = "12b37289-90b2-4b98-963f-75a27110b8da";
pub const NOT_ACCEPTABLE_STATUS_CODE: u16 = 406;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait PointSender: Send + Sync {
    /// Posts newline-separated wire lines. Any outcome other than success leaves the caller
    /// responsible for the batch.
    async fn post_data(
        &self,
        work_unit_id: &str,
        format: &str,
        lines: String,
    ) -> Result<(), ShippingError>;
}

#[derive(Debug, Clone)]
pub struct HttpPointSender {
    client: reqwest::Client,
    server: String,
    agent_id: String,
}

impl HttpPointSender {
    pub fn new(server: &str, agent_id: &str) -> Result<Self, ShippingError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ShippingError::Transport(e.to_string()))?;
        Ok(HttpPointSender {
            client,
            server: server.trim_end_matches('/').to_string(),
            agent_id: agent_id.to_string(),
        })
    }

    fn push_url(&self, work_unit_id: &str, format: &str) -> String {
        format!(
            "{}/daemon/{}/pushdata/{}?format={}",
            self.server, self.agent_id, work_unit_id, format
        )
    }
}

#[async_trait]
impl PointSender for HttpPointSender {
    async fn post_data(
        &self,
        work_unit_id: &str,
        format: &str,
        lines: String,
    ) -> Result<(), ShippingError> {
        if lines.is_empty() {
            return Err(ShippingError::Transport("no points to send".to_string()));
        }

        let url = self.push_url(work_unit_id, format);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/plain")
            .body(lines)
            .send()
            .await
            .map_err(|e| {
                error!("Error posting data to {url}: {e}");
                ShippingError::Transport(e.to_string())
            })?;

        let status = response.status();
        match status.as_u16() {
            _ if status.is_success() => {
                debug!("Posted data to {url}: {status}");
                Ok(())
            }
            NOT_ACCEPTABLE_STATUS_CODE => {
                error!(
                    "{status}: Collector does not accept format {format} for work unit {work_unit_id}"
                );
                Err(ShippingError::Rejected(NOT_ACCEPTABLE_STATUS_CODE))
            }
            code => {
                let body = response.text().await.unwrap_or_default();
                error!("{status}: Failed to post data to {url}: {body:?}");
                Err(ShippingError::Rejected(code))
            }
        }
    }
}
