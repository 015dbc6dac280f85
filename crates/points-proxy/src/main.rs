// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use points::{
    api::{HttpPointSender, PointSender, FORMAT_GRAPHITE_V2, GRAPHITE_BLOCK_WORK_UNIT},
    config::ProxyConfig,
    listener::PointListener,
    metrics::MetricsRegistry,
    parser::Dialect,
    queue::{DiscardingSink, OverflowSink},
};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("PROXY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ProxyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}. Shutting down proxy.");
            return;
        }
    };

    let sender: Arc<dyn PointSender> =
        match HttpPointSender::new(&config.server, &config.agent_id) {
            Ok(sender) => Arc::new(sender),
            Err(e) => {
                error!("Unable to build HTTP client: {e}. Shutting down proxy.");
                return;
            }
        };
    let sink: Arc<dyn OverflowSink> = Arc::new(DiscardingSink);
    let metrics = MetricsRegistry::new();

    let ports = config
        .push_listener_ports
        .iter()
        .map(|port| (*port, Dialect::Graphite))
        .chain(
            config
                .opentsdb_ports
                .iter()
                .map(|port| (*port, Dialect::OpenTsdb)),
        );

    let mut listeners = Vec::new();
    for (port, dialect) in ports {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        match PointListener::start(
            addr,
            dialect,
            config.handler_config(FORMAT_GRAPHITE_V2, GRAPHITE_BLOCK_WORK_UNIT),
            Arc::clone(&sender),
            Arc::clone(&sink),
            &metrics,
        )
        .await
        {
            Ok(listener) => listeners.push(listener),
            Err(e) => error!("Unable to listen for {dialect} points on {addr}: {e}"),
        }
    }

    if listeners.is_empty() {
        error!("No listener could be started. Shutting down proxy.");
        return;
    }
    info!("Proxy started with {} listeners", listeners.len());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
    }

    info!("Shutting down proxy");
    for listener in &listeners {
        listener.stop();
    }
    info!("Agent metrics: {}", metrics.to_json());
}
