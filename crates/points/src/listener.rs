// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::api::PointSender;
use crate::constants::MAX_LINE_LENGTH;
use crate::decoder::Decoder;
use crate::errors::DecodeError;
use crate::handler::{Handler, HandlerConfig};
use crate::metrics::MetricsRegistry;
use crate::parser::Dialect;
use crate::queue::OverflowSink;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Accepts newline-delimited points over TCP and feeds them to a [`Handler`].
pub struct PointListener {
    local_addr: SocketAddr,
    handler: Arc<Handler>,
    cancel_token: CancellationToken,
}

impl PointListener {
    /// Binds `addr` and starts accepting connections. The handler is named after the bound port.
    pub async fn start(
        addr: SocketAddr,
        dialect: Dialect,
        mut handler_config: HandlerConfig,
        sender: Arc<dyn PointSender>,
        sink: Arc<dyn OverflowSink>,
        metrics: &MetricsRegistry,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        handler_config.handle = local_addr.port().to_string();
        let handler = Arc::new(Handler::new(handler_config, sender, sink, metrics));
        handler.start();

        let cancel_token = CancellationToken::new();
        tokio::spawn(accept_loop(
            listener,
            dialect,
            Arc::clone(&handler),
            cancel_token.clone(),
        ));
        info!("Listening for {dialect} points on {local_addr}");

        Ok(PointListener {
            local_addr,
            handler,
            cancel_token,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Closes the listener and open connections, then stops the handler.
    pub fn stop(&self) {
        self.cancel_token.cancel();
        self.handler.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    dialect: Dialect,
    handler: Arc<Handler>,
    cancel_token: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = cancel_token.cancelled() => break,
        };
        match accepted {
            Ok((stream, peer)) => {
                debug!("Accepted connection from {peer}");
                tokio::spawn(read_lines(
                    stream,
                    peer,
                    Decoder::new(dialect),
                    Arc::clone(&handler),
                    cancel_token.clone(),
                ));
            }
            Err(e) => error!("Failed to accept connection: {e}"),
        }
    }
    debug!("Stopped listening on {}", handler.handle());
}

async fn read_lines(
    stream: TcpStream,
    peer: SocketAddr,
    mut decoder: Decoder,
    handler: Arc<Handler>,
    cancel_token: CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        // room for the line ending on top of the longest accepted line
        let mut limited = (&mut reader).take(MAX_LINE_LENGTH as u64 + 2);
        let read = tokio::select! {
            read = limited.read_until(b'\n', &mut buf) => read,
            () = cancel_token.cancelled() => break,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Error reading from {peer}: {e}");
                break;
            }
        }

        let line = strip_line_ending(&buf);
        if line.len() > MAX_LINE_LENGTH {
            warn!("Line from {peer} exceeds {MAX_LINE_LENGTH} bytes, closing connection");
            handler.counters().add_blocked(1);
            break;
        }
        match decoder.decode(line) {
            Ok(point) => handler.report_point(&point),
            Err(DecodeError::Empty) => {}
            Err(e) => {
                debug!("Failed to decode line from {peer}: {e}");
                handler.handle_blocked_point(&String::from_utf8_lossy(line));
            }
        }
    }
    debug!("Connection from {peer} closed");
}

fn strip_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::FORMAT_GRAPHITE_V2;
    use crate::forwarder::tests::RecordingSender;
    use crate::queue::MemorySink;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{sleep, timeout};
    use tracing_test::traced_test;

    fn config() -> HandlerConfig {
        HandlerConfig {
            handle: String::new(),
            work_unit_id: "work".to_string(),
            format: FORMAT_GRAPHITE_V2.to_string(),
            num_forwarders: 4,
            flush_interval: Duration::from_secs(1),
            max_buffer_size: 100,
            max_flush_size: 10,
        }
    }

    async fn start(dialect: Dialect, metrics: &MetricsRegistry) -> PointListener {
        PointListener::start(
            "127.0.0.1:0".parse().unwrap(),
            dialect,
            config(),
            Arc::new(RecordingSender::default()),
            Arc::new(MemorySink::new()),
            metrics,
        )
        .await
        .unwrap()
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"a b\r\n"), b"a b");
        assert_eq!(strip_line_ending(b"a b\n"), b"a b");
        assert_eq!(strip_line_ending(b"a b"), b"a b");
        assert_eq!(strip_line_ending(b"\r\n"), b"");
    }

    #[tokio::test]
    async fn test_lines_are_reported_or_blocked() {
        let metrics = MetricsRegistry::new();
        let listener = start(Dialect::Graphite, &metrics).await;
        let port = listener.local_addr().port().to_string();
        assert_eq!(listener.handler().handle(), port);

        let mut stream = TcpStream::connect(listener.local_addr()).await.unwrap();
        stream
            .write_all(b"foo.metric 1.5 1505454047 source=a\r\n\nfoo.metric 1.5\nbar 2 host=b")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        let counters = metrics.counters(&port);
        wait_for(|| counters.received() == 2 && counters.blocked() == 1).await;

        let mut lines: Vec<String> = listener
            .handler()
            .forwarders()
            .iter()
            .flat_map(|f| f.snapshot())
            .collect();
        lines.sort();
        assert!(lines[0].starts_with("\"bar\" 2 "));
        assert_eq!(lines[1], "\"foo.metric\" 1.5 1505454047 source=\"a\"");
        listener.stop();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_oversized_line_closes_connection() {
        let metrics = MetricsRegistry::new();
        let listener = start(Dialect::Graphite, &metrics).await;
        let counters = metrics.counters(&listener.local_addr().port().to_string());

        let mut stream = TcpStream::connect(listener.local_addr()).await.unwrap();
        let mut line = b"foo 1 source=a k=".to_vec();
        line.resize(4 * MAX_LINE_LENGTH, b'v');
        // the server may reset the connection before everything is written
        let _ = stream.write_all(&line).await;

        let mut buf = [0u8; 16];
        let closed = timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap();
        assert!(matches!(closed, Ok(0) | Err(_)));
        wait_for(|| counters.blocked() == 1).await;
        assert_eq!(counters.received(), 0);
        assert!(logs_contain("closing connection"));

        // a line right at the limit is still read and decoded
        let mut stream = TcpStream::connect(listener.local_addr()).await.unwrap();
        let mut line = b"foo 1 source=a ".to_vec();
        line.resize(MAX_LINE_LENGTH, b' ');
        line.extend_from_slice(b"\r\n");
        stream.write_all(&line).await.unwrap();
        wait_for(|| counters.received() == 1).await;
        listener.stop();
    }

    #[tokio::test]
    async fn test_opentsdb_dialect() {
        let metrics = MetricsRegistry::new();
        let listener = start(Dialect::OpenTsdb, &metrics).await;
        let counters = metrics.counters(&listener.local_addr().port().to_string());

        let mut stream = TcpStream::connect(listener.local_addr()).await.unwrap();
        stream
            .write_all(b"put foo.metric 1505454047 1.5 source=a\nfoo.metric 1.5 1505454047 source=a\n")
            .await
            .unwrap();

        wait_for(|| counters.received() == 1 && counters.blocked() == 1).await;
        listener.stop();
    }

    #[tokio::test]
    async fn test_stop_refuses_new_connections() {
        let metrics = MetricsRegistry::new();
        let listener = start(Dialect::Graphite, &metrics).await;
        let addr = listener.local_addr();
        listener.stop();

        let refused = timeout(Duration::from_secs(5), async {
            loop {
                if TcpStream::connect(addr).await.is_err() {
                    break;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(refused.is_ok());
    }

    #[tokio::test]
    async fn test_bind_error() {
        let metrics = MetricsRegistry::new();
        let listener = start(Dialect::Graphite, &metrics).await;
        let result = PointListener::start(
            listener.local_addr(),
            Dialect::Graphite,
            config(),
            Arc::new(RecordingSender::default()),
            Arc::new(MemorySink::new()),
            &metrics,
        )
        .await;
        assert!(result.is_err());
        listener.stop();
    }
}
