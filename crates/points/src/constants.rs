// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Bounds on the number of forwarders a single handler runs.
pub const MIN_FORWARDERS: usize = 4;
pub const MAX_FORWARDERS: usize = 16;

/// Shortest flush interval a handler accepts.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

/// How often each handler logs its point summary.
pub const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

// Proxy defaults
pub const DEFAULT_FLUSH_THREADS: usize = 4;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_FLUSH_MAX_POINTS: usize = 40_000;
pub const DEFAULT_MEMORY_BUFFER_LIMIT: usize = 640_000;
pub const DEFAULT_PUSH_LISTENER_PORT: u16 = 2878;

/// Longest line, without its line ending, a listener reads before dropping the connection.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

// Point limits. Name and source must be shorter than this many bytes.
pub const MAX_NAME_LENGTH: usize = 1024;
pub const MAX_SOURCE_LENGTH: usize = 1024;
// key + value must be shorter than this many bytes
pub const MAX_TAG_LENGTH: usize = 255;

pub const SOURCE_TAG: &str = "source";
pub const HOST_TAG: &str = "host";

/// Keyword that opens every OpenTSDB line.
pub const OPENTSDB_PUT: &str = "put";
