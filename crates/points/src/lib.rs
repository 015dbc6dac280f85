// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Point ingestion and delivery pipeline.
//!
//! Lines arriving in the Graphite or OpenTSDB dialect are scanned, parsed and validated into
//! [`point::Point`] values, serialized to the wire line format and sharded across a pool of
//! forwarders that batch them to a remote collector on a fixed interval.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod api;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod forwarder;
pub mod handler;
pub mod listener;
pub mod metrics;
pub mod parser;
pub mod point;
pub mod queue;
pub mod validation;
