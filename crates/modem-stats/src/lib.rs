// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Polls a broadband modem's management API, normalizes the vendor telemetry into
//! [`model::StatsSnapshot`], and ships the modem's event log to a Loki-compatible sink.
//!
//! ```text
//!   fetcher ──> accumulator ──> modems::{superhub5, dsl} ──> StatsSnapshot
//!                                   │
//!                                   └── EventLogSource ──> logs::LogShipper ──> Loki
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod accumulator;
pub mod errors;
pub mod fetcher;
pub mod http;
pub mod logs;
pub mod merge;
pub mod model;
pub mod modems;

/// Concurrency cap used when fetching a modem's sub-resources.
pub const STATS_FETCH_CONCURRENCY: usize = 3;
