// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Event-log forwarding to a Loki-compatible sink.
//!
//! ```text
//!   EventLogSource ──> LogShipper ──(unseen entries)──> LokiSink ──> push API
//!                          │                                │
//!                          └────────── SeenSet <── 2xx ─────┘
//! ```
//!
//! - **[`seen`]**: identity keys of entries the sink has confirmed
//! - **[`loki`]**: push payload and HTTP sink
//! - **[`shipper`]**: one deduplicating cycle plus the polling loop

pub mod loki;
pub mod seen;
pub mod shipper;

pub use loki::LokiSink;
pub use seen::SeenSet;
pub use shipper::LogShipper;
