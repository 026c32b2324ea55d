// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for modem polling and log shipping.

/// Failure while fetching or decoding data from the modem.
#[derive(Debug, thiserror::Error)]
pub enum ModemError {
    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The modem answered with a non-success status code.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// A fragment could not be merged into the accumulated document.
    #[error("failed to merge response from {url}: {reason}")]
    Merge { url: String, reason: String },

    /// The document does not have the shape expected for this modem.
    #[error("failed to parse stats JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// The event log body is not the expected JSON shape.
    #[error("failed to parse eventlog JSON: {0}")]
    EventLogDecode(#[source] serde_json::Error),
}

/// Failure of a single log shipping cycle. Nothing is marked as shipped when
/// one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("failed to fetch event log: {0}")]
    Source(#[source] ModemError),

    #[error("failed to encode push request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to push to loki: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("loki returned status {0}")]
    Status(u16),
}
