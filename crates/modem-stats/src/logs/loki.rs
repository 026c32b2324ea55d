// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Loki push API payload and client.

use std::collections::BTreeMap;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::debug;

use crate::errors::ShipError;

/// `job` label applied when the configuration does not set one.
pub const DEFAULT_JOB: &str = "modem-stats";

/// Body of `POST /loki/api/v1/push`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

/// Entries sharing one label set. Each value is `[<unix nanos>, <line>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    pub stream: BTreeMap<String, String>,
    pub values: Vec<[String; 2]>,
}

/// Adds `job=modem-stats` unless a job label is already present.
#[must_use]
pub fn with_default_labels(mut labels: BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .entry("job".to_string())
        .or_insert_with(|| DEFAULT_JOB.to_string());
    labels
}

#[derive(Debug, Clone)]
pub struct LokiSink {
    client: reqwest::Client,
    url: String,
}

impl LokiSink {
    /// `url` is the full push endpoint, e.g. `http://loki:3100/loki/api/v1/push`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        LokiSink {
            client,
            url: url.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one push request. Only a 2xx response counts as delivered.
    pub async fn push(&self, request: &PushRequest) -> Result<(), ShipError> {
        let body = serde_json::to_vec(request).map_err(ShipError::Encode)?;
        debug!(
            "LOGS | Pushing {} streams ({} bytes) to {}",
            request.streams.len(),
            body.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(ShipError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShipError::Status(status.as_u16()));
        }
        Ok(())
    }
}
