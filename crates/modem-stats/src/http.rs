// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use reqwest::ClientBuilder;

/// Timeout applied to pushes against the log sink.
pub const LOG_SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for requests against the modem.
pub const MODEM_TIMEOUT: Duration = Duration::from_secs(30);

fn create_reqwest_client_builder() -> ClientBuilder {
    reqwest::Client::builder().use_rustls_tls()
}

/// Builds the client used to talk to the modem.
///
/// Modems serve their management API with self-signed certificates, so certificate
/// validation is disabled for this client only.
pub fn build_modem_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    create_reqwest_client_builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .build()
}

/// Builds the client used to push log batches.
pub fn build_sink_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    create_reqwest_client_builder().timeout(timeout).build()
}
