// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cable (DOCSIS 3.1) modems exposing the `rest/v1/cablemodem` API.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::accumulator::{RawDocument, StatsAccumulator};
use crate::errors::ModemError;
use crate::model::{
    Channel, ChannelMetrics, LogEntry, ModemFamily, Scheme, ServiceFlowConfig, StatsSnapshot,
    TimeoutCounters,
};
use crate::modems::{get_body, EventLogSource, Modem};
use crate::STATS_FETCH_CONCURRENCY;

pub const DEFAULT_IP_ADDRESS: &str = "192.168.100.1";

const STATS_RESOURCES: [&str; 3] = ["downstream", "upstream", "serviceflows"];

#[allow(clippy::expect_used)]
static QAM_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9]+").expect("invalid modulation pattern"));

pub struct Superhub5 {
    client: reqwest::Client,
    api_address: String,
    accumulator: StatsAccumulator,
}

impl Superhub5 {
    /// Talks to the modem at `ip_address`, or [`DEFAULT_IP_ADDRESS`] when unset.
    #[must_use]
    pub fn new(client: reqwest::Client, ip_address: Option<&str>) -> Self {
        let ip_address = ip_address
            .filter(|ip| !ip.is_empty())
            .unwrap_or(DEFAULT_IP_ADDRESS);
        Self::with_api_address(client, format!("https://{ip_address}/rest/v1/cablemodem"))
    }

    /// Uses `api_address` as the base of every request.
    #[must_use]
    pub fn with_api_address(client: reqwest::Client, api_address: impl Into<String>) -> Self {
        let api_address = api_address.into();
        let endpoints = STATS_RESOURCES
            .iter()
            .map(|resource| format!("{api_address}/{resource}"))
            .collect();

        Superhub5 {
            accumulator: StatsAccumulator::new(client.clone(), endpoints, STATS_FETCH_CONCURRENCY),
            client,
            api_address,
        }
    }

    #[must_use]
    pub fn api_address(&self) -> &str {
        &self.api_address
    }
}

#[async_trait]
impl Modem for Superhub5 {
    async fn get_snapshot(&self) -> Result<StatsSnapshot, ModemError> {
        self.accumulator
            .decode(|document: &RawDocument| normalize(&document.bytes, document.fetch_time_ms))
            .await
    }

    async fn invalidate(&self) {
        self.accumulator.invalidate().await;
    }

    fn family(&self) -> ModemFamily {
        ModemFamily::Docsis
    }
}

#[async_trait]
impl EventLogSource for Superhub5 {
    async fn fetch_event_log(&self) -> Result<Vec<LogEntry>, ModemError> {
        let url = format!("{}/eventlog", self.api_address);
        let body = get_body(&self.client, &url).await?;
        let response: EventLogResponse =
            serde_json::from_slice(&body).map_err(ModemError::EventLogDecode)?;

        Ok(response
            .eventlog
            .into_iter()
            .map(|record| LogEntry {
                severity: record.priority,
                timestamp: record.time,
                message: record.message,
            })
            .collect())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatsDocument {
    downstream: ChannelList<DownstreamChannel>,
    upstream: ChannelList<UpstreamChannel>,
    service_flows: Vec<ServiceFlowEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ChannelList<T> {
    channels: Vec<T>,
}

impl<T> Default for ChannelList<T> {
    fn default() -> Self {
        ChannelList {
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DownstreamChannel {
    channel_id: i64,
    frequency: i64,
    power: f64,
    modulation: String,
    lock_status: bool,
    channel_type: String,
    snr: i64,
    rx_mer: i64,
    corrected_errors: i64,
    uncorrected_errors: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UpstreamChannel {
    channel_id: i64,
    frequency: i64,
    power: f64,
    modulation: String,
    lock_status: bool,
    channel_type: String,
    symbol_rate: i64,
    t1_timeout: i64,
    t2_timeout: i64,
    t3_timeout: i64,
    t4_timeout: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServiceFlowEntry {
    service_flow: ServiceFlow,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServiceFlow {
    service_flow_id: i64,
    direction: String,
    max_traffic_rate: i64,
    max_traffic_burst: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventLogResponse {
    eventlog: Vec<EventLogRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventLogRecord {
    priority: String,
    time: String,
    message: String,
}

/// Converts a merged stats document into a snapshot.
///
/// Channels with an unrecognized type are skipped and do not take an ordinal.
pub fn normalize(raw: &[u8], fetch_time_ms: u64) -> Result<StatsSnapshot, ModemError> {
    let document: StatsDocument = serde_json::from_slice(raw)?;
    let mut snapshot = StatsSnapshot::empty(ModemFamily::Docsis, fetch_time_ms);

    for channel in &document.downstream.channels {
        let (scheme, power, snr) = match channel.channel_type.as_str() {
            "sc_qam" => (
                Scheme::ScQam,
                tenths(channel.power),
                channel.snr.saturating_mul(10),
            ),
            "ofdm" => (Scheme::Ofdm, whole(channel.power), channel.rx_mer),
            other => {
                warn!("Unknown downstream channel scheme: {}", other);
                continue;
            }
        };

        snapshot.downstream.push(Channel {
            channel_id: channel.channel_id,
            ordinal: snapshot.downstream.len() + 1,
            frequency: channel.frequency,
            power,
            modulation: modulation_label(&channel.modulation),
            scheme,
            locked: channel.lock_status,
            metrics: ChannelMetrics::Downstream {
                snr,
                pre_rs_errors: channel
                    .corrected_errors
                    .saturating_add(channel.uncorrected_errors),
                post_rs_errors: channel.uncorrected_errors,
            },
        });
    }

    for channel in &document.upstream.channels {
        let (scheme, power) = match channel.channel_type.as_str() {
            "atdma" => (Scheme::Atdma, tenths(channel.power)),
            "ofdma" => (Scheme::Ofdma, whole(channel.power)),
            other => {
                warn!("Unknown upstream channel scheme: {}", other);
                continue;
            }
        };

        snapshot.upstream.push(Channel {
            channel_id: channel.channel_id,
            ordinal: snapshot.upstream.len() + 1,
            frequency: channel.frequency,
            power,
            modulation: modulation_label(&channel.modulation),
            scheme,
            locked: channel.lock_status,
            metrics: ChannelMetrics::Upstream {
                symbol_rate: channel.symbol_rate,
                timeouts: TimeoutCounters {
                    t1: channel.t1_timeout,
                    t2: channel.t2_timeout,
                    t3: channel.t3_timeout,
                    t4: channel.t4_timeout,
                },
            },
        });
    }

    snapshot.configs = document
        .service_flows
        .iter()
        .map(|entry| {
            let flow = &entry.service_flow;
            ServiceFlowConfig {
                direction: flow.direction.clone(),
                max_rate: flow.max_traffic_rate,
                max_burst: (flow.max_traffic_burst != 0).then_some(flow.max_traffic_burst),
                service_flow_id: flow.service_flow_id,
            }
        })
        .collect();

    Ok(snapshot)
}

/// "qam_256" becomes "QAM256". Values without digits become "QAM".
fn modulation_label(raw: &str) -> String {
    let size = QAM_SIZE.find(raw).map_or("", |m| m.as_str());
    format!("QAM{size}")
}

/// Power in tenths of a unit. The fractional remainder is dropped, not rounded.
fn tenths(value: f64) -> i64 {
    truncate(value * 10.0)
}

fn whole(value: f64) -> i64 {
    truncate(value)
}

// 44.3 * 10.0 lands a hair under 443; snap such values before truncating.
fn truncate(value: f64) -> i64 {
    let nearest = value.round();
    if (value - nearest).abs() < 1e-6 {
        nearest as i64
    } else {
        value.trunc() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_fragment;
    use mockito::Server;
    use serde_json::{json, Value};
    use tracing_test::traced_test;

    const DOWNSTREAM: &str = include_str!("../../tests/fixtures/superhub5/downstream.json");
    const UPSTREAM: &str = include_str!("../../tests/fixtures/superhub5/upstream.json");
    const SERVICE_FLOWS: &str = include_str!("../../tests/fixtures/superhub5/serviceflows.json");
    const EVENT_LOG: &str = include_str!("../../tests/fixtures/superhub5/eventlog.json");

    fn fixture_document() -> Vec<u8> {
        let mut document = json!({});
        for fragment in [DOWNSTREAM, UPSTREAM, SERVICE_FLOWS] {
            merge_fragment(&mut document, fragment.as_bytes()).expect("fixture is not an object");
        }
        serde_json::to_vec(&document).unwrap()
    }

    fn single_downstream(channel: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({ "downstream": { "channels": [channel] } })).unwrap()
    }

    #[test]
    fn test_sc_qam_downstream_is_scaled() {
        let raw = single_downstream(json!({
            "channelId": 37,
            "frequency": 419000000,
            "power": 2.1,
            "modulation": "qam_256",
            "lockStatus": true,
            "channelType": "sc_qam",
            "snr": 41,
            "correctedErrors": 100,
            "uncorrectedErrors": 5
        }));

        let snapshot = normalize(&raw, 12).unwrap();
        assert_eq!(snapshot.family, ModemFamily::Docsis);
        assert_eq!(snapshot.fetch_time_ms, 12);
        assert_eq!(
            snapshot.downstream,
            vec![Channel {
                channel_id: 37,
                ordinal: 1,
                frequency: 419000000,
                power: 21,
                modulation: "QAM256".to_string(),
                scheme: Scheme::ScQam,
                locked: true,
                metrics: ChannelMetrics::Downstream {
                    snr: 410,
                    pre_rs_errors: 105,
                    post_rs_errors: 5,
                },
            }]
        );
    }

    #[test]
    fn test_ofdm_downstream_uses_mer_unscaled() {
        let raw = single_downstream(json!({
            "channelId": 33,
            "power": 12,
            "modulation": "qam_4096",
            "channelType": "ofdm",
            "snr": 41,
            "rxMer": 39
        }));

        let snapshot = normalize(&raw, 0).unwrap();
        let channel = &snapshot.downstream[0];
        assert_eq!(channel.scheme, Scheme::Ofdm);
        assert_eq!(channel.power, 12);
        assert_eq!(channel.modulation, "QAM4096");
        assert!(matches!(
            channel.metrics,
            ChannelMetrics::Downstream { snr: 39, .. }
        ));
    }

    #[test]
    fn test_fractional_power_is_truncated() {
        let raw = serde_json::to_vec(&json!({
            "downstream": { "channels": [
                { "channelId": 33, "power": 12.7, "channelType": "ofdm" },
                { "channelId": 34, "power": 2.15, "channelType": "sc_qam" },
                { "channelId": 35, "power": -3.75, "channelType": "sc_qam" }
            ]},
            "upstream": { "channels": [
                { "channelId": 11, "power": 40.6, "channelType": "ofdma" },
                { "channelId": 2, "power": 44.3, "channelType": "atdma" }
            ]}
        }))
        .unwrap();

        let snapshot = normalize(&raw, 0).unwrap();
        let downstream: Vec<i64> = snapshot.downstream.iter().map(|c| c.power).collect();
        let upstream: Vec<i64> = snapshot.upstream.iter().map(|c| c.power).collect();
        assert_eq!(downstream, vec![12, 21, -37]);
        assert_eq!(upstream, vec![40, 443]);
    }

    #[test]
    #[traced_test]
    fn test_unknown_scheme_is_skipped_without_taking_an_ordinal() {
        let snapshot = normalize(&fixture_document(), 0).unwrap();

        let ids: Vec<(i64, usize)> = snapshot
            .downstream
            .iter()
            .map(|c| (c.channel_id, c.ordinal))
            .collect();
        assert_eq!(ids, vec![(37, 1), (38, 2), (39, 3), (33, 4)]);
        assert!(logs_contain("Unknown downstream channel scheme: docsis_4"));

        let ids: Vec<(i64, usize)> = snapshot
            .upstream
            .iter()
            .map(|c| (c.channel_id, c.ordinal))
            .collect();
        assert_eq!(ids, vec![(1, 1), (2, 2), (11, 3)]);
        assert!(logs_contain("Unknown upstream channel scheme: docsis_4"));
    }

    #[test]
    fn test_fixture_document() {
        let snapshot = normalize(&fixture_document(), 250).unwrap();

        let negative = &snapshot.downstream[2];
        assert_eq!(negative.power, -4);
        assert!(!negative.locked);

        let ofdm = &snapshot.downstream[3];
        assert_eq!(ofdm.scheme, Scheme::Ofdm);
        assert_eq!(ofdm.power, 12);
        assert!(matches!(
            ofdm.metrics,
            ChannelMetrics::Downstream {
                snr: 0,
                pre_rs_errors: 502,
                post_rs_errors: 2
            }
        ));

        assert_eq!(snapshot.upstream.len(), 3);
        let atdma = &snapshot.upstream[0];
        assert_eq!(atdma.scheme, Scheme::Atdma);
        assert_eq!(atdma.power, 448);
        assert_eq!(atdma.modulation, "QAM64");
        assert_eq!(
            atdma.metrics,
            ChannelMetrics::Upstream {
                symbol_rate: 5120,
                timeouts: TimeoutCounters {
                    t1: 0,
                    t2: 1,
                    t3: 3,
                    t4: 0
                },
            }
        );

        let ofdma = &snapshot.upstream[2];
        assert_eq!(ofdma.scheme, Scheme::Ofdma);
        assert_eq!(ofdma.ordinal, 3);
        assert_eq!(ofdma.power, 402);
        assert_eq!(ofdma.modulation, "QAM1024");

        assert_eq!(snapshot.configs.len(), 4);
        assert_eq!(
            snapshot.configs[0],
            ServiceFlowConfig {
                direction: "downstream".to_string(),
                max_rate: 287500061,
                max_burst: Some(42600),
                service_flow_id: 412832,
            }
        );
        assert_eq!(snapshot.configs[1].max_burst, None);
        assert_eq!(snapshot.configs[3].direction, "upstream");
    }

    #[test]
    fn test_empty_document_yields_empty_snapshot() {
        let snapshot = normalize(b"{}", 7).unwrap();
        assert_eq!(snapshot, StatsSnapshot::empty(ModemFamily::Docsis, 7));
    }

    #[test]
    fn test_invalid_document_is_a_decode_error() {
        assert!(matches!(
            normalize(b"{not json", 0),
            Err(ModemError::Decode(_))
        ));
        assert!(matches!(
            normalize(br#"{"downstream":{"channels":"nope"}}"#, 0),
            Err(ModemError::Decode(_))
        ));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = fixture_document();
        assert_eq!(normalize(&raw, 1).unwrap(), normalize(&raw, 1).unwrap());
    }

    #[test]
    fn test_modulation_label() {
        assert_eq!(modulation_label("qam_256"), "QAM256");
        assert_eq!(modulation_label("256qam"), "QAM256");
        assert_eq!(modulation_label("unknown"), "QAM");
        assert_eq!(modulation_label(""), "QAM");
    }

    #[test]
    fn test_api_address() {
        let client = reqwest::Client::new();
        assert_eq!(
            Superhub5::new(client.clone(), None).api_address(),
            "https://192.168.100.1/rest/v1/cablemodem"
        );
        assert_eq!(
            Superhub5::new(client.clone(), Some("")).api_address(),
            "https://192.168.100.1/rest/v1/cablemodem"
        );
        assert_eq!(
            Superhub5::new(client, Some("10.0.0.1")).api_address(),
            "https://10.0.0.1/rest/v1/cablemodem"
        );
    }

    #[tokio::test]
    async fn test_get_snapshot_fetches_every_resource() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for (path, body) in [
            ("/downstream", DOWNSTREAM),
            ("/upstream", UPSTREAM),
            ("/serviceflows", SERVICE_FLOWS),
        ] {
            mocks.push(
                server
                    .mock("GET", path)
                    .with_status(200)
                    .with_body(body)
                    .create_async()
                    .await,
            );
        }

        let modem = Superhub5::with_api_address(reqwest::Client::new(), server.url());
        let snapshot = modem.get_snapshot().await.unwrap();
        assert_eq!(snapshot.downstream.len(), 4);
        assert_eq!(snapshot.upstream.len(), 3);
        assert_eq!(snapshot.configs.len(), 4);
        assert_eq!(modem.family(), ModemFamily::Docsis);

        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_fetch_event_log() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/eventlog")
            .with_status(200)
            .with_body(EVENT_LOG)
            .create_async()
            .await;

        let modem = Superhub5::with_api_address(reqwest::Client::new(), server.url());
        let entries = modem.fetch_event_log().await.unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries[0],
            LogEntry {
                severity: "error".to_string(),
                timestamp: "2024-01-15T10:30:00Z".to_string(),
                message: "No Ranging Response received - T3 time-out".to_string(),
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_event_log_status_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/eventlog")
            .with_status(404)
            .create_async()
            .await;

        let modem = Superhub5::with_api_address(reqwest::Client::new(), server.url());
        assert!(matches!(
            modem.fetch_event_log().await,
            Err(ModemError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_event_log_malformed_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/eventlog")
            .with_status(200)
            .with_body(r#"{"eventlog":"unavailable"}"#)
            .create_async()
            .await;

        let modem = Superhub5::with_api_address(reqwest::Client::new(), server.url());
        let error = modem.fetch_event_log().await.unwrap_err();
        assert!(matches!(error, ModemError::EventLogDecode(_)));
        assert!(error
            .to_string()
            .starts_with("failed to parse eventlog JSON"));
    }
}
