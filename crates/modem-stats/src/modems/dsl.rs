// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! VDSL routers exposing an `api/v4` connection API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::accumulator::{RawDocument, StatsAccumulator};
use crate::errors::ModemError;
use crate::model::{
    Channel, ChannelMetrics, ModemFamily, Scheme, ServiceFlowConfig, StatsSnapshot,
};
use crate::modems::Modem;
use crate::STATS_FETCH_CONCURRENCY;

pub const DEFAULT_IP_ADDRESS: &str = "mafreebox.freebox.fr";

const STATS_RESOURCES: [&str; 2] = ["connection/xdsl", "connection"];

const LINE_UP: &str = "showtime";

pub struct Dsl {
    api_address: String,
    accumulator: StatsAccumulator,
}

impl Dsl {
    #[must_use]
    pub fn new(client: reqwest::Client, ip_address: Option<&str>) -> Self {
        let ip_address = ip_address
            .filter(|ip| !ip.is_empty())
            .unwrap_or(DEFAULT_IP_ADDRESS);
        Self::with_api_address(client, format!("http://{ip_address}/api/v4"))
    }

    #[must_use]
    pub fn with_api_address(client: reqwest::Client, api_address: impl Into<String>) -> Self {
        let api_address = api_address.into();
        let endpoints = STATS_RESOURCES
            .iter()
            .map(|resource| format!("{api_address}/{resource}"))
            .collect();

        Dsl {
            accumulator: StatsAccumulator::new(client, endpoints, STATS_FETCH_CONCURRENCY),
            api_address,
        }
    }

    #[must_use]
    pub fn api_address(&self) -> &str {
        &self.api_address
    }
}

#[async_trait]
impl Modem for Dsl {
    async fn get_snapshot(&self) -> Result<StatsSnapshot, ModemError> {
        self.accumulator
            .decode(|document: &RawDocument| normalize(&document.bytes, document.fetch_time_ms))
            .await
    }

    async fn invalidate(&self) {
        self.accumulator.invalidate().await;
    }

    fn family(&self) -> ModemFamily {
        ModemFamily::Vdsl
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    result: ConnectionInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConnectionInfo {
    status: Option<LineStatus>,
    down: Option<LineStats>,
    up: Option<LineStats>,
    bandwidth_down: Option<i64>,
    bandwidth_up: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LineStatus {
    status: String,
    modulation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LineStats {
    snr: i64,
    attn: i64,
    rate: i64,
    maxrate: i64,
}

/// Converts a merged connection document into a snapshot with at most one channel
/// per direction.
pub fn normalize(raw: &[u8], fetch_time_ms: u64) -> Result<StatsSnapshot, ModemError> {
    let Envelope { result } = serde_json::from_slice(raw)?;
    let mut snapshot = StatsSnapshot::empty(ModemFamily::Vdsl, fetch_time_ms);

    let (locked, modulation) = match &result.status {
        Some(status) => (status.status == LINE_UP, status.modulation.clone()),
        None => (false, String::new()),
    };
    let line = |stats: &LineStats| Channel {
        channel_id: 1,
        ordinal: 1,
        frequency: 0,
        power: 0,
        modulation: modulation.clone(),
        scheme: Scheme::Vdsl,
        locked,
        metrics: ChannelMetrics::Dsl {
            noise: stats.snr,
            attenuation: stats.attn,
        },
    };

    snapshot.downstream.extend(result.down.as_ref().map(line));
    snapshot.upstream.extend(result.up.as_ref().map(line));

    for (direction, service_flow_id, bandwidth) in [
        ("downstream", 1, result.bandwidth_down),
        ("upstream", 2, result.bandwidth_up),
    ] {
        if let Some(max_rate) = bandwidth {
            snapshot.configs.push(ServiceFlowConfig {
                direction: direction.to_string(),
                max_rate,
                max_burst: None,
                service_flow_id,
            });
        }
    }

    Ok(snapshot)
}
