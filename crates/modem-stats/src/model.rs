// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Canonical statistics model shared by every modem family.

use std::fmt;

/// Device family, decides which measurements a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemFamily {
    Docsis,
    Vdsl,
}

impl ModemFamily {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModemFamily::Docsis => "DOCSIS",
            ModemFamily::Vdsl => "VDSL",
        }
    }
}

impl fmt::Display for ModemFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modulation or access technology of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    ScQam,
    Ofdm,
    Atdma,
    Ofdma,
    Vdsl,
}

impl Scheme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::ScQam => "SC-QAM",
            Scheme::Ofdm => "OFDM",
            Scheme::Atdma => "ATDMA",
            Scheme::Ofdma => "OFDMA",
            Scheme::Vdsl => "VDSL",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DOCSIS upstream ranging timeout counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutCounters {
    pub t1: i64,
    pub t2: i64,
    pub t3: i64,
    pub t4: i64,
}

/// Measurements that differ between channel kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMetrics {
    /// Cable downstream. `snr` is in tenths of a dB for SC-QAM and the reported MER
    /// for OFDM.
    Downstream {
        snr: i64,
        pre_rs_errors: i64,
        post_rs_errors: i64,
    },
    /// Cable upstream.
    Upstream {
        symbol_rate: i64,
        timeouts: TimeoutCounters,
    },
    /// DSL line, either direction.
    Dsl { noise: i64, attenuation: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Identifier reported by the modem.
    pub channel_id: i64,
    /// 1-based position among the channels kept for this direction.
    pub ordinal: usize,
    pub frequency: i64,
    /// Tenths of a dBmV for SC-QAM/ATDMA, as reported for OFDM/OFDMA.
    pub power: i64,
    pub modulation: String,
    pub scheme: Scheme,
    pub locked: bool,
    pub metrics: ChannelMetrics,
}

/// A service flow (traffic shaping contract).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFlowConfig {
    /// "upstream" or "downstream".
    pub direction: String,
    pub max_rate: i64,
    /// `None` when the modem reports no burst limit.
    pub max_burst: Option<i64>,
    pub service_flow_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub family: ModemFamily,
    pub downstream: Vec<Channel>,
    pub upstream: Vec<Channel>,
    pub configs: Vec<ServiceFlowConfig>,
    /// Time the fetch-and-merge took, in milliseconds.
    pub fetch_time_ms: u64,
}

impl StatsSnapshot {
    #[must_use]
    pub fn empty(family: ModemFamily, fetch_time_ms: u64) -> Self {
        StatsSnapshot {
            family,
            downstream: Vec::new(),
            upstream: Vec::new(),
            configs: Vec::new(),
            fetch_time_ms,
        }
    }
}

/// One line of the modem's event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: String,
    /// ISO-8601 timestamp as reported by the modem.
    pub timestamp: String,
    pub message: String,
}

impl LogEntry {
    /// Key used to recognise an entry that was already shipped.
    #[must_use]
    pub fn identity_key(&self) -> String {
        format!("{}|{}|{}", self.timestamp, self.severity, self.message)
    }
}
