// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Modem families. Each family owns its endpoint set and its normalizer; callers only
//! see the [`Modem`] and [`EventLogSource`] traits.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

use crate::errors::ModemError;
use crate::model::{LogEntry, ModemFamily, StatsSnapshot};

pub mod dsl;
pub mod superhub5;

#[async_trait]
pub trait Modem: Send + Sync {
    /// Normalizes the cached document, fetching it first when there is none.
    async fn get_snapshot(&self) -> Result<StatsSnapshot, ModemError>;

    /// Clears the cached document so the next snapshot re-fetches.
    async fn invalidate(&self);

    fn family(&self) -> ModemFamily;
}

#[async_trait]
pub trait EventLogSource: Send + Sync {
    async fn fetch_event_log(&self) -> Result<Vec<LogEntry>, ModemError>;
}

/// Supported modem models, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemKind {
    Superhub5,
    Dsl,
}

impl FromStr for ModemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "superhub5" => Ok(ModemKind::Superhub5),
            "dsl" => Ok(ModemKind::Dsl),
            other => Err(format!(
                "unknown modem type '{other}', expected one of: superhub5, dsl"
            )),
        }
    }
}

impl fmt::Display for ModemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemKind::Superhub5 => f.write_str("superhub5"),
            ModemKind::Dsl => f.write_str("dsl"),
        }
    }
}

/// Fetches a single resource body, classifying failures the same way the stats
/// accumulator does. Decoding is left to the caller.
pub(crate) async fn get_body(client: &reqwest::Client, url: &str) -> Result<Bytes, ModemError> {
    let transport = |source: reqwest::Error| ModemError::Transport {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ModemError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.bytes().await.map_err(transport)
}
