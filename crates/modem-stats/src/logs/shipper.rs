// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Deduplicating event-log shipper.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::errors::ShipError;
use crate::logs::loki::{LokiSink, PushRequest, Stream};
use crate::logs::seen::SeenSet;
use crate::model::LogEntry;
use crate::modems::EventLogSource;

/// Ships event-log entries that the sink has not yet confirmed.
///
/// Entries are marked as seen only after the sink accepts the push, so a failed cycle
/// is retried in full on the next one.
pub struct LogShipper {
    source: Arc<dyn EventLogSource>,
    sink: LokiSink,
    labels: BTreeMap<String, String>,
    seen: SeenSet,
}

impl LogShipper {
    #[must_use]
    pub fn new(
        source: Arc<dyn EventLogSource>,
        sink: LokiSink,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self::with_seen_set(source, sink, labels, SeenSet::default())
    }

    #[must_use]
    pub fn with_seen_set(
        source: Arc<dyn EventLogSource>,
        sink: LokiSink,
        labels: BTreeMap<String, String>,
        seen: SeenSet,
    ) -> Self {
        LogShipper {
            source,
            sink,
            labels,
            seen,
        }
    }

    #[must_use]
    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Runs one cycle and returns how many entries were pushed.
    pub async fn ship_new_logs(&self) -> Result<usize, ShipError> {
        let entries = self
            .source
            .fetch_event_log()
            .await
            .map_err(ShipError::Source)?;

        let mut batch_keys = HashSet::new();
        let fresh: Vec<(String, LogEntry)> = entries
            .into_iter()
            .filter_map(|entry| {
                let key = entry.identity_key();
                let new = !self.seen.contains(&key) && batch_keys.insert(key.clone());
                new.then_some((key, entry))
            })
            .collect();

        if fresh.is_empty() {
            debug!("LOGS | No new event log entries");
            return Ok(0);
        }

        let request = build_push_request(
            &self.labels,
            fresh.iter().map(|(_, entry)| entry),
            Utc::now(),
        );
        self.sink.push(&request).await?;

        let count = fresh.len();
        self.seen.insert_all(fresh.into_iter().map(|(key, _)| key));
        info!("LOGS | Pushed {} log entries to Loki", count);
        Ok(count)
    }

    /// Runs a cycle now and then once per `period`, until the task is dropped.
    pub async fn run(self: Arc<Self>, period: Duration) {
        // tokio's interval panics on a zero period
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        loop {
            ticker.tick().await;
            if let Err(e) = self.ship_new_logs().await {
                warn!("LOGS | Failed to ship event log: {}", e);
            }
        }
    }

    pub fn start_polling(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(self.run(period))
    }
}

/// Groups entries into one stream per severity, ordered by severity name, each sorted
/// by timestamp. Timestamps that are not RFC 3339 fall back to `now`.
pub fn build_push_request<'a, I>(
    labels: &BTreeMap<String, String>,
    entries: I,
    now: DateTime<Utc>,
) -> PushRequest
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let fallback = now.timestamp_nanos_opt().unwrap_or_default();

    let mut groups: BTreeMap<&str, Vec<(i64, &str)>> = BTreeMap::new();
    for entry in entries {
        let nanos = DateTime::parse_from_rfc3339(&entry.timestamp)
            .ok()
            .and_then(|ts| ts.timestamp_nanos_opt())
            .unwrap_or(fallback);
        groups
            .entry(entry.severity.as_str())
            .or_default()
            .push((nanos, entry.message.as_str()));
    }

    let streams = groups
        .into_iter()
        .map(|(severity, mut values)| {
            values.sort_by_key(|(nanos, _)| *nanos);

            let mut stream = labels.clone();
            stream.insert("level".to_string(), severity.to_string());
            Stream {
                stream,
                values: values
                    .into_iter()
                    .map(|(nanos, message)| [nanos.to_string(), message.to_string()])
                    .collect(),
            }
        })
        .collect();

    PushRequest { streams }
}
