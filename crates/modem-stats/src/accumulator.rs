// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fetches a modem's sub-resources and folds them into one cached raw document.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::ModemError;
use crate::fetcher::{bounded_parallel_get, FetchResult};
use crate::merge::merge_fragment;

/// Merged JSON document for one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    /// Wall-clock time of the whole fetch, in milliseconds.
    pub fetch_time_ms: u64,
}

/// Caches the merged document until [`StatsAccumulator::invalidate`] is called.
///
/// The cache lock is held for the duration of a fetch, so concurrent callers wait for
/// the in-flight accumulation and then share its result.
#[derive(Debug)]
pub struct StatsAccumulator {
    client: reqwest::Client,
    endpoints: Vec<String>,
    concurrency: usize,
    cache: Mutex<Option<Arc<RawDocument>>>,
}

impl StatsAccumulator {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoints: Vec<String>, concurrency: usize) -> Self {
        StatsAccumulator {
            client,
            endpoints,
            concurrency,
            cache: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Returns the cached document, fetching it first if there is none.
    ///
    /// On failure nothing is cached and the next call starts from scratch.
    pub async fn document(&self) -> Result<Arc<RawDocument>, ModemError> {
        let mut cache = self.cache.lock().await;
        if let Some(document) = cache.as_ref() {
            return Ok(Arc::clone(document));
        }

        let document = Arc::new(self.accumulate().await?);
        *cache = Some(Arc::clone(&document));
        Ok(document)
    }

    /// Decodes the cached document with `decode`.
    ///
    /// A document that fails to decode is dropped from the cache, so a transient bad
    /// response is not served again.
    pub async fn decode<T, F>(&self, decode: F) -> Result<T, ModemError>
    where
        F: FnOnce(&RawDocument) -> Result<T, ModemError>,
    {
        let document = self.document().await?;
        let decoded = decode(document.as_ref());
        if decoded.is_err() {
            self.forget(&document).await;
        }
        decoded
    }

    /// Drops `document` from the cache unless it has already been replaced.
    async fn forget(&self, document: &Arc<RawDocument>) {
        let mut cache = self.cache.lock().await;
        if cache
            .as_ref()
            .is_some_and(|cached| Arc::ptr_eq(cached, document))
        {
            *cache = None;
        }
    }

    /// Drops the cached document so the next call re-fetches.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    pub async fn is_cached(&self) -> bool {
        self.cache.lock().await.is_some()
    }

    async fn accumulate(&self) -> Result<RawDocument, ModemError> {
        let start = Instant::now();
        let results = bounded_parallel_get(&self.client, &self.endpoints, self.concurrency).await;
        let fetch_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        // Results come back in request order, so the first failure by index wins even if
        // a later request failed sooner.
        let mut document = Value::Object(Map::new());
        for FetchResult { url, outcome, .. } in results {
            let response = match outcome {
                Ok(response) => response,
                Err(source) => return Err(ModemError::Transport { url, source }),
            };
            if !response.status.is_success() {
                return Err(ModemError::Status {
                    url,
                    status: response.status.as_u16(),
                });
            }
            merge_fragment(&mut document, &response.body)
                .map_err(|reason| ModemError::Merge { url, reason })?;
        }

        debug!(
            "Merged {} fragments in {} ms",
            self.endpoints.len(),
            fetch_time_ms
        );

        Ok(RawDocument {
            bytes: serde_json::to_vec(&document)?,
            fetch_time_ms,
        })
    }
}
