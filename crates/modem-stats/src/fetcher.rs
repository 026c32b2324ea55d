// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded fan-out/fan-in of HTTP GET requests.
//!
//! Every request runs to completion regardless of its siblings; the caller gets one
//! result per input, in input order, once all of them have resolved.

use bytes::Bytes;
use futures::future::join_all;
use reqwest::StatusCode;
use std::future::Future;
use tokio::sync::Semaphore;
use tracing::debug;

/// A value tagged with the position of the input that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexed<T> {
    pub index: usize,
    pub value: T,
}

/// A response whose body has been read in full.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Outcome of one GET issued by [`bounded_parallel_get`].
#[derive(Debug)]
pub struct FetchResult {
    pub index: usize,
    pub url: String,
    pub outcome: Result<FetchedResponse, reqwest::Error>,
}

/// Runs `op` once per input with at most `limit` operations in flight.
///
/// A `limit` of zero is treated as one. The returned vector has exactly one entry per
/// input, ordered by input position rather than completion order.
pub async fn bounded_parallel<I, T, F, Fut>(inputs: Vec<I>, limit: usize, op: F) -> Vec<Indexed<T>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    let op = &op;

    let tasks = inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| async move {
            // The semaphore is local to this call and never closed, so acquisition
            // only ever waits.
            let _permit = semaphore.acquire().await;
            Indexed {
                index,
                value: op(input).await,
            }
        });

    join_all(tasks).await
}

/// Issues a GET for every url, at most `limit` at a time.
pub async fn bounded_parallel_get(
    client: &reqwest::Client,
    urls: &[String],
    limit: usize,
) -> Vec<FetchResult> {
    debug!("Fetching {} urls with concurrency {}", urls.len(), limit);

    bounded_parallel(urls.to_vec(), limit, |url| async move {
        let outcome = get(client, &url).await;
        (url, outcome)
    })
    .await
    .into_iter()
    .map(|Indexed { index, value: (url, outcome) }| FetchResult {
        index,
        url,
        outcome,
    })
    .collect()
}

async fn get(client: &reqwest::Client, url: &str) -> Result<FetchedResponse, reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    Ok(FetchedResponse { status, body })
}
