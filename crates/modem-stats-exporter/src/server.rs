// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error};

use modem_stats::modems::Modem;

use crate::prometheus::{render, render_empty};

pub const METRICS_ENDPOINT_PATH: &str = "/metrics";
pub const HEALTH_ENDPOINT_PATH: &str = "/health";

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Accepts connections on `listener` until accepting fails with a non-transient error.
pub async fn serve(
    listener: TcpListener,
    modem: Arc<dyn Modem>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = hyper::server::conn::http1::Builder::new();
    let mut joinset = tokio::task::JoinSet::new();

    loop {
        let conn = tokio::select! {
            con_res = listener.accept() => match con_res {
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Server error: {e}");
                    return Err(e.into());
                }
                Ok((conn, _)) => conn,
            },
            finished = async {
                match joinset.join_next().await {
                    Some(finished) => finished,
                    None => std::future::pending().await,
                }
            } => match finished {
                Err(e) if e.is_panic() => {
                    error!("Connection handler panicked: {:?}", e);
                    continue;
                },
                Ok(()) | Err(_) => continue,
            },
        };

        let modem = Arc::clone(&modem);
        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            let modem = Arc::clone(&modem);
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            async move { Ok::<_, Infallible>(endpoint_handler(&method, &path, modem.as_ref()).await) }
        });

        let conn = TokioIo::new(conn);
        let server = server.clone();
        joinset.spawn(async move {
            if let Err(e) = server.serve_connection(conn, service).await {
                error!("Connection error: {e}");
            }
        });
    }
}

/// Routes one request. Every metrics scrape reads the modem afresh.
pub async fn endpoint_handler(
    method: &Method,
    path: &str,
    modem: &dyn Modem,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, METRICS_ENDPOINT_PATH) => {
            modem.invalidate().await;
            let body = match modem.get_snapshot().await {
                Ok(snapshot) => {
                    debug!(
                        "Collected {} stats in {} ms",
                        modem.family(),
                        snapshot.fetch_time_ms
                    );
                    render(&snapshot)
                }
                Err(e) => {
                    error!("Failed to collect modem stats: {e}");
                    render_empty()
                }
            };
            text_response(StatusCode::OK, EXPOSITION_CONTENT_TYPE, body)
        }
        (&Method::GET, HEALTH_ENDPOINT_PATH) => {
            text_response(StatusCode::OK, "text/plain", "OK".to_string())
        }
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
    }
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
