// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::net::SocketAddr;
use std::{env, sync::Arc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use modem_stats::{
    http::{build_modem_client, build_sink_client, LOG_SINK_TIMEOUT},
    logs::{LogShipper, LokiSink},
    modems::{dsl::Dsl, superhub5::Superhub5, EventLogSource, Modem, ModemKind},
};
use modem_stats_exporter::{config::ExporterConfig, server};

const EXPORTER_HOST: [u8; 4] = [0, 0, 0, 0];

#[tokio::main]
pub async fn main() {
    let log_level = env::var("MODEM_STATS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ExporterConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on modem stats exporter startup: {e}");
            return;
        }
    };

    let client = match build_modem_client(config.modem_timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to build modem HTTP client: {e}");
            return;
        }
    };

    let ip_address = config.modem_ip.as_deref();
    let (modem, event_log): (Arc<dyn Modem>, Option<Arc<dyn EventLogSource>>) = match config.modem
    {
        ModemKind::Superhub5 => {
            let hub = Arc::new(Superhub5::new(client, ip_address));
            info!("Polling Hub 5 at {}", hub.api_address());
            (hub.clone() as Arc<dyn Modem>, Some(hub as Arc<dyn EventLogSource>))
        }
        ModemKind::Dsl => {
            let router = Arc::new(Dsl::new(client, ip_address));
            info!("Polling DSL router at {}", router.api_address());
            (router as Arc<dyn Modem>, None)
        }
    };

    match (&config.loki_url, event_log) {
        (Some(loki_url), Some(source)) => match build_sink_client(LOG_SINK_TIMEOUT) {
            Ok(sink_client) => {
                let sink = LokiSink::new(sink_client, loki_url.as_str());
                let shipper = Arc::new(LogShipper::new(
                    source,
                    sink,
                    config.loki_labels.clone(),
                ));
                info!(
                    "Shipping event log to {} every {}s",
                    loki_url,
                    config.loki_interval.as_secs()
                );
                shipper.start_polling(config.loki_interval);
            }
            Err(e) => error!("Unable to build Loki HTTP client, log shipping disabled: {e}"),
        },
        (Some(_), None) => warn!(
            "{} modems have no event log, log shipping disabled",
            config.modem
        ),
        (None, _) => info!("Loki URL not set, log shipping disabled"),
    }

    let addr = SocketAddr::from((EXPORTER_HOST, config.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Unable to listen on {addr}: {e}");
            return;
        }
    };
    info!("Starting Prometheus exporter on port {}", config.port);

    if let Err(e) = server::serve(listener, modem).await {
        error!("Prometheus exporter stopped: {e}");
    }
}
