// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Prometheus text exposition of a [`StatsSnapshot`].
//!
//! Families are written in a fixed order. A family with no samples is left out of
//! [`render`]; [`render_empty`] writes every family's `HELP`/`TYPE` header and no
//! samples, for scrapes where the modem could not be read.

use std::collections::HashMap;
use std::fmt::{Display, Write};

use modem_stats::model::{Channel, ChannelMetrics, StatsSnapshot};

pub const NAMESPACE: &str = "modemstats";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricType {
    Gauge,
    Counter,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
        }
    }
}

struct Family {
    name: &'static str,
    help: &'static str,
    kind: MetricType,
}

const fn gauge(name: &'static str, help: &'static str) -> Family {
    Family {
        name,
        help,
        kind: MetricType::Gauge,
    }
}

const fn counter(name: &'static str, help: &'static str) -> Family {
    Family {
        name,
        help,
        kind: MetricType::Counter,
    }
}

const FAMILIES: &[Family] = &[
    gauge("downstream_frequency", "Downstream frequency in Hz"),
    gauge("upstream_frequency", "Upstream frequency in Hz"),
    gauge(
        "downstream_power",
        "Downstream power level (tenths of a dBmV for SC-QAM)",
    ),
    gauge(
        "upstream_power",
        "Upstream power level (tenths of a dBmV for ATDMA)",
    ),
    gauge(
        "downstream_snr",
        "Downstream SNR (tenths of a dB for SC-QAM, MER for OFDM)",
    ),
    gauge("downstream_postrserr", "Number of errors per channel post RS"),
    gauge("downstream_prerserr", "Number of errors per channel pre RS"),
    gauge(
        "downstream_locked",
        "Downstream channel lock status (1=locked, 0=unlocked)",
    ),
    gauge(
        "upstream_locked",
        "Upstream channel lock status (1=locked, 0=unlocked)",
    ),
    gauge("upstream_symbol_rate", "Upstream symbol rate in ksym/s"),
    counter("upstream_t1_timeout_total", "Upstream T1 timeout count"),
    counter("upstream_t2_timeout_total", "Upstream T2 timeout count"),
    counter("upstream_t3_timeout_total", "Upstream T3 timeout count"),
    counter("upstream_t4_timeout_total", "Upstream T4 timeout count"),
    gauge("config_maxrate", "Maximum link rate"),
    gauge("config_maxburst", "Maximum link burst rate"),
    gauge(
        "shstatsinfo_timems",
        "Time to fetch statistics from the modem in milliseconds",
    ),
    gauge("downstream_noise", "Downstream noise margin"),
    gauge("downstream_attenuation", "Downstream line attenuation"),
    gauge("upstream_noise", "Upstream noise margin"),
    gauge("upstream_attenuation", "Upstream line attenuation"),
];

#[derive(Debug, Default)]
struct Exposition {
    /// Sample lines keyed by family name (without namespace).
    samples: HashMap<String, Vec<String>>,
}

impl Exposition {
    fn add(&mut self, family: String, labels: &[(&str, &str)], value: impl Display) {
        let mut line = format!("{NAMESPACE}_{family}");
        if !labels.is_empty() {
            let labels: Vec<String> = labels
                .iter()
                .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
                .collect();
            let _ = write!(line, "{{{}}}", labels.join(","));
        }
        let _ = write!(line, " {value}");
        self.samples.entry(family).or_default().push(line);
    }

    fn finish(self) -> String {
        let mut output = String::new();
        for family in FAMILIES {
            let Some(samples) = self.samples.get(family.name) else {
                continue;
            };
            write_header(&mut output, family);
            for sample in samples {
                output.push_str(sample);
                output.push('\n');
            }
        }
        output
    }
}

fn write_header(output: &mut String, family: &Family) {
    let _ = writeln!(output, "# HELP {NAMESPACE}_{} {}", family.name, family.help);
    let _ = writeln!(output, "# TYPE {NAMESPACE}_{} {}", family.name, family.kind.as_str());
}

/// Renders every channel, service flow and the fetch duration of `snapshot`.
#[must_use]
pub fn render(snapshot: &StatsSnapshot) -> String {
    let mut exposition = Exposition::default();

    for (direction, channels) in [
        ("downstream", &snapshot.downstream),
        ("upstream", &snapshot.upstream),
    ] {
        for channel in channels {
            add_channel(&mut exposition, direction, channel);
        }
    }

    for config in &snapshot.configs {
        let flow_id = config.service_flow_id.to_string();
        let labels = [
            ("config", config.direction.as_str()),
            ("serviceflow_id", flow_id.as_str()),
        ];
        exposition.add("config_maxrate".to_string(), &labels, config.max_rate);
        if let Some(max_burst) = config.max_burst {
            exposition.add("config_maxburst".to_string(), &labels, max_burst);
        }
    }

    exposition.add(
        "shstatsinfo_timems".to_string(),
        &[],
        snapshot.fetch_time_ms,
    );

    exposition.finish()
}

/// Headers of every family, no samples.
#[must_use]
pub fn render_empty() -> String {
    let mut output = String::new();
    for family in FAMILIES {
        write_header(&mut output, family);
    }
    output
}

fn add_channel(exposition: &mut Exposition, direction: &str, channel: &Channel) {
    let ordinal = channel.ordinal.to_string();
    let id = channel.channel_id.to_string();
    let locked = u8::from(channel.locked);
    let family = |name: &str| format!("{direction}_{name}");

    match &channel.metrics {
        ChannelMetrics::Downstream {
            snr,
            pre_rs_errors,
            post_rs_errors,
        } => {
            let labels = [
                ("channel", ordinal.as_str()),
                ("id", id.as_str()),
                ("modulation", channel.modulation.as_str()),
                ("scheme", channel.scheme.as_str()),
            ];
            exposition.add(family("frequency"), &labels, channel.frequency);
            exposition.add(family("power"), &labels, channel.power);
            exposition.add(family("snr"), &labels, snr);
            exposition.add(family("prerserr"), &labels, pre_rs_errors);
            exposition.add(family("postrserr"), &labels, post_rs_errors);
            exposition.add(family("locked"), &labels, locked);
        }
        ChannelMetrics::Upstream {
            symbol_rate,
            timeouts,
        } => {
            let labels = [("channel", ordinal.as_str()), ("id", id.as_str())];
            exposition.add(family("frequency"), &labels, channel.frequency);
            exposition.add(family("power"), &labels, channel.power);
            exposition.add(family("locked"), &labels, locked);
            if *symbol_rate > 0 {
                exposition.add(family("symbol_rate"), &labels, symbol_rate);
            }
            exposition.add(family("t1_timeout_total"), &labels, timeouts.t1);
            exposition.add(family("t2_timeout_total"), &labels, timeouts.t2);
            exposition.add(family("t3_timeout_total"), &labels, timeouts.t3);
            exposition.add(family("t4_timeout_total"), &labels, timeouts.t4);
        }
        ChannelMetrics::Dsl { noise, attenuation } => {
            let labels = [("id", id.as_str())];
            exposition.add(family("noise"), &labels, noise);
            exposition.add(family("attenuation"), &labels, attenuation);
        }
    }
}

/// Backslash, double-quote, and newline must be escaped.
fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use modem_stats::model::{ModemFamily, Scheme, ServiceFlowConfig, TimeoutCounters};

    fn docsis_snapshot() -> StatsSnapshot {
        StatsSnapshot {
            family: ModemFamily::Docsis,
            downstream: vec![Channel {
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
            }],
            upstream: vec![
                Channel {
                    channel_id: 1,
                    ordinal: 1,
                    frequency: 49600000,
                    power: 448,
                    modulation: "QAM64".to_string(),
                    scheme: Scheme::Atdma,
                    locked: true,
                    metrics: ChannelMetrics::Upstream {
                        symbol_rate: 5120,
                        timeouts: TimeoutCounters {
                            t1: 0,
                            t2: 1,
                            t3: 3,
                            t4: 0,
                        },
                    },
                },
                Channel {
                    channel_id: 11,
                    ordinal: 2,
                    frequency: 54000000,
                    power: 402,
                    modulation: "QAM1024".to_string(),
                    scheme: Scheme::Ofdma,
                    locked: false,
                    metrics: ChannelMetrics::Upstream {
                        symbol_rate: 0,
                        timeouts: TimeoutCounters::default(),
                    },
                },
            ],
            configs: vec![
                ServiceFlowConfig {
                    direction: "downstream".to_string(),
                    max_rate: 287500061,
                    max_burst: Some(42600),
                    service_flow_id: 412832,
                },
                ServiceFlowConfig {
                    direction: "upstream".to_string(),
                    max_rate: 128000,
                    max_burst: None,
                    service_flow_id: 412833,
                },
            ],
            fetch_time_ms: 250,
        }
    }

    #[test]
    fn test_render_downstream_samples() {
        let output = render(&docsis_snapshot());
        let labels = r#"{channel="1",id="37",modulation="QAM256",scheme="SC-QAM"}"#;

        for (family, value) in [
            ("frequency", "419000000"),
            ("power", "21"),
            ("snr", "410"),
            ("prerserr", "105"),
            ("postrserr", "5"),
            ("locked", "1"),
        ] {
            let sample = format!("modemstats_downstream_{family}{labels} {value}\n");
            assert!(output.contains(&sample), "missing {sample}");
        }
        assert!(output.contains("# TYPE modemstats_downstream_snr gauge\n"));
    }

    #[test]
    fn test_render_upstream_samples() {
        let output = render(&docsis_snapshot());

        assert!(output.contains("modemstats_upstream_power{channel=\"1\",id=\"1\"} 448\n"));
        assert!(output.contains("modemstats_upstream_locked{channel=\"2\",id=\"11\"} 0\n"));
        assert!(
            output.contains("modemstats_upstream_t3_timeout_total{channel=\"1\",id=\"1\"} 3\n")
        );
        assert!(output.contains("# TYPE modemstats_upstream_t1_timeout_total counter\n"));
    }

    #[test]
    fn test_zero_symbol_rate_is_omitted() {
        let output = render(&docsis_snapshot());
        assert!(
            output.contains("modemstats_upstream_symbol_rate{channel=\"1\",id=\"1\"} 5120\n")
        );
        assert!(!output.contains("modemstats_upstream_symbol_rate{channel=\"2\""));
    }

    #[test]
    fn test_absent_burst_is_omitted() {
        let output = render(&docsis_snapshot());
        assert!(output.contains(
            "modemstats_config_maxburst{config=\"downstream\",serviceflow_id=\"412832\"} 42600\n"
        ));
        assert!(output.contains(
            "modemstats_config_maxrate{config=\"upstream\",serviceflow_id=\"412833\"} 128000\n"
        ));
        assert!(!output.contains("modemstats_config_maxburst{config=\"upstream\""));
    }

    #[test]
    fn test_render_dsl_samples() {
        let channel = |noise, attenuation| Channel {
            channel_id: 1,
            ordinal: 1,
            frequency: 0,
            power: 0,
            modulation: "vdsl".to_string(),
            scheme: Scheme::Vdsl,
            locked: true,
            metrics: ChannelMetrics::Dsl { noise, attenuation },
        };
        let snapshot = StatsSnapshot {
            downstream: vec![channel(95, 145)],
            upstream: vec![channel(64, 0)],
            ..StatsSnapshot::empty(ModemFamily::Vdsl, 40)
        };

        let output = render(&snapshot);
        assert!(output.contains("modemstats_downstream_noise{id=\"1\"} 95\n"));
        assert!(output.contains("modemstats_downstream_attenuation{id=\"1\"} 145\n"));
        assert!(output.contains("modemstats_upstream_noise{id=\"1\"} 64\n"));
        assert!(!output.contains("modemstats_downstream_frequency"));
        assert!(output.contains("modemstats_shstatsinfo_timems 40\n"));
    }

    #[test]
    fn test_render_empty_has_headers_only() {
        let output = render_empty();
        assert_eq!(output.lines().count(), FAMILIES.len() * 2);
        assert!(output.lines().all(|line| line.starts_with('#')));
        assert!(output.contains("# HELP modemstats_shstatsinfo_timems "));
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_label_value("a\nb"), "a\\nb");
    }
}
