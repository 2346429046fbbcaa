//! Turn merged report snapshots into Prometheus exposition text.
//!
//! ## Metrics
//!
//! `litespeed_up`: 1 if the last collection succeeded, 0 otherwise
//! `litespeed_uptime_seconds_total`: Server uptime
//! `litespeed_network_throughput{scheme,stream}`: Throughput
//! `litespeed_server_connection_max{scheme}`: Connection limits
//! `litespeed_server_connections_used{scheme}`: Connections in use
//! `litespeed_server_connections_idle`: Idle connections
//! `litespeed_vhost_*{vhost}`: Per virtual host request counters
//! `litespeed_external_application_*{type,vhost,extapp_name}`: Per external
//! application pool counters
//!
//! Every scrape records into a fresh recorder. Series that vanished from the
//! reports therefore vanish from the output, and a failed collection exports
//! nothing but `litespeed_up 0`.

use std::path::PathBuf;

use litespeed_report::{
    Aggregator, Snapshot,
    snapshot::{connection, ext_app, network, virtual_host},
};
use litespeed_signal::Watcher;
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::config::Config;

const UP: &str = "litespeed_up";
const UPTIME: &str = "litespeed_uptime_seconds_total";
const NETWORK_THROUGHPUT: &str = "litespeed_network_throughput";
const CONNECTION_MAX: &str = "litespeed_server_connection_max";
const CONNECTIONS_USED: &str = "litespeed_server_connections_used";
const CONNECTIONS_IDLE: &str = "litespeed_server_connections_idle";

/// Report key, scheme, stream.
const NETWORK: [(&str, &str, &str); 4] = [
    (network::BPS_IN, "http", "in"),
    (network::BPS_OUT, "http", "out"),
    (network::SSL_BPS_IN, "https", "in"),
    (network::SSL_BPS_OUT, "https", "out"),
];

/// Report key, gauge, scheme label if any.
const CONNECTION: [(&str, &str, Option<&str>); 5] = [
    (connection::MAXCONN, CONNECTION_MAX, Some("http")),
    (connection::MAXSSL_CONN, CONNECTION_MAX, Some("https")),
    (connection::PLAINCONN, CONNECTIONS_USED, Some("http")),
    (connection::SSLCONN, CONNECTIONS_USED, Some("https")),
    (connection::IDLECONN, CONNECTIONS_IDLE, None),
];

/// Report key, gauge, help.
const VIRTUAL_HOST: [(&str, &str, &str); 6] = [
    (
        virtual_host::REQ_PROCESSING,
        "litespeed_vhost_running_processes",
        "The number of running processes by vhost.",
    ),
    (
        virtual_host::REQ_PER_SEC,
        "litespeed_vhost_requests_per_sec",
        "The requests per second by vhost.",
    ),
    (
        virtual_host::TOT_REQS,
        "litespeed_vhost_requests_total",
        "The total requests by vhost.",
    ),
    (
        virtual_host::TOTAL_STATIC_HITS,
        "litespeed_vhost_static_hits_total",
        "The number of static requests by vhost.",
    ),
    (
        virtual_host::TOTAL_PUB_CACHE_HITS,
        "litespeed_vhost_public_cache_hits_total",
        "The number of public cache hits by vhost.",
    ),
    (
        virtual_host::TOTAL_PRIVATE_CACHE_HITS,
        "litespeed_vhost_private_cache_hits_total",
        "The number of private cache hits by vhost.",
    ),
];

/// Report key, gauge, help.
const EXT_APP: [(&str, &str, &str); 8] = [
    (
        ext_app::CMAXCONN,
        "litespeed_external_application_max_connections",
        "The max connection value of external application.",
    ),
    (
        ext_app::EMAXCONN,
        "litespeed_external_application_effective_max_connections",
        "The max effective connection value of external application.",
    ),
    (
        ext_app::POOL_SIZE,
        "litespeed_external_application_pool_size",
        "The number of pool size by external application.",
    ),
    (
        ext_app::INUSE_CONN,
        "litespeed_external_application_connection_used",
        "The number of using connections by external application.",
    ),
    (
        ext_app::IDLE_CONN,
        "litespeed_external_application_connection_idles",
        "The number of idle connections by external application.",
    ),
    (
        ext_app::WAITQUE_DEPTH,
        "litespeed_external_application_connection_wait_queues",
        "The number of wait queues by external application.",
    ),
    (
        ext_app::REQ_PER_SEC,
        "litespeed_external_application_requests_per_sec",
        "The requests per second by external application.",
    ),
    (
        ext_app::TOT_REQS,
        "litespeed_external_application_requests_total",
        "The total requests by external application.",
    ),
];

#[derive(Debug)]
/// Collects reports on demand and renders them for Prometheus
pub struct Exporter {
    report_path: PathBuf,
    aggregator: Aggregator,
    global_labels: Vec<(String, String)>,
    // Held for the whole of a scrape: one collection at a time.
    cycle: Mutex<()>,
}

impl Exporter {
    /// Create a new [`Exporter`] reading the report directory named in
    /// `config`.
    #[must_use]
    pub fn new(config: &Config, shutdown: Watcher) -> Self {
        let mut global_labels: Vec<(String, String)> = config
            .global_labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        global_labels.sort();

        Self {
            report_path: config.report_path.clone(),
            aggregator: Aggregator::new(config.aggregator(), shutdown),
            global_labels,
            cycle: Mutex::new(()),
        }
    }

    /// Collect the report directory once and render the result as
    /// Prometheus text.
    ///
    /// Concurrent callers are served one after the other, each with its own
    /// collection.
    pub async fn scrape(&self) -> String {
        let _cycle = self.cycle.lock().await;

        let snapshot = match self.aggregator.collect(&self.report_path).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!("Error reading real-time report: {e}");
                None
            }
        };

        let mut builder = PrometheusBuilder::new();
        for (k, v) in &self.global_labels {
            builder = builder.add_global_label(k, v);
        }
        let recorder = builder.build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || publish(snapshot.as_ref()));

        let rendered = handle.render();
        debug!("Rendered {bytes} bytes of exposition", bytes = rendered.len());
        rendered
    }
}

/// Record `snapshot` as gauges into the current recorder. `None` stands for a
/// failed collection and records only `litespeed_up 0`.
pub fn publish(snapshot: Option<&Snapshot>) {
    describe();

    let Some(snapshot) = snapshot else {
        gauge!(UP).set(0.0);
        return;
    };
    gauge!(UP).set(1.0);
    gauge!(UPTIME).set(snapshot.uptime_seconds as f64);

    for (key, scheme, stream) in NETWORK {
        if let Some(value) = snapshot.network.get(key) {
            gauge!(NETWORK_THROUGHPUT, "scheme" => scheme, "stream" => stream).set(*value);
        }
    }

    for (key, name, scheme) in CONNECTION {
        let Some(value) = snapshot.connections.get(key) else {
            continue;
        };
        match scheme {
            Some(scheme) => gauge!(name, "scheme" => scheme).set(*value),
            None => gauge!(name).set(*value),
        }
    }

    for (vhost, metrics) in &snapshot.virtual_hosts {
        for (key, name, _) in VIRTUAL_HOST {
            if let Some(value) = metrics.get(key) {
                gauge!(name, "vhost" => vhost.clone()).set(*value);
            }
        }
    }

    for (app_type, vhosts) in &snapshot.ext_apps {
        for (vhost, instances) in vhosts {
            for (instance, metrics) in instances {
                for (key, name, _) in EXT_APP {
                    if let Some(value) = metrics.get(key) {
                        gauge!(
                            name,
                            "type" => app_type.clone(),
                            "vhost" => vhost.clone(),
                            "extapp_name" => instance.clone()
                        )
                        .set(*value);
                    }
                }
            }
        }
    }
}

fn describe() {
    describe_gauge!(UP, "Whether the real-time report could be read.");
    describe_gauge!(UPTIME, "Current uptime in seconds.");
    describe_gauge!(
        NETWORK_THROUGHPUT,
        "Current network throughput by scheme (http or https) and stream (in or out)."
    );
    describe_gauge!(CONNECTION_MAX, "The max connection value of server.");
    describe_gauge!(CONNECTIONS_USED, "The number of using connections to server.");
    describe_gauge!(CONNECTIONS_IDLE, "The idle connection values of server.");
    for (_, name, help) in VIRTUAL_HOST.into_iter().chain(EXT_APP) {
        describe_gauge!(name, help);
    }
}
