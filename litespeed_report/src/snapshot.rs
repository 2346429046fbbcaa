//! The parsed state of one report file, or the merged state of many.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::Error;

/// Name given to the virtual host a report leaves unnamed, `REQ_RATE []`.
pub const DEFAULT_VIRTUAL_HOST: &str = "Server";

/// Flat mapping of metric key to value, one per report line.
pub type Metrics = FxHashMap<String, f64>;
/// Virtual host name to that host's request metrics.
pub type VirtualHosts = FxHashMap<String, Metrics>;
/// Application type to virtual host to application instance to metrics.
pub type ExtApps = FxHashMap<String, FxHashMap<String, FxHashMap<String, Metrics>>>;

/// Keys of the `BPS_IN:` line.
pub mod network {
    /// Plain ingress throughput.
    pub const BPS_IN: &str = "BPS_IN";
    /// Plain egress throughput.
    pub const BPS_OUT: &str = "BPS_OUT";
    /// TLS ingress throughput.
    pub const SSL_BPS_IN: &str = "SSL_BPS_IN";
    /// TLS egress throughput.
    pub const SSL_BPS_OUT: &str = "SSL_BPS_OUT";
}

/// Keys of the `MAXCONN:` line.
pub mod connection {
    /// Plain connection limit.
    pub const MAXCONN: &str = "MAXCONN";
    /// TLS connection limit.
    pub const MAXSSL_CONN: &str = "MAXSSL_CONN";
    /// Plain connections in use.
    pub const PLAINCONN: &str = "PLAINCONN";
    /// Plain connections available.
    pub const AVAILCONN: &str = "AVAILCONN";
    /// Idle connections.
    pub const IDLECONN: &str = "IDLECONN";
    /// TLS connections in use.
    pub const SSLCONN: &str = "SSLCONN";
    /// TLS connections available.
    pub const AVAILSSL: &str = "AVAILSSL";
}

/// Keys of a `REQ_RATE` line.
pub mod virtual_host {
    /// Requests currently being processed.
    pub const REQ_PROCESSING: &str = "REQ_PROCESSING";
    /// Requests per second.
    pub const REQ_PER_SEC: &str = "REQ_PER_SEC";
    /// Total requests served.
    pub const TOT_REQS: &str = "TOT_REQS";
    /// Public cache hits per second.
    pub const PUB_CACHE_HITS_PER_SEC: &str = "PUB_CACHE_HITS_PER_SEC";
    /// Total public cache hits.
    pub const TOTAL_PUB_CACHE_HITS: &str = "TOTAL_PUB_CACHE_HITS";
    /// Private cache hits per second.
    pub const PRIVATE_CACHE_HITS_PER_SEC: &str = "PRIVATE_CACHE_HITS_PER_SEC";
    /// Total private cache hits.
    pub const TOTAL_PRIVATE_CACHE_HITS: &str = "TOTAL_PRIVATE_CACHE_HITS";
    /// Static file hits per second.
    pub const STATIC_HITS_PER_SEC: &str = "STATIC_HITS_PER_SEC";
    /// Total static file hits.
    pub const TOTAL_STATIC_HITS: &str = "TOTAL_STATIC_HITS";
}

/// Keys of an `EXTAPP` line.
pub mod ext_app {
    /// Configured connection limit.
    pub const CMAXCONN: &str = "CMAXCONN";
    /// Effective connection limit.
    pub const EMAXCONN: &str = "EMAXCONN";
    /// Process pool size.
    pub const POOL_SIZE: &str = "POOL_SIZE";
    /// Connections in use.
    pub const INUSE_CONN: &str = "INUSE_CONN";
    /// Idle connections.
    pub const IDLE_CONN: &str = "IDLE_CONN";
    /// Requests waiting for a connection.
    pub const WAITQUE_DEPTH: &str = "WAITQUE_DEPTH";
    /// Requests per second.
    pub const REQ_PER_SEC: &str = "REQ_PER_SEC";
    /// Total requests served.
    pub const TOT_REQS: &str = "TOT_REQS";
}

/// Counters parsed out of real-time report files.
///
/// A `Snapshot` may carry an error. Once it does, the metric fields are
/// partial -- whatever was parsed before the failing line -- and must not be
/// trusted. [`Snapshot::into_result`] is the way out for callers that only
/// want good data.
#[derive(Debug, Default, Serialize)]
pub struct Snapshot {
    /// Server version, the last `/` separated segment of the `VERSION:` line.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_seconds: u64,
    /// Throughput keyed by [`network`] keys.
    pub network: Metrics,
    /// Connection counts keyed by [`connection`] keys.
    pub connections: Metrics,
    /// Per virtual host request metrics keyed by [`virtual_host`] keys.
    pub virtual_hosts: VirtualHosts,
    /// Per external application metrics keyed by [`ext_app`] keys.
    pub ext_apps: ExtApps,
    #[serde(skip)]
    pub(crate) error: Option<Error>,
}

impl Snapshot {
    /// Create an empty, error free `Snapshot`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An otherwise empty `Snapshot` carrying `error`.
    pub(crate) fn failed(error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// The error carried by this `Snapshot`, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Whether this `Snapshot` carries an error.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into a `Result`, dropping the partial metrics of a failed
    /// `Snapshot`.
    ///
    /// # Errors
    ///
    /// Returns the carried error, if any.
    pub fn into_result(self) -> Result<Self, Error> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }

    /// Store the metrics of one external application instance. Sibling
    /// instances already present are left alone.
    pub(crate) fn insert_ext_app(
        &mut self,
        app_type: &str,
        vhost: &str,
        instance: &str,
        metrics: Metrics,
    ) {
        self.ext_apps
            .entry(app_type.to_string())
            .or_default()
            .entry(vhost.to_string())
            .or_default()
            .insert(instance.to_string(), metrics);
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.uptime_seconds == other.uptime_seconds
            && self.network == other.network
            && self.connections == other.connections
            && self.virtual_hosts == other.virtual_hosts
            && self.ext_apps == other.ext_apps
            && self.error.as_ref().map(ToString::to_string)
                == other.error.as_ref().map(ToString::to_string)
    }
}
