//! Classify a single report line by its leading keyword.
//!
//! A real-time report is a sequence of newline delimited records, each
//! introduced by a fixed keyword:
//!
//! ```text
//! VERSION: LiteSpeed Web Server/Enterprise/5.4.12
//! UPTIME: 15:34:30
//! BPS_IN: 1, BPS_OUT: 2, SSL_BPS_IN: 3, SSL_BPS_OUT: 4
//! MAXCONN: 10000, MAXSSL_CONN: 5000, PLAINCONN: 0, AVAILCONN: 10000, IDLECONN: 0, SSLCONN: 0, AVAILSSL: 5000
//! REQ_RATE []: REQ_PROCESSING: 0, REQ_PER_SEC: 0.1, TOT_REQS: 448, ...
//! EXTAPP [LSAPI] [hoge.jp] [hoge.jp_php73]: CMAXCONN: 1000, EMAXCONN: 1000, ...
//! BLOCKED_IP:
//! EOF
//! ```
//!
//! Anything that does not start with a known keyword is ignored.

const VERSION: &str = "VERSION:";
const UPTIME: &str = "UPTIME:";
const NETWORK: &str = "BPS_IN:";
const CONNECTION: &str = "MAXCONN:";
const VIRTUAL_HOST: &str = "REQ_RATE";
const EXT_APP: &str = "EXTAPP";

/// A report line tagged with its record kind.
///
/// Every variant but `Ignored` borrows the line text, left-trimmed, so that
/// parsers see the keyword at offset zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `VERSION: .../Edition/X.Y.Z`
    Version(&'a str),
    /// `UPTIME: HH:MM:SS`
    Uptime(&'a str),
    /// `BPS_IN: n, BPS_OUT: n, SSL_BPS_IN: n, SSL_BPS_OUT: n`
    Network(&'a str),
    /// `MAXCONN: n, MAXSSL_CONN: n, ...`
    Connection(&'a str),
    /// `REQ_RATE [vhost]: REQ_PROCESSING: n, ...`
    VirtualHost(&'a str),
    /// `EXTAPP [type] [vhost] [name]: CMAXCONN: n, ...`
    ExtApp(&'a str),
    /// Any line without a recognized keyword.
    Ignored,
}

impl<'a> Line<'a> {
    /// Classify `text` by its first non-space token.
    ///
    /// Prefixes are checked in a fixed priority order; the first match wins.
    #[must_use]
    pub fn classify(text: &'a str) -> Self {
        let text = text.trim_start();
        if text.starts_with(VERSION) {
            Line::Version(text)
        } else if text.starts_with(UPTIME) {
            Line::Uptime(text)
        } else if text.starts_with(NETWORK) {
            Line::Network(text)
        } else if text.starts_with(CONNECTION) {
            Line::Connection(text)
        } else if text.starts_with(VIRTUAL_HOST) {
            Line::VirtualHost(text)
        } else if text.starts_with(EXT_APP) {
            Line::ExtApp(text)
        } else {
            Line::Ignored
        }
    }
}
