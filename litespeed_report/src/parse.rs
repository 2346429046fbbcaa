//! Field parsers for each record kind.
//!
//! Parsers are keyword agnostic inside a line: a `key: value` list stores
//! whatever keys it finds. Only classification decides which parser runs and
//! therefore which [`Snapshot`] group the keys land in.

use crate::{
    line::Line,
    snapshot::{DEFAULT_VIRTUAL_HOST, Metrics, Snapshot},
};

/// Shortest acceptable `VERSION:` line.
const VERSION_MIN_LEN: usize = 10;
/// Shortest acceptable `UPTIME:` line, `UPTIME: H:M:S` plus slack.
const UPTIME_MIN_LEN: usize = 16;
/// Offset of the `HH:MM:SS` triple, just past `UPTIME: `.
const UPTIME_OFFSET: usize = 8;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors produced by functions in this module
pub enum Error {
    /// The line is shorter than its record kind allows.
    #[error("Parse line too short: {0}")]
    LineTooShort(String),
    /// The text did not split into the expected number of parts.
    #[error("Expected {expected} parts: {text}")]
    SplitCountMismatch {
        /// Number of parts required.
        expected: usize,
        /// The text that was split.
        text: String,
    },
    /// A list segment is not exactly one `key: value` pair.
    #[error("Cannot split key value: {0}")]
    KeyValueSplit(String),
    /// A value is not a number.
    #[error("Cannot convert value to a number: {0}")]
    NumericConversion(String),
    /// Fewer `[...]` names than the record kind requires.
    #[error("Expected {expected} bracketed names: {text}")]
    BracketExtraction {
        /// Number of names required.
        expected: usize,
        /// The offending line.
        text: String,
    },
}

impl Line<'_> {
    /// Parse this line into `snapshot`.
    ///
    /// On error `snapshot` is left as it was before the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not follow the grammar of its record
    /// kind.
    pub fn apply(&self, snapshot: &mut Snapshot) -> Result<(), Error> {
        match *self {
            Line::Version(text) => {
                snapshot.version = version(text)?.to_string();
            }
            Line::Uptime(text) => {
                snapshot.uptime_seconds = uptime(text)?;
            }
            Line::Network(text) => {
                snapshot.network = key_values(text)?;
            }
            Line::Connection(text) => {
                snapshot.connections = key_values(text)?;
            }
            Line::VirtualHost(text) => {
                let (names, tail) = named_tail::<1>(text)?;
                let [vhost] = names;
                let metrics = key_values(tail)?;
                snapshot
                    .virtual_hosts
                    .insert(vhost_or_default(vhost).to_string(), metrics);
            }
            Line::ExtApp(text) => {
                let (names, tail) = named_tail::<3>(text)?;
                let [app_type, vhost, instance] = names;
                let metrics = key_values(tail)?;
                snapshot.insert_ext_app(app_type, vhost_or_default(vhost), instance, metrics);
            }
            Line::Ignored => {}
        }
        Ok(())
    }
}

/// Extract the version from `VERSION: LiteSpeed Web Server/Enterprise/5.8.1`.
///
/// The last `/` separated segment is returned verbatim.
///
/// # Errors
///
/// Returns [`Error::LineTooShort`] if `line` is shorter than 10 bytes.
pub fn version(line: &str) -> Result<&str, Error> {
    if line.len() < VERSION_MIN_LEN {
        return Err(Error::LineTooShort(line.to_string()));
    }
    Ok(line.rsplit_once('/').map_or(line, |(_, version)| version))
}

/// Convert `UPTIME: HH:MM:SS` to seconds.
///
/// # Errors
///
/// Returns [`Error::LineTooShort`] for lines under 16 bytes,
/// [`Error::SplitCountMismatch`] unless there are exactly three components and
/// [`Error::NumericConversion`] if a component is not an unsigned integer.
pub fn uptime(line: &str) -> Result<u64, Error> {
    if line.len() < UPTIME_MIN_LEN {
        return Err(Error::LineTooShort(line.to_string()));
    }
    let triple = line
        .get(UPTIME_OFFSET..)
        .ok_or_else(|| Error::LineTooShort(line.to_string()))?;

    let parts: Vec<&str> = triple.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(Error::SplitCountMismatch {
            expected: 3,
            text: triple.to_string(),
        });
    };

    let hours = uptime_component(hours)?;
    let minutes = uptime_component(minutes)?;
    let seconds = uptime_component(seconds)?;

    Ok(hours
        .saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds))
}

fn uptime_component(text: &str) -> Result<u64, Error> {
    let text = text.trim();
    text.parse::<u64>()
        .map_err(|_| Error::NumericConversion(text.to_string()))
}

/// Convert `"xxxx: 1234, oooo: 432.1"` to `{xxxx: 1234, oooo: 432.1}`.
///
/// Segments are separated by `,`, keys from values by a single `:`. Keys and
/// values are trimmed. A repeated key keeps its last value.
///
/// # Errors
///
/// Returns [`Error::KeyValueSplit`] for a segment that does not split into
/// exactly one key and one value -- a missing `:` or a missing `,` -- and
/// [`Error::NumericConversion`] for a value that is not a finite number.
pub fn key_values(text: &str) -> Result<Metrics, Error> {
    let mut metrics = Metrics::default();
    for segment in text.split(',') {
        let (key, value) = segment
            .split_once(':')
            .filter(|(_, value)| !value.contains(':'))
            .ok_or_else(|| Error::KeyValueSplit(segment.to_string()))?;
        let value = value.trim();
        let number = value
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| Error::NumericConversion(value.to_string()))?;
        metrics.insert(key.trim().to_string(), number);
    }
    Ok(metrics)
}

/// Pick the contents of each `[...]` group out of `line`, left to right.
///
/// `"EXTAPP [LSAPI] [hoge.com] [hoge.com_php7.3]: ..."` yields
/// `["LSAPI", "hoge.com", "hoge.com_php7.3"]`. Names are trimmed; an empty
/// group yields an empty name. Scanning stops at the first `[` without a
/// closing `]`.
#[must_use]
pub fn bracket_names(line: &str) -> Vec<&str> {
    bracket_groups(line).map(|(name, _)| name).collect()
}

/// Yields each bracketed name together with the offset just past its `]`.
fn bracket_groups(line: &str) -> impl Iterator<Item = (&str, usize)> {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        let rest = &line[cursor..];
        let open = rest.find('[')?;
        let close = rest[open..].find(']')? + open;
        let name = rest[open + 1..close].trim();
        cursor += close + 1;
        Some((name, cursor))
    })
}

/// Split a named record into its first `N` bracketed names and the key value
/// list that follows the `:` after the last of them.
fn named_tail<const N: usize>(line: &str) -> Result<([&str; N], &str), Error> {
    let mismatch = || Error::BracketExtraction {
        expected: N,
        text: line.to_string(),
    };

    let mut names = [""; N];
    let mut end = 0;
    let mut groups = bracket_groups(line);
    for slot in &mut names {
        let (name, after) = groups.next().ok_or_else(mismatch)?;
        *slot = name;
        end = after;
    }

    // Names may themselves hold a `:`, `[hoge.jp:80]`, so the list starts at
    // the first `:` after the closing bracket.
    let rest = &line[end..];
    let colon = rest
        .find(':')
        .ok_or_else(|| Error::KeyValueSplit(rest.to_string()))?;
    Ok((names, &rest[colon + 1..]))
}

fn vhost_or_default(name: &str) -> &str {
    if name.is_empty() {
        DEFAULT_VIRTUAL_HOST
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::snapshot::{connection, ext_app, network, virtual_host};

    fn apply(text: &str) -> Result<Snapshot, Error> {
        let mut snapshot = Snapshot::new();
        Line::classify(text).apply(&mut snapshot)?;
        Ok(snapshot)
    }

    #[test]
    fn version_takes_last_segment() {
        assert_eq!(
            version("VERSION: LiteSpeed Web Server/Enterprise/5.8.1"),
            Ok("5.8.1")
        );
        assert_eq!(
            version("VERSION: LiteSpeed Web Server/Enterprise/5.4.12 to 5.4.13"),
            Ok("5.4.12 to 5.4.13")
        );
        assert_eq!(version("VERSION: 6"), Ok("VERSION: 6"));
    }

    #[test]
    fn version_too_short() {
        assert_eq!(
            version("VERSION:"),
            Err(Error::LineTooShort("VERSION:".to_string()))
        );
    }

    #[test]
    fn uptime_values() {
        assert_eq!(uptime("UPTIME: 00:00:00"), Ok(0));
        assert_eq!(uptime("UPTIME: 23:59:59"), Ok(86_399));
        assert_eq!(uptime("UPTIME: 03:02:01"), Ok(10_921));
        assert_eq!(uptime("UPTIME: 15:34:30"), Ok(56_070));
        assert_eq!(uptime("UPTIME: 123:04:05"), Ok(443_045));
    }

    #[test]
    fn uptime_errors() {
        assert!(matches!(
            uptime("UPTIME: 1:2:3"),
            Err(Error::LineTooShort(_))
        ));
        assert!(matches!(
            uptime("UPTIME: 0000:00:00:00"),
            Err(Error::SplitCountMismatch { expected: 3, .. })
        ));
        assert!(matches!(
            uptime("UPTIME: 0000000000"),
            Err(Error::SplitCountMismatch { expected: 3, .. })
        ));
        assert_eq!(
            uptime("UPTIME: aa:00:00"),
            Err(Error::NumericConversion("aa".to_string()))
        );
    }

    #[test]
    fn key_values_single_and_multi() {
        let single = key_values("xxxx: 1234").expect("single pair parses");
        assert_eq!(single.len(), 1);
        assert_eq!(single["xxxx"], 1234.0);

        let multi = key_values("xxxx: 1234, oooo: 432.1").expect("pairs parse");
        assert_eq!(multi.len(), 2);
        assert_eq!(multi["xxxx"], 1234.0);
        assert_eq!(multi["oooo"], 432.1);
    }

    #[test]
    fn key_values_missing_comma() {
        // Two pairs run together in one segment.
        assert_eq!(
            key_values("xxxx: 1234 oooo: 432.1"),
            Err(Error::KeyValueSplit("xxxx: 1234 oooo: 432.1".to_string()))
        );
        // A segment with no colon at all.
        assert_eq!(
            key_values("xxxx: 1234, oooo"),
            Err(Error::KeyValueSplit(" oooo".to_string()))
        );
    }

    #[test]
    fn key_values_rejects_non_finite() {
        assert!(matches!(
            key_values("xxxx: NaN"),
            Err(Error::NumericConversion(_))
        ));
        assert!(matches!(
            key_values("xxxx: inf"),
            Err(Error::NumericConversion(_))
        ));
    }

    #[test]
    fn key_values_last_duplicate_wins() {
        let metrics = key_values("xxxx: 1, xxxx: 2").expect("pairs parse");
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics["xxxx"], 2.0);
    }

    #[test]
    fn bracket_names_in_order() {
        assert_eq!(
            bracket_names("REQ_RATE [hoge.com]: REQ_PROCESSING: 1"),
            vec!["hoge.com"]
        );
        assert_eq!(
            bracket_names("EXTAPP [LSAPI] [hoge.com] [hoge.com_php7.3]: CMAXCONN: 1000,"),
            vec!["LSAPI", "hoge.com", "hoge.com_php7.3"]
        );
        assert_eq!(
            bracket_names("EXTAPP [LSAPI] [hoge.com:80] [hoge.com_php7.3]: CMAXCONN: 1000,"),
            vec!["LSAPI", "hoge.com:80", "hoge.com_php7.3"]
        );
        assert_eq!(
            bracket_names("EXTAPP [LSAPI] [ hoge.com] [hoge.com_php7.3]: CMAXCONN: 1000,"),
            vec!["LSAPI", "hoge.com", "hoge.com_php7.3"]
        );
        assert_eq!(bracket_names("REQ_RATE []: REQ_PROCESSING: 1"), vec![""]);
        assert_eq!(bracket_names("REQ_RATE [open: 1"), Vec::<&str>::new());
    }

    #[test]
    fn network_line() {
        let snapshot =
            apply("BPS_IN: 2, BPS_OUT: 1954, SSL_BPS_IN: 5, SSL_BPS_OUT: 3332").expect("parses");
        assert_eq!(snapshot.network[network::BPS_IN], 2.0);
        assert_eq!(snapshot.network[network::BPS_OUT], 1954.0);
        assert_eq!(snapshot.network[network::SSL_BPS_IN], 5.0);
        assert_eq!(snapshot.network[network::SSL_BPS_OUT], 3332.0);

        assert!(apply("BPS_IN: 2 BPS_OUT: 1954").is_err());
    }

    #[test]
    fn connection_line() {
        let snapshot = apply(
            "MAXCONN: 10000, MAXSSL_CONN: 5000, PLAINCONN: 100, AVAILCONN: 200, IDLECONN: 1, SSLCONN: 2, AVAILSSL: 3",
        )
        .expect("parses");
        assert_eq!(snapshot.connections.len(), 7);
        assert_eq!(snapshot.connections[connection::MAXCONN], 10_000.0);
        assert_eq!(snapshot.connections[connection::AVAILSSL], 3.0);

        assert!(
            apply("MAXCONN: 10000 MAXSSL_CONN: 5000, PLAINCONN: 100, AVAILCONN: 200").is_err()
        );
    }

    #[test]
    fn virtual_host_line() {
        let tail = "REQ_PROCESSING: 1, REQ_PER_SEC: 0.1, TOT_REQS: 2, PUB_CACHE_HITS_PER_SEC: 0.2, \
                    TOTAL_PUB_CACHE_HITS: 3, PRIVATE_CACHE_HITS_PER_SEC: 0.3, TOTAL_PRIVATE_CACHE_HITS: 4, \
                    STATIC_HITS_PER_SEC: 0.4, TOTAL_STATIC_HITS: 5";

        for (name, expected) in [("hoge.jp", "hoge.jp"), ("hoge.jp:80", "hoge.jp:80"), ("", "Server")] {
            let snapshot = apply(&format!("REQ_RATE [{name}]: {tail}")).expect("parses");
            let metrics = &snapshot.virtual_hosts[expected];
            assert_eq!(metrics.len(), 9);
            assert_eq!(metrics[virtual_host::REQ_PER_SEC], 0.1);
            assert_eq!(metrics[virtual_host::TOTAL_STATIC_HITS], 5.0);
            assert!(!snapshot.virtual_hosts.contains_key(""));
        }
    }

    #[test]
    fn virtual_host_double_colon() {
        let res = apply("REQ_RATE [hoge.jp]:: REQ_PROCESSING: 1, REQ_PER_SEC: 0.1");
        assert!(matches!(res, Err(Error::KeyValueSplit(_))));
    }

    #[test]
    fn virtual_host_without_brackets() {
        let res = apply("REQ_RATE: REQ_PROCESSING: 1");
        assert!(matches!(
            res,
            Err(Error::BracketExtraction { expected: 1, .. })
        ));
    }

    #[test]
    fn ext_app_line() {
        let snapshot = apply(
            "EXTAPP [CGI] [] [lscgid]: CMAXCONN: 2, EMAXCONN: 3, POOL_SIZE: 4, INUSE_CONN: 5, \
             IDLE_CONN: 6, WAITQUE_DEPTH: 7, REQ_PER_SEC: 0.8, TOT_REQS: 9",
        )
        .expect("parses");
        let metrics = &snapshot.ext_apps["CGI"]["Server"]["lscgid"];
        assert_eq!(metrics.len(), 8);
        assert_eq!(metrics[ext_app::CMAXCONN], 2.0);
        assert_eq!(metrics[ext_app::REQ_PER_SEC], 0.8);
        assert_eq!(metrics[ext_app::TOT_REQS], 9.0);
    }

    #[test]
    fn ext_app_with_port() {
        let snapshot = apply(
            "EXTAPP [LSAPI] [fuga.com:80] [fuga.com_php73]: CMAXCONN: 1, EMAXCONN: 2, POOL_SIZE: 3",
        )
        .expect("parses");
        assert_eq!(
            snapshot.ext_apps["LSAPI"]["fuga.com:80"]["fuga.com_php73"][ext_app::POOL_SIZE],
            3.0
        );
    }

    #[test]
    fn ext_app_too_few_names() {
        let res = apply("EXTAPP [LSA:PI] [fuga.com]: CMAXCONN: 2, EMAXCONN: 3");
        assert!(matches!(
            res,
            Err(Error::BracketExtraction { expected: 3, .. })
        ));
    }

    #[test]
    fn ignored_line_is_noop() {
        let snapshot = apply("BLOCKED_IP:").expect("ignored lines never fail");
        assert_eq!(snapshot, Snapshot::new());
    }

    #[test]
    fn failed_apply_leaves_snapshot_untouched() {
        let mut snapshot = Snapshot::new();
        Line::classify("BPS_IN: 1, BPS_OUT: 2")
            .apply(&mut snapshot)
            .expect("parses");
        let res = Line::classify("BPS_IN: 3, BPS_OUT").apply(&mut snapshot);
        assert!(res.is_err());
        assert_eq!(snapshot.network[network::BPS_IN], 1.0);
    }

    proptest! {
        #[test]
        fn no_panic_on_any_line(input: String) {
            let mut snapshot = Snapshot::new();
            let _ = Line::classify(&input).apply(&mut snapshot);
        }

        #[test]
        fn uptime_is_weighted_sum(h in 0u64..10_000, m in 0u64..60, s in 0u64..60) {
            let line = format!("UPTIME: {h:02}:{m:02}:{s:02}");
            prop_assert_eq!(uptime(&line), Ok(h * 3600 + m * 60 + s));
        }

        #[test]
        fn key_values_recovers_pairs(
            pairs in prop::collection::btree_map("[A-Z_]{1,16}", 0u32..1_000_000, 1..10)
        ) {
            let text = pairs
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ");
            let metrics = key_values(&text).expect("generated list parses");
            prop_assert_eq!(metrics.len(), pairs.len());
            for (k, v) in &pairs {
                prop_assert_eq!(metrics[k.as_str()], f64::from(*v));
            }
        }
    }
}
