//! Combine snapshots of several worker processes into one.
//!
//! Mapping fields merge by recursive union: a key only one side has is kept
//! as is, a key both sides have is merged again one level down until the
//! numeric leaves, which are summed. Over error free snapshots this is
//! commutative and associative, so the order in which worker results are
//! paired never changes the summed metrics.
//!
//! Errors poison. If one side carries an error the result carries that error
//! and no metrics; if both do, the result carries both messages. This is not
//! associative in *which* message surfaces when several files fail, only in
//! the fact that something failed.

use std::{collections::HashMap, hash::BuildHasher};

use crate::{Error, snapshot::Snapshot};

/// Absorb another value of the same shape into `self`.
pub trait Merge {
    /// Fold `other` into `self`.
    fn merge(&mut self, other: Self);
}

impl Merge for f64 {
    fn merge(&mut self, other: Self) {
        *self += other;
    }
}

impl<V, S> Merge for HashMap<String, V, S>
where
    V: Merge,
    S: BuildHasher,
{
    fn merge(&mut self, other: Self) {
        for (key, value) in other {
            match self.get_mut(&key) {
                Some(existing) => existing.merge(value),
                None => {
                    self.insert(key, value);
                }
            }
        }
    }
}

/// Merge two snapshots, see the module documentation for the rules.
///
/// `version` and `uptime_seconds` come from `a`: every worker of one server
/// reports the same values.
#[must_use]
pub fn merge(a: Snapshot, b: Snapshot) -> Snapshot {
    match (a.error, b.error) {
        (Some(first), Some(second)) => Snapshot::failed(Error::Combined {
            first: Box::new(first),
            second: Box::new(second),
        }),
        (Some(error), None) | (None, Some(error)) => Snapshot::failed(error),
        (None, None) => {
            let mut merged = Snapshot {
                version: a.version,
                uptime_seconds: a.uptime_seconds,
                network: a.network,
                connections: a.connections,
                virtual_hosts: a.virtual_hosts,
                ext_apps: a.ext_apps,
                error: None,
            };
            merged.network.merge(b.network);
            merged.connections.merge(b.connections);
            merged.virtual_hosts.merge(b.virtual_hosts);
            merged.ext_apps.merge(b.ext_apps);
            merged
        }
    }
}
