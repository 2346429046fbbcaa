//! Prometheus exporter for LiteSpeed real-time reports.
//!
//! This library supports the `litespeed_exporter` and `rtdump` binaries found
//! elsewhere in this crate: configuration, the mapping from report keys to
//! gauges and the HTTP endpoint that serves them.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod exporter;
pub mod httpd;
