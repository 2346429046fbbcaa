//! Parse and merge LiteSpeed real-time report files.
//!
//! A running LiteSpeed server writes one `.rtreport*` file per worker process
//! into its report directory, by default `/tmp/lshttpd`. This library reads
//! every such file, parses each into a [`Snapshot`] and sums the snapshots
//! into one server wide view. Exposing that view is left to callers.

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

use std::{io, path::PathBuf};

pub mod aggregate;
pub mod line;
pub mod load;
pub mod merge;
pub mod parse;
pub mod snapshot;

pub use aggregate::{Aggregator, Config};
pub use merge::merge;
pub use snapshot::Snapshot;

/// Directory LiteSpeed writes its real-time reports into.
pub const DEFAULT_REPORT_PATH: &str = "/tmp/lshttpd";
/// Every report file name starts with this.
pub const REPORT_FILE_PREFIX: &str = ".rtreport";

#[derive(thiserror::Error, Debug)]
/// Errors produced while collecting reports
pub enum Error {
    /// The report directory could not be listed.
    #[error("Unable to read report directory {path}: {source}")]
    DirectoryUnreadable {
        /// The report directory.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A report file could not be read.
    #[error("Unable to read report {path}: {source}")]
    SourceUnavailable {
        /// The report file.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A report line failed to parse.
    #[error("{path}:{line}: {source}")]
    Parse {
        /// The report file.
        path: PathBuf,
        /// 1-based number of the failing line.
        line: usize,
        /// What went wrong on that line.
        source: parse::Error,
    },
    /// The report directory holds no report files.
    #[error("No report files found in {0}")]
    NoReportFiles(PathBuf),
    /// Two snapshots being merged both carried an error.
    #[error("{first}\n--------------{second}")]
    Combined {
        /// Error of the first operand.
        first: Box<Error>,
        /// Error of the second operand.
        second: Box<Error>,
    },
    /// A load or merge task panicked or was cancelled.
    #[error("Report worker failed: {0}")]
    Worker(String),
    /// Collection was abandoned after a shutdown signal.
    #[error("Collection abandoned on shutdown")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_message_keeps_order() {
        let error = Error::Combined {
            first: Box::new(Error::NoReportFiles(PathBuf::from("/a"))),
            second: Box::new(Error::Shutdown),
        };
        assert_eq!(
            error.to_string(),
            "No report files found in /a\n--------------Collection abandoned on shutdown"
        );
    }

    #[test]
    fn parse_error_names_file_and_line() {
        let error = Error::Parse {
            path: PathBuf::from("/tmp/lshttpd/.rtreport.2"),
            line: 4,
            source: parse::Error::NumericConversion("abc".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "/tmp/lshttpd/.rtreport.2:4: Cannot convert value to a number: abc"
        );
    }
}
