//! Build summary.
//!
//! Counts what a build produced and why securities and dates were skipped.

use minute_core::{Error, SkipCounts};
use minute_features::SecuritySamples;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate outcome of a dataset build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Securities in the catalog.
    pub securities_total: u64,
    /// Securities whose files were processed.
    pub securities_built: u64,
    /// Securities skipped because a source file is absent.
    pub missing_files: u64,
    /// Securities skipped because a table could not be parsed.
    pub format_errors: u64,
    /// Records emitted.
    pub records: u64,
    /// Skipped (security, date) pairs by reason.
    pub skips: SkipCounts,
}

impl BuildSummary {
    /// Account for one processed security.
    pub fn add_security(&mut self, samples: &SecuritySamples) {
        self.securities_built += 1;
        self.records += samples.records.len() as u64;
        self.skips.merge(&samples.skips);
    }

    /// Account for one skipped security.
    pub fn add_failure(&mut self, err: &Error) {
        match err {
            Error::FileNotFound { .. } => self.missing_files += 1,
            _ => self.format_errors += 1,
        }
    }

    /// Securities that produced no output because of an error.
    pub fn securities_skipped(&self) -> u64 {
        self.missing_files + self.format_errors
    }
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records from {}/{} securities ({} missing files, {} format errors); \
             skipped dates: {} no window, {} label missing, {} empty session, \
             {} degenerate window, {} malformed",
            self.records,
            self.securities_built,
            self.securities_total,
            self.missing_files,
            self.format_errors,
            self.skips.no_window,
            self.skips.label_missing,
            self.skips.empty_session,
            self.skips.degenerate_window,
            self.skips.malformed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minute_core::SkipReason;

    #[test]
    fn test_accumulate() {
        let mut summary = BuildSummary {
            securities_total: 3,
            ..Default::default()
        };

        let mut samples = SecuritySamples::default();
        samples.skips.record(&SkipReason::NoWindow);
        samples.skips.record(&SkipReason::LabelMissing);
        summary.add_security(&samples);
        summary.add_failure(&Error::file_not_found("/data/600000.csv"));
        summary.add_failure(&Error::data_format("missing column 'close'"));

        assert_eq!(summary.securities_built, 1);
        assert_eq!(summary.missing_files, 1);
        assert_eq!(summary.format_errors, 1);
        assert_eq!(summary.securities_skipped(), 2);
        assert_eq!(summary.skips.total(), 2);
        assert!(summary.to_string().starts_with("0 records from 1/3 securities"));
    }
}
