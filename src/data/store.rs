//! Measurement file reader.
//!
//! Data files hold one record per line, nine comma-separated numbers:
//!
//! ```text
//! # x, xErrLow, xErrHigh, y, yErrLow, yErrHigh, z, zErrLow, zErrHigh
//! 1.0, 0.1, 0.1, 0, 0, 0, 10, 1, 1
//! ```
//!
//! Empty fields between delimiters are skipped. A line that does not resolve
//! to exactly nine numbers, or that carries a negative error bar, is reported
//! and dropped; the rest of the file is still read.

use std::path::{Path, PathBuf};

/// Field names in record order.
const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "x", "xErrLow", "xErrHigh", "y", "yErrLow", "yErrHigh", "z", "zErrLow", "zErrHigh",
];

/// Positions of the error-bar fields.
const ERROR_FIELDS: [usize; 6] = [1, 2, 4, 5, 7, 8];

use super::measurement::{Defaults, Measurement, ResponseReference, FIELD_COUNT};
use crate::error::{FitError, Result};

/// Outcome of reading one data file.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub measurements: Vec<Measurement>,
    /// One [`FitError::MalformedRow`] per dropped line.
    pub malformed: Vec<FitError>,
}

fn parse_record(line: &str) -> std::result::Result<[f64; FIELD_COUNT], String> {
    let fields: Vec<&str> = line
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if fields.len() != FIELD_COUNT {
        return Err(format!(
            "expected {} fields, found {}",
            FIELD_COUNT,
            fields.len()
        ));
    }

    let mut record = [0.0; FIELD_COUNT];
    for (slot, field) in record.iter_mut().zip(&fields) {
        *slot = field
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", field))?;
        if !slot.is_finite() {
            return Err(format!("'{}' is not finite", field));
        }
    }

    for &k in &ERROR_FIELDS {
        if record[k] < 0.0 {
            return Err(format!("{} is negative ({})", FIELD_NAMES[k], record[k]));
        }
    }
    Ok(record)
}

/// Parse measurement records from text. `path` is only used for reporting.
pub fn parse_measurements(text: &str, path: &Path) -> LoadReport {
    let mut report = LoadReport::default();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match parse_record(trimmed) {
            Ok(fields) => report.measurements.push(Measurement::from_fields(&fields)),
            Err(message) => {
                let err = FitError::MalformedRow {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message,
                };
                log::warn!("{}; row skipped", err);
                report.malformed.push(err);
            }
        }
    }

    report
}

/// Read a data file and fill unspecified uncertainties from `defaults`.
pub fn load_measurements(
    path: impl Into<PathBuf>,
    defaults: &Defaults,
    reference: ResponseReference,
) -> Result<LoadReport> {
    let path = path.into();
    let text = std::fs::read_to_string(&path).map_err(|e| FitError::open(&path, e))?;

    let mut report = parse_measurements(&text, &path);
    for m in report.measurements.iter_mut() {
        m.apply_defaults(defaults, reference);
    }

    log::info!(
        "read {} measurements from {} ({} rows skipped)",
        report.measurements.len(),
        path.display(),
        report.malformed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_and_empty_fields() {
        let text = "# header\n\n1,0.1,0.1,0,0,0,10,1,1\n  2, 0.1,,0.1, 0,0,0, 20,1,1,\n";
        let report = parse_measurements(text, Path::new("inline"));
        assert!(report.malformed.is_empty());
        assert_eq!(report.measurements.len(), 2);
        assert_eq!(report.measurements[1].z, 20.0);
        assert_eq!(report.measurements[1].x_err_high, 0.1);
    }

    #[test]
    fn test_short_row_is_one_malformed_row() {
        let text = "1,0.1,0.1,0,0,0,10,1,1\n2,0.1,0.1,0,0,0,20,1\n3,0.1,0.1,0,0,0,31,1,1\n";
        let report = parse_measurements(text, Path::new("set.txt"));
        assert_eq!(report.measurements.len(), 2);
        assert_eq!(report.malformed.len(), 1);
        match &report.malformed[0] {
            FitError::MalformedRow { line, .. } => assert_eq!(*line, 2),
            other => panic!("Expected MalformedRow, got {other:?}"),
        }
        assert_eq!(report.measurements[1].x, 3.0);
    }

    #[test]
    fn test_extra_and_bad_fields() {
        let text = "1,2,3,4,5,6,7,8,9,10\n1,2,3,4,five,6,7,8,9\n";
        let report = parse_measurements(text, Path::new("inline"));
        assert!(report.measurements.is_empty());
        assert_eq!(report.malformed.len(), 2);
    }

    #[test]
    fn test_negative_error_bar_is_malformed() {
        let text = "1,0.1,0.1,0,0,0,10,-1,1\n2,0.1,0.1,-5,0,0,-20,1,1\n3,-0.1,0.1,0,0,0,31,1,1\n";
        let report = parse_measurements(text, Path::new("set.txt"));

        // Negative coordinates are fine, negative error bars are not
        assert_eq!(report.measurements.len(), 1);
        assert_eq!(report.measurements[0].y, -5.0);
        assert_eq!(report.malformed.len(), 2);
        match &report.malformed[0] {
            FitError::MalformedRow { line, message, .. } => {
                assert_eq!(*line, 1);
                assert!(message.contains("zErrLow"), "{}", message);
            }
            other => panic!("Expected MalformedRow, got {other:?}"),
        }
        match &report.malformed[1] {
            FitError::MalformedRow { line, message, .. } => {
                assert_eq!(*line, 3);
                assert!(message.contains("xErrLow"), "{}", message);
            }
            other => panic!("Expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let defaults = Defaults {
            yield_uncertainty: 0.0,
            energy_uncertainty: 0.0,
            field_uncertainty: 0.0,
            low_field: 0.0,
        };
        let missing = std::env::temp_dir().join("chainfit-no-such-dataset.txt");
        assert!(matches!(
            load_measurements(missing, &defaults, ResponseReference::Response),
            Err(FitError::FileNotFound { .. })
        ));
    }
}
