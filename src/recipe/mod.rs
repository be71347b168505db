//! Recipe chaining.
//!
//! A fit that other fits depend on leaves behind a recipe log: its best-fit
//! parameter vector and parameter covariance. A chained dataset loads that log
//! and replaces its response with the auxiliary model's prediction minus the
//! measured value, carrying the auxiliary model's uncertainty along.

pub mod resolver;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};

use crate::config::kv::split_list;
use crate::error::{FitError, Result};
use crate::model::ModelKey;

pub use resolver::{apply_recipe, AuxiliaryModel, RecipeResolver};

/// File name of the recipe log for `key`: `<Type><Id>Log.txt`.
pub fn log_file_name(key: &ModelKey) -> String {
    format!("{}Log.txt", key)
}

/// Best-fit parameters and their covariance, as persisted after a fit.
///
/// Layout: the first line is the comma-separated parameter vector, the next
/// `P` lines are the rows of the `P x P` covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeLog {
    pub params: Array1<f64>,
    pub covariance: Array2<f64>,
}

impl RecipeLog {
    pub fn new(params: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
        let p = params.len();
        if covariance.dim() != (p, p) {
            return Err(FitError::DimensionMismatch(format!(
                "recipe covariance is {}x{} for {} parameters",
                covariance.nrows(),
                covariance.ncols(),
                p
            )));
        }
        Ok(Self { params, covariance })
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Parse the recipe-log text format. `source` is only used in errors.
    pub fn parse(text: &str, source: &Path) -> Result<Self> {
        let malformed = |line: usize, message: String| FitError::MalformedRow {
            path: source.to_path_buf(),
            line,
            message,
        };
        let numbers = |line: usize, text: &str| -> Result<Vec<f64>> {
            split_list(text)
                .into_iter()
                .map(|item| {
                    item.parse::<f64>()
                        .map_err(|_| malformed(line, format!("'{}' is not a number", item)))
                })
                .collect()
        };

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let (first, header) = lines
            .next()
            .ok_or_else(|| malformed(1, "recipe log is empty".to_string()))?;
        let params = numbers(first, header)?;
        let p = params.len();

        let mut covariance = Array2::zeros((p, p));
        for row in 0..p {
            let (line, text) = lines.next().ok_or_else(|| {
                malformed(first + row + 1, format!("expected {} covariance rows, found {}", p, row))
            })?;
            let values = numbers(line, text)?;
            if values.len() != p {
                return Err(malformed(
                    line,
                    format!("covariance row has {} entries, expected {}", values.len(), p),
                ));
            }
            for (col, v) in values.into_iter().enumerate() {
                covariance[[row, col]] = v;
            }
        }

        Self::new(Array1::from_vec(params), covariance)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| FitError::open(path, e))?;
        Self::parse(&text, path)
    }

    /// Render in the recipe-log layout. `f64` `Display` is round-trip exact.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", join_row(self.params.iter()));
        for row in self.covariance.rows() {
            let _ = writeln!(out, "{}", join_row(row.iter()));
        }
        out
    }

    /// Write the log into `dir`, returning the path written.
    pub fn save(&self, dir: &Path, key: &ModelKey) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(key));
        std::fs::write(&path, self.to_text())?;
        log::info!("wrote recipe log {}", path.display());
        Ok(path)
    }
}

fn join_row<'a>(values: impl Iterator<Item = &'a f64>) -> String {
    values.map(f64::to_string).collect::<Vec<_>>().join(",")
}
