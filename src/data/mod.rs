//! Measurement store.
//!
//! Datasets are read once, before any fitting, and concatenated in catalog
//! order. That order is the index order of the global covariance matrix.

pub mod measurement;
pub mod store;

use std::path::Path;

pub use measurement::{Defaults, Measurement, ResponseReference};
pub use store::{load_measurements, parse_measurements, LoadReport};

use crate::error::{FitError, Result};
use crate::model::{Arity, DatasetSpec, Recipe};

/// An ordered set of measurements and the recipe that prepares their response.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub recipe: Recipe,
    pub measurements: Vec<Measurement>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// Reference coordinate for the default response uncertainty of a dataset.
pub fn response_reference(recipe: &Recipe, arity: Arity) -> ResponseReference {
    if recipe.is_identity() && arity == Arity::OneArgument {
        ResponseReference::Energy
    } else {
        ResponseReference::Response
    }
}

/// Load every dataset of a model from `data_dir`.
///
/// Malformed rows are dropped (and logged); a missing file aborts the load,
/// since skipping it would silently change the global measurement order.
pub fn load_datasets(
    specs: &[DatasetSpec],
    data_dir: &Path,
    defaults: &Defaults,
    arity: Arity,
) -> Result<Vec<Dataset>> {
    let mut datasets = Vec::with_capacity(specs.len());
    for spec in specs {
        let reference = response_reference(&spec.recipe, arity);
        let report = load_measurements(data_dir.join(&spec.name), defaults, reference)?;
        if report.measurements.is_empty() {
            log::warn!("dataset {} contains no usable measurements", spec.name);
        }
        datasets.push(Dataset {
            name: spec.name.clone(),
            recipe: spec.recipe.clone(),
            measurements: report.measurements,
        });
    }

    let total: usize = datasets.iter().map(Dataset::len).sum();
    if total == 0 {
        return Err(FitError::DimensionMismatch(
            "no measurements were loaded".to_string(),
        ));
    }
    Ok(datasets)
}
