//! Assembly of the global measurement sequence and covariance.

use ndarray::Array2;

use crate::covariance::{identity_block, CovarianceBuilder};
use crate::data::{Dataset, Measurement};
use crate::error::Result;
use crate::model::Recipe;
use crate::recipe::{apply_recipe, RecipeResolver};

/// Everything the driver needs to know about the data of one fit.
#[derive(Debug, Clone)]
pub struct FitInputs {
    /// All datasets concatenated in catalog order.
    pub measurements: Vec<Measurement>,
    /// Global covariance, indexed like `measurements`.
    pub covariance: Array2<f64>,
    /// True if any dataset went through a chained recipe.
    pub generalized: bool,
}

impl FitInputs {
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// Apply recipes and build the block-diagonal global covariance.
///
/// Chained datasets are transformed in place through `resolver`; identity
/// datasets contribute their response variances on the diagonal.
pub fn assemble(datasets: Vec<Dataset>, resolver: &mut RecipeResolver<'_>) -> Result<FitInputs> {
    let total = datasets.iter().map(Dataset::len).sum();
    let mut builder = CovarianceBuilder::new(total);
    let mut measurements = Vec::with_capacity(total);
    let mut generalized = false;

    for mut dataset in datasets {
        let block = match dataset.recipe.clone() {
            Recipe::Identity => identity_block(&dataset.measurements),
            Recipe::Chained(key) => {
                generalized = true;
                let aux = resolver.resolve(&key)?;
                apply_recipe(&mut dataset, aux)?
            }
        };
        builder.push_block(&block)?;
        log::debug!(
            "dataset {}: {} points at offset {}",
            dataset.name,
            dataset.len(),
            measurements.len()
        );
        measurements.extend(dataset.measurements);
    }

    Ok(FitInputs {
        measurements,
        covariance: builder.finish()?,
        generalized,
    })
}
