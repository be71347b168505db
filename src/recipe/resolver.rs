//! Resolution of recipe references into fitted auxiliary models.

use std::collections::HashMap;
use std::path::PathBuf;

use ndarray::Array2;

use super::{log_file_name, RecipeLog};
use crate::config::Catalog;
use crate::covariance::chained_covariance;
use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::model::{ModelDefinition, ModelKey, Recipe};

/// A previously fit model: its definition and persisted best fit.
#[derive(Debug, Clone)]
pub struct AuxiliaryModel {
    pub definition: ModelDefinition,
    pub fitted: RecipeLog,
}

impl AuxiliaryModel {
    /// Pair a definition with its recipe log, checking that they agree in size.
    pub fn new(definition: ModelDefinition, fitted: RecipeLog) -> Result<Self> {
        let p = definition.parameter_count();
        if fitted.parameter_count() != p {
            return Err(FitError::DimensionMismatch(format!(
                "recipe log for {} holds {} parameters, definition has {}",
                definition.key,
                fitted.parameter_count(),
                p
            )));
        }
        Ok(Self { definition, fitted })
    }
}

/// Looks up recipe models in the catalog and their logs in the recipe directory.
pub struct RecipeResolver<'a> {
    catalog: &'a Catalog,
    recipe_dir: PathBuf,
    cache: HashMap<ModelKey, AuxiliaryModel>,
}

impl<'a> RecipeResolver<'a> {
    pub fn new(catalog: &'a Catalog, recipe_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            recipe_dir: recipe_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Load (once) the auxiliary model behind `key`.
    pub fn resolve(&mut self, key: &ModelKey) -> Result<&AuxiliaryModel> {
        if !self.cache.contains_key(key) {
            let definition = self.catalog.definition(key)?;
            let path = self.recipe_dir.join(log_file_name(key));
            let fitted = RecipeLog::load(&path)?;
            log::info!("using recipe {} from {}", key, path.display());
            self.cache
                .insert(key.clone(), AuxiliaryModel::new(definition, fitted)?);
        }
        self.cache.get(key).ok_or_else(|| {
            FitError::InvalidState(format!("recipe {} missing from cache", key))
        })
    }
}

/// Apply a chained recipe to a dataset in place and return its covariance block.
///
/// Every response becomes `M(x, y; p̂) - z`. The block is propagated from the
/// raw values, after which each response error is set to `sqrt(V_z[i,i])`.
pub fn apply_recipe(dataset: &mut Dataset, aux: &AuxiliaryModel) -> Result<Array2<f64>> {
    match &dataset.recipe {
        Recipe::Chained(key) if *key == aux.definition.key => {}
        other => {
            return Err(FitError::InvalidState(format!(
                "dataset {} has recipe {}, cannot apply {}",
                dataset.name, other, aux.definition.key
            )))
        }
    }

    let block = chained_covariance(&aux.definition, &aux.fitted, &dataset.measurements)?;

    let params = aux.fitted.params.view();
    for (i, m) in dataset.measurements.iter_mut().enumerate() {
        let prediction = aux.definition.evaluate(m.x, m.y, params)?;
        let sigma = block[[i, i]].max(0.0).sqrt();
        m.z = prediction - m.z;
        m.z_err_low = sigma;
        m.z_err_high = sigma;
    }

    log::debug!(
        "applied recipe {} to {} ({} points)",
        aux.definition.key,
        dataset.name,
        dataset.len()
    );
    Ok(block)
}
