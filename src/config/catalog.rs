//! Model-definition catalog.
//!
//! Each model is described by a group of `key: "value"` lines whose keys are
//! `<Type><Tag><Id>`:
//!
//! | tag       | content                                   | required |
//! |-----------|-------------------------------------------|----------|
//! | `F`       | formula                                   | yes      |
//! | `P`       | initial parameter values                  | yes      |
//! | `LL`      | lower limits                              | yes      |
//! | `LH`      | upper limits                              | yes      |
//! | `S`       | step sizes                                | yes      |
//! | `Sets`    | dataset file names                        | no       |
//! | `Recipes` | one recipe tag per dataset                | no       |
//!
//! Keys are matched exactly, so `NRQYF1` never answers a lookup for `NRQYF10`.
//! A parameter whose `LL` and `LH` are both `0` has no limits.

use std::collections::HashMap;
use std::path::Path;

use ndarray::Array1;

use super::kv;
use crate::error::{FitError, Result};
use crate::model::{DatasetSpec, Formula, ModelDefinition, ModelKey, Recipe};

/// All definitions in a catalog file, indexed by key.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| FitError::open(path, e))?;
        Ok(Self::parse(&text, &path.display().to_string()))
    }

    pub fn parse(text: &str, source: &str) -> Self {
        let mut entries = HashMap::new();
        for entry in kv::parse_entries(text, source) {
            entries.entry(entry.key).or_insert(entry.value);
        }
        Self { entries }
    }

    fn lookup(&self, key: &ModelKey, tag: &str) -> Option<&str> {
        self.entries
            .get(&format!("{}{}{}", key.model_type, tag, key.model_id))
            .map(String::as_str)
    }

    fn required(&self, key: &ModelKey, tag: &str) -> Result<&str> {
        self.lookup(key, tag).ok_or_else(|| {
            log::debug!("catalog has no {}{}{} entry", key.model_type, tag, key.model_id);
            FitError::ModelDefinitionNotFound {
                model_type: key.model_type.clone(),
                model_id: key.model_id,
            }
        })
    }

    fn numbers(&self, key: &ModelKey, tag: &str) -> Result<Array1<f64>> {
        let raw = self.required(key, tag)?;
        let values = kv::split_list(raw)
            .into_iter()
            .map(|item| {
                item.parse::<f64>().map_err(|_| FitError::InvalidDefinition {
                    model: key.to_string(),
                    message: format!("{} entry has non-numeric item '{}'", tag, item),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Array1::from_vec(values))
    }

    /// Whether all required entries for `key` are present.
    pub fn contains(&self, key: &ModelKey) -> bool {
        ["F", "P", "LL", "LH", "S"]
            .iter()
            .all(|tag| self.lookup(key, tag).is_some())
    }

    /// Load and validate the definition of one model.
    pub fn definition(&self, key: &ModelKey) -> Result<ModelDefinition> {
        let formula = Formula::parse(self.required(key, "F")?)?;
        let initial = self.numbers(key, "P")?;
        let lower = self.numbers(key, "LL")?;
        let upper = self.numbers(key, "LH")?;
        let steps = self.numbers(key, "S")?;

        let sets = self.lookup(key, "Sets").map(kv::split_list).unwrap_or_default();
        let recipes = self
            .lookup(key, "Recipes")
            .map(kv::split_list)
            .unwrap_or_default();

        // A catalog may omit Recipes entirely when every set is used raw
        let recipes = if recipes.is_empty() {
            vec![Recipe::Identity; sets.len()]
        } else if recipes.len() != sets.len() {
            return Err(FitError::InvalidDefinition {
                model: key.to_string(),
                message: format!(
                    "{} datasets but {} recipes",
                    sets.len(),
                    recipes.len()
                ),
            });
        } else {
            recipes
                .into_iter()
                .map(Recipe::parse)
                .collect::<Result<Vec<_>>>()?
        };

        if let Some(Recipe::Chained(own)) = recipes.iter().find(|r| **r == Recipe::Chained(key.clone())) {
            return Err(FitError::InvalidDefinition {
                model: key.to_string(),
                message: format!("dataset recipe {} refers to the model itself", own),
            });
        }

        let datasets = sets
            .into_iter()
            .zip(recipes)
            .map(|(name, recipe)| DatasetSpec {
                name: name.to_string(),
                recipe,
            })
            .collect();

        let definition = ModelDefinition::new(
            key.clone(),
            formula,
            initial,
            lower,
            upper,
            steps,
            datasets,
        )?;
        log::debug!(
            "loaded {}: {} ({} parameters, {} datasets)",
            key,
            definition.formula.text(),
            definition.parameter_count(),
            definition.datasets.len()
        );
        Ok(definition)
    }
}
