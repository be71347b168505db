//! Command-line front end: settings, logging, the fit pipeline and its outputs.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::config::{Catalog, Settings};
use crate::data::load_datasets;
use crate::error::{FitError, Result};
use crate::fit::{assemble, FitDriver, FitResult};
use crate::model::ModelKey;
use crate::recipe::RecipeResolver;
use crate::report;

/// Fit a calibration model to its datasets.
#[derive(Parser, Debug, Clone)]
#[command(name = "chainfit")]
#[command(version)]
#[command(about = "Calibration fitting with asymmetric uncertainties and recipe chaining")]
pub struct Cli {
    /// Model type, e.g. NRQY
    pub model_type: String,

    /// Model id within the type
    pub model_id: u32,

    /// Settings file
    #[arg(long, default_value = "Settings.txt")]
    pub settings: PathBuf,
}

impl Cli {
    pub fn key(&self) -> ModelKey {
        ModelKey::new(&self.model_type, self.model_id)
    }
}

/// Where and how results are published.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub directory: PathBuf,
    pub results_to_file: bool,
    pub save_parameters: bool,
}

impl OutputOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            directory: settings.get_path("OutputDirectory")?,
            results_to_file: settings.get_bool("ResultsToFile")?,
            save_parameters: settings.get_bool("SaveParameters")?,
        })
    }
}

/// Install the `env_logger` backend.
///
/// `RUST_LOG` wins when set; otherwise `level` (from `Verbosity`) applies.
pub fn init_logging(level: LevelFilter) {
    let mut builder = if std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_default_env()
    } else {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        builder
    };
    // A second initialization (tests, embedding) keeps the first logger
    let _ = builder.format_timestamp(None).try_init();
}

/// Run the command line: load settings, set up logging, fit, publish.
pub fn run(cli: &Cli) -> Result<FitResult> {
    let settings = Settings::load(&cli.settings)?;
    init_logging(settings.log_level()?);
    log::info!("chainfit {} using {}", crate::VERSION, settings.source().display());
    fit_model(&settings, &cli.key())
}

/// Fit the model `key` as configured by `settings` and publish the result.
///
/// Every setting is read before the minimizer runs, so configuration
/// problems never cost a minimization.
pub fn fit_model(settings: &Settings, key: &ModelKey) -> Result<FitResult> {
    let catalog = Catalog::load(settings.get("FunctionDefinitions")?)?;
    let definition = catalog.definition(key)?;
    if definition.datasets.is_empty() {
        return Err(FitError::InvalidDefinition {
            model: key.to_string(),
            message: "no datasets listed; the model can only serve as a recipe".to_string(),
        });
    }

    let defaults = settings.defaults()?;
    let config = settings.minimizer_config()?;
    let output = OutputOptions::from_settings(settings)?;
    let data_dir = settings.get_path("DataDirectory")?;
    let recipe_dir = settings.get_path("RecipeDirectory")?;

    let datasets = load_datasets(&definition.datasets, &data_dir, &defaults, definition.arity())?;
    let mut resolver = RecipeResolver::new(&catalog, recipe_dir);
    let inputs = assemble(datasets, &mut resolver)?;

    let mut driver = FitDriver::new(config);
    driver.configure(definition, inputs)?;
    let result = driver.minimize()?.clone();

    publish(&result, &output)?;
    Ok(result)
}

/// Print or write the report, and persist the recipe log and JSON copy.
pub fn publish(result: &FitResult, output: &OutputOptions) -> Result<()> {
    if output.results_to_file {
        report::write_report(result, &output.directory)?;
    } else {
        print!("{}", report::format_report(result));
    }

    if output.save_parameters {
        result.save_log(&output.directory)?;
        result.save_json(&output.directory)?;
    }
    Ok(())
}
