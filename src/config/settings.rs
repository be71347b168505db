//! Run settings.
//!
//! The settings file is a flat list of `key: "value"` lines. Every value is
//! kept as a string and converted on lookup, so a missing or malformed key is
//! reported at the point it is actually needed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::data::measurement::Defaults;
use crate::error::{FitError, Result};
use crate::lm::config::MinimizerConfig;

use super::kv;

/// Key/value settings store.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
    source: PathBuf,
}

impl Settings {
    /// Load settings from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| FitError::open(path, e))?;
        let mut settings = Self::parse(&text, &path.display().to_string());
        settings.source = path.to_path_buf();
        Ok(settings)
    }

    /// Parse settings text. A key given twice keeps its first value.
    pub fn parse(text: &str, source: &str) -> Self {
        let mut values = HashMap::new();
        for entry in kv::parse_entries(text, source) {
            if values.contains_key(&entry.key) {
                log::warn!(
                    "{}:{}: duplicate setting {} ignored",
                    source,
                    entry.line,
                    entry.key
                );
                continue;
            }
            values.insert(entry.key, entry.value);
        }
        Self {
            values,
            source: PathBuf::from(source),
        }
    }

    /// Path the settings were loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Raw string value of `key`.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| FitError::MissingConfigurationKey(key.to_string()))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        value.trim().parse::<T>().map_err(|_| FitError::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.parsed(key)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.parsed(key)
    }

    pub fn get_usize(&self, key: &str) -> Result<usize> {
        self.parsed(key)
    }

    /// Boolean value; only `true` and `false` (any case) are accepted.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get(key)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(FitError::InvalidSetting {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Directory-valued setting. An empty value means the working directory.
    pub fn get_path(&self, key: &str) -> Result<PathBuf> {
        let value = self.get(key)?.trim();
        if value.is_empty() {
            Ok(PathBuf::from("."))
        } else {
            Ok(PathBuf::from(value))
        }
    }

    /// Default uncertainties applied by the measurement store.
    pub fn defaults(&self) -> Result<Defaults> {
        Ok(Defaults {
            yield_uncertainty: self.get_f64("DefaultYieldUncertainty")?,
            energy_uncertainty: self.get_f64("DefaultEnergyUncertainty")?,
            field_uncertainty: self.get_f64("DefaultFieldUncertainty")?,
            low_field: self.get_f64("LowField")?,
        })
    }

    /// Minimizer configuration (`UP`, `MaxCalls`, `Tolerance`, `Hesse`).
    pub fn minimizer_config(&self) -> Result<MinimizerConfig> {
        let up = self.get_f64("UP")?;
        if !(up > 0.0) {
            return Err(FitError::InvalidSetting {
                key: "UP".to_string(),
                value: up.to_string(),
            });
        }
        let tolerance = self.get_f64("Tolerance")?;
        if !(tolerance > 0.0) {
            return Err(FitError::InvalidSetting {
                key: "Tolerance".to_string(),
                value: tolerance.to_string(),
            });
        }
        Ok(MinimizerConfig {
            up,
            max_calls: self.get_usize("MaxCalls")?,
            tolerance,
            hesse: self.get_bool("Hesse")?,
            ..MinimizerConfig::default()
        })
    }

    /// Log level implied by the `Verbosity` setting.
    pub fn log_level(&self) -> Result<log::LevelFilter> {
        let verbosity = self.get_i64("Verbosity")?;
        Ok(match verbosity {
            v if v < 0 => log::LevelFilter::Warn,
            0 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
    }
}
