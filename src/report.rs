//! Human-readable fit summary.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fit::FitResult;
use crate::model::ModelKey;

const RULE: &str = "******************************************************";

/// File name of the written report: `FitResults_<Type><Id>.txt`.
pub fn report_file_name(key: &ModelKey) -> String {
    format!("FitResults_{}.txt", key)
}

/// Render the summary of a fit.
pub fn format_report(result: &FitResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "ModelType: {}", result.model.model_type);
    let _ = writeln!(out, "ModelID: {}", result.model.model_id);
    let _ = writeln!(out, "ModelString: {}", result.formula);
    let _ = writeln!(out, "Minimum Chi^2: {}", result.chi2);
    match result.reduced_chi2 {
        Some(reduced) => {
            let _ = writeln!(out, "Reduced Chi^2: {}", reduced);
        }
        None => {
            let _ = writeln!(out, "Reduced Chi^2: undefined (no degrees of freedom)");
        }
    }
    let _ = writeln!(out, "EDM: {:.3e}", result.edm);
    let _ = writeln!(out, "PARAMETERS");
    for (i, (value, error)) in result.params.iter().zip(&result.errors).enumerate() {
        let _ = writeln!(out, "Parameter {}: {} +/- {}", i, value, error);
    }
    let _ = writeln!(out, "CORRELATIONS");
    let n = result.params.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let _ = writeln!(
                out,
                "Correlation between parameter {} and {}: {:.3}",
                i,
                j,
                result.correlation[[i, j]]
            );
        }
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

/// Write the summary to `FitResults_<Type><Id>.txt` in `dir`.
pub fn write_report(result: &FitResult, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(&result.model));
    std::fs::write(&path, format_report(result))?;
    log::info!("wrote report {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn result(n_data: usize) -> FitResult {
        FitResult {
            model: ModelKey::new("NRQY", 3),
            formula: "[0]*x+[1]".into(),
            params: array![2.0, 0.5],
            errors: array![0.1, 0.05],
            covariance: array![[0.01, -0.004], [-0.004, 0.0025]],
            correlation: array![[1.0, -0.8], [-0.8, 1.0]],
            chi2: 3.0,
            edm: 1e-6,
            converged: true,
            n_data,
            dof: n_data.saturating_sub(2),
            reduced_chi2: (n_data > 2).then(|| 3.0 / (n_data - 2) as f64),
            calls: 30,
            generalized: false,
        }
    }

    #[test]
    fn test_report_contents() {
        let text = format_report(&result(5));
        assert!(text.contains("ModelType: NRQY\n"));
        assert!(text.contains("ModelID: 3\n"));
        assert!(text.contains("ModelString: [0]*x+[1]\n"));
        assert!(text.contains("Reduced Chi^2: 1\n"));
        assert!(text.contains("Parameter 0: 2 +/- 0.1\n"));
        assert!(text.contains("Correlation between parameter 0 and 1: -0.800\n"));
        assert_eq!(text.lines().filter(|l| *l == RULE).count(), 2);
    }

    #[test]
    fn test_report_without_degrees_of_freedom() {
        let text = format_report(&result(2));
        assert!(text.contains("undefined"));
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name(&ModelKey::new("NRQY", 3)), "FitResults_NRQY3.txt");
    }
}
