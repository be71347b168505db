//! Integration tests for chainfit-rs
//!
//! This file organizes and includes all test modules for the library.


mod differentiation;

mod recipe_chaining;

/// Test helpers - common utilities for tests
pub mod test_helpers {
    use std::path::{Path, PathBuf};

    use chainfit_rs::data::Measurement;
    use ndarray::Array2;

    /// A fresh, empty directory under the system temp dir.
    pub fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chainfit-{}-{}", name, std::process::id()));
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `contents` to `dir/name` and return the path.
    pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn point(fields: [f64; 9]) -> Measurement {
        Measurement::from_fields(&fields)
    }

    /// The three calibration points `z ≈ 10 x` used throughout the tests.
    pub const LINEAR_ROWS: &str = "\
# x, xLow, xHigh, y, yLow, yHigh, z, zLow, zHigh
1,0.1,0.1,0,0,0,10,1,1
2,0.1,0.1,0,0,0,20,1,1
3,0.1,0.1,0,0,0,31,1,1
";

    /// Check if two matrices are approximately equal
    pub fn matrix_approx_eq(a: &Array2<f64>, b: &Array2<f64>, tol: f64) -> bool {
        a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < tol)
    }

    /// A complete settings file pointing every directory at `dir`.
    pub fn settings_text(dir: &Path, hesse: bool) -> String {
        format!(
            r#"# generated for tests
FunctionDefinitions: "{dir}/Definitions.txt"
DataDirectory: "{dir}"
RecipeDirectory: "{dir}"
OutputDirectory: "{dir}"
DefaultYieldUncertainty: "0.05"
DefaultEnergyUncertainty: "0.02"
DefaultFieldUncertainty: "0.1"
LowField: "0.001"
Verbosity: "-1"
UP: "1"
MaxCalls: "5000"
Tolerance: "0.1"
Hesse: "{hesse}"
ResultsToFile: "true"
SaveParameters: "true"
"#,
            dir = dir.display(),
            hesse = hesse
        )
    }
}
