use approx::assert_relative_eq;
use chainfit_rs::config::Catalog;
use chainfit_rs::data::Dataset;
use chainfit_rs::error::FitError;
use chainfit_rs::model::{Formula, ModelDefinition, ModelKey, Recipe};
use chainfit_rs::recipe::{apply_recipe, log_file_name, AuxiliaryModel, RecipeLog, RecipeResolver};
use ndarray::{array, Array1};

use crate::test_helpers::{point, temp_dir, write_file};

const AUX_DEFINITION: &str = r#"
AuxF0: "[0] * x + [1]"
AuxP0: "2, 1"
AuxLL0: "-10, -10"
AuxLH0: "10, 10"
AuxS0: "0.1, 0.1"
"#;

fn aux_model() -> AuxiliaryModel {
    let definition = ModelDefinition::new(
        ModelKey::new("Aux", 0),
        Formula::parse("[0] * x + [1]").unwrap(),
        array![2.0, 1.0],
        array![-10.0, -10.0],
        array![10.0, 10.0],
        array![0.1, 0.1],
        vec![],
    )
    .unwrap();
    let fitted = RecipeLog::new(array![2.0, 1.0], array![[0.01, 0.002], [0.002, 0.04]]).unwrap();
    AuxiliaryModel::new(definition, fitted).unwrap()
}

#[test]
fn test_zero_response_and_parameter_propagation() {
    // Raw responses equal the auxiliary prediction and x carries no error
    let xs = [1.0, 2.0, 3.0];
    let mut dataset = Dataset {
        name: "chained.txt".into(),
        recipe: Recipe::Chained(ModelKey::new("Aux", 0)),
        measurements: xs
            .iter()
            .map(|&x| point([x, 0.0, 0.0, 0.001, 0.0, 0.0, 2.0 * x + 1.0, 0.5, 0.5]))
            .collect(),
    };

    let block = apply_recipe(&mut dataset, &aux_model()).unwrap();

    for m in &dataset.measurements {
        assert!(m.z.abs() < 1e-12);
    }
    // Gp = [x_i, 1], V = Gp V_P Gpᵗ + diag(0.25)
    for (i, &xi) in xs.iter().enumerate() {
        for (j, &xj) in xs.iter().enumerate() {
            let mut expected = xi * xj * 0.01 + (xi + xj) * 0.002 + 0.04;
            if i == j {
                expected += 0.25;
            }
            assert_relative_eq!(block[[i, j]], expected, epsilon = 1e-9);
        }
        let sigma = block[[i, i]].sqrt();
        assert_relative_eq!(dataset.measurements[i].z_err_low, sigma, epsilon = 1e-12);
        assert_relative_eq!(dataset.measurements[i].z_err_high, sigma, epsilon = 1e-12);
    }
}

#[test]
fn test_x_errors_enter_through_the_slope() {
    let mut dataset = Dataset {
        name: "chained.txt".into(),
        recipe: Recipe::Chained(ModelKey::new("Aux", 0)),
        measurements: vec![point([4.0, 0.1, 0.3, 0.001, 0.0, 0.0, 5.0, 0.5, 0.5])],
    };
    let block = apply_recipe(&mut dataset, &aux_model()).unwrap();

    // z = 2·4 + 1 - 5
    assert_relative_eq!(dataset.measurements[0].z, 4.0, epsilon = 1e-12);
    let expected = 0.25 + (2.0f64 * 0.2).powi(2) + 16.0 * 0.01 + 8.0 * 0.002 + 0.04;
    assert_relative_eq!(block[[0, 0]], expected, epsilon = 1e-9);
}

#[test]
fn test_recipe_must_match_dataset() {
    let mut dataset = Dataset {
        name: "raw.txt".into(),
        recipe: Recipe::Identity,
        measurements: vec![point([1.0; 9])],
    };
    assert!(matches!(
        apply_recipe(&mut dataset, &aux_model()),
        Err(FitError::InvalidState(_))
    ));
}

#[test]
fn test_recipe_log_round_trip() {
    let dir = temp_dir("recipe-round-trip");
    let key = ModelKey::new("Aux", 0);
    let log = RecipeLog::new(
        array![0.1 + 0.2, -3.5e12, 1e-300],
        array![
            [1.0 / 3.0, 2e-17, 0.0],
            [2e-17, 7.25, -1.0e-5],
            [0.0, -1.0e-5, 123456.789]
        ],
    )
    .unwrap();

    let path = log.save(&dir, &key).unwrap();
    assert_eq!(path, dir.join("Aux0Log.txt"));
    assert_eq!(log_file_name(&key), "Aux0Log.txt");

    let back = RecipeLog::load(&path).unwrap();
    assert_eq!(back, log);
}

#[test]
fn test_malformed_recipe_log() {
    let dir = temp_dir("recipe-malformed");
    let path = write_file(&dir, "Aux0Log.txt", "2, 1\n0.01, 0.002\n");
    assert!(matches!(
        RecipeLog::load(&path),
        Err(FitError::MalformedRow { line: 3, .. })
    ));
}

#[test]
fn test_resolver_loads_once_and_checks_sizes() {
    let dir = temp_dir("recipe-resolver");
    let catalog = Catalog::parse(AUX_DEFINITION, "inline");
    let key = ModelKey::new("Aux", 0);

    let mut resolver = RecipeResolver::new(&catalog, &dir);
    assert!(matches!(resolver.resolve(&key), Err(FitError::FileNotFound { .. })));

    write_file(&dir, "Aux0Log.txt", "2.5\n0.01\n");
    let mut resolver = RecipeResolver::new(&catalog, &dir);
    assert!(matches!(
        resolver.resolve(&key),
        Err(FitError::DimensionMismatch(_))
    ));

    write_file(&dir, "Aux0Log.txt", "2.5,1.5\n0.01,0\n0,0.04\n");
    let mut resolver = RecipeResolver::new(&catalog, &dir);
    let aux = resolver.resolve(&key).unwrap();
    assert_eq!(aux.fitted.params, Array1::from_vec(vec![2.5, 1.5]));
    assert_eq!(aux.definition.parameter_count(), 2);

    // Cached: removing the file does not matter any more
    std::fs::remove_file(dir.join("Aux0Log.txt")).unwrap();
    assert!(resolver.resolve(&key).is_ok());

    assert!(matches!(
        resolver.resolve(&ModelKey::new("Aux", 1)),
        Err(FitError::ModelDefinitionNotFound { .. })
    ));
}
