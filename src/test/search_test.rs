use crate::config::{ErrorNorm, ModelConfig};
use crate::dataset::Dataset;
use crate::error::ModelError;
use crate::search::StructureSearch;

fn vee_data() -> Dataset {
    let rows: Vec<Vec<f64>> = (0..60)
        .map(|i| {
            let u = -0.5 + i as f64 / 60.0;
            vec![u, u.abs()]
        })
        .collect();
    Dataset::from_rows(&rows).unwrap()
}

fn quick_config() -> ModelConfig {
    ModelConfig {
        consequence_dim: 2,
        max_rules: 3,
        optimize_global_best: 0,
        ..Default::default()
    }
}

#[test]
fn search_respects_the_rule_bounds() {
    let data = vee_data();
    let outcome = StructureSearch::new(quick_config())
        .run(&data, &data)
        .unwrap();
    assert!(outcome.model.rule_count() <= 3);
    assert!(!outcome.epochs.is_empty());
    for report in &outcome.epochs {
        assert!(report.rules <= 3);
        assert!(report.validation_rms.is_finite());
    }
}

#[test]
fn epoch_rule_counts_grow_one_per_epoch() {
    let data = vee_data();
    let outcome = StructureSearch::new(quick_config())
        .run(&data, &data)
        .unwrap();
    for (i, report) in outcome.epochs.iter().enumerate() {
        assert_eq!(report.rules, i + 1);
    }
}

#[test]
fn splitting_improves_a_piecewise_linear_target() {
    let data = vee_data();
    let outcome = StructureSearch::new(quick_config())
        .run(&data, &data)
        .unwrap();
    // One affine rule cannot represent the vee; at least one split must win.
    assert!(outcome.model.rule_count() >= 2);
    assert!(outcome.validation_rms < outcome.epochs[0].validation_rms);
    assert!(outcome.r_squared > 0.8);
}

#[test]
fn linear_data_is_solved_by_the_first_epoch() {
    let rows: Vec<Vec<f64>> = (0..30)
        .map(|i| {
            let u = -0.5 + i as f64 / 30.0;
            vec![u, 2.0 * u]
        })
        .collect();
    let data = Dataset::from_rows(&rows).unwrap();
    let outcome = StructureSearch::new(quick_config())
        .run(&data, &data)
        .unwrap();
    assert!(outcome.epochs[0].validation_rms < 1e-8);
    // Splitting cannot help here, but the lower rule bound still applies.
    assert!(outcome.model.rule_count() >= 2);
    assert!(outcome.validation_rms < 1e-2);
}

#[test]
fn best_model_tracks_the_lowest_validation_rms() {
    // Nearly linear target: every split improves the RMS, but only by a
    // vanishing R² margin, so the winner must be picked by RMS.
    let rows: Vec<Vec<f64>> = (0..60)
        .map(|i| {
            let u = -0.5 + i as f64 / 60.0;
            vec![u, 2.0 * u + 0.03 * u.abs()]
        })
        .collect();
    let data = Dataset::from_rows(&rows).unwrap();
    let outcome = StructureSearch::new(quick_config())
        .run(&data, &data)
        .unwrap();

    let lowest = outcome
        .epochs
        .iter()
        .map(|e| e.validation_rms)
        .fold(f64::INFINITY, f64::min);
    assert!(
        outcome.validation_rms <= lowest,
        "returned rms {} but an epoch saw {}",
        outcome.validation_rms,
        lowest
    );
    assert!(outcome.model.rule_count() >= 2);
}

#[test]
fn shortcut_search_still_runs() {
    let data = vee_data();
    let config = ModelConfig {
        shortcut: true,
        norm: ErrorNorm::L1,
        ..quick_config()
    };
    let outcome = StructureSearch::new(config).run(&data, &data).unwrap();
    assert!(outcome.model.rule_count() >= 2);
    assert!(outcome.validation_rms.is_finite());
}

#[test]
fn mismatched_validation_data_is_rejected() {
    let data = vee_data();
    let other = Dataset::from_rows(&[vec![0.0, 1.0, 0.5]]).unwrap();
    assert!(matches!(
        StructureSearch::new(quick_config()).run(&data, &other),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn invalid_configuration_is_rejected() {
    let data = vee_data();
    let config = ModelConfig {
        consequence_dim: 5,
        ..Default::default()
    };
    assert!(matches!(
        StructureSearch::new(config).run(&data, &data),
        Err(ModelError::InputValidationError(_))
    ));
}
