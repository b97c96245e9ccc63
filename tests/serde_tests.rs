#![cfg(feature = "serde")]

use hpimportance::prelude::*;

fn evaluated_run() -> MemoryRun {
    let mut run = MemoryRun::new(
        vec![
            Hyperparameter::float("x", -1.0, 1.0).unwrap(),
            Hyperparameter::ordinal("depth", 4).unwrap(),
        ],
        vec![Objective::new("error", Direction::Minimize).bounds(0.0, 10.0)],
    )
    .unwrap();
    let mut rng = fastrand::Rng::with_seed(5);
    for _ in 0..60 {
        let x = rng.f64() * 2.0 - 1.0;
        let depth = rng.usize(..4);
        let id = run
            .add_config([
                ("x", ParamValue::Float(x)),
                ("depth", ParamValue::Categorical(depth)),
            ])
            .unwrap();
        #[allow(clippy::cast_precision_loss)]
        let value = x.abs() + depth as f64;
        run.add_trial(id, 9.0, vec![value]).unwrap();
    }
    run
}

#[test]
fn result_round_trips_through_json() {
    let run = evaluated_run();
    let objective = run.objective(0).unwrap().clone();
    let mut fanova = Fanova::new(&run);
    fanova
        .calculate(&objective, Budget::Value(9.0), 6, 1)
        .unwrap();
    fanova.most_important_pairs(1).unwrap();

    let result = fanova.result().unwrap();
    let json = result.to_json().unwrap();
    let loaded = ImportanceResult::from_json(&json).unwrap();

    assert_eq!(loaded.n_trees(), result.n_trees());
    assert_eq!(loaded.entries().len(), result.entries().len());
    for (a, b) in loaded.entries().iter().zip(result.entries()) {
        assert_eq!(a.subset, b.subset);
        assert!((a.importance.mean - b.importance.mean).abs() < 1e-12);
        assert!((a.importance.std - b.importance.std).abs() < 1e-12);
    }
    assert!(loaded.contains(&["depth", "x"]));
}

#[test]
fn malformed_json_is_a_serialization_error() {
    assert!(matches!(
        ImportanceResult::from_json("{\"entries\": 3}"),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn forest_and_key_serialize() {
    let run = evaluated_run();
    let objective = run.objective(0).unwrap().clone();
    let mut fanova = Fanova::new(&run);
    fanova.calculate(&objective, Budget::Combined, 3, 0).unwrap();

    let key = fanova.calculation_key().unwrap();
    let json = serde_json::to_string(key).unwrap();
    let loaded: CalculationKey = serde_json::from_str(&json).unwrap();
    assert_eq!(&loaded, key);
    assert_eq!(loaded.budget, Budget::Combined);

    let forest = fanova.forest().unwrap();
    let json = serde_json::to_string(forest).unwrap();
    let loaded: Forest = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.n_trees(), 3);
    assert_eq!(loaded.names(), forest.names());
}
