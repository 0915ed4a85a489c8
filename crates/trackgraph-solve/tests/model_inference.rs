//! The reference optimizer against full tracking models.

use trackgraph_solve::{ExhaustiveOptimizer, SubgradientLearner};
use trackgraph_test::{exclusion_pair, fork, two_frame_division, TWO_FRAME_DIVISION_WEIGHTS};

#[test]
fn optimal_labelings_pass_model_verification() {
    let mut built = two_frame_division()
        .build(&TWO_FRAME_DIVISION_WEIGHTS)
        .unwrap();
    let solution = built.infer(&ExhaustiveOptimizer::new()).unwrap();
    assert!(built.verify_solution(&solution).unwrap());

    let objective = built.last_objective().unwrap();
    assert_eq!(built.evaluate_solution(&solution).unwrap(), objective);
}

#[test]
fn the_trivial_labeling_is_optimal_when_nothing_pays_off() {
    // all fork energies are non-negative under zero weights
    let mut built = fork().build(&[0.0; 4]).unwrap();
    let solution = built.infer(&ExhaustiveOptimizer::new()).unwrap();
    assert_eq!(built.last_objective(), Some(0.0));
    assert!(built.verify_solution(&solution).unwrap());
}

#[test]
fn exclusion_constraints_survive_into_the_factor_graph() {
    let mut built = exclusion_pair().build(&[1.0, 1.0]).unwrap();
    let solution = built.infer(&ExhaustiveOptimizer::new()).unwrap();
    let active = solution.iter().filter(|&&state| state > 0).count();
    assert_eq!(active, 1);
}

#[test]
fn learner_and_optimizer_round_trip_on_a_model() {
    let built = two_frame_division()
        .build(&[0.0; 5])
        .unwrap();

    // ground truth: track everything under the known-good weights
    let mut oracle = two_frame_division()
        .build(&TWO_FRAME_DIVISION_WEIGHTS)
        .unwrap();
    let ground_truth = oracle.infer(&ExhaustiveOptimizer::new()).unwrap();

    let provider = move |_model: &trackgraph_model::BuiltModel| -> trackgraph_model::ModelResult<Vec<usize>> {
        Ok(ground_truth.clone())
    };
    let learner = SubgradientLearner::new(ExhaustiveOptimizer::new()).with_max_iterations(100);
    let weights = built.learn(&learner, &provider, None).unwrap();
    assert_eq!(weights.len(), 5);
}
