//! End-to-end scenarios: assembly, inference, verification, learning.

use trackgraph::{
    track, train, ExhaustiveOptimizer, Labeling, ModelResult, SubgradientLearner, VariableId,
};
use trackgraph_test::{
    appearance_only, exclusion_pair, fork, two_frame_division, TWO_FRAME_DIVISION_WEIGHTS,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn set(labeling: &mut Labeling, var: Option<VariableId>, value: usize) {
    labeling[var.expect("variable is materialized")] = value;
}

#[test]
fn broken_flow_at_the_link_target_fails_verification() {
    let model = fork();
    let built = model.build(&[0.0; 4]).unwrap();

    // activate node 1 and the link to node 2, but leave node 2 inactive
    let mut labeling = vec![0; built.graph().num_variables()];
    set(
        &mut labeling,
        built.hypothesis(1).unwrap().detection().graph_id(),
        1,
    );
    set(&mut labeling, built.link((1, 2)).unwrap().graph_id(), 1);
    assert!(!built.verify_solution(&labeling).unwrap());

    // completing the flow at node 2 makes the labeling valid
    set(
        &mut labeling,
        built.hypothesis(2).unwrap().detection().graph_id(),
        1,
    );
    assert!(built.verify_solution(&labeling).unwrap());
}

#[test]
fn inferred_solutions_satisfy_the_flow_invariants() {
    let (built, solution) = track(fork(), &[0.0, -1.0, 0.0, 1.0]).unwrap();
    assert!(built.verify_solution(&solution).unwrap());
    assert!(built.last_objective().is_some());
}

#[test]
fn appearance_must_explain_an_appearing_detection() {
    let model = appearance_only();
    let mut built = model.build(&[1.0, 1.0, 1.0, 1.0]).unwrap();

    let solution = built.infer(&ExhaustiveOptimizer::new()).unwrap();
    let detection = built.hypothesis(1).unwrap().detection().graph_id().unwrap();
    let appearance = built
        .hypothesis(1)
        .unwrap()
        .appearance()
        .graph_id()
        .unwrap();
    assert_eq!(solution[detection], 1);
    assert_eq!(solution[appearance], 1);
    assert!(built.verify_solution(&solution).unwrap());
    assert_eq!(built.last_objective(), Some(-0.5));
    assert_eq!(built.evaluate_solution(&solution).unwrap(), -0.5);

    // detection active without appearance is rejected
    let mut broken = solution.clone();
    broken[appearance] = 0;
    assert!(!built.verify_solution(&broken).unwrap());
}

#[test]
fn exclusion_allows_at_most_one_active_detection() {
    let model = exclusion_pair();
    let mut built = model.build(&[1.0, 1.0]).unwrap();

    let solution = built.infer(&ExhaustiveOptimizer::new()).unwrap();
    let active: usize = [7u64, 9]
        .iter()
        .map(|&id| {
            let var = built.hypothesis(id).unwrap().detection().graph_id().unwrap();
            usize::from(solution[var] > 0)
        })
        .sum();
    assert_eq!(active, 1);
    assert!(built.verify_solution(&solution).unwrap());

    // activating both members must be rejected
    let mut both = solution.clone();
    for id in [7u64, 9] {
        let var = built.hypothesis(id).unwrap().detection().graph_id().unwrap();
        both[var] = 1;
    }
    assert!(!built.verify_solution(&both).unwrap());
}

#[test]
fn division_scenario_tracks_both_lineages() {
    init_tracing();
    let (built, solution) = track(two_frame_division(), &TWO_FRAME_DIVISION_WEIGHTS).unwrap();
    assert!(built.verify_solution(&solution).unwrap());

    // every detection is active
    for id in [2u64, 3, 4, 5, 6] {
        let var = built.hypothesis(id).unwrap().detection().graph_id().unwrap();
        assert_eq!(solution[var], 1, "detection {} should be active", id);
    }

    // node 2 divides into 4 and 5; node 3 continues to 6
    let division = built.hypothesis(2).unwrap().division().graph_id().unwrap();
    assert_eq!(solution[division], 1);
    for (key, expected) in [((2u64, 4u64), 1), ((2, 5), 1), ((3, 5), 0), ((3, 6), 1)] {
        let var = built.link(key).unwrap().graph_id().unwrap();
        assert_eq!(
            solution[var], expected,
            "link {:?} has unexpected state",
            key
        );
    }
}

/// Ground truth for the division scenario: the expected tracking result
/// with appearance/disappearance states deduced from the flow.
fn division_ground_truth(model: &trackgraph::BuiltModel) -> ModelResult<Labeling> {
    let mut labeling = vec![0; model.graph().num_variables()];
    for id in [2u64, 3, 4, 5, 6] {
        set(
            &mut labeling,
            model.hypothesis(id).unwrap().detection().graph_id(),
            1,
        );
    }
    set(
        &mut labeling,
        model.hypothesis(2).unwrap().division().graph_id(),
        1,
    );
    for key in [(2u64, 4u64), (2, 5), (3, 6)] {
        set(&mut labeling, model.link(key).unwrap().graph_id(), 1);
    }
    model.deduce_appearance_disappearance(&mut labeling)?;
    Ok(labeling)
}

#[test]
fn deduced_ground_truth_is_a_valid_labeling() {
    let model = two_frame_division();
    let built = model.build(&[0.0; 5]).unwrap();
    let ground_truth = division_ground_truth(&built).unwrap();
    assert!(built.verify_solution(&ground_truth).unwrap());

    // parents keep their appearance, children their disappearance
    let appearance = built
        .hypothesis(2)
        .unwrap()
        .appearance()
        .graph_id()
        .unwrap();
    let disappearance = built
        .hypothesis(4)
        .unwrap()
        .disappearance()
        .graph_id()
        .unwrap();
    assert_eq!(ground_truth[appearance], 1);
    assert_eq!(ground_truth[disappearance], 1);

    // a continuing parent does not disappear
    let parent_disappearance = built
        .hypothesis(3)
        .unwrap()
        .disappearance()
        .graph_id()
        .unwrap();
    assert_eq!(ground_truth[parent_disappearance], 0);
}

#[test]
fn learning_recovers_weights_for_the_division_scenario() {
    let (_built, weights) = train(two_frame_division(), &division_ground_truth).unwrap();
    assert_eq!(weights.len(), 5);

    // re-run inference under the learned weights
    let mut rebuilt = two_frame_division().build(&weights).unwrap();
    let solution = rebuilt.infer(&ExhaustiveOptimizer::new()).unwrap();
    assert!(rebuilt.verify_solution(&solution).unwrap());
}

#[test]
fn learner_separates_ground_truth_from_alternatives() {
    let model = appearance_only();
    let built = model.build(&[0.0; 4]).unwrap();

    // ground truth: the detection is active and appears; the node has
    // no disappearance features, so the states are set directly
    let provider = |model: &trackgraph::BuiltModel| -> ModelResult<Labeling> {
        let mut labeling = vec![0; model.graph().num_variables()];
        set(
            &mut labeling,
            model.hypothesis(1).unwrap().detection().graph_id(),
            1,
        );
        set(
            &mut labeling,
            model.hypothesis(1).unwrap().appearance().graph_id(),
            1,
        );
        Ok(labeling)
    };

    let learner = SubgradientLearner::new(ExhaustiveOptimizer::new()).with_max_iterations(300);
    let weights = built.learn(&learner, &provider, None).unwrap();

    let mut rebuilt = appearance_only().build(&weights).unwrap();
    let solution = rebuilt.infer(&ExhaustiveOptimizer::new()).unwrap();
    let detection = rebuilt
        .hypothesis(1)
        .unwrap()
        .detection()
        .graph_id()
        .unwrap();
    assert_eq!(solution[detection], 1);
}
