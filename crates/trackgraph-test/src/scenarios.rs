//! Assembled hypothesis graphs used across the test suites.

use trackgraph_config::Settings;
use trackgraph_model::{
    ExclusionConstraint, LinkingHypothesis, SegmentationHypothesis, TrackingModel,
};

fn binary(inactive: f64, active: f64) -> Vec<Vec<f64>> {
    vec![vec![inactive], vec![active]]
}

/// Weights solving [`two_frame_division`] with the expected result:
/// layout [link][detection][division][appearance][disappearance],
/// one shared weight each.
pub const TWO_FRAME_DIVISION_WEIGHTS: [f64; 5] = [10.0, 10.0, 10.0, 500.0, 500.0];

/// Two parent detections (2, 3) in the first frame and three children
/// (4, 5, 6) in the second, candidate links 2->4, 2->5, 3->5, 3->6.
///
/// With [`TWO_FRAME_DIVISION_WEIGHTS`] the minimum-energy labeling
/// activates every detection, divides node 2 into 4 and 5, and
/// continues node 3 to 6; node 5 is reachable from both parents but may
/// only absorb one incoming transition.
pub fn two_frame_division() -> TrackingModel {
    let settings = Settings::default()
        .with_states_share_weights(true)
        .with_optimizer_verbose(false);
    let mut model = TrackingModel::new(settings);

    for id in [2u64, 3u64] {
        model
            .add_hypothesis(SegmentationHypothesis::new(
                id,
                binary(1.0, 0.0),
                binary(0.0, -5.0),
                binary(0.0, 0.0),
                binary(0.0, 50.0),
            ))
            .expect("fresh id");
    }
    let disappearance_gains = [-2.0, -2.0, -4.0];
    for (offset, id) in [4u64, 5u64, 6u64].into_iter().enumerate() {
        model
            .add_hypothesis(SegmentationHypothesis::new(
                id,
                binary(1.0, 0.0),
                vec![],
                binary(0.0, 50.0),
                binary(0.0, disappearance_gains[offset]),
            ))
            .expect("fresh id");
    }

    for (src, dest, active) in [
        (2u64, 4u64, -4.0),
        (2, 5, -3.0),
        (3, 5, -1.0),
        (3, 6, -4.0),
    ] {
        model
            .add_link(LinkingHypothesis::new(src, dest, binary(0.0, active)))
            .expect("endpoints exist");
    }

    model
}

/// One detection (1) with outgoing links to detections 2 and 3 and no
/// appearance/disappearance variables anywhere.
pub fn fork() -> TrackingModel {
    let mut model = TrackingModel::new(Settings::default().with_optimizer_verbose(false));
    for id in [1u64, 2, 3] {
        model
            .add_hypothesis(SegmentationHypothesis::new(
                id,
                binary(0.0, 1.0),
                vec![],
                vec![],
                vec![],
            ))
            .expect("fresh id");
    }
    for dest in [2u64, 3] {
        model
            .add_link(LinkingHypothesis::new(1, dest, binary(0.0, -1.0)))
            .expect("endpoints exist");
    }
    model
}

/// A single detection whose activity can only be explained by its
/// appearance variable.
pub fn appearance_only() -> TrackingModel {
    let mut model = TrackingModel::new(Settings::default().with_optimizer_verbose(false));
    model
        .add_hypothesis(SegmentationHypothesis::new(
            1,
            binary(1.0, -1.0),
            vec![],
            binary(0.0, 0.5),
            vec![],
        ))
        .expect("fresh id");
    model
}

/// Detections 7 and 9 under a mutual-exclusion constraint; both would
/// be profitable on their own.
pub fn exclusion_pair() -> TrackingModel {
    let mut model = TrackingModel::new(Settings::default().with_optimizer_verbose(false));
    for id in [7u64, 9] {
        model
            .add_hypothesis(SegmentationHypothesis::new(
                id,
                binary(0.0, -1.0),
                vec![],
                vec![],
                vec![],
            ))
            .expect("fresh id");
    }
    model
        .add_exclusion(ExclusionConstraint::new(vec![7, 9]).expect("two members"))
        .expect("members exist");
    model
}
