use std::collections::BTreeMap;

use trackgraph_config::Settings;
use trackgraph_core::FactorGraph;

use crate::linking::LinkingHypothesis;
use crate::segmentation::SegmentationHypothesis;
use crate::{LinkKey, ModelError};

fn binary() -> Vec<Vec<f64>> {
    vec![vec![0.0], vec![1.0]]
}

fn materialize_link(
    graph: &mut FactorGraph,
    links: &mut BTreeMap<LinkKey, LinkingHypothesis>,
    src: u64,
    dest: u64,
) {
    let mut link = LinkingHypothesis::new(src, dest, binary());
    link.add_to_graph(graph, false, &[0, 1]).unwrap();
    links.insert(link.key(), link);
}

fn empty_divisions() -> BTreeMap<crate::DivisionKey, crate::DivisionHypothesis> {
    BTreeMap::new()
}

#[test]
fn incoming_flow_constraint_balances_link_and_detection() {
    let mut graph = FactorGraph::new();
    let mut links = BTreeMap::new();
    materialize_link(&mut graph, &mut links, 1, 2);

    let mut hyp = SegmentationHypothesis::new(2, binary(), vec![], vec![], vec![]);
    hyp.add_incoming_link((1, 2)).unwrap();
    hyp.add_to_graph(
        &mut graph,
        &Settings::default(),
        &links,
        &empty_divisions(),
        &[2, 3],
        &[],
        &[],
        &[],
    )
    .unwrap();

    assert_eq!(graph.constraints().len(), 1);
    // variable 0 = link, variable 1 = detection
    assert!(graph.satisfies_constraints(&vec![1, 1]));
    assert!(graph.satisfies_constraints(&vec![0, 0]));
    assert!(!graph.satisfies_constraints(&vec![1, 0]));
    assert!(!graph.satisfies_constraints(&vec![0, 1]));
}

#[test]
fn detection_without_features_is_an_error() {
    let mut graph = FactorGraph::new();
    let mut hyp = SegmentationHypothesis::new(5, vec![], vec![], vec![], vec![]);
    let result = hyp.add_to_graph(
        &mut graph,
        &Settings::default(),
        &BTreeMap::new(),
        &empty_divisions(),
        &[],
        &[],
        &[],
        &[],
    );
    assert!(matches!(result, Err(ModelError::MissingDetectionFeatures(5))));
}

#[test]
fn division_needs_two_outgoing_links() {
    let settings = Settings::default();

    // one outgoing link: division variable stays absent
    let mut graph = FactorGraph::new();
    let mut links = BTreeMap::new();
    materialize_link(&mut graph, &mut links, 1, 2);
    let mut hyp = SegmentationHypothesis::new(1, binary(), binary(), vec![], vec![]);
    hyp.add_outgoing_link((1, 2)).unwrap();
    hyp.add_to_graph(
        &mut graph,
        &settings,
        &links,
        &empty_divisions(),
        &[2, 3],
        &[4, 5],
        &[],
        &[],
    )
    .unwrap();
    assert!(!hyp.division().is_materialized());

    // two outgoing links: division variable materializes
    let mut graph = FactorGraph::new();
    let mut links = BTreeMap::new();
    materialize_link(&mut graph, &mut links, 1, 2);
    materialize_link(&mut graph, &mut links, 1, 3);
    let mut hyp = SegmentationHypothesis::new(1, binary(), binary(), vec![], vec![]);
    hyp.add_outgoing_link((1, 2)).unwrap();
    hyp.add_outgoing_link((1, 3)).unwrap();
    hyp.add_to_graph(
        &mut graph,
        &settings,
        &links,
        &empty_divisions(),
        &[2, 3],
        &[4, 5],
        &[],
        &[],
    )
    .unwrap();
    assert!(hyp.division().is_materialized());
}

#[test]
fn registration_after_materialization_fails() {
    let mut graph = FactorGraph::new();
    let mut hyp = SegmentationHypothesis::new(1, binary(), vec![], vec![], vec![]);
    hyp.add_to_graph(
        &mut graph,
        &Settings::default(),
        &BTreeMap::new(),
        &empty_divisions(),
        &[0, 1],
        &[],
        &[],
        &[],
    )
    .unwrap();

    assert!(matches!(
        hyp.add_incoming_link((0, 1)),
        Err(ModelError::AlreadyMaterialized(1))
    ));
    assert!(matches!(
        hyp.add_outgoing_division((1, 2, 3)),
        Err(ModelError::AlreadyMaterialized(1))
    ));
}

/// Parent with two outgoing links and division features; variables are
/// link(0), link(1), detection(2), division(3).
fn divided_parent(
    settings: &Settings,
) -> (
    FactorGraph,
    SegmentationHypothesis,
    BTreeMap<LinkKey, LinkingHypothesis>,
) {
    let mut graph = FactorGraph::new();
    let mut links = BTreeMap::new();
    materialize_link(&mut graph, &mut links, 1, 2);
    materialize_link(&mut graph, &mut links, 1, 3);

    let mut hyp = SegmentationHypothesis::new(1, binary(), binary(), vec![], vec![]);
    hyp.add_outgoing_link((1, 2)).unwrap();
    hyp.add_outgoing_link((1, 3)).unwrap();
    hyp.add_to_graph(
        &mut graph,
        settings,
        &links,
        &empty_divisions(),
        &[4, 5],
        &[6, 7],
        &[],
        &[],
    )
    .unwrap();
    (graph, hyp, links)
}

#[test]
fn division_capacity_is_enforced_and_verified() {
    let settings = Settings::default();
    let (graph, hyp, links) = divided_parent(&settings);

    // active division on an inactive detection violates capacity
    let bad = vec![1, 1, 0, 1];
    assert!(!graph.satisfies_constraints(&bad));
    assert!(!hyp
        .verify_solution(&bad, &settings, &links, &empty_divisions())
        .unwrap());

    // dividing detection: both children links active
    let good = vec![1, 1, 1, 1];
    assert!(graph.satisfies_constraints(&good));
    assert!(hyp
        .verify_solution(&good, &settings, &links, &empty_divisions())
        .unwrap());
}

#[test]
fn separate_children_constraint_rejects_single_child_division() {
    let settings = Settings::default().with_require_separate_children_of_division(true);
    let (graph, hyp, links) = divided_parent(&settings);

    // division active but only one outgoing link active
    let single_child = vec![1, 0, 1, 1];
    assert!(!graph.satisfies_constraints(&single_child));
    assert!(!hyp
        .verify_solution(&single_child, &settings, &links, &empty_divisions())
        .unwrap());

    let both_children = vec![1, 1, 1, 1];
    assert!(graph.satisfies_constraints(&both_children));
    assert!(hyp
        .verify_solution(&both_children, &settings, &links, &empty_divisions())
        .unwrap());
}

#[test]
fn appearance_only_node_verifies_against_detection_value() {
    let mut graph = FactorGraph::new();
    let mut hyp = SegmentationHypothesis::new(1, binary(), vec![], binary(), vec![]);
    hyp.add_to_graph(
        &mut graph,
        &Settings::default(),
        &BTreeMap::new(),
        &empty_divisions(),
        &[0, 1],
        &[],
        &[2, 3],
        &[],
    )
    .unwrap();

    let settings = Settings::default();
    // detection(0), appearance(1)
    let appearing = vec![1, 1];
    assert!(hyp
        .verify_solution(&appearing, &settings, &BTreeMap::new(), &empty_divisions())
        .unwrap());

    let unexplained = vec![1, 0];
    assert!(!hyp
        .verify_solution(&unexplained, &settings, &BTreeMap::new(), &empty_divisions())
        .unwrap());
}

#[test]
fn disappearance_and_division_exclude_each_other() {
    let settings = Settings::default();
    let mut graph = FactorGraph::new();
    let mut links = BTreeMap::new();
    materialize_link(&mut graph, &mut links, 1, 2);
    materialize_link(&mut graph, &mut links, 1, 3);

    let mut hyp = SegmentationHypothesis::new(1, binary(), binary(), vec![], binary());
    hyp.add_outgoing_link((1, 2)).unwrap();
    hyp.add_outgoing_link((1, 3)).unwrap();
    hyp.add_to_graph(
        &mut graph,
        &settings,
        &links,
        &empty_divisions(),
        &[4, 5],
        &[6, 7],
        &[],
        &[8, 9],
    )
    .unwrap();

    // link(0), link(1), detection(2), division(3), disappearance(4)
    let both_active = vec![1, 1, 1, 1, 1];
    assert!(!graph.satisfies_constraints(&both_active));
    assert!(!hyp
        .verify_solution(&both_active, &settings, &links, &empty_divisions())
        .unwrap());
}
