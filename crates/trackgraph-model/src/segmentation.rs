//! A detection node: its state machine and local flow constraints.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use trackgraph_config::Settings;
use trackgraph_core::{FactorGraph, Labeling, LinearConstraint, Relation, StateFeatures, VariableId};

use crate::division::DivisionHypothesis;
use crate::error::{ModelError, ModelResult};
use crate::linking::LinkingHypothesis;
use crate::variable::Variable;
use crate::{DivisionKey, HypothesisId, LinkKey};

type LinkList = SmallVec<[LinkKey; 4]>;
type DivisionList = SmallVec<[DivisionKey; 2]>;

/// A segmentation hypothesis: one detection with optional division,
/// appearance and disappearance variables, plus the transitions that
/// touch it.
///
/// Transitions are stored as keys into the model's link/division maps,
/// never as owning references. Registration is only legal before the
/// hypothesis is materialized; afterwards the adjacency is frozen.
#[derive(Debug, Clone)]
pub struct SegmentationHypothesis {
    id: HypothesisId,
    detection: Variable,
    division: Variable,
    appearance: Variable,
    disappearance: Variable,
    incoming_links: LinkList,
    outgoing_links: LinkList,
    incoming_divisions: DivisionList,
    outgoing_divisions: DivisionList,
}

impl SegmentationHypothesis {
    /// Creates a hypothesis from its per-variable feature blocks. An
    /// empty block means the corresponding variable is absent.
    pub fn new(
        id: HypothesisId,
        detection_features: StateFeatures,
        division_features: StateFeatures,
        appearance_features: StateFeatures,
        disappearance_features: StateFeatures,
    ) -> Self {
        Self {
            id,
            detection: Variable::new(detection_features),
            division: Variable::new(division_features),
            appearance: Variable::new(appearance_features),
            disappearance: Variable::new(disappearance_features),
            incoming_links: SmallVec::new(),
            outgoing_links: SmallVec::new(),
            incoming_divisions: SmallVec::new(),
            outgoing_divisions: SmallVec::new(),
        }
    }

    pub fn id(&self) -> HypothesisId {
        self.id
    }

    pub fn detection(&self) -> &Variable {
        &self.detection
    }

    pub fn division(&self) -> &Variable {
        &self.division
    }

    pub fn appearance(&self) -> &Variable {
        &self.appearance
    }

    pub fn disappearance(&self) -> &Variable {
        &self.disappearance
    }

    pub fn incoming_links(&self) -> &[LinkKey] {
        &self.incoming_links
    }

    pub fn outgoing_links(&self) -> &[LinkKey] {
        &self.outgoing_links
    }

    pub fn incoming_divisions(&self) -> &[DivisionKey] {
        &self.incoming_divisions
    }

    pub fn outgoing_divisions(&self) -> &[DivisionKey] {
        &self.outgoing_divisions
    }

    /// Registers an incoming link. Must happen before materialization.
    pub fn add_incoming_link(&mut self, key: LinkKey) -> ModelResult<()> {
        self.check_mutable()?;
        self.incoming_links.push(key);
        Ok(())
    }

    /// Registers an outgoing link. Must happen before materialization.
    pub fn add_outgoing_link(&mut self, key: LinkKey) -> ModelResult<()> {
        self.check_mutable()?;
        self.outgoing_links.push(key);
        Ok(())
    }

    /// Registers an incoming division. Must happen before materialization.
    pub fn add_incoming_division(&mut self, key: DivisionKey) -> ModelResult<()> {
        self.check_mutable()?;
        self.incoming_divisions.push(key);
        Ok(())
    }

    /// Registers an outgoing division. Must happen before materialization.
    pub fn add_outgoing_division(&mut self, key: DivisionKey) -> ModelResult<()> {
        self.check_mutable()?;
        self.outgoing_divisions.push(key);
        Ok(())
    }

    fn check_mutable(&self) -> ModelResult<()> {
        if self.detection.is_materialized() {
            return Err(ModelError::AlreadyMaterialized(self.id));
        }
        Ok(())
    }

    /// Materializes the variables of this hypothesis and emits its flow,
    /// division and transition-exclusion constraints.
    ///
    /// Links and standalone divisions must already be materialized; the
    /// adjacency lists are re-sorted by their assigned graph variable
    /// ids so constraint emission is deterministic.
    #[allow(clippy::too_many_arguments)]
    pub fn add_to_graph(
        &mut self,
        graph: &mut FactorGraph,
        settings: &Settings,
        links: &BTreeMap<LinkKey, LinkingHypothesis>,
        divisions: &BTreeMap<DivisionKey, DivisionHypothesis>,
        detection_weight_ids: &[usize],
        division_weight_ids: &[usize],
        appearance_weight_ids: &[usize],
        disappearance_weight_ids: &[usize],
    ) -> ModelResult<()> {
        let shared = settings.states_share_weights;

        self.detection
            .add_to_graph(graph, shared, detection_weight_ids)?;
        if !self.detection.is_materialized() {
            return Err(ModelError::MissingDetectionFeatures(self.id));
        }

        // a division needs at least two potential children to mean anything
        if self.outgoing_links.len() >= 2 {
            self.division
                .add_to_graph(graph, shared, division_weight_ids)?;
        }
        self.appearance
            .add_to_graph(graph, shared, appearance_weight_ids)?;
        self.disappearance
            .add_to_graph(graph, shared, disappearance_weight_ids)?;

        let id = self.id;
        let incoming_link_ids = sort_links_by_graph_id(&mut self.incoming_links, links, id)?;
        let outgoing_link_ids = sort_links_by_graph_id(&mut self.outgoing_links, links, id)?;
        let incoming_division_ids =
            sort_divisions_by_graph_id(&mut self.incoming_divisions, divisions, id)?;
        let outgoing_division_ids =
            sort_divisions_by_graph_id(&mut self.outgoing_divisions, divisions, id)?;

        self.add_incoming_constraint(graph, &incoming_link_ids, &incoming_division_ids)?;
        self.add_outgoing_constraint(graph, &outgoing_link_ids, &outgoing_division_ids)?;
        self.add_division_constraints(graph, settings, &outgoing_link_ids)?;
        self.add_transition_exclusions(graph, settings, &incoming_link_ids, &outgoing_link_ids)?;
        Ok(())
    }

    /// Incoming flow: sum of incoming transition values plus appearance
    /// equals the detection value.
    fn add_incoming_constraint(
        &self,
        graph: &mut FactorGraph,
        incoming_link_ids: &[VariableId],
        incoming_division_ids: &[VariableId],
    ) -> ModelResult<()> {
        if incoming_link_ids.is_empty()
            && incoming_division_ids.is_empty()
            && !self.appearance.is_materialized()
        {
            return Ok(());
        }

        let mut constraint = LinearConstraint::new();

        // links and standalone divisions all precede detections in the
        // graph; merge them so terms stay in ascending variable order
        let mut transitions: Vec<VariableId> = incoming_link_ids
            .iter()
            .chain(incoming_division_ids)
            .copied()
            .collect();
        transitions.sort_unstable();
        for var in transitions {
            constraint.add_value_terms(var, graph.num_states(var), 1.0);
        }

        let detection = self.detection_graph_id()?;
        constraint.add_value_terms(detection, graph.num_states(detection), -1.0);

        if let Some(appearance) = self.appearance.graph_id() {
            constraint.add_value_terms(appearance, graph.num_states(appearance), 1.0);
        }

        constraint.set_bound(0.0);
        constraint.set_relation(Relation::Equal);
        graph.add_constraint(constraint)?;
        Ok(())
    }

    /// Outgoing flow: sum of outgoing link values plus disappearance
    /// equals detection plus division (inline and standalone).
    fn add_outgoing_constraint(
        &self,
        graph: &mut FactorGraph,
        outgoing_link_ids: &[VariableId],
        outgoing_division_ids: &[VariableId],
    ) -> ModelResult<()> {
        if outgoing_link_ids.is_empty()
            && outgoing_division_ids.is_empty()
            && !self.disappearance.is_materialized()
        {
            return Ok(());
        }

        let mut constraint = LinearConstraint::new();

        let mut transitions: Vec<(VariableId, f64)> = outgoing_link_ids
            .iter()
            .map(|&var| (var, 1.0))
            .chain(outgoing_division_ids.iter().map(|&var| (var, -1.0)))
            .collect();
        transitions.sort_unstable_by_key(|(var, _)| *var);
        for (var, coefficient) in transitions {
            constraint.add_value_terms(var, graph.num_states(var), coefficient);
        }

        let detection = self.detection_graph_id()?;
        constraint.add_value_terms(detection, graph.num_states(detection), -1.0);

        if let Some(division) = self.division.graph_id() {
            constraint.add_value_terms(division, graph.num_states(division), -1.0);
        }

        if let Some(disappearance) = self.disappearance.graph_id() {
            constraint.add_value_terms(disappearance, graph.num_states(disappearance), 1.0);
        }

        constraint.set_bound(0.0);
        constraint.set_relation(Relation::Equal);
        graph.add_constraint(constraint)?;
        Ok(())
    }

    /// Division capacity: the division value may not exceed the
    /// detection value. Optionally force at least two active children
    /// while the division is active.
    fn add_division_constraints(
        &self,
        graph: &mut FactorGraph,
        settings: &Settings,
        outgoing_link_ids: &[VariableId],
    ) -> ModelResult<()> {
        let Some(division) = self.division.graph_id() else {
            return Ok(());
        };
        let detection = self.detection_graph_id()?;

        let mut capacity = LinearConstraint::new();
        capacity.add_value_terms(detection, graph.num_states(detection), -1.0);
        capacity.add_value_terms(division, graph.num_states(division), 1.0);
        capacity.set_bound(0.0);
        capacity.set_relation(Relation::LessEqual);
        graph.add_constraint(capacity)?;

        if settings.require_separate_children_of_division {
            // 2 * division[1] - sum of active outgoing links <= 0
            let mut separate = LinearConstraint::new();
            for &var in outgoing_link_ids {
                separate.add_indicator(var, 1, -1.0);
            }
            separate.add_indicator(division, 1, 2.0);
            separate.set_bound(0.0);
            separate.set_relation(Relation::LessEqual);
            graph.add_constraint(separate)?;
        }
        Ok(())
    }

    /// Pairwise exclusions between appearance/disappearance and the
    /// adjacent transitions (merger case only).
    fn add_transition_exclusions(
        &self,
        graph: &mut FactorGraph,
        settings: &Settings,
        incoming_link_ids: &[VariableId],
        outgoing_link_ids: &[VariableId],
    ) -> ModelResult<()> {
        if self.detection.num_states() <= 1 {
            return Ok(());
        }

        if let Some(appearance) = self.appearance.graph_id() {
            if !settings.allow_partial_merger_appearance {
                for &link in incoming_link_ids {
                    add_pairwise_exclusion(graph, appearance, link)?;
                }
            }
        }

        if let Some(disappearance) = self.disappearance.graph_id() {
            if !settings.allow_partial_merger_appearance {
                for &link in outgoing_link_ids {
                    add_pairwise_exclusion(graph, disappearance, link)?;
                }
            }
            if let Some(division) = self.division.graph_id() {
                add_pairwise_exclusion(graph, disappearance, division)?;
            }
        }
        Ok(())
    }

    fn detection_graph_id(&self) -> ModelResult<VariableId> {
        self.detection
            .graph_id()
            .ok_or(ModelError::NotMaterialized(self.id))
    }

    /// Sum of solution values over the incoming links and divisions.
    pub fn active_incoming(
        &self,
        solution: &Labeling,
        links: &BTreeMap<LinkKey, LinkingHypothesis>,
        divisions: &BTreeMap<DivisionKey, DivisionHypothesis>,
    ) -> ModelResult<usize> {
        Ok(self.sum_links(solution, &self.incoming_links, links)?
            + self.sum_divisions(solution, &self.incoming_divisions, divisions)?)
    }

    /// Sum of solution values over the outgoing links and divisions.
    pub fn active_outgoing(
        &self,
        solution: &Labeling,
        links: &BTreeMap<LinkKey, LinkingHypothesis>,
        divisions: &BTreeMap<DivisionKey, DivisionHypothesis>,
    ) -> ModelResult<usize> {
        Ok(self.sum_links(solution, &self.outgoing_links, links)?
            + self.sum_divisions(solution, &self.outgoing_divisions, divisions)?)
    }

    fn sum_links(
        &self,
        solution: &Labeling,
        list: &[LinkKey],
        links: &BTreeMap<LinkKey, LinkingHypothesis>,
    ) -> ModelResult<usize> {
        list.iter()
            .map(|key| {
                links
                    .get(key)
                    .and_then(LinkingHypothesis::graph_id)
                    .map(|var| solution[var])
                    .ok_or(ModelError::NotMaterialized(self.id))
            })
            .sum()
    }

    fn sum_divisions(
        &self,
        solution: &Labeling,
        list: &[DivisionKey],
        divisions: &BTreeMap<DivisionKey, DivisionHypothesis>,
    ) -> ModelResult<usize> {
        list.iter()
            .map(|key| {
                divisions
                    .get(key)
                    .and_then(DivisionHypothesis::graph_id)
                    .map(|var| solution[var])
                    .ok_or(ModelError::NotMaterialized(self.id))
            })
            .sum()
    }

    /// Checks the flow, division and transition-exclusion invariants of
    /// this node against a concrete labeling.
    ///
    /// Returns `Ok(false)` with a diagnostic on the first violated
    /// invariant; structural problems (unmaterialized variables) are
    /// errors.
    pub fn verify_solution(
        &self,
        solution: &Labeling,
        settings: &Settings,
        links: &BTreeMap<LinkKey, LinkingHypothesis>,
        divisions: &BTreeMap<DivisionKey, DivisionHypothesis>,
    ) -> ModelResult<bool> {
        let own_value = solution[self.detection_graph_id()?];
        let division_value = self
            .division
            .graph_id()
            .map(|var| solution[var])
            .unwrap_or(0);

        // incoming
        let incoming_transitions = self.active_incoming(solution, links, divisions)?;
        let mut sum_incoming = incoming_transitions;
        if let Some(appearance) = self.appearance.graph_id() {
            let appearance_value = solution[appearance];
            if !settings.allow_partial_merger_appearance
                && appearance_value > 0
                && incoming_transitions > 0
            {
                tracing::warn!(
                    node = self.id,
                    "active incoming transitions and active appearance"
                );
                return Ok(false);
            }
            sum_incoming += appearance_value;
        }

        let has_incoming = !self.incoming_links.is_empty()
            || !self.incoming_divisions.is_empty()
            || self.appearance.is_materialized();
        if has_incoming && sum_incoming != own_value {
            tracing::warn!(
                node = self.id,
                incoming = sum_incoming,
                detection = own_value,
                "incoming flow does not match detection value"
            );
            return Ok(false);
        }

        // outgoing
        let outgoing_links = self.sum_links(solution, &self.outgoing_links, links)?;
        let outgoing_divisions =
            self.sum_divisions(solution, &self.outgoing_divisions, divisions)?;
        let mut sum_outgoing = outgoing_links;
        if let Some(disappearance) = self.disappearance.graph_id() {
            let disappearance_value = solution[disappearance];
            if !settings.allow_partial_merger_appearance
                && disappearance_value > 0
                && outgoing_links + outgoing_divisions > 0
            {
                tracing::warn!(
                    node = self.id,
                    "active outgoing transitions and active disappearance"
                );
                return Ok(false);
            }
            sum_outgoing += disappearance_value;
        }

        let has_outgoing = !self.outgoing_links.is_empty()
            || !self.outgoing_divisions.is_empty()
            || self.disappearance.is_materialized();
        if has_outgoing && sum_outgoing != own_value + division_value + outgoing_divisions {
            tracing::warn!(
                node = self.id,
                outgoing = sum_outgoing,
                detection = own_value,
                division = division_value,
                "outgoing flow does not match detection plus division"
            );
            return Ok(false);
        }

        // division capacity
        if division_value > own_value {
            tracing::warn!(
                node = self.id,
                division = division_value,
                detection = own_value,
                "division exceeds detection value"
            );
            return Ok(false);
        }

        // division vs disappearance
        if let Some(disappearance) = self.disappearance.graph_id() {
            if division_value > 0 && solution[disappearance] > 0 {
                tracing::warn!(node = self.id, "division and disappearance both active");
                return Ok(false);
            }
        }

        // separate children
        if settings.require_separate_children_of_division && division_value > 0 {
            let active_children = self
                .outgoing_links
                .iter()
                .filter_map(|key| links.get(key).and_then(LinkingHypothesis::graph_id))
                .filter(|&var| solution[var] > 0)
                .count();
            if active_children < 2 {
                tracing::warn!(
                    node = self.id,
                    active_children,
                    "active division with fewer than two active children"
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Re-sorts `list` by the links' assigned graph variable ids and
/// returns those ids in the new order.
fn sort_links_by_graph_id(
    list: &mut LinkList,
    links: &BTreeMap<LinkKey, LinkingHypothesis>,
    owner: HypothesisId,
) -> ModelResult<Vec<VariableId>> {
    let mut resolved = list
        .iter()
        .map(|key| {
            links
                .get(key)
                .and_then(LinkingHypothesis::graph_id)
                .map(|var| (var, *key))
                .ok_or(ModelError::NotMaterialized(owner))
        })
        .collect::<ModelResult<Vec<_>>>()?;
    resolved.sort_unstable_by_key(|(var, _)| *var);
    list.clear();
    list.extend(resolved.iter().map(|(_, key)| *key));
    Ok(resolved.into_iter().map(|(var, _)| var).collect())
}

/// Re-sorts `list` by the divisions' assigned graph variable ids and
/// returns those ids in the new order.
fn sort_divisions_by_graph_id(
    list: &mut DivisionList,
    divisions: &BTreeMap<DivisionKey, DivisionHypothesis>,
    owner: HypothesisId,
) -> ModelResult<Vec<VariableId>> {
    let mut resolved = list
        .iter()
        .map(|key| {
            divisions
                .get(key)
                .and_then(DivisionHypothesis::graph_id)
                .map(|var| (var, *key))
                .ok_or(ModelError::NotMaterialized(owner))
        })
        .collect::<ModelResult<Vec<_>>>()?;
    resolved.sort_unstable_by_key(|(var, _)| *var);
    list.clear();
    list.extend(resolved.iter().map(|(_, key)| *key));
    Ok(resolved.into_iter().map(|(var, _)| var).collect())
}

/// At least one of the two variables must be inactive:
/// `a(0) + b(0) >= 1`.
fn add_pairwise_exclusion(
    graph: &mut FactorGraph,
    a: VariableId,
    b: VariableId,
) -> ModelResult<()> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut constraint = LinearConstraint::new();
    constraint.add_indicator(first, 0, 1.0);
    constraint.add_indicator(second, 0, 1.0);
    constraint.set_bound(1.0);
    constraint.set_relation(Relation::GreaterEqual);
    graph.add_constraint(constraint)?;
    Ok(())
}

#[cfg(test)]
mod tests;
