//! Mutual-exclusion sets over detection variables.

use std::collections::BTreeMap;

use trackgraph_core::{FactorGraph, Labeling, LinearConstraint, Relation};

use crate::error::{ModelError, ModelResult};
use crate::segmentation::SegmentationHypothesis;
use crate::HypothesisId;

/// At most one of the referenced detections may be active (state > 0)
/// in any valid solution.
#[derive(Debug, Clone)]
pub struct ExclusionConstraint {
    ids: Vec<HypothesisId>,
}

impl ExclusionConstraint {
    /// Creates an exclusion set. Needs at least two members.
    pub fn new(mut ids: Vec<HypothesisId>) -> ModelResult<Self> {
        if ids.len() < 2 {
            return Err(ModelError::ExclusionTooSmall(ids.len()));
        }
        ids.sort_unstable();
        Ok(Self { ids })
    }

    /// The member hypothesis ids, sorted ascending.
    pub fn ids(&self) -> &[HypothesisId] {
        &self.ids
    }

    /// Emits the at-most-one-active constraint.
    ///
    /// Members are re-sorted by their materialized detection variable
    /// ids, since constraint terms must reference variables in
    /// increasing id order.
    pub fn add_to_graph(
        &self,
        graph: &mut FactorGraph,
        hypotheses: &BTreeMap<HypothesisId, SegmentationHypothesis>,
    ) -> ModelResult<()> {
        let mut detection_vars = self
            .ids
            .iter()
            .map(|id| self.detection_var(*id, hypotheses))
            .collect::<ModelResult<Vec<_>>>()?;
        detection_vars.sort_unstable();

        let mut constraint = LinearConstraint::new();
        for var in detection_vars {
            // one indicator per active state: "this detection is active"
            for state in 1..graph.num_states(var) {
                constraint.add_indicator(var, state, 1.0);
            }
        }
        constraint.set_bound(1.0);
        constraint.set_relation(Relation::LessEqual);
        graph.add_constraint(constraint)?;
        Ok(())
    }

    /// Counts the active members; valid iff at most one.
    pub fn verify_solution(
        &self,
        solution: &Labeling,
        hypotheses: &BTreeMap<HypothesisId, SegmentationHypothesis>,
    ) -> ModelResult<bool> {
        let mut active = 0;
        for id in &self.ids {
            let var = self.detection_var(*id, hypotheses)?;
            if solution[var] > 0 {
                active += 1;
            }
        }
        if active > 1 {
            tracing::warn!(ids = ?self.ids, active, "violated exclusion constraint");
        }
        Ok(active <= 1)
    }

    fn detection_var(
        &self,
        id: HypothesisId,
        hypotheses: &BTreeMap<HypothesisId, SegmentationHypothesis>,
    ) -> ModelResult<usize> {
        let hypothesis = hypotheses
            .get(&id)
            .ok_or(ModelError::DanglingReference { missing: id })?;
        hypothesis
            .detection()
            .graph_id()
            .ok_or(ModelError::NotMaterialized(id))
    }
}
