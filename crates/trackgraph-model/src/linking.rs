//! A candidate transition between two detections.

use std::collections::BTreeMap;

use trackgraph_core::{FactorGraph, StateFeatures, VariableId};

use crate::error::{ModelError, ModelResult};
use crate::segmentation::SegmentationHypothesis;
use crate::variable::Variable;
use crate::{HypothesisId, LinkKey};

/// A linking hypothesis: source and destination detection ids plus one
/// variable carrying the transition features.
#[derive(Debug, Clone)]
pub struct LinkingHypothesis {
    src: HypothesisId,
    dest: HypothesisId,
    variable: Variable,
}

impl LinkingHypothesis {
    /// Creates a link between `src` and `dest` with the given per-state
    /// features.
    pub fn new(src: HypothesisId, dest: HypothesisId, features: StateFeatures) -> Self {
        Self {
            src,
            dest,
            variable: Variable::new(features),
        }
    }

    pub fn src(&self) -> HypothesisId {
        self.src
    }

    pub fn dest(&self) -> HypothesisId {
        self.dest
    }

    /// Map key of this link.
    pub fn key(&self) -> LinkKey {
        (self.src, self.dest)
    }

    /// The transition variable.
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// The assigned graph variable id, if materialized.
    pub fn graph_id(&self) -> Option<VariableId> {
        self.variable.graph_id()
    }

    /// Registers this link with both endpoint hypotheses.
    ///
    /// Fails when either endpoint id does not exist; a dangling
    /// reference is a hard input error.
    pub fn register(
        &self,
        hypotheses: &mut BTreeMap<HypothesisId, SegmentationHypothesis>,
    ) -> ModelResult<()> {
        if !hypotheses.contains_key(&self.src) {
            return Err(ModelError::DanglingReference { missing: self.src });
        }
        if !hypotheses.contains_key(&self.dest) {
            return Err(ModelError::DanglingReference { missing: self.dest });
        }

        let key = self.key();
        hypotheses
            .get_mut(&self.src)
            .expect("checked above")
            .add_outgoing_link(key)?;
        hypotheses
            .get_mut(&self.dest)
            .expect("checked above")
            .add_incoming_link(key)?;
        Ok(())
    }

    /// Materializes the transition variable.
    pub fn add_to_graph(
        &mut self,
        graph: &mut FactorGraph,
        shared_across_states: bool,
        weight_ids: &[usize],
    ) -> ModelResult<()> {
        tracing::trace!(src = self.src, dest = self.dest, "adding linking hypothesis");
        self.variable
            .add_to_graph(graph, shared_across_states, weight_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypothesis(id: HypothesisId) -> SegmentationHypothesis {
        SegmentationHypothesis::new(id, vec![vec![0.0], vec![1.0]], vec![], vec![], vec![])
    }

    #[test]
    fn register_adds_to_both_endpoints() {
        let mut hypotheses = BTreeMap::new();
        hypotheses.insert(1, hypothesis(1));
        hypotheses.insert(2, hypothesis(2));

        let link = LinkingHypothesis::new(1, 2, vec![vec![0.0], vec![-1.0]]);
        link.register(&mut hypotheses).unwrap();

        assert_eq!(hypotheses[&1].outgoing_links(), &[(1, 2)]);
        assert_eq!(hypotheses[&2].incoming_links(), &[(1, 2)]);
        assert!(hypotheses[&1].incoming_links().is_empty());
    }

    #[test]
    fn register_rejects_dangling_endpoint() {
        let mut hypotheses = BTreeMap::new();
        hypotheses.insert(1, hypothesis(1));

        let link = LinkingHypothesis::new(1, 7, vec![vec![0.0], vec![-1.0]]);
        assert!(matches!(
            link.register(&mut hypotheses),
            Err(ModelError::DanglingReference { missing: 7 })
        ));
    }
}
