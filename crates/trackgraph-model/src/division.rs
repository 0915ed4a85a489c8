//! A standalone division hypothesis: one parent, exactly two children.

use std::collections::BTreeMap;

use trackgraph_core::{FactorGraph, StateFeatures, VariableId};

use crate::error::{ModelError, ModelResult};
use crate::segmentation::SegmentationHypothesis;
use crate::variable::Variable;
use crate::{DivisionKey, HypothesisId};

/// A division hypothesis between a parent detection and two child
/// detections in the next frame.
///
/// The children are normalized into ascending order at construction so
/// that the same division is always keyed identically regardless of
/// input ordering.
#[derive(Debug, Clone)]
pub struct DivisionHypothesis {
    parent: HypothesisId,
    children: [HypothesisId; 2],
    variable: Variable,
}

impl DivisionHypothesis {
    /// Creates a division of `parent` into the given children.
    ///
    /// Fails unless exactly two children are given.
    pub fn new(
        parent: HypothesisId,
        children: &[HypothesisId],
        features: StateFeatures,
    ) -> ModelResult<Self> {
        if children.len() != 2 {
            return Err(ModelError::MalformedDivision {
                parent,
                got: children.len(),
            });
        }
        let mut children = [children[0], children[1]];
        children.sort_unstable();
        Ok(Self {
            parent,
            children,
            variable: Variable::new(features),
        })
    }

    pub fn parent(&self) -> HypothesisId {
        self.parent
    }

    /// The two children, in ascending order.
    pub fn children(&self) -> &[HypothesisId; 2] {
        &self.children
    }

    /// Map key of this division.
    pub fn key(&self) -> DivisionKey {
        (self.parent, self.children[0], self.children[1])
    }

    /// The division variable.
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// The assigned graph variable id, if materialized.
    pub fn graph_id(&self) -> Option<VariableId> {
        self.variable.graph_id()
    }

    /// Registers this division as outgoing of the parent and incoming
    /// of each child.
    ///
    /// Fails when any referenced id does not exist.
    pub fn register(
        &self,
        hypotheses: &mut BTreeMap<HypothesisId, SegmentationHypothesis>,
    ) -> ModelResult<()> {
        if !hypotheses.contains_key(&self.parent) {
            return Err(ModelError::DanglingReference {
                missing: self.parent,
            });
        }
        for child in self.children {
            if !hypotheses.contains_key(&child) {
                return Err(ModelError::DanglingReference { missing: child });
            }
        }

        let key = self.key();
        hypotheses
            .get_mut(&self.parent)
            .expect("checked above")
            .add_outgoing_division(key)?;
        for child in self.children {
            hypotheses
                .get_mut(&child)
                .expect("checked above")
                .add_incoming_division(key)?;
        }
        Ok(())
    }

    /// Materializes the division variable.
    pub fn add_to_graph(
        &mut self,
        graph: &mut FactorGraph,
        shared_across_states: bool,
        weight_ids: &[usize],
    ) -> ModelResult<()> {
        tracing::trace!(
            parent = self.parent,
            children = ?self.children,
            "adding division hypothesis"
        );
        self.variable
            .add_to_graph(graph, shared_across_states, weight_ids)
    }
}
