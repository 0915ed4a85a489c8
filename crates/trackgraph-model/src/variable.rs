//! A single model variable with per-state feature vectors.

use trackgraph_core::{FactorGraph, StateFeatures, UnaryEnergy, VariableId};

use crate::error::{ModelError, ModelResult};

/// One decision variable of a hypothesis: detection, division,
/// appearance, disappearance or link.
///
/// Holds the per-state feature vectors and, once materialized, the id
/// of the graph variable it became. A variable with no states (or an
/// empty first state) is *absent*: it never materializes and needs no
/// weights.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variable {
    features: StateFeatures,
    graph_id: Option<VariableId>,
}

impl Variable {
    /// Creates a variable from per-state features.
    pub fn new(features: StateFeatures) -> Self {
        Self {
            features,
            graph_id: None,
        }
    }

    /// Creates an absent variable (no states, no features).
    pub fn absent() -> Self {
        Self::default()
    }

    /// Number of states this variable can take.
    pub fn num_states(&self) -> usize {
        self.features.len()
    }

    /// Number of features of one state.
    pub fn num_features(&self, state: usize) -> usize {
        self.features[state].len()
    }

    /// Number of features summed over all states.
    pub fn total_features(&self) -> usize {
        self.features.iter().map(Vec::len).sum()
    }

    /// The per-state feature vectors.
    pub fn features(&self) -> &StateFeatures {
        &self.features
    }

    /// True once `add_to_graph` has assigned a graph variable.
    pub fn is_materialized(&self) -> bool {
        self.graph_id.is_some()
    }

    /// The assigned graph variable id, if materialized.
    pub fn graph_id(&self) -> Option<VariableId> {
        self.graph_id
    }

    /// True when there is no feature data to materialize.
    pub fn is_absent(&self) -> bool {
        self.features.is_empty() || self.features[0].is_empty()
    }

    /// Number of learnable weights this variable needs, or `None` for
    /// an absent variable.
    ///
    /// With weight sharing every state reuses the same weights, so the
    /// count is the (validated, uniform) per-state feature count; the
    /// counts of all states must agree. Without sharing each
    /// (state, feature) pair has its own weight.
    pub fn num_weights(&self, shared_across_states: bool) -> ModelResult<Option<usize>> {
        if self.is_absent() {
            return Ok(None);
        }
        if shared_across_states {
            let expected = self.features[0].len();
            for (state, per_state) in self.features.iter().enumerate().skip(1) {
                if per_state.len() != expected {
                    return Err(ModelError::RaggedSharedFeatures {
                        expected,
                        state,
                        got: per_state.len(),
                    });
                }
            }
            Ok(Some(expected))
        } else {
            Ok(Some(self.total_features()))
        }
    }

    /// Materializes this variable as a graph variable with a learnable
    /// unary energy. No-op for absent variables.
    ///
    /// `weight_ids` must have exactly `num_weights` entries; in shared
    /// mode the same id multiplies its feature in every state, in
    /// unshared mode each state consumes a disjoint sequential slice.
    pub fn add_to_graph(
        &mut self,
        graph: &mut FactorGraph,
        shared_across_states: bool,
        weight_ids: &[usize],
    ) -> ModelResult<()> {
        if self.is_absent() {
            return Ok(());
        }
        debug_assert_eq!(
            Some(weight_ids.len()),
            self.num_weights(shared_across_states)?
        );

        let energy = if shared_across_states {
            UnaryEnergy::shared(&self.features, weight_ids)?
        } else {
            UnaryEnergy::per_state(&self.features, weight_ids)?
        };

        let id = graph.add_variable(self.num_states());
        graph.add_unary(id, energy)?;
        self.graph_id = Some(id);
        Ok(())
    }
}
