//! Learnable unary energies.
//!
//! A unary energy assigns each state of a variable the dot product of
//! that state's feature vector with a slice of the global weight vector,
//! plus an optional constant bias. Whether the slices overlap is decided
//! by the weight-sharing mode: in shared mode every state reuses the
//! same weight ids, in unshared mode each state consumes a disjoint,
//! sequential slice.

use crate::error::{GraphError, Result};
use crate::weights::WeightVector;

/// Per-state feature vectors: outer index = state (0 = inactive,
/// 1..k = active states), inner = feature values for that state.
pub type StateFeatures = Vec<Vec<f64>>;

/// Energy contribution of a single state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEnergy {
    features: Vec<f64>,
    weight_ids: Vec<usize>,
    bias: f64,
}

impl StateEnergy {
    fn new(features: Vec<f64>, weight_ids: Vec<usize>) -> Result<Self> {
        if features.len() != weight_ids.len() {
            return Err(GraphError::WeightIdCountMismatch {
                expected: features.len(),
                got: weight_ids.len(),
            });
        }
        Ok(Self {
            features,
            weight_ids,
            bias: 0.0,
        })
    }

    /// Dot product with the selected weight slice, plus bias.
    fn value(&self, weights: &WeightVector) -> f64 {
        self.features
            .iter()
            .zip(&self.weight_ids)
            .map(|(f, &id)| f * weights.get(id))
            .sum::<f64>()
            + self.bias
    }
}

/// A learnable unary energy over a multi-state variable.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryEnergy {
    states: Vec<StateEnergy>,
}

impl UnaryEnergy {
    /// Builds a shared-weight unary: the same `weight_ids[i]` multiplies
    /// feature `i` in every state.
    ///
    /// Requires every state to carry `weight_ids.len()` features.
    pub fn shared(features: &StateFeatures, weight_ids: &[usize]) -> Result<Self> {
        let states = features
            .iter()
            .map(|per_state| StateEnergy::new(per_state.clone(), weight_ids.to_vec()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { states })
    }

    /// Builds an unshared unary: each state consumes a disjoint,
    /// sequential slice of `weight_ids`.
    ///
    /// Requires `weight_ids.len()` to equal the total feature count
    /// summed over all states.
    pub fn per_state(features: &StateFeatures, weight_ids: &[usize]) -> Result<Self> {
        let total: usize = features.iter().map(Vec::len).sum();
        if weight_ids.len() != total {
            return Err(GraphError::WeightIdCountMismatch {
                expected: total,
                got: weight_ids.len(),
            });
        }
        let mut next = 0;
        let states = features
            .iter()
            .map(|per_state| {
                let ids = weight_ids[next..next + per_state.len()].to_vec();
                next += per_state.len();
                StateEnergy::new(per_state.clone(), ids)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { states })
    }

    /// Builds a constant (weight-free) unary from per-state energies.
    ///
    /// Used for loss augmentation during learning.
    pub fn constant(per_state: Vec<f64>) -> Self {
        let states = per_state
            .into_iter()
            .map(|bias| StateEnergy {
                features: Vec::new(),
                weight_ids: Vec::new(),
                bias,
            })
            .collect();
        Self { states }
    }

    /// Number of states this energy covers.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Energy of `state` under the given weights.
    pub fn value(&self, state: usize, weights: &WeightVector) -> f64 {
        self.states[state].value(weights)
    }

    /// Accumulates this unary's feature map for `state` into `phi`:
    /// `phi[weight_id] += feature`.
    pub fn accumulate_features(&self, state: usize, phi: &mut [f64]) {
        let s = &self.states[state];
        for (f, &id) in s.features.iter().zip(&s.weight_ids) {
            phi[id] += f;
        }
    }
}
