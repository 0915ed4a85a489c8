//! The factor graph assembled by the model layer and consumed by
//! optimizers.
//!
//! Variables are multi-state; energies are learnable unaries; hard
//! linear constraints restrict the feasible labelings. Construction is
//! sequential and single-threaded; the finished graph is handed to the
//! optimizer read-only.

use crate::constraint::LinearConstraint;
use crate::energy::UnaryEnergy;
use crate::error::{GraphError, Result};
use crate::weights::WeightVector;

/// Index of a model variable within a [`FactorGraph`].
pub type VariableId = usize;

/// A concrete assignment of one state per model variable.
pub type Labeling = Vec<usize>;

/// A factor graph: multi-state variables, learnable unary energies and
/// hard linear constraints.
#[derive(Debug, Clone, Default)]
pub struct FactorGraph {
    num_states: Vec<usize>,
    unaries: Vec<(VariableId, UnaryEnergy)>,
    constraints: Vec<LinearConstraint>,
}

impl FactorGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable with the given number of states and returns its id.
    pub fn add_variable(&mut self, num_states: usize) -> VariableId {
        self.num_states.push(num_states);
        self.num_states.len() - 1
    }

    /// Attaches a unary energy to a variable.
    pub fn add_unary(&mut self, variable: VariableId, energy: UnaryEnergy) -> Result<()> {
        let variable_states = self.check_variable(variable)?;
        if energy.num_states() != variable_states {
            return Err(GraphError::StateCountMismatch {
                variable,
                variable_states,
                energy_states: energy.num_states(),
            });
        }
        self.unaries.push((variable, energy));
        Ok(())
    }

    /// Adds a hard linear constraint.
    ///
    /// Terms must reference variables in ascending order (ties allowed,
    /// e.g. several states of one variable), and every referenced state
    /// must be within its variable's label range.
    pub fn add_constraint(&mut self, constraint: LinearConstraint) -> Result<()> {
        let mut previous: Option<VariableId> = None;
        for term in constraint.terms() {
            let num_states = self.check_variable(term.variable)?;
            if term.state >= num_states {
                return Err(GraphError::StateOutOfRange {
                    variable: term.variable,
                    state: term.state,
                    num_states,
                });
            }
            if let Some(prev) = previous {
                if term.variable < prev {
                    return Err(GraphError::UnorderedConstraintTerms {
                        previous: prev,
                        current: term.variable,
                    });
                }
            }
            previous = Some(term.variable);
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Number of variables in the graph.
    pub fn num_variables(&self) -> usize {
        self.num_states.len()
    }

    /// Number of states of a variable.
    pub fn num_states(&self, variable: VariableId) -> usize {
        self.num_states[variable]
    }

    /// Total number of indicator variables (sum of label counts).
    pub fn num_indicator_variables(&self) -> usize {
        self.num_states.iter().sum()
    }

    /// The hard constraints of this graph.
    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// The unary energies of this graph.
    pub fn unaries(&self) -> &[(VariableId, UnaryEnergy)] {
        &self.unaries
    }

    /// Energy of a labeling under the given weights.
    ///
    /// Hard constraints contribute +inf when violated, so an infeasible
    /// labeling evaluates to infinity.
    pub fn evaluate(&self, labeling: &Labeling, weights: &WeightVector) -> Result<f64> {
        self.check_labeling(labeling)?;
        if !self.satisfies_constraints(labeling) {
            return Ok(f64::INFINITY);
        }
        Ok(self.unary_energy(labeling, weights))
    }

    /// Sum of unary energies only, ignoring constraints.
    pub fn unary_energy(&self, labeling: &Labeling, weights: &WeightVector) -> f64 {
        self.unaries
            .iter()
            .map(|(var, energy)| energy.value(labeling[*var], weights))
            .sum()
    }

    /// Whether all hard constraints hold.
    pub fn satisfies_constraints(&self, labeling: &Labeling) -> bool {
        self.constraints.iter().all(|c| c.holds(labeling))
    }

    /// Indices of the violated constraints.
    pub fn violated_constraints(&self, labeling: &Labeling) -> Vec<usize> {
        self.constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.holds(labeling))
            .map(|(i, _)| i)
            .collect()
    }

    /// Feature map φ(y): accumulated feature values per weight slot, so
    /// that the learnable part of the energy is `w · φ(y)`.
    pub fn feature_map(&self, labeling: &Labeling, num_weights: usize) -> Result<Vec<f64>> {
        self.check_labeling(labeling)?;
        let mut phi = vec![0.0; num_weights];
        for (var, energy) in &self.unaries {
            energy.accumulate_features(labeling[*var], &mut phi);
        }
        Ok(phi)
    }

    fn check_variable(&self, variable: VariableId) -> Result<usize> {
        self.num_states
            .get(variable)
            .copied()
            .ok_or(GraphError::UnknownVariable {
                variable,
                num_variables: self.num_states.len(),
            })
    }

    fn check_labeling(&self, labeling: &Labeling) -> Result<()> {
        if labeling.len() != self.num_states.len() {
            return Err(GraphError::LabelingLengthMismatch {
                expected: self.num_states.len(),
                got: labeling.len(),
            });
        }
        Ok(())
    }
}
