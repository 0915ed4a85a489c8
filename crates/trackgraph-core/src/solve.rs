//! Collaborator traits for inference and learning.
//!
//! The ILP/LP solver and the structured learner are external
//! collaborators: the model layer builds a [`FactorGraph`] and hands it
//! over through these narrow interfaces. Reference implementations live
//! in `trackgraph-solve`; any backend satisfying the traits can be
//! plugged in.

use thiserror::Error;

use crate::error::GraphError;
use crate::graph::{FactorGraph, Labeling};
use crate::weights::WeightVector;

/// Errors raised by optimizers and learners.
#[derive(Debug, Error)]
pub enum SolveError {
    /// No labeling satisfies the hard constraints.
    #[error("model is infeasible: no labeling satisfies the constraints")]
    Infeasible,

    /// A backend-specific failure.
    #[error("solver backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type alias for solver operations.
pub type SolveResult<T> = std::result::Result<T, SolveError>;

/// LP relaxation mode requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relaxation {
    /// Solve over the tightest polytope the backend supports.
    #[default]
    TightPolytope,
    /// Local-polytope relaxation.
    LocalPolytope,
}

/// Parameter set handed to an [`Optimizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerParams {
    pub relaxation: Relaxation,
    /// Require integral node variables.
    pub integer_constraints: bool,
    /// Acceptable relative gap to the proven optimum.
    pub ep_gap: f64,
    pub verbose: bool,
    /// 0 means "use all cores"; purely a pass-through knob.
    pub num_threads: usize,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            relaxation: Relaxation::TightPolytope,
            integer_constraints: true,
            ep_gap: 0.01,
            verbose: true,
            num_threads: 1,
        }
    }
}

/// An optimal labeling together with its objective value.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub labeling: Labeling,
    pub objective: f64,
}

/// Minimizes the energy of a factor graph subject to its constraints.
pub trait Optimizer {
    fn infer(
        &self,
        graph: &FactorGraph,
        weights: &WeightVector,
        params: &OptimizerParams,
    ) -> SolveResult<Inference>;
}

/// One training example: a built factor graph and its ground-truth
/// labeling.
#[derive(Debug)]
pub struct TrainingInstance<'a> {
    pub graph: &'a FactorGraph,
    pub ground_truth: Labeling,
}

/// Parameter set handed to a [`Learner`].
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerParams {
    /// Optimizer parameters for the inner (loss-augmented) inference.
    pub optimizer: OptimizerParams,
    /// L2 regularization strength.
    pub regularization: f64,
    /// Project weights onto the non-negative orthant after each step.
    pub non_negative_weights: bool,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            optimizer: OptimizerParams::default(),
            regularization: 1.0,
            non_negative_weights: false,
        }
    }
}

/// Learns a weight vector from (graph, ground truth) pairs by
/// minimizing a margin-based loss.
pub trait Learner {
    fn learn(
        &self,
        dataset: &[TrainingInstance<'_>],
        initial: WeightVector,
        params: &LearnerParams,
    ) -> SolveResult<WeightVector>;
}
