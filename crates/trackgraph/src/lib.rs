//! Trackgraph - multi-target tracking-by-assignment.
//!
//! Builds a constrained ILP model from per-frame detection hypotheses
//! and candidate links/divisions, finds a minimum-energy flow-consistent
//! labeling, and learns per-feature weights from ground truth via
//! structured max-margin learning.
//!
//! # Example
//!
//! ```
//! use trackgraph::config::Settings;
//! use trackgraph::{track, LinkingHypothesis, SegmentationHypothesis, TrackingModel};
//!
//! let settings = Settings::default()
//!     .with_states_share_weights(true)
//!     .with_optimizer_verbose(false);
//! let mut model = TrackingModel::new(settings);
//! for id in [1, 2] {
//!     model.add_hypothesis(SegmentationHypothesis::new(
//!         id,
//!         vec![vec![1.0], vec![0.0]],
//!         vec![],
//!         vec![],
//!         vec![],
//!     )).unwrap();
//! }
//! model.add_link(LinkingHypothesis::new(1, 2, vec![vec![0.0], vec![-1.0]])).unwrap();
//!
//! let (built, solution) = track(model, &[1.0, 1.0]).unwrap();
//! assert!(built.verify_solution(&solution).unwrap());
//! ```

pub use trackgraph_core::{
    FactorGraph, GraphError, Inference, Labeling, Learner, LearnerParams, LinearConstraint,
    Optimizer, OptimizerParams, Relation, Relaxation, SolveError, UnaryEnergy, VariableId,
    WeightVector,
};
pub use trackgraph_model::{
    BuiltModel, DivisionHypothesis, ExclusionConstraint, GroundTruthProvider, HypothesisId,
    LinkingHypothesis, ModelError, ModelResult, SegmentationHypothesis, TrackingModel, Variable,
    WeightCounts, WeightKind,
};
pub use trackgraph_solve::{ExhaustiveOptimizer, SubgradientLearner};

pub mod config {
    pub use trackgraph_config::{ConfigError, Settings};
}

pub mod graphviz {
    pub use trackgraph_model::graphviz::write_dot;
}

/// Builds the model with the given weights and runs inference with the
/// reference optimizer.
pub fn track(model: TrackingModel, weights: &[f64]) -> ModelResult<(BuiltModel, Labeling)> {
    let mut built = model.build(weights)?;
    let solution = built.infer(&ExhaustiveOptimizer::new())?;
    tracing::info!(objective = built.last_objective(), "tracking finished");
    Ok((built, solution))
}

/// Builds the model with zero weights and learns weights from the
/// ground truth supplied by `provider`, using the reference learner.
pub fn train<G: GroundTruthProvider>(
    model: TrackingModel,
    provider: &G,
) -> ModelResult<(BuiltModel, Vec<f64>)> {
    let mut model = model;
    let num_weights = model.num_weights()?;
    let built = model.build(&vec![0.0; num_weights])?;
    let learner = SubgradientLearner::new(ExhaustiveOptimizer::new());
    let weights = built.learn(&learner, provider, None)?;
    tracing::info!(num_weights = weights.len(), "training finished");
    Ok((built, weights))
}
