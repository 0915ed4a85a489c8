//! Trackgraph Core - factor-graph substrate for tracking-by-assignment
//!
//! This crate provides the fundamental abstractions the hypothesis-graph
//! compiler in `trackgraph-model` targets:
//! - Multi-state model variables with learnable unary energies
//! - Linear constraints over indicator variables
//! - A flat, shareable weight vector
//! - The `Optimizer`/`Learner` collaborator traits

pub mod constraint;
pub mod energy;
pub mod error;
pub mod graph;
pub mod solve;
pub mod weights;

pub use constraint::{IndicatorTerm, LinearConstraint, Relation};
pub use energy::{StateFeatures, UnaryEnergy};
pub use error::{GraphError, Result};
pub use graph::{FactorGraph, Labeling, VariableId};
pub use solve::{
    Inference, Learner, LearnerParams, Optimizer, OptimizerParams, Relaxation, SolveError,
    SolveResult, TrainingInstance,
};
pub use weights::WeightVector;
