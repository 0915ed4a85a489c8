//! Trackgraph Model - compiles a hypothesis graph into a constrained
//! ILP model.
//!
//! A [`TrackingModel`] collects segmentation, linking and division
//! hypotheses plus mutual-exclusion sets, computes the layout of the
//! flat learnable weight vector, and materializes everything into a
//! [`trackgraph_core::FactorGraph`] with flow-conservation, division
//! and exclusion constraints. The consumed-builder split into
//! [`TrackingModel`] / [`BuiltModel`] makes the single-use contract a
//! compile-time guarantee.

pub mod division;
pub mod error;
pub mod exclusion;
pub mod graphviz;
pub mod linking;
pub mod model;
pub mod segmentation;
pub mod variable;

pub use division::DivisionHypothesis;
pub use error::{ModelError, ModelResult};
pub use exclusion::ExclusionConstraint;
pub use linking::LinkingHypothesis;
pub use model::{BuiltModel, GroundTruthProvider, TrackingModel, WeightCounts, WeightKind};
pub use segmentation::SegmentationHypothesis;
pub use variable::Variable;

/// Identity of a segmentation hypothesis, unique across the model.
pub type HypothesisId = u64;

/// Key of a linking hypothesis: (source, destination).
pub type LinkKey = (HypothesisId, HypothesisId);

/// Key of a division hypothesis: (parent, smaller child, larger child).
pub type DivisionKey = (HypothesisId, HypothesisId, HypothesisId);
