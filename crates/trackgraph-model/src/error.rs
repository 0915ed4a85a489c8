//! Error types for model construction.
//!
//! Structural input errors, weight-layout mismatches and sequencing
//! errors are all fatal and propagate to the caller before any solver
//! is invoked. Solution verification deliberately does not use these:
//! it reports a verdict instead of aborting.

use thiserror::Error;

use trackgraph_core::{GraphError, SolveError};

use crate::model::WeightKind;
use crate::HypothesisId;

/// Errors raised while assembling or materializing a tracking model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A hypothesis id was inserted twice.
    #[error("duplicate segmentation hypothesis id {0}")]
    DuplicateHypothesis(HypothesisId),

    /// The same (src, dest) link was inserted twice.
    #[error("duplicate linking hypothesis {src} -> {dest}")]
    DuplicateLink { src: HypothesisId, dest: HypothesisId },

    /// The same (parent, children) division was inserted twice.
    #[error("duplicate division hypothesis of parent {parent}")]
    DuplicateDivision { parent: HypothesisId },

    /// A link or division references a segmentation hypothesis that
    /// does not exist.
    #[error("reference to unknown segmentation hypothesis {missing}")]
    DanglingReference { missing: HypothesisId },

    /// A division must have exactly two children.
    #[error("division of parent {parent} must have exactly two children, got {got}")]
    MalformedDivision { parent: HypothesisId, got: usize },

    /// An exclusion set needs at least two members.
    #[error("exclusion constraint must reference at least two hypotheses, got {0}")]
    ExclusionTooSmall(usize),

    /// Detections are mandatory: a segmentation hypothesis without
    /// detection features cannot be materialized.
    #[error("detection variable of hypothesis {0} must have some features")]
    MissingDetectionFeatures(HypothesisId),

    /// Weight sharing requires every state of a variable to carry the
    /// same number of features.
    #[error("features of hypothesis variable differ across states: state 0 has {expected}, state {state} has {got}")]
    RaggedSharedFeatures {
        expected: usize,
        state: usize,
        got: usize,
    },

    /// All instances of one variable kind must need the same number of
    /// weights.
    #[error("{kind} variables do not have the same number of features/weights: expected {expected}, got {got}")]
    WeightCountMismatch {
        kind: WeightKind,
        expected: usize,
        got: usize,
    },

    /// Inline and standalone divisions cannot coexist.
    #[error("model cannot contain divisions within detection nodes and externally at the same time")]
    MixedDivisionKinds,

    /// A weight vector of the wrong length was supplied.
    #[error("weight vector has length {got} but the model needs {expected} weights")]
    WeightVectorLength { expected: usize, got: usize },

    /// Links and divisions must be registered before materialization.
    #[error("hypothesis {0} is already materialized; links and divisions must be registered first")]
    AlreadyMaterialized(HypothesisId),

    /// A variable id was requested before the variable was added to the
    /// graph.
    #[error("variable of hypothesis {0} has not been materialized yet")]
    NotMaterialized(HypothesisId),

    /// Ground truth activates a node that appears without appearance
    /// features.
    #[error("ground truth contains appearing hypothesis {0} that has no appearance features")]
    MissingAppearanceFeatures(HypothesisId),

    /// Ground truth activates a node that disappears without
    /// disappearance features.
    #[error("ground truth contains disappearing hypothesis {0} that has no disappearance features")]
    MissingDisappearanceFeatures(HypothesisId),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// Result type alias for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
