//! Error types for the factor-graph layer

use thiserror::Error;

/// Errors raised while assembling or evaluating a factor graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A unary energy was attached with a state count that disagrees
    /// with the variable it is attached to.
    #[error("unary energy has {energy_states} states but variable {variable} has {variable_states}")]
    StateCountMismatch {
        variable: usize,
        variable_states: usize,
        energy_states: usize,
    },

    /// A variable id outside the graph was referenced.
    #[error("variable {variable} does not exist (graph has {num_variables} variables)")]
    UnknownVariable {
        variable: usize,
        num_variables: usize,
    },

    /// A state index outside the variable's label range was referenced.
    #[error("state {state} out of range for variable {variable} with {num_states} states")]
    StateOutOfRange {
        variable: usize,
        state: usize,
        num_states: usize,
    },

    /// Constraint terms must reference variables in ascending order.
    #[error("constraint references variable {current} after {previous}; terms must be in ascending variable order")]
    UnorderedConstraintTerms { previous: usize, current: usize },

    /// A weight-id slice disagrees with the feature layout it is paired with.
    #[error("got {got} weight ids for {expected} features")]
    WeightIdCountMismatch { expected: usize, got: usize },

    /// A labeling does not cover every variable of the graph.
    #[error("labeling has {got} entries but the graph has {expected} variables")]
    LabelingLengthMismatch { expected: usize, got: usize },

    /// A weight vector of the wrong length was supplied.
    #[error("weight vector has length {got} but {expected} weights are referenced")]
    WeightVectorLength { expected: usize, got: usize },
}

/// Result type alias for factor-graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
