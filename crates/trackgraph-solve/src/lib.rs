//! Reference collaborators behind the `trackgraph-core` solver traits.
//!
//! - [`ExhaustiveOptimizer`] - exact minimum-energy search with
//!   constraint pruning and branch-and-bound
//! - [`SubgradientLearner`] - structured max-margin learning with
//!   loss-augmented inference through any inner optimizer
//!
//! Both are exact enough for the model sizes used in tests and serve
//! as drop-in stand-ins for an external ILP backend.

pub mod exhaustive;
pub mod learn;

pub use exhaustive::ExhaustiveOptimizer;
pub use learn::SubgradientLearner;
