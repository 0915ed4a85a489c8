//! Structured max-margin learning by subgradient descent.

use trackgraph_core::{
    Learner, LearnerParams, SolveResult, TrainingInstance, UnaryEnergy, WeightVector,
};

/// Learns weights so that each ground-truth labeling beats every other
/// labeling by a margin proportional to its Hamming distance.
///
/// Each step runs loss-augmented inference through the inner optimizer
/// (the Hamming loss enters as constant unary bonuses for deviating
/// states), then descends along the regularized margin subgradient.
/// With `non_negative_weights` the iterate is projected onto the
/// non-negative orthant after every step.
#[derive(Debug, Clone)]
pub struct SubgradientLearner<O> {
    optimizer: O,
    max_iterations: usize,
    initial_step: f64,
    tolerance: f64,
}

impl<O> SubgradientLearner<O> {
    /// Creates a learner around the given inner optimizer.
    pub fn new(optimizer: O) -> Self {
        Self {
            optimizer,
            max_iterations: 200,
            initial_step: 0.1,
            tolerance: 1e-6,
        }
    }

    /// Sets the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the initial step size (decays as 1/(1+t)).
    pub fn with_initial_step(mut self, initial_step: f64) -> Self {
        self.initial_step = initial_step;
        self
    }

    /// Sets the total-loss threshold below which learning stops.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl<O: trackgraph_core::Optimizer> Learner for SubgradientLearner<O> {
    fn learn(
        &self,
        dataset: &[TrainingInstance<'_>],
        initial: WeightVector,
        params: &LearnerParams,
    ) -> SolveResult<WeightVector> {
        let num_weights = initial.len();
        let mut weights = initial.into_vec();

        for iteration in 0..self.max_iterations {
            let step = self.initial_step / (1.0 + iteration as f64);
            let mut gradient: Vec<f64> = weights
                .iter()
                .map(|w| params.regularization * w)
                .collect();
            let mut total_loss = 0.0;

            for instance in dataset {
                let augmented = loss_augmented(instance);
                let current = WeightVector::from_vec(weights.clone());
                let inference =
                    self.optimizer
                        .infer(&augmented, &current, &params.optimizer)?;

                // hinge: ground truth must beat the augmented argmin
                let truth_energy = instance
                    .graph
                    .unary_energy(&instance.ground_truth, &current);
                let loss = (truth_energy - inference.objective).max(0.0);
                total_loss += loss;

                if loss > 0.0 {
                    let truth_phi = instance
                        .graph
                        .feature_map(&instance.ground_truth, num_weights)?;
                    let argmin_phi = instance
                        .graph
                        .feature_map(&inference.labeling, num_weights)?;
                    for ((g, t), a) in gradient.iter_mut().zip(&truth_phi).zip(&argmin_phi) {
                        *g += t - a;
                    }
                }
            }

            for (weight, g) in weights.iter_mut().zip(&gradient) {
                *weight -= step * g;
                if params.non_negative_weights && *weight < 0.0 {
                    *weight = 0.0;
                }
            }

            tracing::debug!(iteration, loss = total_loss, "subgradient step");
            if total_loss <= self.tolerance {
                break;
            }
        }

        Ok(WeightVector::from_vec(weights))
    }
}

/// Clones the instance graph and adds the Hamming-loss bonuses: every
/// state deviating from the ground truth gets a constant -1 energy, so
/// the inner argmin solves `min_y E(y; w) - delta(y, gt)`.
fn loss_augmented(instance: &TrainingInstance<'_>) -> trackgraph_core::FactorGraph {
    let mut augmented = instance.graph.clone();
    for var in 0..augmented.num_variables() {
        let truth_state = instance.ground_truth[var];
        let bonuses: Vec<f64> = (0..augmented.num_states(var))
            .map(|state| if state == truth_state { 0.0 } else { -1.0 })
            .collect();
        augmented
            .add_unary(var, UnaryEnergy::constant(bonuses))
            .expect("states of the cloned graph are unchanged");
    }
    augmented
}
