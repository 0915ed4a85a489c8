//! Exact minimum-energy search over a factor graph.

use trackgraph_core::{
    FactorGraph, Inference, Labeling, LinearConstraint, Optimizer, OptimizerParams, SolveError,
    SolveResult, WeightVector,
};

/// Depth-first enumeration of the label space with constraint pruning
/// and an admissible min-remaining-energy bound.
///
/// Every constraint is checked as soon as its last referenced variable
/// is assigned, so infeasible branches are cut early. The search is
/// exact: `ep_gap` is effectively zero and `num_threads` is ignored.
#[derive(Debug, Clone, Default)]
pub struct ExhaustiveOptimizer;

impl ExhaustiveOptimizer {
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for ExhaustiveOptimizer {
    fn infer(
        &self,
        graph: &FactorGraph,
        weights: &WeightVector,
        params: &OptimizerParams,
    ) -> SolveResult<Inference> {
        let num_variables = graph.num_variables();

        // per-variable state energies, all unaries summed in
        let mut energies: Vec<Vec<f64>> = (0..num_variables)
            .map(|var| vec![0.0; graph.num_states(var)])
            .collect();
        for (var, unary) in graph.unaries() {
            for (state, energy) in energies[*var].iter_mut().enumerate() {
                *energy += unary.value(state, weights);
            }
        }

        // admissible bound: cheapest completion of the remaining suffix
        let mut min_tail = vec![0.0; num_variables + 1];
        for var in (0..num_variables).rev() {
            let min_state = energies[var]
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min);
            min_tail[var] = min_tail[var + 1] + min_state;
        }

        // constraints become checkable once their last variable is set
        let mut checkable_at: Vec<Vec<&LinearConstraint>> = vec![Vec::new(); num_variables];
        for constraint in graph.constraints() {
            match constraint.max_variable() {
                Some(var) => checkable_at[var].push(constraint),
                None => {
                    // no terms: the bound must hold on its own
                    if !constraint.holds(&vec![]) {
                        return Err(SolveError::Infeasible);
                    }
                }
            }
        }

        let mut search = Search {
            energies: &energies,
            min_tail: &min_tail,
            checkable_at: &checkable_at,
            best: None,
            partial: vec![0; num_variables],
            verbose: params.verbose,
        };
        search.descend(0, 0.0);

        let (labeling, objective) = search.best.ok_or(SolveError::Infeasible)?;
        Ok(Inference {
            labeling,
            objective,
        })
    }
}

struct Search<'a> {
    energies: &'a [Vec<f64>],
    min_tail: &'a [f64],
    checkable_at: &'a [Vec<&'a LinearConstraint>],
    best: Option<(Labeling, f64)>,
    partial: Labeling,
    verbose: bool,
}

impl Search<'_> {
    fn descend(&mut self, depth: usize, cost: f64) {
        if depth == self.energies.len() {
            let improved = self
                .best
                .as_ref()
                .map(|(_, best)| cost < *best)
                .unwrap_or(true);
            if improved {
                if self.verbose {
                    tracing::debug!(objective = cost, "improved labeling");
                }
                self.best = Some((self.partial.clone(), cost));
            }
            return;
        }

        for state in 0..self.energies[depth].len() {
            let next_cost = cost + self.energies[depth][state];
            if let Some((_, best)) = &self.best {
                if next_cost + self.min_tail[depth + 1] >= *best {
                    continue;
                }
            }

            self.partial[depth] = state;
            if self.checkable_at[depth]
                .iter()
                .all(|constraint| constraint.holds(&self.partial))
            {
                self.descend(depth + 1, next_cost);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackgraph_core::{LinearConstraint, Relation, UnaryEnergy};

    fn params() -> OptimizerParams {
        OptimizerParams {
            verbose: false,
            ..OptimizerParams::default()
        }
    }

    #[test]
    fn picks_the_cheapest_states() {
        let mut graph = FactorGraph::new();
        let a = graph.add_variable(2);
        let b = graph.add_variable(3);
        graph
            .add_unary(a, UnaryEnergy::constant(vec![0.0, -2.0]))
            .unwrap();
        graph
            .add_unary(b, UnaryEnergy::constant(vec![1.0, 0.5, 3.0]))
            .unwrap();

        let result = ExhaustiveOptimizer::new()
            .infer(&graph, &WeightVector::zeros(0), &params())
            .unwrap();
        assert_eq!(result.labeling, vec![1, 1]);
        assert_eq!(result.objective, -1.5);
    }

    #[test]
    fn respects_hard_constraints() {
        let mut graph = FactorGraph::new();
        let a = graph.add_variable(2);
        let b = graph.add_variable(2);
        graph
            .add_unary(a, UnaryEnergy::constant(vec![0.0, -2.0]))
            .unwrap();
        graph
            .add_unary(b, UnaryEnergy::constant(vec![0.0, -1.0]))
            .unwrap();

        // at most one of the two may be active
        let mut c = LinearConstraint::new();
        c.add_indicator(a, 1, 1.0);
        c.add_indicator(b, 1, 1.0);
        c.set_bound(1.0);
        c.set_relation(Relation::LessEqual);
        graph.add_constraint(c).unwrap();

        let result = ExhaustiveOptimizer::new()
            .infer(&graph, &WeightVector::zeros(0), &params())
            .unwrap();
        assert_eq!(result.labeling, vec![1, 0]);
        assert_eq!(result.objective, -2.0);
    }

    #[test]
    fn infeasible_model_is_reported() {
        let mut graph = FactorGraph::new();
        let a = graph.add_variable(2);
        // a must be active and inactive at once
        let mut c = LinearConstraint::new();
        c.add_indicator(a, 0, 1.0);
        c.add_indicator(a, 1, 1.0);
        c.set_bound(2.0);
        c.set_relation(Relation::GreaterEqual);
        graph.add_constraint(c).unwrap();

        let result =
            ExhaustiveOptimizer::new().infer(&graph, &WeightVector::zeros(0), &params());
        assert!(matches!(result, Err(SolveError::Infeasible)));
    }

    #[test]
    fn matches_brute_force_on_a_learnable_graph() {
        let mut graph = FactorGraph::new();
        let features = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        for _ in 0..3 {
            let var = graph.add_variable(2);
            graph
                .add_unary(var, UnaryEnergy::shared(&features, &[0, 1]).unwrap())
                .unwrap();
        }
        let weights = WeightVector::from_vec(vec![0.3, -0.7]);

        // brute force over all 8 labelings
        let mut best = (vec![], f64::INFINITY);
        for bits in 0..8usize {
            let labeling: Labeling = (0..3).map(|i| (bits >> i) & 1).collect();
            let energy = graph.evaluate(&labeling, &weights).unwrap();
            if energy < best.1 {
                best = (labeling, energy);
            }
        }

        let result = ExhaustiveOptimizer::new()
            .infer(&graph, &weights, &params())
            .unwrap();
        assert_eq!(result.labeling, best.0);
        assert_eq!(result.objective, best.1);
    }
}
