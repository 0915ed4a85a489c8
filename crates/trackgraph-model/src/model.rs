//! Model orchestration: weight layout, materialization, inference,
//! learning and verification.
//!
//! [`TrackingModel`] is the assembly stage: hypotheses, links,
//! divisions and exclusions are added, the weight layout is computed.
//! [`TrackingModel::build`] consumes the assembly and produces a
//! [`BuiltModel`] whose hypothesis graph is frozen, so re-initialization
//! is not expressible.

use std::collections::BTreeMap;
use std::fmt;

use trackgraph_config::Settings;
use trackgraph_core::{
    FactorGraph, Labeling, Learner, LearnerParams, Optimizer, OptimizerParams, Relaxation,
    TrainingInstance, WeightVector,
};

use crate::division::DivisionHypothesis;
use crate::error::{ModelError, ModelResult};
use crate::exclusion::ExclusionConstraint;
use crate::linking::LinkingHypothesis;
use crate::segmentation::SegmentationHypothesis;
use crate::variable::Variable;
use crate::{DivisionKey, HypothesisId, LinkKey};

/// The kinds of learnable variables, in weight-layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightKind {
    Link,
    Detection,
    Division,
    Appearance,
    Disappearance,
    ExternalDivision,
}

impl WeightKind {
    /// All kinds in the order their weight blocks are laid out.
    pub const LAYOUT_ORDER: [WeightKind; 6] = [
        WeightKind::Link,
        WeightKind::Detection,
        WeightKind::Division,
        WeightKind::Appearance,
        WeightKind::Disappearance,
        WeightKind::ExternalDivision,
    ];

    /// Human-readable label of this kind.
    pub const fn label(self) -> &'static str {
        match self {
            WeightKind::Link => "Link",
            WeightKind::Detection => "Detection",
            WeightKind::Division => "Division",
            WeightKind::Appearance => "Appearance",
            WeightKind::Disappearance => "Disappearance",
            WeightKind::ExternalDivision => "External Division",
        }
    }
}

impl fmt::Display for WeightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of weights each variable kind contributes to the flat weight
/// vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeightCounts {
    pub link: usize,
    pub detection: usize,
    pub division: usize,
    pub appearance: usize,
    pub disappearance: usize,
    pub external_division: usize,
}

impl WeightCounts {
    /// Count for one kind.
    pub fn get(&self, kind: WeightKind) -> usize {
        match kind {
            WeightKind::Link => self.link,
            WeightKind::Detection => self.detection,
            WeightKind::Division => self.division,
            WeightKind::Appearance => self.appearance,
            WeightKind::Disappearance => self.disappearance,
            WeightKind::ExternalDivision => self.external_division,
        }
    }

    /// Total length of the weight vector.
    pub fn total(&self) -> usize {
        WeightKind::LAYOUT_ORDER
            .iter()
            .map(|&kind| self.get(kind))
            .sum()
    }

    /// Start offset of one kind's block in the flat vector.
    pub fn offset(&self, kind: WeightKind) -> usize {
        WeightKind::LAYOUT_ORDER
            .iter()
            .take_while(|&&k| k != kind)
            .map(|&k| self.get(k))
            .sum()
    }

    /// The contiguous weight ids of one kind's block.
    pub fn ids(&self, kind: WeightKind) -> Vec<usize> {
        let offset = self.offset(kind);
        (offset..offset + self.get(kind)).collect()
    }
}

/// Supplies the ground-truth labeling for learning.
///
/// Implemented by format-specific frontends (or plain closures); called
/// only on a built model, so all variable ids are available.
pub trait GroundTruthProvider {
    fn ground_truth(&self, model: &BuiltModel) -> ModelResult<Labeling>;
}

impl<F> GroundTruthProvider for F
where
    F: Fn(&BuiltModel) -> ModelResult<Labeling>,
{
    fn ground_truth(&self, model: &BuiltModel) -> ModelResult<Labeling> {
        self(model)
    }
}

/// The hypothesis graph under assembly.
#[derive(Debug, Clone)]
pub struct TrackingModel {
    settings: Settings,
    hypotheses: BTreeMap<HypothesisId, SegmentationHypothesis>,
    links: BTreeMap<LinkKey, LinkingHypothesis>,
    divisions: BTreeMap<DivisionKey, DivisionHypothesis>,
    exclusions: Vec<ExclusionConstraint>,
    weight_counts: Option<WeightCounts>,
}

impl TrackingModel {
    /// Creates an empty model with the given settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            hypotheses: BTreeMap::new(),
            links: BTreeMap::new(),
            divisions: BTreeMap::new(),
            exclusions: Vec::new(),
            weight_counts: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn num_hypotheses(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_divisions(&self) -> usize {
        self.divisions.len()
    }

    /// Adds a segmentation hypothesis. Ids must be unique.
    pub fn add_hypothesis(&mut self, hypothesis: SegmentationHypothesis) -> ModelResult<()> {
        if self.hypotheses.contains_key(&hypothesis.id()) {
            return Err(ModelError::DuplicateHypothesis(hypothesis.id()));
        }
        self.weight_counts = None;
        self.hypotheses.insert(hypothesis.id(), hypothesis);
        Ok(())
    }

    /// Adds a linking hypothesis and registers it with both endpoints.
    pub fn add_link(&mut self, link: LinkingHypothesis) -> ModelResult<()> {
        if self.links.contains_key(&link.key()) {
            return Err(ModelError::DuplicateLink {
                src: link.src(),
                dest: link.dest(),
            });
        }
        link.register(&mut self.hypotheses)?;
        self.weight_counts = None;
        self.links.insert(link.key(), link);
        Ok(())
    }

    /// Adds a standalone division hypothesis and registers it with the
    /// parent and both children.
    pub fn add_division(&mut self, division: DivisionHypothesis) -> ModelResult<()> {
        if self.divisions.contains_key(&division.key()) {
            return Err(ModelError::DuplicateDivision {
                parent: division.parent(),
            });
        }
        division.register(&mut self.hypotheses)?;
        self.weight_counts = None;
        self.divisions.insert(division.key(), division);
        Ok(())
    }

    /// Adds a mutual-exclusion set. All members must exist.
    pub fn add_exclusion(&mut self, exclusion: ExclusionConstraint) -> ModelResult<()> {
        for id in exclusion.ids() {
            if !self.hypotheses.contains_key(id) {
                return Err(ModelError::DanglingReference { missing: *id });
            }
        }
        self.exclusions.push(exclusion);
        Ok(())
    }

    pub fn hypothesis(&self, id: HypothesisId) -> Option<&SegmentationHypothesis> {
        self.hypotheses.get(&id)
    }

    /// Computes (and memoizes) the per-kind weight counts.
    ///
    /// Every instance of a kind that reports features must need the
    /// same number of weights; instances without the kind are skipped.
    /// Inline and standalone divisions are mutually exclusive.
    pub fn compute_weight_counts(&mut self) -> ModelResult<WeightCounts> {
        if let Some(counts) = self.weight_counts {
            return Ok(counts);
        }

        let shared = self.settings.states_share_weights;
        let mut detection = None;
        let mut division = None;
        let mut appearance = None;
        let mut disappearance = None;
        let mut external_division = None;
        let mut link = None;

        let merge = |kind: WeightKind,
                         current: &mut Option<usize>,
                         variable: &Variable|
         -> ModelResult<()> {
            let Some(count) = variable.num_weights(shared)? else {
                return Ok(());
            };
            match current {
                Some(expected) if *expected != count => Err(ModelError::WeightCountMismatch {
                    kind,
                    expected: *expected,
                    got: count,
                }),
                Some(_) => Ok(()),
                None => {
                    *current = Some(count);
                    Ok(())
                }
            }
        };

        for hypothesis in self.hypotheses.values() {
            merge(WeightKind::Detection, &mut detection, hypothesis.detection())?;
            merge(WeightKind::Division, &mut division, hypothesis.division())?;
            merge(WeightKind::Appearance, &mut appearance, hypothesis.appearance())?;
            merge(
                WeightKind::Disappearance,
                &mut disappearance,
                hypothesis.disappearance(),
            )?;
        }
        for standalone in self.divisions.values() {
            merge(
                WeightKind::ExternalDivision,
                &mut external_division,
                standalone.variable(),
            )?;
        }
        for linking in self.links.values() {
            merge(WeightKind::Link, &mut link, linking.variable())?;
        }

        let counts = WeightCounts {
            link: link.unwrap_or(0),
            detection: detection.unwrap_or(0),
            division: division.unwrap_or(0),
            appearance: appearance.unwrap_or(0),
            disappearance: disappearance.unwrap_or(0),
            external_division: external_division.unwrap_or(0),
        };

        if counts.division != 0 && counts.external_division != 0 {
            return Err(ModelError::MixedDivisionKinds);
        }

        self.weight_counts = Some(counts);
        Ok(counts)
    }

    /// Total number of learnable weights.
    pub fn num_weights(&mut self) -> ModelResult<usize> {
        Ok(self.compute_weight_counts()?.total())
    }

    /// One human-readable label per weight slot, in layout order.
    pub fn weight_descriptions(&mut self) -> ModelResult<Vec<String>> {
        let counts = self.compute_weight_counts()?;
        let mut descriptions = Vec::with_capacity(counts.total());
        for kind in WeightKind::LAYOUT_ORDER {
            for feature in 0..counts.get(kind) {
                descriptions.push(format!("{} - feature {}", kind.label(), feature));
            }
        }
        Ok(descriptions)
    }

    /// Materializes the full constraint graph, consuming the assembly.
    ///
    /// Component order is fixed: links first (segmentations reference
    /// their variable ids when emitting flow constraints), then
    /// standalone divisions, then segmentations, then exclusions.
    pub fn build(mut self, weights: &[f64]) -> ModelResult<BuiltModel> {
        let counts = self.compute_weight_counts()?;
        if weights.len() != counts.total() {
            return Err(ModelError::WeightVectorLength {
                expected: counts.total(),
                got: weights.len(),
            });
        }

        let TrackingModel {
            settings,
            mut hypotheses,
            mut links,
            mut divisions,
            exclusions,
            ..
        } = self;

        let shared = settings.states_share_weights;
        let link_ids = counts.ids(WeightKind::Link);
        let detection_ids = counts.ids(WeightKind::Detection);
        let division_ids = counts.ids(WeightKind::Division);
        let appearance_ids = counts.ids(WeightKind::Appearance);
        let disappearance_ids = counts.ids(WeightKind::Disappearance);
        let external_division_ids = counts.ids(WeightKind::ExternalDivision);

        let mut graph = FactorGraph::new();
        tracing::info!(num_weights = counts.total(), "initializing factor graph");

        for link in links.values_mut() {
            link.add_to_graph(&mut graph, shared, &link_ids)?;
        }
        for division in divisions.values_mut() {
            division.add_to_graph(&mut graph, shared, &external_division_ids)?;
        }
        for hypothesis in hypotheses.values_mut() {
            hypothesis.add_to_graph(
                &mut graph,
                &settings,
                &links,
                &divisions,
                &detection_ids,
                &division_ids,
                &appearance_ids,
                &disappearance_ids,
            )?;
        }
        for exclusion in &exclusions {
            exclusion.add_to_graph(&mut graph, &hypotheses)?;
        }

        tracing::info!(
            num_variables = graph.num_variables(),
            num_indicator_variables = graph.num_indicator_variables(),
            num_constraints = graph.constraints().len(),
            "factor graph built"
        );

        Ok(BuiltModel {
            settings,
            graph,
            weights: WeightVector::from_vec(weights.to_vec()),
            hypotheses,
            links,
            divisions,
            exclusions,
            counts,
            last_objective: None,
        })
    }
}

/// A materialized model: frozen hypothesis graph plus the factor graph
/// compiled from it.
#[derive(Debug, Clone)]
pub struct BuiltModel {
    settings: Settings,
    graph: FactorGraph,
    weights: WeightVector,
    hypotheses: BTreeMap<HypothesisId, SegmentationHypothesis>,
    links: BTreeMap<LinkKey, LinkingHypothesis>,
    divisions: BTreeMap<DivisionKey, DivisionHypothesis>,
    exclusions: Vec<ExclusionConstraint>,
    counts: WeightCounts,
    last_objective: Option<f64>,
}

impl BuiltModel {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn weight_counts(&self) -> WeightCounts {
        self.counts
    }

    pub fn hypothesis(&self, id: HypothesisId) -> Option<&SegmentationHypothesis> {
        self.hypotheses.get(&id)
    }

    pub fn hypotheses(&self) -> impl Iterator<Item = &SegmentationHypothesis> {
        self.hypotheses.values()
    }

    pub fn link(&self, key: LinkKey) -> Option<&LinkingHypothesis> {
        self.links.get(&key)
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkingHypothesis> {
        self.links.values()
    }

    pub fn division(&self, key: DivisionKey) -> Option<&DivisionHypothesis> {
        self.divisions.get(&key)
    }

    pub fn divisions(&self) -> impl Iterator<Item = &DivisionHypothesis> {
        self.divisions.values()
    }

    pub fn exclusions(&self) -> &[ExclusionConstraint] {
        &self.exclusions
    }

    /// Optimizer parameters derived from the settings.
    pub fn optimizer_params(&self) -> OptimizerParams {
        OptimizerParams {
            relaxation: Relaxation::TightPolytope,
            integer_constraints: true,
            ep_gap: self.settings.optimizer_ep_gap,
            verbose: self.settings.optimizer_verbose,
            num_threads: self.settings.optimizer_num_threads,
        }
    }

    /// Learner parameters derived from the settings.
    pub fn learner_params(&self) -> LearnerParams {
        LearnerParams {
            optimizer: self.optimizer_params(),
            regularization: 1.0,
            non_negative_weights: self.settings.non_negative_weights_only,
        }
    }

    /// Finds the minimum-energy labeling and records its objective.
    pub fn infer<O: Optimizer>(&mut self, optimizer: &O) -> ModelResult<Labeling> {
        let params = self.optimizer_params();
        let inference = optimizer.infer(&self.graph, &self.weights, &params)?;
        tracing::info!(objective = inference.objective, "inference finished");
        self.last_objective = Some(inference.objective);
        Ok(inference.labeling)
    }

    /// Objective of the most recent `infer` call.
    pub fn last_objective(&self) -> Option<f64> {
        self.last_objective
    }

    /// Learns a weight vector from this model and its ground truth.
    ///
    /// `initial` defaults to all zeros; its length must match the
    /// model's weight count.
    pub fn learn<L, G>(
        &self,
        learner: &L,
        provider: &G,
        initial: Option<&[f64]>,
    ) -> ModelResult<Vec<f64>>
    where
        L: Learner,
        G: GroundTruthProvider,
    {
        let num_weights = self.counts.total();
        let initial = match initial {
            Some(values) => {
                if values.len() != num_weights {
                    return Err(ModelError::WeightVectorLength {
                        expected: num_weights,
                        got: values.len(),
                    });
                }
                WeightVector::from_vec(values.to_vec())
            }
            None => WeightVector::zeros(num_weights),
        };

        let ground_truth = provider.ground_truth(self)?;
        let dataset = [TrainingInstance {
            graph: &self.graph,
            ground_truth,
        }];

        tracing::info!(num_weights, "starting structured learning");
        let learned = learner.learn(&dataset, initial, &self.learner_params())?;
        Ok(learned.into_vec())
    }

    /// Checks every exclusion and segmentation invariant against a
    /// labeling. All violations are reported before the verdict.
    pub fn verify_solution(&self, solution: &Labeling) -> ModelResult<bool> {
        self.check_labeling(solution)?;
        let mut valid = true;

        for exclusion in &self.exclusions {
            if !exclusion.verify_solution(solution, &self.hypotheses)? {
                valid = false;
            }
        }

        for hypothesis in self.hypotheses.values() {
            if !hypothesis.verify_solution(solution, &self.settings, &self.links, &self.divisions)?
            {
                valid = false;
            }
        }

        Ok(valid)
    }

    /// Energy of a labeling under the model's weights.
    pub fn evaluate_solution(&self, solution: &Labeling) -> ModelResult<f64> {
        Ok(self.graph.evaluate(solution, &self.weights)?)
    }

    /// Fills in appearance/disappearance states implied by a partial
    /// labeling: every active detection without active incoming
    /// transitions must appear, and symmetrically must disappear
    /// without active outgoing transitions.
    pub fn deduce_appearance_disappearance(&self, solution: &mut Labeling) -> ModelResult<()> {
        self.check_labeling(solution)?;
        for hypothesis in self.hypotheses.values() {
            let detection = hypothesis
                .detection()
                .graph_id()
                .ok_or(ModelError::NotMaterialized(hypothesis.id()))?;
            let detection_value = solution[detection];
            if detection_value == 0 {
                continue;
            }

            if hypothesis.active_incoming(solution, &self.links, &self.divisions)? == 0 {
                match hypothesis.appearance().graph_id() {
                    Some(appearance) => solution[appearance] = detection_value,
                    None => {
                        return Err(ModelError::MissingAppearanceFeatures(hypothesis.id()));
                    }
                }
            }

            if hypothesis.active_outgoing(solution, &self.links, &self.divisions)? == 0 {
                match hypothesis.disappearance().graph_id() {
                    Some(disappearance) => solution[disappearance] = detection_value,
                    None => {
                        return Err(ModelError::MissingDisappearanceFeatures(hypothesis.id()));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_labeling(&self, solution: &Labeling) -> ModelResult<()> {
        if solution.len() != self.graph.num_variables() {
            return Err(trackgraph_core::GraphError::LabelingLengthMismatch {
                expected: self.graph.num_variables(),
                got: solution.len(),
            }
            .into());
        }
        Ok(())
    }
}
