//! Inference orchestration and the per-call state machine.
//!
//! One [`SecondOrderInferencer`] owns the chart, beliefs, and output
//! adjoints of a single sentence at a time. A call proceeds
//! `forward -> [seed adjoints] -> backward -> zero_output_adj`; running
//! `forward` again discards the previous chart, and `backward` without a
//! live chart is a programmer error reported as
//! [`InferenceError::Internal`].

use crate::algebra::{Ring, Semiring};
use crate::engine::beliefs::{self, Beliefs, OutputAdjoints};
use crate::engine::errors::InferenceError;
use crate::engine::hypergraph::ParseHypergraph;
use crate::engine::inside_outside::{self, ChartValues};
use crate::engine::scores::{self, ScoreTensor};
use crate::model::{DepFactorGraph, RootStyle};

/// Configuration of an inference engine instance.
///
/// The root style is fixed for the lifetime of the instance, matching the
/// deployment where it is fixed for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InferenceConfig {
    /// How the wall root may attach to the sentence.
    pub root_style: RootStyle,
}

/// Chart statistics of the most recent `forward()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceDiagnostics {
    /// Number of hypernodes in the chart.
    pub hypernode_count: usize,
    /// Number of hyperedges in the chart.
    pub hyperedge_count: usize,
    /// Partition function, as a real number.
    pub partition: f64,
}

struct ForwardState<S> {
    graph: ParseHypergraph,
    scores: ScoreTensor<S>,
    chart: ChartValues<S>,
    beliefs: Beliefs<S>,
    factor_count: usize,
}

/// Exact marginal inference for one sentence at a time.
///
/// Stateless between sentences apart from its configuration; two instances
/// may run concurrently on different sentences with no shared data.
pub struct SecondOrderInferencer<S: Semiring> {
    config: InferenceConfig,
    state: Option<ForwardState<S>>,
    output_adjoints: Option<OutputAdjoints<S>>,
}

impl<S: Semiring> SecondOrderInferencer<S> {
    /// Creates an engine with the given configuration.
    pub fn new(config: InferenceConfig) -> Self {
        SecondOrderInferencer { config, state: None, output_adjoints: None }
    }

    /// Gathers the model's factors, runs the dynamic program, and extracts
    /// beliefs.
    ///
    /// Discards any previous chart. The model must stay unchanged between
    /// this call and a subsequent [`backward`](Self::backward).
    pub fn forward(&mut self, model: &DepFactorGraph<S>) -> Result<&Beliefs<S>, InferenceError> {
        self.state = None;

        let scores = ScoreTensor::build(model)?;
        let graph = ParseHypergraph::build(model.len(), self.config.root_style);
        let chart = inside_outside::forward(&graph, &scores)?;
        let beliefs = beliefs::extract(&graph, &chart, model);
        let factor_count = model.grandparent_factors().len();

        // adjoints survive re-runs on same-shaped sentences, but a new shape
        // invalidates them
        if let Some(adjoints) = &self.output_adjoints {
            if adjoints.shape() != (model.len(), factor_count) {
                self.output_adjoints = None;
            }
        }

        let state = ForwardState { graph, scores, chart, beliefs, factor_count };
        Ok(&self.state.insert(state).beliefs)
    }

    /// Alias for [`forward`](Self::forward).
    pub fn run(&mut self, model: &DepFactorGraph<S>) -> Result<&Beliefs<S>, InferenceError> {
        self.forward(model)
    }

    /// Beliefs of the most recent `forward()`, if one has run.
    pub fn beliefs(&self) -> Option<&Beliefs<S>> {
        self.state.as_ref().map(|s| &s.beliefs)
    }

    /// Partition value of the most recent `forward()`.
    pub fn partition_belief(&self) -> Option<S> {
        self.state.as_ref().map(|s| s.chart.partition)
    }

    /// Chart statistics of the most recent `forward()`.
    pub fn diagnostics(&self) -> Option<InferenceDiagnostics> {
        self.state.as_ref().map(|s| InferenceDiagnostics {
            hypernode_count: s.graph.nodes().len(),
            hyperedge_count: s.graph.edges().len(),
            partition: s.chart.partition.to_real(),
        })
    }

    /// The output-adjoint container for seeding gradients.
    ///
    /// Allocated lazily on first request, shaped after the most recent
    /// `forward()`; requesting it before any forward is a programmer error.
    pub fn output_adjoints_mut(&mut self) -> Result<&mut OutputAdjoints<S>, InferenceError> {
        let state = self.state.as_ref().ok_or_else(|| {
            InferenceError::Internal("output adjoints requested before forward()".into())
        })?;
        let (n, factor_count) = (state.graph.len(), state.factor_count);
        Ok(self
            .output_adjoints
            .get_or_insert_with(|| OutputAdjoints::zeros(n, factor_count)))
    }

    /// Resets all seeded output adjoints without discarding the chart.
    pub fn zero_output_adj(&mut self) {
        if let Some(adjoints) = self.output_adjoints.as_mut() {
            adjoints.zero_all();
        }
    }
}

impl<S: Ring> SecondOrderInferencer<S> {
    /// Propagates the seeded output adjoints back into the model's adjoint
    /// storage.
    ///
    /// Requires the chart of a prior [`forward`](Self::forward) over the
    /// same model. With no adjoints seeded this is a no-op.
    pub fn backward(&mut self, model: &mut DepFactorGraph<S>) -> Result<(), InferenceError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| InferenceError::Internal("backward() before forward()".into()))?;
        if model.len() != state.graph.len()
            || model.grandparent_factors().len() != state.factor_count
        {
            return Err(InferenceError::Internal(
                "backward() model does not match the forward() chart".into(),
            ));
        }
        let Some(adjoints) = self.output_adjoints.as_ref() else {
            return Ok(());
        };

        let (marginal_adj, partition_adj) = beliefs::backward(&state.graph, model, adjoints);
        let mut scores_adj = ScoreTensor::zeros(state.graph.len());
        inside_outside::backward(
            &state.graph,
            &state.scores,
            &state.chart,
            &marginal_adj,
            partition_adj,
            &mut scores_adj,
        );
        scores::scatter_adjoints(&scores_adj, model);
        Ok(())
    }
}
