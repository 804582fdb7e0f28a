//! Sentence-granularity parallel dispatch.
//!
//! Inference is embarrassingly parallel across sentences: each sentence gets
//! an independent engine instance on a worker from a fixed-size pool, and a
//! failure on one sentence is captured in its slot of the result vector
//! rather than aborting the batch.
//!
//! ## Feature gating
//!
//! The thread pool is behind the `parallel` feature flag. When disabled,
//! sentences are processed sequentially with the same per-sentence error
//! isolation.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::algebra::Semiring;
use crate::engine::beliefs::Beliefs;
use crate::engine::errors::InferenceError;
use crate::engine::inference::{InferenceConfig, SecondOrderInferencer};
use crate::model::{DepFactorGraph, RootStyle};

/// Configuration for batch dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of worker threads in the pool.
    pub num_workers: usize,
    /// Root style applied to every sentence in the batch.
    pub root_style: RootStyle,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            #[cfg(feature = "parallel")]
            num_workers: num_cpus::get(),
            #[cfg(not(feature = "parallel"))]
            num_workers: 1,
            root_style: RootStyle::default(),
        }
    }
}

impl BatchConfig {
    fn validate(self) -> Result<Self, InferenceError> {
        if self.num_workers == 0 {
            return Err(InferenceError::Internal(
                "run_batch: num_workers must be > 0".into(),
            ));
        }
        Ok(self)
    }
}

fn infer_one<S: Semiring>(
    index: usize,
    model: &DepFactorGraph<S>,
    config: InferenceConfig,
) -> Result<Beliefs<S>, InferenceError> {
    let mut engine = SecondOrderInferencer::new(config);
    match engine.forward(model) {
        Ok(beliefs) => Ok(beliefs.clone()),
        Err(error) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(sentence = index, %error, "inference failed; sentence skipped");
            #[cfg(not(feature = "tracing"))]
            let _ = index;
            Err(error)
        }
    }
}

/// Runs forward inference over a batch of sentences on a fixed-size pool.
///
/// Returns one result per sentence, in order. The outer `Result` covers
/// configuration problems only; per-sentence failures land in the inner
/// slots.
#[cfg(feature = "parallel")]
pub fn run_batch<S>(
    models: &[DepFactorGraph<S>],
    config: &BatchConfig,
) -> Result<Vec<Result<Beliefs<S>, InferenceError>>, InferenceError>
where
    S: Semiring + Send + Sync,
{
    let config = config.validate()?;
    let inference = InferenceConfig { root_style: config.root_style };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_workers)
        .build()
        .map_err(|e| InferenceError::Internal(format!("run_batch: pool setup failed: {e}")))?;

    Ok(pool.install(|| {
        models
            .par_iter()
            .enumerate()
            .map(|(index, model)| infer_one(index, model, inference))
            .collect()
    }))
}

/// Sequential fallback used when the `parallel` feature is disabled.
#[cfg(not(feature = "parallel"))]
pub fn run_batch<S>(
    models: &[DepFactorGraph<S>],
    config: &BatchConfig,
) -> Result<Vec<Result<Beliefs<S>, InferenceError>>, InferenceError>
where
    S: Semiring,
{
    let config = config.validate()?;
    let inference = InferenceConfig { root_style: config.root_style };
    Ok(models
        .iter()
        .enumerate()
        .map(|(index, model)| infer_one(index, model, inference))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Real;
    use crate::model::{DepFactor, EdgeKey};

    fn unit_model(n: usize) -> DepFactorGraph<Real> {
        DepFactorGraph::from_factors(n, vec![DepFactor::ProjectiveTree]).expect("valid factors")
    }

    #[test]
    fn batch_preserves_order_and_isolates_failures() {
        // middle sentence is infeasible: its only edge has zero potential
        let poisoned = DepFactorGraph::from_factors(
            1,
            vec![
                DepFactor::ProjectiveTree,
                DepFactor::Edge { key: EdgeKey::new(-1, 0), potential: Real(0.0) },
            ],
        )
        .expect("valid factors");
        let models = vec![unit_model(2), poisoned, unit_model(3)];

        let config = BatchConfig { num_workers: 2, ..BatchConfig::default() };
        let results = run_batch(&models, &config).expect("batch config");

        assert_eq!(results.len(), 3);
        assert!((results[0].as_ref().expect("first").partition().to_real() - 2.0).abs() < 1e-12);
        assert!(matches!(results[1], Err(InferenceError::Infeasible(_))));
        assert!((results[2].as_ref().expect("third").partition().to_real() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn zero_workers_is_a_configuration_error() {
        let config = BatchConfig { num_workers: 0, ..BatchConfig::default() };
        assert!(matches!(
            run_batch::<Real>(&[], &config),
            Err(InferenceError::Internal(_))
        ));
    }
}
