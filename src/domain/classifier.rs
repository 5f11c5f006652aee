//! Classifier Adapter.
//!
//! Wraps a pre-trained three-class model (SELL = 0, HOLD = 1, BUY = 2). The
//! active model lives in an [`ArcSwapOption`]: predictions load a snapshot,
//! retraining publishes a replacement, and a model is never mutated in place.
//!
//! Whenever the model is missing, an input feature is missing, or the model
//! fails, [`ClassifierAdapter::predict`] returns [`Prediction::fallback`]
//! (HOLD at 0.5, tagged [`PredictionMethod::Fallback`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::error::FusetraderError;
use crate::domain::features::{Feature, FeatureVector};
use crate::domain::signal::Signal;
use crate::ports::model_port::ModelStore;

pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// A trained classifier over a fixed, ordered feature list.
pub trait Model: Send + Sync {
    fn features(&self) -> &[Feature];

    /// Class probabilities in SELL, HOLD, BUY order for inputs laid out as
    /// [`Model::features`].
    fn predict_proba(&self, inputs: &[f64]) -> Result<[f64; 3], FusetraderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMethod {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub signal: Signal,
    /// Top-class probability in [0, 1].
    pub confidence: f64,
    pub probabilities: Option<[f64; 3]>,
    pub method: PredictionMethod,
}

impl Prediction {
    pub fn fallback() -> Self {
        Self {
            signal: Signal::Hold,
            confidence: FALLBACK_CONFIDENCE,
            probabilities: None,
            method: PredictionMethod::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.method == PredictionMethod::Fallback
    }

    /// Picks the most probable class. Ties resolve to HOLD when HOLD is among
    /// the leaders, otherwise to the lower class index.
    pub fn from_probabilities(probabilities: [f64; 3]) -> Option<Self> {
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return None;
        }
        let best = probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let hold = Signal::Hold.class_index();
        let index = if probabilities[hold] == best {
            hold
        } else {
            probabilities.iter().position(|p| *p == best)?
        };
        Some(Self {
            signal: Signal::from_class_index(index)?,
            confidence: best,
            probabilities: Some(probabilities),
            method: PredictionMethod::Model,
        })
    }
}

struct LoadedModel {
    model: Box<dyn Model>,
    loaded_at: DateTime<Utc>,
}

pub struct ClassifierAdapter {
    current: ArcSwapOption<LoadedModel>,
    retraining: AtomicBool,
}

impl Default for ClassifierAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierAdapter {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            retraining: AtomicBool::new(false),
        }
    }

    pub fn with_model(model: Box<dyn Model>) -> Self {
        let adapter = Self::new();
        adapter.install(model);
        adapter
    }

    /// Atomically publishes `model`; in-flight predictions keep their snapshot.
    pub fn install(&self, model: Box<dyn Model>) {
        self.current.store(Some(Arc::new(LoadedModel {
            model,
            loaded_at: Utc::now(),
        })));
    }

    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.current.load_full().map(|m| m.loaded_at)
    }

    pub fn is_retraining(&self) -> bool {
        self.retraining.load(Ordering::Acquire)
    }

    /// Loads the initial model from `store`. Returns whether a model is active.
    pub fn load_from(&self, store: &dyn ModelStore) -> bool {
        match store.load_model() {
            Ok(Some(model)) => {
                self.install(model);
                info!("classifier model loaded");
                true
            }
            Ok(None) => {
                warn!("no classifier model available, predictions will fall back to HOLD");
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to load classifier model");
                false
            }
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let snapshot = self.current.load_full();
        let Some(loaded) = snapshot else {
            return Prediction::fallback();
        };

        let mut inputs = Vec::with_capacity(loaded.model.features().len());
        for feature in loaded.model.features() {
            match features.get(*feature) {
                Some(v) if v.is_finite() => inputs.push(v),
                _ => {
                    debug!(feature = %feature, "feature missing, classifier falls back");
                    return Prediction::fallback();
                }
            }
        }

        match loaded.model.predict_proba(&inputs) {
            Ok(probabilities) => {
                Prediction::from_probabilities(probabilities).unwrap_or_else(Prediction::fallback)
            }
            Err(e) => {
                warn!(error = %e, "classifier prediction failed");
                Prediction::fallback()
            }
        }
    }

    /// Retrains on a background thread and swaps the result in. Returns
    /// `None` when a retrain is already running or the thread could not start.
    pub fn spawn_retrain(self: &Arc<Self>, store: Arc<dyn ModelStore>) -> Option<JoinHandle<()>> {
        if self.retraining.swap(true, Ordering::AcqRel) {
            debug!("retrain already in progress");
            return None;
        }

        let adapter = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("classifier-retrain".to_string())
            .spawn(move || {
                let _guard = RetrainGuard(&adapter.retraining);
                info!("classifier retraining started");
                match store.retrain() {
                    Ok(Some(model)) => {
                        adapter.install(model);
                        info!("classifier retraining completed");
                    }
                    Ok(None) => warn!("classifier retraining produced no model"),
                    Err(e) => warn!(error = %e, "classifier retraining failed"),
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not start retraining thread");
                self.retraining.store(false, Ordering::Release);
                None
            }
        }
    }
}

/// Clears the retraining flag on drop, including when the store panics.
struct RetrainGuard<'a>(&'a AtomicBool);

impl Drop for RetrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// On-disk form of a [`SoftmaxModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxSpec {
    pub features: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    /// One row per class, SELL, HOLD, BUY.
    pub weights: Vec<Vec<f64>>,
    pub bias: [f64; 3],
}

/// Standardized linear model with a softmax over three classes.
#[derive(Debug, Clone)]
pub struct SoftmaxModel {
    features: Vec<Feature>,
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<Vec<f64>>,
    bias: [f64; 3],
}

impl SoftmaxModel {
    pub fn from_spec(spec: SoftmaxSpec) -> Result<Self, FusetraderError> {
        let invalid = |reason: String| FusetraderError::ModelInvalid { reason };

        let features = spec
            .features
            .iter()
            .map(|name| name.parse::<Feature>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        let n = features.len();
        if n == 0 {
            return Err(invalid("model has no features".to_string()));
        }
        if spec.means.len() != n || spec.scales.len() != n {
            return Err(invalid(format!(
                "expected {n} means and scales, got {} and {}",
                spec.means.len(),
                spec.scales.len()
            )));
        }
        if spec.weights.len() != 3 || spec.weights.iter().any(|row| row.len() != n) {
            return Err(invalid(format!("weights must be 3 rows of {n}")));
        }
        if spec.scales.iter().any(|s| *s == 0.0) {
            return Err(invalid("scales must be non-zero".to_string()));
        }
        let all_finite = spec
            .means
            .iter()
            .chain(&spec.scales)
            .chain(spec.weights.iter().flatten())
            .chain(&spec.bias)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(invalid("parameters must be finite".to_string()));
        }

        Ok(Self {
            features,
            means: spec.means,
            scales: spec.scales,
            weights: spec.weights,
            bias: spec.bias,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, FusetraderError> {
        let spec: SoftmaxSpec =
            serde_json::from_str(json).map_err(|e| FusetraderError::ModelInvalid {
                reason: e.to_string(),
            })?;
        Self::from_spec(spec)
    }
}

impl Model for SoftmaxModel {
    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn predict_proba(&self, inputs: &[f64]) -> Result<[f64; 3], FusetraderError> {
        if inputs.len() != self.features.len() {
            return Err(FusetraderError::ModelInvalid {
                reason: format!(
                    "expected {} inputs, got {}",
                    self.features.len(),
                    inputs.len()
                ),
            });
        }

        let scaled: Vec<f64> = inputs
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect();

        let mut logits = self.bias;
        for (logit, row) in logits.iter_mut().zip(&self.weights) {
            *logit += row.iter().zip(&scaled).map(|(w, x)| w * x).sum::<f64>();
        }

        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp = logits.map(|l| (l - max).exp());
        let total: f64 = exp.iter().sum();
        Ok(exp.map(|e| e / total))
    }
}
