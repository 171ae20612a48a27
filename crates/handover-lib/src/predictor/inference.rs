//! Classifier implementations
//!
//! `OnnxClassifier` scores candidate rows with a quantized ONNX model loaded
//! via tract-onnx. `HeuristicClassifier` is a dependency-free stand-in used
//! when no model is configured.

use super::{CellClassifier, CellDistribution, HandoverFeatures, NUM_FEATURES};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

/// Maximum inference latency before warning (5ms target)
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-backed classifier
///
/// The model maps one `[1, NUM_FEATURES]` candidate row to a single logit;
/// logits are softmaxed across candidates. Models are loaded once at startup.
pub struct OnnxClassifier {
    model: Arc<TractModel>,
    model_version: String,
}

impl OnnxClassifier {
    /// Create a classifier from model bytes
    pub fn new(model_bytes: &[u8], version: &str) -> Result<Self> {
        Ok(Self {
            model: Arc::new(Self::load_model(model_bytes)?),
            model_version: version.to_string(),
        })
    }

    /// Load a model file, optionally verifying its SHA-256 checksum
    pub fn from_file(path: &Path, expected_sha256: Option<&str>) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read model {:?}", path))?;
        if let Some(expected) = expected_sha256 {
            verify_checksum(&bytes, expected)?;
        }
        let version = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let classifier = Self::new(&bytes, &version)?;
        info!(path = %path.display(), version = %version, "Loaded handover model");
        Ok(classifier)
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8]) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    fn run_rows(model: &TractModel, rows: Vec<[f32; NUM_FEATURES]>) -> Result<Vec<f64>> {
        let mut logits = Vec::with_capacity(rows.len());
        for row in rows {
            let input: Tensor =
                tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), row.to_vec())?.into();
            let result = model.run(tvec!(input.into()))?;
            let output = result.first().context("No output from model")?;
            let view = output.to_array_view::<f32>()?;
            let logit = view.iter().next().copied().context("Empty model output")?;
            logits.push(logit as f64);
        }
        Ok(logits)
    }
}

#[async_trait]
impl CellClassifier for OnnxClassifier {
    async fn classify(&self, features: &HandoverFeatures) -> Result<CellDistribution> {
        let model = Arc::clone(&self.model);
        let start = Instant::now();
        let rows: Vec<[f32; NUM_FEATURES]> =
            features.candidates.iter().map(|c| features.row(c)).collect();

        // Inference is CPU-bound; keep it off the async workers so callers can time out
        let logits = tokio::task::spawn_blocking(move || Self::run_rows(&model, rows))
            .await
            .context("Inference task failed")??;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        let probabilities = softmax(&logits);
        Ok(CellDistribution::new(
            features
                .candidates
                .iter()
                .map(|c| c.cell_id.clone())
                .zip(probabilities)
                .collect(),
        ))
    }

    fn model_version(&self) -> String {
        self.model_version.clone()
    }
}

/// Softmax over a weighted signal/quality score
///
/// Lower temperatures make the distribution sharper. Tighter latency budgets
/// shift weight toward signal quality.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    pub temperature: f64,
    pub signal_weight: f64,
    pub quality_weight: f64,
    pub interference_weight: f64,
    /// Extra quality weight at a zero latency budget
    pub latency_quality_weight: f64,
    /// Score bonus for staying on the serving cell
    pub serving_bonus: f64,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self {
            temperature: 0.05,
            signal_weight: 0.7,
            quality_weight: 0.3,
            interference_weight: 0.2,
            latency_quality_weight: 0.3,
            serving_bonus: 0.02,
        }
    }
}

impl HeuristicClassifier {
    pub fn new(temperature: f64) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CellClassifier for HeuristicClassifier {
    async fn classify(&self, features: &HandoverFeatures) -> Result<CellDistribution> {
        if self.temperature <= 0.0 || !self.temperature.is_finite() {
            anyhow::bail!("temperature must be positive, got {}", self.temperature);
        }
        let tightness = 1.0 - features.latency_budget as f64;
        let quality_weight = self.quality_weight + self.latency_quality_weight * tightness;
        let scores: Vec<f64> = features
            .candidates
            .iter()
            .map(|c| {
                (self.signal_weight * c.signal_strength as f64
                    + quality_weight * c.signal_quality as f64
                    - self.interference_weight * c.interference_ratio as f64
                    + self.serving_bonus * c.is_serving as f64)
                    / self.temperature
            })
            .collect();

        Ok(CellDistribution::new(
            features
                .candidates
                .iter()
                .map(|c| c.cell_id.clone())
                .zip(softmax(&scores))
                .collect(),
        ))
    }

    fn model_version(&self) -> String {
        "heuristic".to_string()
    }
}

fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn verify_checksum(bytes: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hex::encode(Sha256::digest(bytes));
    if !actual.eq_ignore_ascii_case(expected_hex.trim()) {
        anyhow::bail!("Model checksum mismatch: expected {}, got {}", expected_hex, actual);
    }
    Ok(())
}
