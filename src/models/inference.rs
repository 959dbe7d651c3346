//! Heart disease inference engine

use crate::config::ModelsConfig;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::types::prediction::ModelKind;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A binary classifier scoring the positive (heart disease) class.
pub trait RiskModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Probability of the positive class, 0.0 - 1.0
    fn predict_proba(&self, features: &[f32]) -> Result<f64>;
}

/// Inference engine holding one classifier per route
pub struct InferenceEngine {
    models: HashMap<ModelKind, Arc<dyn RiskModel>>,
}

impl InferenceEngine {
    /// Create a new inference engine by loading ONNX models from configuration
    pub fn new(config: &ModelsConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.onnx_threads)?;
        let models = loader
            .load_all_models(config)?
            .into_iter()
            .map(|(kind, model)| (kind, Arc::new(model) as Arc<dyn RiskModel>))
            .collect();

        Ok(Self { models })
    }

    /// Create an engine from already constructed models
    pub fn from_models<I>(models: I) -> Self
    where
        I: IntoIterator<Item = (ModelKind, Arc<dyn RiskModel>)>,
    {
        Self {
            models: models.into_iter().collect(),
        }
    }

    /// Get the number of loaded models
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Get loaded model names
    pub fn model_names(&self) -> Vec<String> {
        self.models.values().map(|m| m.name().to_string()).collect()
    }

    pub fn model(&self, kind: ModelKind) -> Option<Arc<dyn RiskModel>> {
        self.models.get(&kind).cloned()
    }

    /// Score features with one classifier on the blocking pool
    pub async fn predict(&self, kind: ModelKind, features: Vec<f32>) -> Result<f64> {
        let model = self
            .model(kind)
            .with_context(|| format!("No model loaded for {}", kind))?;

        let probability = tokio::task::spawn_blocking(move || model.predict_proba(&features))
            .await
            .context("Inference task panicked")??;

        debug!(model = %kind, probability = probability, "Inference complete");

        Ok(probability)
    }
}

impl RiskModel for LoadedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, features: &[f32]) -> Result<f64> {
        use ort::value::Tensor;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        extract_probability(&outputs, &self.output_name, &self.name)
    }
}

/// Extract the positive-class probability from model output.
///
/// Handles tensor outputs (`zipmap=False` exports) and seq(map) outputs
/// (the default ZipMap exports of scikit-learn classifiers).
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let prob = positive_prob_from_tensor(shape, data)?;
            debug!(model = %model_name, prob = prob, "Extracted from tensor");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(prob) = extract_from_sequence_map(&output, model_name) {
                return Ok(prob);
            }
        }
    }

    // Fallback: iterate all outputs and try extraction
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }

        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let prob = positive_prob_from_tensor(shape, data)?;
            debug!(model = %model_name, output = %name, prob = prob, "Extracted from tensor (fallback)");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(prob) = extract_from_sequence_map(&output, model_name) {
                return Ok(prob);
            }
        }
    }

    warn!(model = %model_name, "Model produced no probability output");
    anyhow::bail!("Model {} produced no probability output", model_name)
}

/// Extract probability from seq(map(int64, float)) format
fn extract_from_sequence_map(output: &ort::value::DynValue, model_name: &str) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    // Batch size is always 1
    let map_value = maps
        .first()
        .ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;

    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
    let pairs: Vec<(i64, f32)> = kv_pairs.into_iter().collect();

    let prob = positive_prob_from_pairs(&pairs)?;
    debug!(model = %model_name, prob = prob, "Extracted from seq(map)");
    Ok(prob)
}

/// Positive-class probability from (class id, probability) pairs
fn positive_prob_from_pairs(pairs: &[(i64, f32)]) -> Result<f64> {
    if let Some((_, prob)) = pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = pairs.iter().find(|(class_id, _)| *class_id == 0) {
        return Ok(1.0 - *prob as f64);
    }
    anyhow::bail!("No class probability found in map")
}

/// Positive-class probability from a `[batch, classes]` or `[classes]` tensor
fn positive_prob_from_tensor(shape: &[i64], data: &[f32]) -> Result<f64> {
    let num_classes = match shape {
        [_, classes] => *classes,
        [classes] => *classes,
        _ => anyhow::bail!("Unexpected probability tensor shape {:?}", shape),
    };

    match (num_classes, data) {
        (n, [_, positive, ..]) if n >= 2 => Ok(*positive as f64),
        (1, [prob, ..]) => Ok(*prob as f64),
        _ => anyhow::bail!("Probability tensor has no positive class"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel(f64);

    impl RiskModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict_proba(&self, _features: &[f32]) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_tensor_extraction() {
        assert_eq!(positive_prob_from_tensor(&[1, 2], &[0.25, 0.75]).unwrap(), 0.75);
        assert_eq!(positive_prob_from_tensor(&[2], &[0.5, 0.5]).unwrap(), 0.5);
        assert_eq!(positive_prob_from_tensor(&[1, 1], &[0.125]).unwrap(), 0.125);
        assert!(positive_prob_from_tensor(&[1, 2, 3], &[0.0; 6]).is_err());
        assert!(positive_prob_from_tensor(&[1, 2], &[]).is_err());
    }

    #[test]
    fn test_map_extraction() {
        assert_eq!(positive_prob_from_pairs(&[(0, 0.25), (1, 0.75)]).unwrap(), 0.75);
        assert_eq!(positive_prob_from_pairs(&[(0, 0.25)]).unwrap(), 0.75);
        assert!(positive_prob_from_pairs(&[(2, 0.1)]).is_err());
    }

    #[tokio::test]
    async fn test_engine_dispatches_by_kind() {
        let engine = InferenceEngine::from_models([
            (ModelKind::RandomForest, Arc::new(FixedModel(0.9)) as Arc<dyn RiskModel>),
            (ModelKind::Knn, Arc::new(FixedModel(0.1)) as Arc<dyn RiskModel>),
        ]);

        assert_eq!(engine.model_count(), 2);
        assert_eq!(engine.predict(ModelKind::RandomForest, vec![0.0; 13]).await.unwrap(), 0.9);
        assert_eq!(engine.predict(ModelKind::Knn, vec![0.0; 13]).await.unwrap(), 0.1);
        assert!(engine.predict(ModelKind::GradientBoosting, vec![0.0; 13]).await.is_err());
    }
}
