//! ONNX model loader

use crate::config::ModelsConfig;
use crate::types::prediction::ModelKind;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Loaded ONNX classifier with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session; running it needs exclusive access
    pub session: Mutex<Session>,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
}

/// skl2onnx names for the classifier input and the class-probability output
const SKL2ONNX_INPUT: &str = "float_input";
const SKL2ONNX_PROBABILITIES: &str = "output_probability";

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Initialize ONNX Runtime and create a loader
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load one exported classifier
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {:?}", path))?;

        let inputs: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        let outputs: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let (input_name, output_name) = select_io_names(&inputs, &outputs)
            .with_context(|| format!("Unexpected graph signature in {:?}", path))?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Load the three classifiers named in the configuration.
    ///
    /// Unlike optional ensembles, every classifier backs a route, so a
    /// missing file is a startup error.
    pub fn load_all_models(&self, config: &ModelsConfig) -> Result<Vec<(ModelKind, LoadedModel)>> {
        let mut models = Vec::with_capacity(ModelKind::ALL.len());

        for kind in ModelKind::ALL {
            let path = config.model_path(kind);
            if !path.exists() {
                anyhow::bail!("Model file for {} not found at {}", kind, path.display());
            }
            let model = self.load_model(&path, kind.slug())?;
            models.push((kind, model));
        }

        info!(
            count = models.len(),
            "Loaded {} models from {}",
            models.len(),
            config.models_dir
        );

        Ok(models)
    }
}

/// Pick the feature input and the probability output of a classifier.
///
/// A converted classifier exposes `output_label` and `output_probability`
/// (a tensor, or a ZipMap sequence). A graph with a single output is taken
/// as probability-only. The label output is never a substitute.
pub fn select_io_names(inputs: &[&str], outputs: &[&str]) -> Result<(String, String)> {
    let input = inputs
        .iter()
        .find(|name| **name == SKL2ONNX_INPUT)
        .or_else(|| inputs.first())
        .context("Model declares no inputs")?;

    let output = outputs
        .iter()
        .find(|name| **name == SKL2ONNX_PROBABILITIES)
        .or_else(|| outputs.iter().find(|name| name.contains("probab")))
        .or(match outputs {
            [only] => Some(only),
            _ => None,
        })
        .with_context(|| format!("No probability output among {:?}", outputs))?;

    Ok((input.to_string(), output.to_string()))
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelsConfig {
            models_dir: dir.path().display().to_string(),
            files: Default::default(),
            onnx_threads: 1,
        };

        let err = match ModelLoader::default().load_all_models(&config) {
            Ok(_) => panic!("expected missing model error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("modelsv.onnx"));
    }

    #[test]
    fn test_skl2onnx_signature() {
        let (input, output) =
            select_io_names(&["float_input"], &["output_label", "output_probability"]).unwrap();
        assert_eq!(input, "float_input");
        assert_eq!(output, "output_probability");
    }

    #[test]
    fn test_renamed_probability_output() {
        let (input, output) = select_io_names(&["X"], &["label", "probabilities"]).unwrap();
        assert_eq!(input, "X");
        assert_eq!(output, "probabilities");

        let (_, output) = select_io_names(&["X"], &["scores"]).unwrap();
        assert_eq!(output, "scores");
    }

    #[test]
    fn test_label_only_graph_is_rejected() {
        let err = select_io_names(&["float_input"], &["output_label", "variable"]).unwrap_err();
        assert!(err.to_string().contains("No probability output"));
        assert!(select_io_names(&[], &["output_probability"]).is_err());
    }
}
