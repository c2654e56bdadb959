//! Image classification with ONNX Runtime.
//!
//! A model directory holds `model.onnx`, the Hugging Face `config.json` (for
//! `id2label`) and optionally `preprocessor_config.json`.

use super::preprocess::Preprocess;
use super::ClassificationPipeline;
use crate::model::Prediction;
use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;

pub struct OnnxClassifier {
    session: Session,
    labels: Vec<String>,
    preprocess: Preprocess,
}

impl OnnxClassifier {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        if !model_path.exists() {
            return Err(anyhow!(
                "ONNX model not found at {}. Export the model (model.onnx + config.json) into {}",
                model_path.display(),
                model_dir.display()
            ));
        }
        let labels = read_labels(&model_dir.join("config.json"))?;
        let preprocess = Preprocess::from_model_dir(model_dir)?;

        let _ = ort::init().with_name("tkai").commit();
        let session = Session::builder()
            .map_err(|e| anyhow!("Failed to create session builder: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Failed to set optimization level: {e}"))?
            .with_intra_threads(4)
            .map_err(|e| anyhow!("Failed to set intra threads: {e}"))?
            .with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| anyhow!("Failed to register CPU execution provider: {e}"))?
            .commit_from_file(&model_path)
            .map_err(|e| anyhow!("Failed to load ONNX model {}: {e}", model_path.display()))?;

        Ok(Self {
            session,
            labels,
            preprocess,
        })
    }
}

/// Labels ordered by class index from the `id2label` map.
fn read_labels(config_path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
    let config: serde_json::Value =
        serde_json::from_str(&raw).context("Failed to parse config JSON")?;
    let id2label = config["id2label"]
        .as_object()
        .ok_or_else(|| anyhow!("Config missing id2label field"))?;

    let mut labels: Vec<(usize, String)> = id2label
        .iter()
        .map(|(k, v)| {
            let idx = k.parse::<usize>().unwrap_or(0);
            let label = v.as_str().unwrap_or("unknown").to_string();
            (idx, label)
        })
        .collect();
    labels.sort_by_key(|(idx, _)| *idx);
    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

/// Softmax over `logits`, then the `top_k` best classes in descending order.
fn top_predictions(logits: &[f32], labels: &[String], top_k: usize) -> Vec<Prediction> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();

    let mut indexed: Vec<(usize, f32)> = logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .enumerate()
        .collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    indexed
        .into_iter()
        .take(top_k)
        .map(|(idx, score)| Prediction {
            label: labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{idx}")),
            score,
        })
        .collect()
}

impl ClassificationPipeline for OnnxClassifier {
    fn classify(&mut self, image: &DynamicImage, top_k: usize) -> Result<Vec<Prediction>> {
        let input = self.preprocess.tensor(image)?;
        let input_name = self.session.inputs()[0].name().to_string();
        let input_tensor =
            Value::from_array(input).map_err(|e| anyhow!("Failed to create tensor value: {e}"))?;

        let outputs = self
            .session
            .run(ort::inputs![input_name.as_str() => input_tensor])
            .map_err(|e| anyhow!("Inference failed: {e}"))?;
        let output = outputs
            .values()
            .next()
            .ok_or_else(|| anyhow!("Model produced no outputs"))?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("Failed to extract output tensor: {e}"))?;

        Ok(top_predictions(data, &self.labels, top_k))
    }

    fn device(&self) -> &str {
        "cpu"
    }
}
