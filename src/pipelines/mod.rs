//! External inference engines behind the controllers.
//!
//! Both traits are synchronous: calls block for as long as inference takes and
//! are only ever made from background workers. Each pipeline is owned by
//! exactly one controller.

mod image_server;
mod onnx;
mod preprocess;

pub use image_server::ImageServerPipeline;
pub use onnx::OnnxClassifier;

use crate::config::AppConfig;
use crate::model::Prediction;
use anyhow::Result;
use image::DynamicImage;

/// Arguments of one text-to-image call, after defaults and validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub negative_prompt: Option<&'a str>,
    pub steps: u32,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
}

pub trait TextToImagePipeline: Send {
    fn generate(&mut self, request: &GenerationRequest<'_>) -> Result<DynamicImage>;

    /// Device the pipeline runs on, as reported by `load`.
    fn device(&self) -> &str;
}

pub trait ClassificationPipeline: Send {
    /// At most `top_k` predictions, in the engine's order (descending score).
    fn classify(&mut self, image: &DynamicImage, top_k: usize) -> Result<Vec<Prediction>>;

    fn device(&self) -> &str;
}

/// Builds a fresh pipeline for a model identifier. Called on every `load`.
pub type TextToImageLoader =
    Box<dyn Fn(&str) -> Result<Box<dyn TextToImagePipeline>> + Send + Sync>;
pub type ClassificationLoader =
    Box<dyn Fn(&str) -> Result<Box<dyn ClassificationPipeline>> + Send + Sync>;

/// Loader for the OpenAI-compatible image generation server in `cfg`.
pub fn image_server_loader(cfg: &AppConfig) -> TextToImageLoader {
    let base_url = cfg.image_server.clone();
    let device = cfg.device.clone();
    Box::new(move |model| {
        let pipeline = ImageServerPipeline::connect(&base_url, model, &device)?;
        Ok(Box::new(pipeline) as Box<dyn TextToImagePipeline>)
    })
}

/// Loader for ONNX exports stored under `<models_dir>/<model id>/`.
pub fn onnx_loader(cfg: &AppConfig) -> ClassificationLoader {
    let models_dir = cfg.models_dir.clone();
    Box::new(move |model| {
        let pipeline = OnnxClassifier::load(&models_dir.join(model))?;
        Ok(Box::new(pipeline) as Box<dyn ClassificationPipeline>)
    })
}
