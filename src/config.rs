//! Static defaults and the resolved runtime configuration.
//!
//! `DEFAULTS` is the fixed table every controller falls back to for omitted
//! arguments. `AppConfig` is what the CLI layer resolves at startup and hands
//! to the controllers and pipelines.

use std::path::PathBuf;

/// Fixed defaults shared by the controllers.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub t2i_model: &'static str,
    pub clf_model: &'static str,
    pub image_size: (u32, u32),
    pub t2i_steps: u32,
    pub t2i_guidance: f32,
    pub clf_topk: usize,
    pub prompt_maxlen: usize,
}

pub const DEFAULTS: Defaults = Defaults {
    t2i_model: "stabilityai/sd-turbo",
    clf_model: "apple/mobilevit-xx-small",
    image_size: (256, 256),
    t2i_steps: 2,
    t2i_guidance: 0.0,
    clf_topk: 5,
    prompt_maxlen: 300,
};

const MODEL_DESCRIPTIONS: &[(&str, &str)] = &[
    (
        "stabilityai/sd-turbo",
        "Fast text-to-image generation model (diffusers), good for quick drafts.",
    ),
    (
        "apple/mobilevit-xx-small",
        "Tiny MobileViT classifier suitable for CPU-bound inference.",
    ),
];

/// Human-readable description for a model identifier, or "N/A".
pub fn describe_model(model: &str) -> &'static str {
    MODEL_DESCRIPTIONS
        .iter()
        .find(|(id, _)| *id == model)
        .map(|(_, desc)| *desc)
        .unwrap_or("N/A")
}

pub const DEFAULT_IMAGE_SERVER: &str = "http://localhost:8080/v1";
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "blurry, low quality, watermark, extra fingers, extra hands";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub log_file: PathBuf,
    pub t2i_model: String,
    pub clf_model: String,
    pub image_server: String,
    pub models_dir: PathBuf,
    pub device: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            log_file: PathBuf::from("logs").join("app.log"),
            t2i_model: DEFAULTS.t2i_model.to_string(),
            clf_model: DEFAULTS.clf_model.to_string(),
            image_server: DEFAULT_IMAGE_SERVER.to_string(),
            models_dir: default_models_dir(),
            device: "cpu".to_string(),
        }
    }
}

/// `<data dir>/tkai/models`, or `./models` when the platform has no data dir.
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("tkai").join("models"))
        .unwrap_or_else(|| PathBuf::from("models"))
}
