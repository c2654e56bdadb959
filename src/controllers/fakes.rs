//! In-memory pipelines for tests.

use crate::config::AppConfig;
use crate::model::Prediction;
use crate::pipelines::{
    ClassificationLoader, ClassificationPipeline, GenerationRequest, TextToImageLoader,
    TextToImagePipeline,
};
use anyhow::{anyhow, Result};
use image::DynamicImage;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn fake_config(root: &Path) -> AppConfig {
    AppConfig {
        output_dir: root.join("outputs"),
        log_file: root.join("logs").join("app.log"),
        models_dir: root.join("models"),
        ..AppConfig::default()
    }
}

/// What the fake text-to-image pipeline was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintCall {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub steps: u32,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
}

pub struct FakePainter {
    calls: Arc<Mutex<Vec<PaintCall>>>,
}

impl FakePainter {
    /// Loader plus a handle on every request the loaded pipelines receive.
    pub fn loader() -> (TextToImageLoader, Arc<Mutex<Vec<PaintCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let shared = calls.clone();
        let loader: TextToImageLoader = Box::new(move |_model| {
            Ok(Box::new(FakePainter {
                calls: shared.clone(),
            }) as Box<dyn TextToImagePipeline>)
        });
        (loader, calls)
    }
}

impl TextToImagePipeline for FakePainter {
    fn generate(&mut self, request: &GenerationRequest<'_>) -> Result<DynamicImage> {
        self.calls.lock().unwrap().push(PaintCall {
            prompt: request.prompt.to_string(),
            negative_prompt: request.negative_prompt.map(str::to_string),
            steps: request.steps,
            guidance_scale: request.guidance_scale,
            width: request.width,
            height: request.height,
        });
        Ok(DynamicImage::new_rgb8(request.width, request.height))
    }

    fn device(&self) -> &str {
        "cpu"
    }
}

/// Always fails generation, as a pipeline that ran out of memory would.
pub struct BrokenPainter;

impl TextToImagePipeline for BrokenPainter {
    fn generate(&mut self, _request: &GenerationRequest<'_>) -> Result<DynamicImage> {
        Err(anyhow!("CUDA out of memory"))
    }

    fn device(&self) -> &str {
        "cpu"
    }
}

pub fn broken_painter_loader() -> TextToImageLoader {
    Box::new(|_| Ok(Box::new(BrokenPainter) as Box<dyn TextToImagePipeline>))
}

/// Fails every load after the first `succeed_first` attempts.
pub fn flaky_painter_loader(succeed_first: usize) -> TextToImageLoader {
    let attempts = AtomicUsize::new(0);
    Box::new(move |model| {
        if attempts.fetch_add(1, Ordering::SeqCst) < succeed_first {
            Ok(Box::new(BrokenPainter) as Box<dyn TextToImagePipeline>)
        } else {
            Err(anyhow!("could not fetch weights for {model}"))
        }
    })
}

pub struct FakeClassifier;

const FAKE_LABELS: [(&str, f32); 5] = [
    ("house", 0.62),
    ("barn", 0.21),
    ("boathouse", 0.09),
    ("church", 0.05),
    ("cinema", 0.03),
];

impl FakeClassifier {
    pub fn loader() -> ClassificationLoader {
        Box::new(|_| Ok(Box::new(FakeClassifier) as Box<dyn ClassificationPipeline>))
    }
}

impl ClassificationPipeline for FakeClassifier {
    fn classify(&mut self, _image: &DynamicImage, top_k: usize) -> Result<Vec<Prediction>> {
        Ok(FAKE_LABELS
            .iter()
            .take(top_k)
            .map(|(label, score)| Prediction {
                label: label.to_string(),
                score: *score,
            })
            .collect())
    }

    fn device(&self) -> &str {
        "cpu"
    }
}

/// Ignores `top_k` and yields predictions in ascending order.
pub struct UnsortedClassifier;

impl ClassificationPipeline for UnsortedClassifier {
    fn classify(&mut self, _image: &DynamicImage, _top_k: usize) -> Result<Vec<Prediction>> {
        Ok(FAKE_LABELS
            .iter()
            .rev()
            .map(|(label, score)| Prediction {
                label: label.to_string(),
                score: *score,
            })
            .collect())
    }

    fn device(&self) -> &str {
        "cpu"
    }
}

pub fn unsorted_classifier_loader() -> ClassificationLoader {
    Box::new(|_| Ok(Box::new(UnsortedClassifier) as Box<dyn ClassificationPipeline>))
}

pub fn write_png(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    DynamicImage::new_rgb8(16, 16).save(path).unwrap();
}
