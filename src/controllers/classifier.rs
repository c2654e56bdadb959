use super::ModelController;
use crate::config::{describe_model, AppConfig, DEFAULTS};
use crate::error::ControllerError;
use crate::logging::LogSink;
use crate::model::{success_record, Classification, ClassifyArgs, LoadInfo, ModelInfo, Task};
use crate::pipelines::{ClassificationLoader, ClassificationPipeline};
use crate::storage::ArtifactWriter;
use crate::validate::validate_image_path;
use anyhow::Context;
use image::DynamicImage;
use std::time::Instant;

pub struct ImageClassifierController {
    name: String,
    loader: ClassificationLoader,
    pipeline: Option<Box<dyn ClassificationPipeline>>,
    artifacts: ArtifactWriter,
    log: LogSink,
}

impl ImageClassifierController {
    pub const CATEGORY: &'static str = "Image → Labels";

    pub fn new(cfg: &AppConfig, loader: ClassificationLoader, log: LogSink) -> Self {
        Self {
            name: cfg.clf_model.clone(),
            loader,
            pipeline: None,
            artifacts: ArtifactWriter::new(&cfg.output_dir, "clf"),
            log,
        }
    }

    fn classify(&mut self, args: ClassifyArgs) -> Result<Classification, ControllerError> {
        let pipeline = self.pipeline.as_mut().ok_or(ControllerError::NotLoaded)?;
        let started = Instant::now();

        let top_k = args.top_k.filter(|&k| k > 0).unwrap_or(DEFAULTS.clf_topk);
        let image_path = validate_image_path(&args.image_path)?;
        let image = image::open(&image_path)
            .with_context(|| format!("decode image {}", image_path.display()))
            .map_err(ControllerError::Pipeline)?;
        let image = DynamicImage::ImageRgb8(image.to_rgb8());

        self.log.info(format!(
            "Classifying image: {} | top_k={top_k}",
            image_path.display()
        ));
        let mut predictions = pipeline
            .classify(&image, top_k)
            .map_err(ControllerError::Pipeline)?;
        predictions.truncate(top_k);

        let stem = self.artifacts.next_stem();
        let record = Classification {
            task: Task::ImageClassification,
            model: self.name.clone(),
            image_path,
            top_k,
            predictions,
            json_path: self.artifacts.json_path(&stem),
            duration_sec: started.elapsed().as_secs_f64(),
        };
        self.artifacts
            .write_json(&success_record(&record), &stem)
            .map_err(ControllerError::Persist)?;
        Ok(record)
    }
}

impl ModelController for ImageClassifierController {
    type Args = ClassifyArgs;
    type Output = Classification;

    fn task(&self) -> Task {
        Task::ImageClassification
    }

    fn is_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    fn load(&mut self) -> Result<LoadInfo, ControllerError> {
        self.log.info("Loading Image Classification model...");
        self.log.debug(format!("Initializing pipeline for {}", self.name));
        let started = Instant::now();
        match (self.loader)(&self.name) {
            Ok(pipeline) => {
                let info = LoadInfo {
                    model: self.name.clone(),
                    device: pipeline.device().to_string(),
                    duration_sec: started.elapsed().as_secs_f64(),
                };
                self.pipeline = Some(pipeline);
                self.log.info(format!(
                    "Image Classification model loaded on {} in {:.2}s",
                    info.device, info.duration_sec
                ));
                Ok(info)
            }
            Err(e) => {
                self.log.error(format!("Error in load: {e:#}"));
                Err(ControllerError::Pipeline(e))
            }
        }
    }

    fn validate_input(&self, args: &ClassifyArgs) -> Result<(), ControllerError> {
        validate_image_path(&args.image_path)?;
        Ok(())
    }

    fn run(&mut self, args: ClassifyArgs) -> Result<Classification, ControllerError> {
        let result = self.classify(args);
        match &result {
            Ok(record) => {
                let top = record
                    .predictions
                    .first()
                    .map(|p| format!("{} ({:.3})", p.label, p.score))
                    .unwrap_or_else(|| "none".into());
                self.log.info(format!(
                    "Top prediction: {top} ({:.2}s)",
                    record.duration_sec
                ));
            }
            Err(ControllerError::NotLoaded) => self.log.warn("Run requested before load"),
            Err(e) => self.log.error(format!("Error in run: {e}")),
        }
        result
    }

    fn summarize_info(&self) -> ModelInfo {
        ModelInfo {
            model_name: self.name.clone(),
            category: Self::CATEGORY.to_string(),
            description: describe_model(&self.name).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::fakes::{
        fake_config, unsorted_classifier_loader, write_png, FakeClassifier,
    };
    use crate::model::Record;

    fn loaded(cfg: &AppConfig) -> ImageClassifierController {
        let mut ctl =
            ImageClassifierController::new(cfg, FakeClassifier::loader(), LogSink::discard());
        ctl.load().unwrap();
        ctl
    }

    #[test]
    fn load_reports_model_and_device() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctl = ImageClassifierController::new(
            &fake_config(tmp.path()),
            FakeClassifier::loader(),
            LogSink::discard(),
        );
        assert!(!ctl.is_loaded());
        let info = ctl.load().unwrap();
        assert_eq!(info.model, "apple/mobilevit-xx-small");
        assert_eq!(info.device, "cpu");
        assert!(ctl.is_loaded());
    }

    #[test]
    fn text_file_is_rejected_as_unsupported_format() {
        let tmp = tempfile::tempdir().unwrap();
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&notes, "not an image").unwrap();
        let mut ctl = loaded(&fake_config(tmp.path()));

        let result = ctl.run(ClassifyArgs {
            image_path: notes,
            top_k: Some(3),
        });
        let v = serde_json::to_value(Record(&result)).unwrap();
        assert_eq!(v["ok"], false);
        assert!(v["error"]
            .as_str()
            .unwrap()
            .contains("Unsupported image format"));
    }

    #[test]
    fn missing_image_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let ctl = loaded(&fake_config(tmp.path()));
        let err = ctl
            .validate_input(&ClassifyArgs {
                image_path: tmp.path().join("ghost.png"),
                top_k: None,
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("Image not found"));
    }

    #[test]
    fn default_top_k_and_metadata_file() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("input").join("house.PNG");
        write_png(&img);
        let mut ctl = loaded(&fake_config(tmp.path()));

        let res = ctl
            .run(ClassifyArgs {
                image_path: img.clone(),
                top_k: None,
            })
            .unwrap();
        assert_eq!(res.top_k, 5);
        assert_eq!(res.predictions.len(), 5);
        assert_eq!(res.image_path, img);

        let name = res.json_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("clf_") && name.ends_with(".json"));
        let parsed: Classification =
            serde_json::from_str(&std::fs::read_to_string(&res.json_path).unwrap()).unwrap();
        assert_eq!(parsed, res);
    }

    #[test]
    fn pipeline_order_is_kept_and_capped_at_top_k() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("house.jpg");
        write_png(&img);
        let cfg = fake_config(tmp.path());
        let mut ctl =
            ImageClassifierController::new(&cfg, unsorted_classifier_loader(), LogSink::discard());
        ctl.load().unwrap();

        let res = ctl
            .run(ClassifyArgs {
                image_path: img,
                top_k: Some(2),
            })
            .unwrap();
        let labels: Vec<&str> = res.predictions.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["cinema", "church"]);
    }

    #[test]
    fn undecodable_image_is_an_error_result() {
        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("broken.png");
        std::fs::write(&fake, b"definitely not a png").unwrap();
        let mut ctl = loaded(&fake_config(tmp.path()));

        let err = ctl
            .run(ClassifyArgs {
                image_path: fake,
                top_k: Some(1),
            })
            .unwrap_err();
        assert!(err.to_string().contains("decode image"));
    }

    #[test]
    fn unwritable_output_dir_is_a_persist_error() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("house.png");
        write_png(&img);
        let mut cfg = fake_config(tmp.path());
        cfg.output_dir = tmp.path().join("outputs.txt");
        std::fs::write(&cfg.output_dir, "a file, not a directory").unwrap();
        let mut ctl = loaded(&cfg);

        let result = ctl.run(ClassifyArgs {
            image_path: img,
            top_k: Some(3),
        });
        assert!(matches!(result, Err(ControllerError::Persist(_))));
        let v = serde_json::to_value(Record(&result)).unwrap();
        assert_eq!(v["ok"], false);
        assert!(v["error"].as_str().unwrap().contains("outputs.txt"));
    }
}

