use super::ModelController;
use crate::config::{describe_model, AppConfig, DEFAULTS};
use crate::error::ControllerError;
use crate::logging::LogSink;
use crate::model::{success_record, GenerateArgs, Generation, LoadInfo, ModelInfo, Task};
use crate::pipelines::{GenerationRequest, TextToImageLoader, TextToImagePipeline};
use crate::storage::ArtifactWriter;
use crate::validate::PromptValidator;
use std::time::Instant;

pub struct TextToImageController {
    name: String,
    loader: TextToImageLoader,
    pipeline: Option<Box<dyn TextToImagePipeline>>,
    prompts: PromptValidator,
    artifacts: ArtifactWriter,
    log: LogSink,
}

impl TextToImageController {
    pub const CATEGORY: &'static str = "Text → Image";

    pub fn new(cfg: &AppConfig, loader: TextToImageLoader, log: LogSink) -> Self {
        Self {
            name: cfg.t2i_model.clone(),
            loader,
            pipeline: None,
            prompts: PromptValidator::new(DEFAULTS.prompt_maxlen),
            artifacts: ArtifactWriter::new(&cfg.output_dir, "t2i"),
            log,
        }
    }

    fn generate(&mut self, args: GenerateArgs) -> Result<Generation, ControllerError> {
        let pipeline = self.pipeline.as_mut().ok_or(ControllerError::NotLoaded)?;
        let started = Instant::now();

        // zero means "not given", same as an omitted value
        let (default_w, default_h) = DEFAULTS.image_size;
        let width = args.width.filter(|&v| v > 0).unwrap_or(default_w);
        let height = args.height.filter(|&v| v > 0).unwrap_or(default_h);
        let steps = args.steps.filter(|&v| v > 0).unwrap_or(DEFAULTS.t2i_steps);
        let guidance = args.guidance.unwrap_or(DEFAULTS.t2i_guidance);

        let prompt = self.prompts.prepare(&args.prompt)?;
        let negative_prompt = Some(args.negative_prompt.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        self.log.info(format!(
            "Generating image {width}x{height}, steps={steps}, guidance={guidance}"
        ));
        let image = pipeline
            .generate(&GenerationRequest {
                prompt: &prompt,
                negative_prompt: negative_prompt.as_deref(),
                steps,
                guidance_scale: guidance,
                width,
                height,
            })
            .map_err(ControllerError::Pipeline)?;

        let stem = self.artifacts.next_stem();
        let image_path = self
            .artifacts
            .write_image(&image, &stem)
            .map_err(ControllerError::Persist)?;
        let record = Generation {
            task: Task::TextToImage,
            model: self.name.clone(),
            prompt,
            negative_prompt,
            width,
            height,
            steps,
            guidance,
            image_path,
            json_path: self.artifacts.json_path(&stem),
            duration_sec: started.elapsed().as_secs_f64(),
        };
        self.artifacts
            .write_json(&success_record(&record), &stem)
            .map_err(ControllerError::Persist)?;
        Ok(record)
    }
}

impl ModelController for TextToImageController {
    type Args = GenerateArgs;
    type Output = Generation;

    fn task(&self) -> Task {
        Task::TextToImage
    }

    fn is_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    fn load(&mut self) -> Result<LoadInfo, ControllerError> {
        self.log.info("Loading Text-to-Image model...");
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
                    "Text-to-Image model loaded on {} in {:.2}s",
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

    fn validate_input(&self, args: &GenerateArgs) -> Result<(), ControllerError> {
        self.prompts.prepare(&args.prompt)?;
        Ok(())
    }

    fn run(&mut self, args: GenerateArgs) -> Result<Generation, ControllerError> {
        let result = self.generate(args);
        match &result {
            Ok(record) => self.log.info(format!(
                "Image saved to {} ({:.2}s)",
                record.image_path.display(),
                record.duration_sec
            )),
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
