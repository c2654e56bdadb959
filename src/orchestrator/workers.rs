//! Controller calls on tokio's blocking pool.

use crate::config::AppConfig;
use crate::controllers::{ImageClassifierController, ModelController, TextToImageController};
use crate::error::ControllerError;
use crate::logging::LogSink;
use crate::model::{LoadInfo, ModelInfo, RunOutput, RunRequest, Task};
use std::sync::{Arc, Mutex, PoisonError};

/// Shared handles on both controllers. Cloning is cheap; each controller
/// serves one call at a time.
#[derive(Clone)]
pub(crate) struct Controllers {
    t2i: Arc<Mutex<TextToImageController>>,
    clf: Arc<Mutex<ImageClassifierController>>,
}

impl Controllers {
    pub(crate) fn new(t2i: TextToImageController, clf: ImageClassifierController) -> Self {
        Self {
            t2i: Arc::new(Mutex::new(t2i)),
            clf: Arc::new(Mutex::new(clf)),
        }
    }

    /// Production wiring: the image server for generation, ONNX exports for
    /// classification. Nothing is loaded yet.
    pub(crate) fn from_config(cfg: &AppConfig, log: &LogSink) -> Self {
        Self::new(
            TextToImageController::new(
                cfg,
                crate::pipelines::image_server_loader(cfg),
                log.clone(),
            ),
            ImageClassifierController::new(cfg, crate::pipelines::onnx_loader(cfg), log.clone()),
        )
    }

    pub(crate) async fn load(&self, task: Task) -> Result<LoadInfo, ControllerError> {
        match task {
            Task::TextToImage => call_blocking(self.t2i.clone(), |c| c.load()).await,
            Task::ImageClassification => call_blocking(self.clf.clone(), |c| c.load()).await,
        }
    }

    pub(crate) async fn run(&self, request: RunRequest) -> Result<RunOutput, ControllerError> {
        match request {
            RunRequest::Generate(args) => {
                call_blocking(self.t2i.clone(), move |c| c.run(args))
                    .await
                    .map(RunOutput::Generation)
            }
            RunRequest::Classify(args) => {
                call_blocking(self.clf.clone(), move |c| c.run(args))
                    .await
                    .map(RunOutput::Classification)
            }
        }
    }

    /// Display info for `task`. Blocks while that controller is busy, so
    /// collect it before handing the controllers to the orchestrator.
    pub(crate) fn info(&self, task: Task) -> Result<ModelInfo, ControllerError> {
        match task {
            Task::TextToImage => with_lock(&self.t2i, |c| Ok(c.summarize_info())),
            Task::ImageClassification => with_lock(&self.clf, |c| Ok(c.summarize_info())),
        }
    }
}

/// A panic in an earlier call leaves the lock poisoned. The controller itself
/// stays usable: the next `load` replaces whatever pipeline panicked.
fn with_lock<C, T>(
    controller: &Mutex<C>,
    f: impl FnOnce(&mut C) -> Result<T, ControllerError>,
) -> Result<T, ControllerError> {
    let mut guard = controller.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Run `f` against the controller on the blocking pool. A panic inside the
/// call comes back as `ControllerError::Worker`.
async fn call_blocking<C, T, F>(controller: Arc<Mutex<C>>, f: F) -> Result<T, ControllerError>
where
    C: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut C) -> Result<T, ControllerError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || with_lock(&controller, f)).await {
        Ok(result) => result,
        Err(e) => Err(ControllerError::Worker(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::fakes::{fake_config, FakeClassifier, FakePainter};
    use crate::model::{ClassifyArgs, GenerateArgs};
    use crate::pipelines::{GenerationRequest, TextToImageLoader, TextToImagePipeline};
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanickingPainter;

    impl TextToImagePipeline for PanickingPainter {
        fn generate(&mut self, _request: &GenerationRequest<'_>) -> anyhow::Result<DynamicImage> {
            panic!("driver crashed")
        }

        fn device(&self) -> &str {
            "cpu"
        }
    }

    #[tokio::test]
    async fn load_then_run_through_blocking_pool() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = fake_config(tmp.path());
        let (painter, _) = FakePainter::loader();
        let controllers = Controllers::new(
            TextToImageController::new(&cfg, painter, LogSink::discard()),
            ImageClassifierController::new(&cfg, FakeClassifier::loader(), LogSink::discard()),
        );

        let info = controllers.load(Task::TextToImage).await.unwrap();
        assert_eq!(info.device, "cpu");
        let out = controllers
            .run(RunRequest::Generate(GenerateArgs {
                prompt: "a tiny sketch of a house".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(out.task(), Task::TextToImage);

        let err = controllers
            .run(RunRequest::Classify(ClassifyArgs {
                image_path: out.primary_path().clone(),
                top_k: Some(3),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NotLoaded));
    }

    #[tokio::test]
    async fn controller_recovers_after_a_panicking_run() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = fake_config(tmp.path());
        let (painter, calls) = FakePainter::loader();
        let loads = AtomicUsize::new(0);
        let loader: TextToImageLoader = Box::new(move |model| {
            if loads.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Box::new(PanickingPainter) as Box<dyn TextToImagePipeline>)
            } else {
                painter(model)
            }
        });
        let controllers = Controllers::new(
            TextToImageController::new(&cfg, loader, LogSink::discard()),
            ImageClassifierController::new(&cfg, FakeClassifier::loader(), LogSink::discard()),
        );
        controllers.load(Task::TextToImage).await.unwrap();

        let request = RunRequest::Generate(GenerateArgs {
            prompt: "a red kite".into(),
            ..Default::default()
        });
        let err = controllers.run(request.clone()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Worker(_)));
        assert!(err.to_string().starts_with("background worker failed"));

        assert!(controllers.info(Task::TextToImage).is_ok());
        assert!(controllers.info(Task::ImageClassification).is_ok());

        let info = controllers.load(Task::TextToImage).await.unwrap();
        assert_eq!(info.device, "cpu");
        let out = controllers.run(request).await.unwrap();
        assert_eq!(out.task(), Task::TextToImage);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
