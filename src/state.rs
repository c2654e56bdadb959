//! Application state owned by the UI thread.
//!
//! Nothing here is shared: background workers report back through
//! `AppEvent`s and the UI thread applies them with `finish_load`/`finish_run`.

use crate::config::DEFAULT_NEGATIVE_PROMPT;
use crate::error::ControllerError;
use crate::model::{ClassifyArgs, GenerateArgs, LoadInfo, RunOutput, RunRequest, Task};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// What the application is doing right now. At most one background call at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Loading(Task),
    Running(Task),
}

impl Activity {
    pub fn is_idle(self) -> bool {
        self == Activity::Idle
    }

    /// Status bar text while this activity is in progress.
    pub fn status(self) -> String {
        match self {
            Activity::Idle => "Ready.".into(),
            Activity::Loading(task) => format!("Loading {} model...", task.display_name()),
            Activity::Running(_) => "Working... Please wait.".into(),
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Idle => write!(f, "idle"),
            Activity::Loading(task) => write!(f, "loading the {} model", task.display_name()),
            Activity::Running(task) => write!(f, "running {}", task.display_name()),
        }
    }
}

/// A load or run was requested while another call is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Busy: {0}.")]
pub struct Busy(pub Activity);

#[derive(Debug, Clone)]
pub struct AppState {
    pub task: Task,
    pub last_prompt: String,
    pub last_negative_prompt: String,
    pub last_input_path: Option<PathBuf>,
    /// Image produced by the most recent successful generation.
    pub last_output_path: Option<PathBuf>,
    /// Free-form facts about loaded models, e.g. `text-to-image.device`.
    pub metadata: BTreeMap<String, String>,
    loaded: [bool; 2],
    activity: Activity,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            task: Task::TextToImage,
            last_prompt: String::new(),
            last_negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            last_input_path: None,
            last_output_path: None,
            metadata: BTreeMap::new(),
            loaded: [false; 2],
            activity: Activity::Idle,
        }
    }
}

fn slot(task: Task) -> usize {
    match task {
        Task::TextToImage => 0,
        Task::ImageClassification => 1,
    }
}

fn meta_key(task: Task, field: &str) -> String {
    let prefix = match task {
        Task::TextToImage => "text-to-image",
        Task::ImageClassification => "image-classification",
    };
    format!("{prefix}.{field}")
}

impl AppState {
    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn is_loaded(&self, task: Task) -> bool {
        self.loaded[slot(task)]
    }

    /// Device reported by the last successful load of `task`.
    pub fn loaded_device(&self, task: Task) -> Option<&str> {
        self.metadata
            .get(&meta_key(task, "device"))
            .map(String::as_str)
    }

    pub fn begin_load(&mut self, task: Task) -> Result<(), Busy> {
        self.begin(Activity::Loading(task))
    }

    pub fn begin_run(&mut self, task: Task) -> Result<(), Busy> {
        self.begin(Activity::Running(task))
    }

    fn begin(&mut self, next: Activity) -> Result<(), Busy> {
        if !self.activity.is_idle() {
            return Err(Busy(self.activity));
        }
        self.activity = next;
        Ok(())
    }

    pub fn finish_load(&mut self, task: Task, result: &Result<LoadInfo, ControllerError>) {
        self.activity = Activity::Idle;
        if let Ok(info) = result {
            self.loaded[slot(task)] = true;
            self.metadata
                .insert(meta_key(task, "model"), info.model.clone());
            self.metadata
                .insert(meta_key(task, "device"), info.device.clone());
        }
    }

    pub fn finish_run(&mut self, result: &Result<RunOutput, ControllerError>) {
        self.activity = Activity::Idle;
        if let Ok(RunOutput::Generation(generation)) = result {
            self.last_output_path = Some(generation.image_path.clone());
        }
    }

    /// Remember the text inputs and build the generation request.
    pub fn snapshot_generate(&mut self, prompt: &str, negative_prompt: &str) -> RunRequest {
        self.last_prompt = prompt.to_string();
        self.last_negative_prompt = negative_prompt.to_string();
        RunRequest::Generate(GenerateArgs {
            prompt: prompt.to_string(),
            negative_prompt: negative_prompt.to_string(),
            ..Default::default()
        })
    }

    /// An empty path field falls back to the last generated image.
    pub fn snapshot_classify(&mut self, image_path: &str) -> RunRequest {
        let typed = image_path.trim();
        let path = if typed.is_empty() {
            self.last_output_path.clone().unwrap_or_default()
        } else {
            PathBuf::from(typed)
        };
        self.last_input_path = Some(path.clone());
        RunRequest::Classify(ClassifyArgs {
            image_path: path,
            top_k: None,
        })
    }
}
