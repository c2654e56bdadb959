use crate::error::ControllerError;
use crate::model::{AppEvent, ModelInfo, RunOutput, Task};
use crate::orchestrator::UiCommand;
use crate::state::AppState;
use crate::text_summary::{build_load_summary, build_output_summary};
use std::collections::VecDeque;
use std::path::PathBuf;

const CONSOLE_LINES: usize = 200;

pub const TAB_WORKSPACE: usize = 0;
pub const TAB_HELP: usize = 1;

/// Editable input fields. Which ones are shown depends on the selected task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Prompt,
    NegativePrompt,
    ImagePath,
}

impl Field {
    pub fn for_task(task: Task) -> &'static [Field] {
        match task {
            Task::TextToImage => &[Field::Prompt, Field::NegativePrompt],
            Task::ImageClassification => &[Field::ImagePath],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Field::Prompt => "Prompt",
            Field::NegativePrompt => "Negative prompt",
            Field::ImagePath => "Image path (empty: last generated image)",
        }
    }
}

pub struct UiState {
    pub tab: usize,
    pub app: AppState,
    pub focus: Field,
    pub prompt: String,
    pub negative_prompt: String,
    pub image_path: String,
    pub status: String,
    pub output: Vec<String>,
    pub console: VecDeque<String>,
    /// Message shown in the error modal until dismissed.
    pub error: Option<String>,
    pub last_result: Option<RunOutput>,
    infos: [ModelInfo; 2],
}

impl UiState {
    pub fn new(infos: [ModelInfo; 2]) -> Self {
        let app = AppState::default();
        Self {
            tab: TAB_WORKSPACE,
            focus: Field::Prompt,
            prompt: app.last_prompt.clone(),
            negative_prompt: app.last_negative_prompt.clone(),
            image_path: String::new(),
            status: app.activity().status(),
            app,
            output: Vec::new(),
            console: VecDeque::new(),
            error: None,
            last_result: None,
            infos,
        }
    }

    pub fn task(&self) -> Task {
        self.app.task
    }

    pub fn model_info(&self) -> &ModelInfo {
        match self.app.task {
            Task::TextToImage => &self.infos[0],
            Task::ImageClassification => &self.infos[1],
        }
    }

    pub fn is_busy(&self) -> bool {
        !self.app.activity().is_idle()
    }

    pub fn toggle_task(&mut self) {
        self.app.task = self.app.task.other();
        self.focus = Field::for_task(self.app.task)[0];
    }

    pub fn cycle_focus(&mut self, forward: bool) {
        let fields = Field::for_task(self.app.task);
        let idx = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward {
            (idx + 1) % fields.len()
        } else {
            (idx + fields.len() - 1) % fields.len()
        };
        self.focus = fields[next];
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Prompt => &mut self.prompt,
            Field::NegativePrompt => &mut self.negative_prompt,
            Field::ImagePath => &mut self.image_path,
        }
    }

    pub fn field_value(&self, field: Field) -> &str {
        match field {
            Field::Prompt => &self.prompt,
            Field::NegativePrompt => &self.negative_prompt,
            Field::ImagePath => &self.image_path,
        }
    }

    // Input fields are read-only while a call is in flight.
    pub fn insert_char(&mut self, c: char) {
        if !self.is_busy() {
            self.focused_mut().push(c);
        }
    }

    pub fn backspace(&mut self) {
        if !self.is_busy() {
            self.focused_mut().pop();
        }
    }

    pub fn clear_field(&mut self) {
        if !self.is_busy() {
            self.focused_mut().clear();
        }
    }

    pub fn push_console(&mut self, line: String) {
        for l in line.lines() {
            if self.console.len() == CONSOLE_LINES {
                self.console.pop_front();
            }
            self.console.push_back(l.to_string());
        }
    }

    /// Start loading the selected task's model, unless a call is in flight.
    pub fn request_load(&mut self) -> Option<UiCommand> {
        let task = self.app.task;
        match self.app.begin_load(task) {
            Ok(()) => {
                self.status = self.app.activity().status();
                Some(UiCommand::Load(task))
            }
            Err(busy) => {
                self.status = busy.to_string();
                None
            }
        }
    }

    /// Snapshot the inputs and start a run, unless a call is in flight.
    pub fn request_run(&mut self) -> Option<UiCommand> {
        let task = self.app.task;
        if let Err(busy) = self.app.begin_run(task) {
            self.status = busy.to_string();
            return None;
        }
        let request = match task {
            Task::TextToImage => self
                .app
                .snapshot_generate(&self.prompt, &self.negative_prompt),
            Task::ImageClassification => self.app.snapshot_classify(&self.image_path),
        };
        self.status = self.app.activity().status();
        Some(UiCommand::Run(request))
    }

    pub fn clear_output(&mut self) {
        if self.is_busy() {
            return;
        }
        self.output.clear();
        self.last_result = None;
        self.status = "Cleared.".into();
    }

    /// Path offered for copying: the last generated image, else the last result's file.
    pub fn copy_target(&self) -> Option<PathBuf> {
        self.app
            .last_output_path
            .clone()
            .or_else(|| self.last_result.as_ref().map(|r| r.primary_path().clone()))
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::LoadCompleted { task, result } => {
                self.app.finish_load(task, &result);
                match result {
                    Ok(info) => {
                        self.output = build_load_summary(task, &info).lines;
                        self.status = "Done.".into();
                    }
                    Err(e) => self.fail(&format!("Loading the {} model", task.display_name()), e),
                }
            }
            AppEvent::RunCompleted { task, result } => {
                self.app.finish_run(&result);
                match *result {
                    Ok(output) => {
                        if let Some(path) = &self.app.last_output_path {
                            if task == Task::TextToImage {
                                self.image_path = path.display().to_string();
                            }
                        }
                        self.output = build_output_summary(&output).lines;
                        self.last_result = Some(output);
                        self.status = "Done.".into();
                    }
                    Err(e) => self.fail(task.display_name(), e),
                }
            }
        }
    }

    fn fail(&mut self, what: &str, error: ControllerError) {
        // Controllers log their own failures; a crashed worker never got the chance.
        if matches!(error, ControllerError::Worker(_)) {
            self.push_console(format!("{what} failed: {error}"));
        }
        self.status = if error.is_validation() {
            "Check your input.".into()
        } else {
            "Failed.".into()
        };
        self.error = Some(format!("{what} failed:\n{error}"));
    }
}
