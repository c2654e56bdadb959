use crate::error::ControllerError;
use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    #[value(alias = "t2i")]
    TextToImage,
    #[value(alias = "clf")]
    ImageClassification,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::TextToImage, Task::ImageClassification];

    /// Label used in the UI and in log lines.
    pub fn display_name(self) -> &'static str {
        match self {
            Task::TextToImage => "Text-to-Image",
            Task::ImageClassification => "Image Classification",
        }
    }

    pub fn other(self) -> Task {
        match self {
            Task::TextToImage => Task::ImageClassification,
            Task::ImageClassification => Task::TextToImage,
        }
    }
}

/// Text-to-image request as captured from the user. Omitted numbers fall back
/// to `DEFAULTS` inside the controller.
#[derive(Debug, Clone, Default)]
pub struct GenerateArgs {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub guidance: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifyArgs {
    pub image_path: PathBuf,
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadInfo {
    pub model: String,
    pub device: String,
    pub duration_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub task: Task,
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance: f32,
    pub image_path: PathBuf,
    pub json_path: PathBuf,
    pub duration_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub task: Task,
    pub model: String,
    pub image_path: PathBuf,
    pub top_k: usize,
    pub predictions: Vec<Prediction>,
    pub json_path: PathBuf,
    pub duration_sec: f64,
}

/// Display strings describing a controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    #[serde(rename = "Model Name")]
    pub model_name: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Description")]
    pub description: String,
}

impl ModelInfo {
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            ("Model Name", self.model_name.as_str()),
            ("Category", self.category.as_str()),
            ("Description", self.description.as_str()),
        ]
    }
}

/// Input snapshot handed from the UI thread to a background worker.
#[derive(Debug, Clone)]
pub enum RunRequest {
    Generate(GenerateArgs),
    Classify(ClassifyArgs),
}

impl RunRequest {
    pub fn task(&self) -> Task {
        match self {
            RunRequest::Generate(_) => Task::TextToImage,
            RunRequest::Classify(_) => Task::ImageClassification,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunOutput {
    Generation(Generation),
    Classification(Classification),
}

impl RunOutput {
    pub fn task(&self) -> Task {
        match self {
            RunOutput::Generation(g) => g.task,
            RunOutput::Classification(c) => c.task,
        }
    }

    /// The path most worth showing to the user: the image for a generation,
    /// the metadata file for a classification.
    pub fn primary_path(&self) -> &PathBuf {
        match self {
            RunOutput::Generation(g) => &g.image_path,
            RunOutput::Classification(c) => &c.json_path,
        }
    }
}

/// Events emitted by the orchestrator and consumed by the UI thread.
#[derive(Debug)]
pub enum AppEvent {
    LoadCompleted {
        task: Task,
        result: Result<LoadInfo, ControllerError>,
    },
    RunCompleted {
        task: Task,
        // Boxed: the success records are much larger than the other variants.
        result: Box<Result<RunOutput, ControllerError>>,
    },
}

#[derive(Serialize)]
struct Success<'a, T> {
    ok: bool,
    #[serde(flatten)]
    record: &'a T,
}

#[derive(Serialize)]
struct Failure {
    ok: bool,
    error: String,
}

/// Tagged `{ok: true, ...}` / `{ok: false, error}` view of a controller result.
pub struct Record<'a, T>(pub &'a Result<T, ControllerError>);

impl<T: Serialize> Serialize for Record<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Ok(record) => Success { ok: true, record }.serialize(serializer),
            Err(e) => Failure {
                ok: false,
                error: e.to_string(),
            }
            .serialize(serializer),
        }
    }
}

/// Success record as written to disk; identical to `Record(&Ok(..))`.
pub fn success_record<T: Serialize>(record: &T) -> impl Serialize + '_ {
    Success { ok: true, record }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(Task::TextToImage).unwrap(),
            json!("text-to-image")
        );
        assert_eq!(
            serde_json::to_value(Task::ImageClassification).unwrap(),
            json!("image-classification")
        );
    }

    #[test]
    fn failure_record_has_exactly_ok_and_error() {
        let r: Result<LoadInfo, ControllerError> = Err(ControllerError::NotLoaded);
        let v = serde_json::to_value(Record(&r)).unwrap();
        assert_eq!(v, json!({"ok": false, "error": "not loaded"}));
    }

    #[test]
    fn success_record_is_flattened_with_ok_tag() {
        let r: Result<LoadInfo, ControllerError> = Ok(LoadInfo {
            model: "stabilityai/sd-turbo".into(),
            device: "cpu".into(),
            duration_sec: 0.5,
        });
        let v = serde_json::to_value(Record(&r)).unwrap();
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["model"], json!("stabilityai/sd-turbo"));
        assert_eq!(v["device"], json!("cpu"));
        assert!(v.get("error").is_none());
    }

    #[test]
    fn absent_negative_prompt_is_omitted() {
        let g = Generation {
            task: Task::TextToImage,
            model: "m".into(),
            prompt: "p".into(),
            negative_prompt: None,
            width: 1,
            height: 1,
            steps: 1,
            guidance: 0.0,
            image_path: "a.png".into(),
            json_path: "a.json".into(),
            duration_sec: 0.0,
        };
        let v = serde_json::to_value(&g).unwrap();
        assert!(v.get("negative_prompt").is_none());
    }
}
