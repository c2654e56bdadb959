//! Text summary builder for the output pane and text mode.
//!
//! This module formats human-readable lines from controller results.

use crate::model::{Classification, Generation, LoadInfo, ModelInfo, RunOutput, Task};
use std::time::Duration;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// `1.2345` seconds → `1s 235ms`.
fn elapsed(duration_sec: f64) -> String {
    let millis = (duration_sec.max(0.0) * 1000.0).round() as u64;
    if millis == 0 {
        return "<1ms".into();
    }
    humantime::format_duration(Duration::from_millis(millis)).to_string()
}

pub(crate) fn build_info_summary(info: &ModelInfo) -> TextSummary {
    TextSummary {
        lines: info
            .entries()
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect(),
    }
}

pub(crate) fn build_load_summary(task: Task, info: &LoadInfo) -> TextSummary {
    TextSummary {
        lines: vec![
            format!("{} model ready: {}", task.display_name(), info.model),
            format!("Device: {}", info.device),
            format!("Load time: {}", elapsed(info.duration_sec)),
        ],
    }
}

fn generation_lines(g: &Generation) -> Vec<String> {
    let mut lines = vec![
        format!("Model: {}", g.model),
        format!("Prompt: {}", g.prompt),
    ];
    if let Some(negative) = g.negative_prompt.as_deref() {
        lines.push(format!("Negative prompt: {negative}"));
    }
    lines.push(format!(
        "Size: {}x{} | steps {} | guidance {:.1}",
        g.width, g.height, g.steps, g.guidance
    ));
    lines.push(format!("Image: {}", g.image_path.display()));
    lines.push(format!("Metadata: {}", g.json_path.display()));
    lines.push(format!("Took: {}", elapsed(g.duration_sec)));
    lines
}

fn classification_lines(c: &Classification) -> Vec<String> {
    let mut lines = vec![
        format!("Model: {}", c.model),
        format!("Image: {}", c.image_path.display()),
    ];
    if c.predictions.is_empty() {
        lines.push("No predictions.".into());
    } else {
        lines.push(format!("Top-{} predictions:", c.predictions.len()));
        let width = c.predictions.iter().map(|p| p.label.chars().count()).max().unwrap_or(0);
        for (rank, p) in c.predictions.iter().enumerate() {
            lines.push(format!(
                "{:>2}. {:<width$}  {:>6.2}%",
                rank + 1,
                p.label,
                p.score * 100.0
            ));
        }
    }
    lines.push(format!("Metadata: {}", c.json_path.display()));
    lines.push(format!("Took: {}", elapsed(c.duration_sec)));
    lines
}

pub(crate) fn build_output_summary(output: &RunOutput) -> TextSummary {
    let lines = match output {
        RunOutput::Generation(g) => generation_lines(g),
        RunOutput::Classification(c) => classification_lines(c),
    };
    TextSummary { lines }
}
