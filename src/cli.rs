use crate::config::{default_models_dir, AppConfig, DEFAULTS, DEFAULT_IMAGE_SERVER};
use crate::error::ControllerError;
use crate::logging::{Console, LogSink};
use crate::model::{ClassifyArgs, GenerateArgs, LoadInfo, Record, RunOutput, RunRequest, Task};
use crate::orchestrator::Controllers;
use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::filter::LevelFilter;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "tkai",
    version,
    about = "Text-to-image generation and image classification with a terminal UI"
)]
pub struct Cli {
    /// Task for headless runs
    #[arg(long, value_enum, default_value = "text-to-image")]
    pub task: Task,

    /// Prompt for text-to-image
    #[arg(long, default_value = "")]
    pub prompt: String,

    /// Negative prompt for text-to-image (empty to disable)
    #[arg(long, default_value = crate::config::DEFAULT_NEGATIVE_PROMPT)]
    pub negative_prompt: String,

    /// Image to classify
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Image width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Number of inference steps
    #[arg(long)]
    pub steps: Option<u32>,

    /// Classifier-free guidance scale
    #[arg(long)]
    pub guidance: Option<f32>,

    /// Number of predictions to keep
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Print JSON result and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Directory for generated images and metadata
    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Append-only log file
    #[arg(long, default_value = "logs/app.log")]
    pub log_file: PathBuf,

    /// Base URL of an OpenAI-compatible image generation server
    #[arg(long, default_value = DEFAULT_IMAGE_SERVER)]
    pub image_server: String,

    /// Directory holding ONNX classifier exports (default: <data dir>/tkai/models)
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Device label reported for the image server
    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// Text-to-image model identifier
    #[arg(long, default_value = DEFAULTS.t2i_model)]
    pub t2i_model: String,

    /// Image classification model identifier
    #[arg(long, default_value = DEFAULTS.clf_model)]
    pub clf_model: String,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow!("--json and --text are mutually exclusive"));
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(build_config(&args)).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }

    run_text(args).await
}

/// Build an `AppConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> AppConfig {
    AppConfig {
        output_dir: args.output_dir.clone(),
        log_file: args.log_file.clone(),
        t2i_model: args.t2i_model.clone(),
        clf_model: args.clf_model.clone(),
        image_server: args.image_server.clone(),
        models_dir: args.models_dir.clone().unwrap_or_else(default_models_dir),
        device: args.device.clone(),
    }
}

/// The single request a headless run executes.
pub fn build_request(args: &Cli) -> RunRequest {
    match args.task {
        Task::TextToImage => RunRequest::Generate(GenerateArgs {
            prompt: args.prompt.clone(),
            negative_prompt: args.negative_prompt.clone(),
            width: args.width,
            height: args.height,
            steps: args.steps,
            guidance: args.guidance,
        }),
        Task::ImageClassification => RunRequest::Classify(ClassifyArgs {
            image_path: args.image.clone().unwrap_or_default(),
            top_k: args.top_k,
        }),
    }
}

/// Both results of a headless load + run cycle.
struct Cycle {
    load: Result<LoadInfo, ControllerError>,
    run: Result<RunOutput, ControllerError>,
}

#[derive(Serialize)]
struct CycleRecord<'a> {
    load: Record<'a, LoadInfo>,
    run: Record<'a, RunOutput>,
}

impl Cycle {
    fn record(&self) -> CycleRecord<'_> {
        CycleRecord {
            load: Record(&self.load),
            run: Record(&self.run),
        }
    }
}

/// Load the task's model and run one request. A failed load is not fatal
/// here: the run then reports "not loaded" on its own.
async fn load_and_run(controllers: &Controllers, request: RunRequest) -> Cycle {
    let load = controllers.load(request.task()).await;
    let run = controllers.run(request).await;
    Cycle { load, run }
}

async fn run_json(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let log = LogSink::new(&cfg.log_file, Console::Silent, LevelFilter::INFO)?;
    let controllers = Controllers::from_config(&cfg, &log);

    let cycle = load_and_run(&controllers, build_request(&args)).await;
    let out = serde_json::to_string_pretty(&cycle.record())?;
    println!("{out}");

    cycle
        .run
        .map(|_| ())
        .map_err(|e| anyhow!("{} failed: {e}", args.task.display_name()))
}

async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let log = LogSink::new(&cfg.log_file, Console::Stderr, LevelFilter::INFO)?;
    let controllers = Controllers::from_config(&cfg, &log);
    let (out_tx, out_handle) = spawn_output_writer();

    let info = controllers.info(args.task)?;
    for line in crate::text_summary::build_info_summary(&info).lines {
        let _ = out_tx.send(OutputLine::Stderr(line));
    }

    let cycle = load_and_run(&controllers, build_request(&args)).await;
    if let Ok(loaded) = &cycle.load {
        for line in crate::text_summary::build_load_summary(args.task, loaded).lines {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }
    let res = match &cycle.run {
        Ok(output) => {
            for line in crate::text_summary::build_output_summary(output).lines {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
            Ok(())
        }
        Err(e) => Err(anyhow!("{} failed: {e}", args.task.display_name())),
    };

    drop(out_tx);
    let _ = out_handle.await;
    res
}
