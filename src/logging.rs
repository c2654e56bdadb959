//! Append-only application log.
//!
//! A `LogSink` is built once at startup and cloned into every component that
//! logs. It owns a `tracing::Dispatch` that is never installed as the global
//! default: events are routed through it explicitly.

use anyhow::{Context, Result};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::fmt::{format, FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{filter::LevelFilter, Layer, Registry};

/// Where log lines are mirrored besides the log file.
pub enum Console {
    Stderr,
    /// One message per line, drained by the TUI console pane.
    Channel(UnboundedSender<String>),
    Silent,
}

/// `<YYYY-MM-DD HH:MM:SS,mmm> [<LEVEL>] <message>`
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} [{}] ", log_timestamp(), event.metadata().level())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second],[subsecond digits:3]"
    ))
    .unwrap_or_default()
}

#[derive(Clone)]
struct ChannelWriter(UnboundedSender<String>);

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        let _ = self.0.send(line.trim_end().to_string());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for ChannelWriter {
    type Writer = ChannelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[derive(Clone)]
pub struct LogSink {
    dispatch: Dispatch,
}

impl LogSink {
    /// Open (or create) `log_file` in append mode and mirror to `console`.
    pub fn new(log_file: &Path, console: Console, level: LevelFilter) -> Result<Self> {
        if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log directory {}", parent.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("open log file {}", log_file.display()))?;

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![
            tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed(),
        ];
        match console {
            Console::Stderr => layers.push(
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .boxed(),
            ),
            Console::Channel(tx) => layers.push(
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(false)
                    .with_writer(ChannelWriter(tx))
                    .boxed(),
            ),
            Console::Silent => {}
        }

        let subscriber = tracing_subscriber::registry().with(layers).with(level);
        Ok(Self {
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// A sink that drops everything.
    pub fn discard() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    pub fn debug(&self, msg: impl fmt::Display) {
        self.emit(Level::DEBUG, msg);
    }

    pub fn info(&self, msg: impl fmt::Display) {
        self.emit(Level::INFO, msg);
    }

    pub fn warn(&self, msg: impl fmt::Display) {
        self.emit(Level::WARN, msg);
    }

    pub fn error(&self, msg: impl fmt::Display) {
        self.emit(Level::ERROR, msg);
    }

    fn emit(&self, level: Level, msg: impl fmt::Display) {
        tracing::dispatcher::with_default(&self.dispatch, || match level {
            Level::ERROR => tracing::error!(target: "tkai", "{msg}"),
            Level::WARN => tracing::warn!(target: "tkai", "{msg}"),
            Level::INFO => tracing::info!(target: "tkai", "{msg}"),
            _ => tracing::debug!(target: "tkai", "{msg}"),
        });
    }
}
