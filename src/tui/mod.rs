mod clipboard;
mod help;
mod state;

use crate::config::AppConfig;
use crate::logging::{Console, LogSink};
use crate::model::{AppEvent, ModelInfo, Task};
use crate::orchestrator::{self, Controllers, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{Field, UiState, TAB_HELP, TAB_WORKSPACE};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing_subscriber::filter::LevelFilter;

pub async fn run(cfg: AppConfig) -> Result<()> {
    // Unbounded channels: the UI thread never blocks on a send.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let (log_tx, log_rx) = mpsc::unbounded_channel::<String>();

    let log = LogSink::new(&cfg.log_file, Console::Channel(log_tx), LevelFilter::INFO)?;
    log.info(format!(
        "Starting UI (outputs: {}, log: {})",
        cfg.output_dir.display(),
        cfg.log_file.display()
    ));
    let controllers = Controllers::from_config(&cfg, &log);

    // Model info is static; gather it before the orchestrator owns the controllers.
    let infos = [
        controllers.info(Task::TextToImage)?,
        controllers.info(Task::ImageClassification)?,
    ];

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(infos, log_rx, event_rx, cmd_tx));

    let res = orchestrator::run_controller(controllers, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    log.info("UI closed");

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    infos: [ModelInfo; 2],
    mut log_rx: UnboundedReceiver<String>,
    mut event_rx: UnboundedReceiver<AppEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let _restore = RestoreTerminal;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(infos);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(line) = log_rx.try_recv() {
            state.push_console(line);
        }
        // Drain completions without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &cmd_tx) {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
                // Redraw right away so typing does not lag behind the tick.
                terminal.draw(|f| draw(f.area(), f, &state)).ok();
                last_tick = Instant::now();
            }
        }
    };

    res
}

/// Leaves raw mode and the alternate screen when the UI thread exits, on
/// every path out of `run_threaded`.
struct RestoreTerminal;

impl Drop for RestoreTerminal {
    fn drop(&mut self) {
        disable_raw_mode().ok();
        execute!(io::stdout(), LeaveAlternateScreen).ok();
    }
}

/// Apply one key press. Returns true when the user asked to quit.
fn handle_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) -> bool {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        return true;
    }

    // The error modal swallows everything until dismissed.
    if state.error.is_some() {
        if matches!(k.code, KeyCode::Esc | KeyCode::Enter) {
            state.dismiss_error();
        }
        return false;
    }

    if k.code == KeyCode::F(1) {
        state.tab = if state.tab == TAB_HELP {
            TAB_WORKSPACE
        } else {
            TAB_HELP
        };
        return false;
    }
    if state.tab == TAB_HELP {
        if k.code == KeyCode::Esc {
            state.tab = TAB_WORKSPACE;
        }
        return false;
    }

    let command = match (ctrl, k.code) {
        (true, KeyCode::Char('t')) => {
            state.toggle_task();
            None
        }
        (true, KeyCode::Char('l')) => state.request_load(),
        (true, KeyCode::Char('r')) | (false, KeyCode::Enter) => state.request_run(),
        (true, KeyCode::Char('x')) => {
            state.clear_output();
            None
        }
        (true, KeyCode::Char('u')) => {
            state.clear_field();
            None
        }
        (true, KeyCode::Char('y')) => {
            state.status = match state.copy_target() {
                Some(path) => match clipboard::copy_path(&path) {
                    Ok(()) => format!("Copied to clipboard: {}", path.display()),
                    Err(e) => format!("Clipboard copy failed: {e:#}"),
                },
                None => "Nothing to copy yet.".into(),
            };
            None
        }
        (false, KeyCode::Tab) => {
            state.cycle_focus(true);
            None
        }
        (_, KeyCode::BackTab) => {
            state.cycle_focus(false);
            None
        }
        (false, KeyCode::Backspace) => {
            state.backspace();
            None
        }
        (false, KeyCode::Char(c)) => {
            state.insert_char(c);
            None
        }
        _ => None,
    };
    if let Some(cmd) = command {
        let _ = cmd_tx.send(cmd);
    }
    false
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Workspace"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("tkai"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_WORKSPACE => draw_workspace(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }

    if let Some(msg) = &state.error {
        draw_error(area, f, msg);
    }
}

fn draw_workspace(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let fields = Field::for_task(state.task());
    let mut constraints = vec![Constraint::Length(7)];
    constraints.extend(fields.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(3));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    draw_model(rows[0], f, state);
    for (i, field) in fields.iter().enumerate() {
        draw_field(rows[1 + i], f, state, *field);
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(rows[rows.len() - 2]);
    draw_output(body[0], f, state);
    draw_console(body[1], f, state);

    draw_status(rows[rows.len() - 1], f, state);
}

fn draw_model(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let label = Style::default().fg(Color::Gray);
    let info = state.model_info();
    let task = state.task();

    let loaded = if state.app.is_loaded(task) {
        let device = state.app.loaded_device(task).unwrap_or("?");
        Span::styled(format!("yes ({device})"), Style::default().fg(Color::Green))
    } else {
        Span::styled("no (Ctrl-L to load)", Style::default().fg(Color::Red))
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("Task: ", label),
        Span::styled(
            task.display_name(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  (Ctrl-T to switch)", label),
    ])];
    lines.extend(info.entries().iter().map(|(key, value)| {
        Line::from(vec![
            Span::styled(format!("{key}: "), label),
            Span::raw(value.to_string()),
        ])
    }));
    lines.push(Line::from(vec![Span::styled("Loaded: ", label), loaded]));

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Model"));
    f.render_widget(p, area);
}

fn draw_field(area: Rect, f: &mut ratatui::Frame, state: &UiState, field: Field) {
    let focused = state.focus == field;
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    // Show the tail of long values so the cursor stays visible.
    let inner_width = area.width.saturating_sub(2) as usize;
    let value = state.field_value(field);
    let count = value.chars().count();
    let visible: String = if count >= inner_width {
        value
            .chars()
            .skip(count + 1 - inner_width.max(1))
            .collect()
    } else {
        value.to_string()
    };

    let p = Paragraph::new(visible.clone()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(field.title()),
    );
    f.render_widget(p, area);

    if focused && state.error.is_none() && state.tab == TAB_WORKSPACE {
        let x = area.x + 1 + visible.chars().count() as u16;
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_output(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let lines: Vec<Line> = if state.output.is_empty() {
        vec![Line::from(Span::styled(
            "Load a model (Ctrl-L), then run (Ctrl-R).",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        state.output.iter().map(|l| Line::from(l.as_str())).collect()
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Output"));
    f.render_widget(p, area);
}

fn draw_console(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let height = area.height.saturating_sub(2) as usize;
    let skip = state.console.len().saturating_sub(height);
    let lines: Vec<Line> = state
        .console
        .iter()
        .skip(skip)
        .map(|l| {
            let style = if l.contains("[ERROR]") {
                Style::default().fg(Color::Red)
            } else if l.contains("[WARN]") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(Span::styled(l.as_str(), style))
        })
        .collect();
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Console"));
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let color = if state.is_busy() {
        Color::Yellow
    } else if state.error.is_some() {
        Color::Red
    } else {
        Color::Green
    };
    let p = Paragraph::new(Line::from(vec![
        Span::styled(state.status.as_str(), Style::default().fg(color)),
        Span::styled(
            "   Ctrl-L load · Ctrl-R run · Ctrl-T task · F1 help · Ctrl-Q quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x.min(100)) / 100) as u16;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_error(area: Rect, f: &mut ratatui::Frame, msg: &str) {
    let rect = centered(area, 60, 9);
    let mut lines: Vec<Line> = msg.lines().map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press Esc or Enter to dismiss",
        Style::default().fg(Color::DarkGray),
    )));
    let p = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title("Error"),
    );
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}
