use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const KEYS: &[(&str, &str)] = &[
    ("Ctrl-T", "Switch task (Text-to-Image / Image Classification)"),
    ("Ctrl-L", "Load the selected model"),
    ("Ctrl-R / Enter", "Run the selected task"),
    ("Tab / Shift-Tab", "Move between input fields"),
    ("Ctrl-U", "Clear the focused field"),
    ("Ctrl-X", "Clear the output pane"),
    ("Ctrl-Y", "Copy the last output path to the clipboard"),
    ("Esc / Enter", "Dismiss an error"),
    ("F1", "Toggle this help"),
    ("Ctrl-Q / Ctrl-C", "Quit"),
];

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYS.iter().map(|(key, what)| {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{key:<16}"), Style::default().fg(Color::Magenta)),
            Span::raw(*what),
        ])
    }));
    lines.extend([
        Line::from(""),
        Line::from("Workflow:"),
        Line::from("  Load a model once, then run as often as you like. Generated images and"),
        Line::from("  their JSON metadata are written to the output directory. Leave the image"),
        Line::from("  path empty to classify the most recently generated image."),
    ]);

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
