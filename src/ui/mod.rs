use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{App, Popup};
use crate::charts;
use crate::config::ThemeOverrides;
use crate::render::{Element, StatLine};
use crate::theme::Theme;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Apply config overrides; only the first call has any effect
pub fn init_theme(overrides: &ThemeOverrides) {
    let _ = THEME.set(Theme::from_overrides(overrides));
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Length(3), // Symbol input
            Constraint::Min(4),    // Result region
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    draw_info_line(f, app, chunks[0]);
    draw_input_box(f, app, chunks[1]);
    draw_result_box(f, app, chunks[2]);
    draw_footer(f, chunks[3]);

    if app.popup == Popup::Help {
        draw_help_popup(f, app);
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    // Priority: pending request > status message > endpoint
    let line = if let Some(ref symbol) = app.pending {
        Line::from(vec![
            Span::styled("󰔟 ", Style::default().fg(warning())),
            Span::styled(format!("Fetching {}…", symbol), Style::default().fg(text())),
        ])
    } else if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status.as_str(), Style::default().fg(warning())))
    } else {
        Line::from(Span::styled(app.endpoint(), Style::default().fg(text_dim())))
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_input_box(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(Span::styled(
            " Symbol ",
            Style::default().fg(accent()).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    let line = if app.input.is_empty() {
        Line::from(vec![
            Span::styled(" ", Style::default()),
            Span::styled("e.g. AAPL", Style::default().fg(inactive())),
        ])
    } else {
        Line::from(vec![
            Span::styled(" ", Style::default()),
            Span::styled(app.input.as_str(), Style::default().fg(text()).add_modifier(Modifier::BOLD)),
            Span::styled("▏", Style::default().fg(accent())),
        ])
    };

    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_result_box(f: &mut Frame, app: &App, area: Rect) {
    let title = match &app.region_symbol {
        Some(symbol) => format!(" {} ", symbol),
        None => " Result ".to_string(),
    };
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(header()).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(inactive()));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.region.is_empty() {
        let hint = Paragraph::new(Line::from(Span::styled(
            "Type a ticker symbol and press Enter",
            Style::default().fg(text_dim()),
        )))
        .alignment(Alignment::Center);
        f.render_widget(hint, inner);
        return;
    }

    let stats: Option<&Vec<StatLine>> = app.region.elements().iter().find_map(|e| match e {
        Element::Stats(lines) => Some(lines),
        _ => None,
    });
    let stats_height = stats.map(|s| s.len() as u16 + 1).unwrap_or(0);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(stats_height), Constraint::Min(0)])
        .split(inner);

    if let Some(stats) = stats {
        draw_stats_table(f, stats, chunks[0]);
    }

    let mut lines = Vec::new();
    let mut chart = 0;
    for element in app.region.elements() {
        match element {
            Element::Stats(_) => {}
            Element::Image { src } => {
                chart += 1;
                lines.push(Line::from(vec![
                    Span::styled(" 󰄨 ", Style::default().fg(accent())),
                    Span::styled(format!("Chart {}  ", chart), Style::default().fg(text())),
                    Span::styled(charts::describe(src), Style::default().fg(text_dim())),
                ]));
            }
            Element::Error { message } => {
                lines.push(Line::from(vec![
                    Span::styled(" Error: ", Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
                    Span::styled(message.as_str(), Style::default().fg(danger())),
                ]));
            }
        }
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[1]);
}

fn draw_stats_table(f: &mut Frame, stats: &[StatLine], area: Rect) {
    let rows: Vec<Row> = stats
        .iter()
        .map(|stat| {
            Row::new(vec![
                Span::styled(format!(" {}:", stat.label), Style::default().fg(text_dim())),
                Span::styled(stat.value.as_str(), Style::default().fg(success())),
            ])
        })
        .collect();

    let table = Table::new(rows, [Constraint::Length(10), Constraint::Min(10)]);
    f.render_widget(table, area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let hints: [(&str, &str); 5] = [
        ("Enter", "Submit"),
        ("↑↓", "Recent"),
        ("^S", "Save charts"),
        ("?", "Help"),
        ("^Q", "Quit"),
    ];

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 3 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    f.render_widget(Paragraph::new(Line::from(hint_spans)).alignment(Alignment::Center), area);
}

fn draw_help_popup(f: &mut Frame, app: &App) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 70 },
        if area.height < 30 { 95 } else { 70 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().fg(header()).add_modifier(Modifier::BOLD)))
    };
    let entry = |key: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(key, Style::default().fg(accent())),
            Span::raw(desc),
        ])
    };

    let help_text = vec![
        section("═══ Form ═══"),
        entry("  A-Z 0-9 . - ^ =  ", "Type a ticker symbol"),
        entry("  Enter            ", "Submit the symbol"),
        entry("  Backspace/Esc    ", "Delete a character / clear input"),
        entry("  ↑/↓              ", "Cycle through recent symbols"),
        Line::from(""),
        section("═══ Results ═══"),
        entry("  Ctrl-S           ", "Save charts of the current result"),
        Line::from(vec![
            Span::raw("                     to "),
            Span::styled(app.config.chart_dir().display().to_string(), Style::default().fg(text_dim())),
        ]),
        entry("  ?                ", "Show this help"),
        entry("  Ctrl-Q / Ctrl-C  ", "Quit"),
        Line::from(""),
        section("═══ Quick Start ═══"),
        entry("  tickerpane                  ", "Launch this TUI"),
        entry("  tickerpane --symbol AAPL    ", "Print one result and exit"),
        entry("  tickerpane -s AAPL --html   ", "Print the result as HTML"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" 󰋖 tickerpane Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::render::{render, StatValue, Stats, SubmissionResult};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn test_app() -> App {
        App::new(AppConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..AppConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_draw_empty_region_shows_hint() {
        let app = test_app();
        let out = screen(&app);
        assert!(out.contains("Type a ticker symbol"));
        assert!(out.contains("127.0.0.1:9/get-stock-data"));
        assert!(out.contains("^S Save charts"));
        assert!(out.contains("^Q Quit"));
    }

    #[test]
    fn test_draw_success_shows_stats_and_charts() {
        let mut app = test_app();
        render(
            &mut app.region,
            &SubmissionResult::Success {
                stats: Some(Stats {
                    mean: Some(StatValue::Number(150.5)),
                    max: Some(StatValue::Number(180.0)),
                    ..Stats::default()
                }),
                images: vec!["u1".to_string(), "u2".to_string()],
            },
        );
        app.region_symbol = Some("AAPL".to_string());

        let out = screen(&app);
        assert!(out.contains("AAPL"));
        assert!(out.contains("Mean:"));
        assert!(out.contains("150.5"));
        assert!(out.contains("Chart 1"));
        assert!(out.contains("Chart 2"));
        assert!(!out.contains("Error:"));
    }

    #[test]
    fn test_draw_failure_and_pending() {
        let mut app = test_app();
        render(
            &mut app.region,
            &SubmissionResult::Failure {
                message: Some("bad ticker".to_string()),
            },
        );
        app.pending = Some("MSFT".to_string());

        let out = screen(&app);
        assert!(out.contains("Error: bad ticker"));
        assert!(out.contains("Fetching MSFT"));
    }

    #[test]
    fn test_draw_help_popup() {
        let mut app = test_app();
        app.popup = Popup::Help;
        assert!(screen(&app).contains("tickerpane Help"));
    }
}
