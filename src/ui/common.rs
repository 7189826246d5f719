//! Common UI components: header bar, status bar and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, SensorStatus};

/// Render the header bar with per-sensor status.
///
/// Displays: overall status indicator, each sensor's latest value, and the
/// ingestion summary once every worker has stopped.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let worst = app
        .sensor_ids
        .iter()
        .map(|id| app.sensor_status(id))
        .max()
        .unwrap_or(SensorStatus::Waiting);

    let mut spans = vec![
        Span::styled(" ● ", app.theme.status_style(worst)),
        Span::styled("THERMOWATCH ", Style::default().add_modifier(Modifier::BOLD)),
    ];

    for id in &app.sensor_ids {
        let status = app.sensor_status(id);
        let value = app
            .states
            .get(id)
            .filter(|_| status != SensorStatus::Waiting)
            .map(|s| format!("{:.2}{}", s.value, app.unit))
            .unwrap_or_else(|| "-".to_string());
        spans.push(Span::raw("│ "));
        spans.push(Span::styled(format!("{} ", id), Style::default().add_modifier(Modifier::BOLD)));
        spans.push(Span::styled(format!("{} ", value), app.theme.status_style(status)));
    }

    if let Some(ref summary) = app.ingestion_summary {
        spans.push(Span::raw("│ "));
        spans.push(Span::styled(summary.clone(), Style::default().add_modifier(Modifier::DIM)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the status bar at the bottom.
///
/// Shows: store, time since last refresh, available controls.
/// Also displays temporary status messages and errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = "Tab:select r:refresh e:export ?:help q:quit";
    let status = if let Some(ref err) = app.load_error {
        format!(" Error: {} | {} | {}", err, app.store_description(), controls)
    } else if let Some(at) = app.last_refresh {
        format!(
            " {} | Updated {:.1}s ago | {}",
            app.store_description(),
            at.elapsed().as_secs_f64(),
            controls,
        )
    } else {
        " Loading... | q:quit".to_string()
    };

    let style = if app.load_error.is_some() {
        Style::default().fg(app.theme.alarm)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    frame.render_widget(Paragraph::new(status).style(style), area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the charts.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  Tab ↑/↓ j/k  Select panel"),
        Line::from("  Mouse wheel  Select panel"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  r          Refresh now"),
        Line::from("  e          Export window to JSON"),
        Line::from("  q Esc      Close display"),
        Line::from(""),
        Line::from(format!(
            "  Alarm above {:.1}{}, refresh every {}s",
            app.threshold,
            app.unit,
            app.refresh_interval.as_secs()
        )),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 46u16.min(area.width.saturating_sub(4));
    let help_height = 17u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
