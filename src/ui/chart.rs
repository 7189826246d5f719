//! Chart panel rendering.
//!
//! One panel per sensor, stacked vertically. Each panel plots the trailing
//! window of readings with the alarm threshold as a horizontal line.

use chrono::{DateTime, Local, TimeDelta, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_duration;
use crate::data::Series;

/// Render every sensor panel into `area`.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if app.sensor_ids.is_empty() {
        return;
    }

    let count = app.sensor_ids.len() as u32;
    let constraints: Vec<Constraint> =
        app.sensor_ids.iter().map(|_| Constraint::Ratio(1, count)).collect();
    let chunks = Layout::vertical(constraints).split(area);

    let now = Utc::now();
    let span = TimeDelta::from_std(app.window).unwrap_or(TimeDelta::hours(1));
    let origin = now - span;

    for (index, sensor_id) in app.sensor_ids.iter().enumerate() {
        render_panel(frame, app, chunks[index], index, sensor_id, origin, now);
    }
}

fn render_panel(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    index: usize,
    sensor_id: &str,
    origin: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    let status = app.sensor_status(sensor_id);
    let border_style = if index == app.selected {
        Style::default().fg(app.theme.highlight)
    } else {
        Style::default().fg(app.theme.border)
    };

    let latest = app
        .states
        .get(sensor_id)
        .map(|s| format!("{:.2}{}", s.value, app.unit))
        .unwrap_or_else(|| "-".to_string());
    let title = vec![
        Span::styled(format!(" {} ", sensor_id), app.theme.header),
        Span::raw(format!("last {} | ", format_duration(app.window))),
        Span::raw(format!("{} ", latest)),
        Span::styled(format!("{} ", status.symbol()), app.theme.status_style(status)),
    ];

    let block = Block::default()
        .title(ratatui::text::Line::from(title))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(border_style);

    let empty = Series::default();
    let series = app.series.get(sensor_id).unwrap_or(&empty);
    if series.is_empty() {
        let paragraph = Paragraph::new("Waiting for readings...")
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let points = series.chart_points(origin);
    let x_max = (now - origin).num_milliseconds() as f64 / 1000.0;
    let threshold_line = [(0.0, app.threshold), (x_max, app.threshold)];
    let y_bounds = series.value_bounds(app.threshold).unwrap_or(app.value_range);

    let datasets = vec![
        Dataset::default()
            .name(sensor_id.to_string())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(app.theme.series_color(index)))
            .data(&points),
        Dataset::default()
            .name(format!("alarm > {:.1}", app.threshold))
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(app.theme.alarm).add_modifier(Modifier::DIM))
            .data(&threshold_line),
    ];

    let x_labels = vec![
        time_label(origin),
        time_label(origin + (now - origin) / 2),
        time_label(now),
    ];
    let y_labels = vec![
        format!("{:.1}", y_bounds[0]),
        format!("{:.1}", (y_bounds[0] + y_bounds[1]) / 2.0),
        format!("{:.1}", y_bounds[1]),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(app.theme.border))
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title(format!("Temp ({})", app.unit))
                .style(Style::default().fg(app.theme.border))
                .bounds(y_bounds)
                .labels(y_labels),
        );

    frame.render_widget(chart, area);
}

fn time_label(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}
