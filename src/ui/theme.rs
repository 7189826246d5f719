//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::app::SensorStatus;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and the selected panel border.
    pub highlight: Color,
    /// Color for alarmed sensors and the threshold line.
    pub alarm: Color,
    /// Color for sensors within range.
    pub normal: Color,
    /// Color for sensors with no reading yet.
    pub waiting: Color,
    /// Color for borders and axes.
    pub border: Color,
    /// Line colors for the sensor series, cycled by panel index.
    pub series: [Color; 4],
    /// Style for panel titles.
    pub header: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            alarm: Color::Red,
            normal: Color::Green,
            waiting: Color::Gray,
            border: Color::Gray,
            series: [Color::Cyan, Color::Yellow, Color::Magenta, Color::LightGreen],
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            alarm: Color::Red,
            normal: Color::Green,
            waiting: Color::DarkGray,
            border: Color::DarkGray,
            series: [Color::Blue, Color::Magenta, Color::Rgb(160, 90, 0), Color::Black],
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        // Use terminal-light crate to detect background luminance
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Line color for the panel at `index`.
    pub fn series_color(&self, index: usize) -> Color {
        self.series[index % self.series.len()]
    }

    /// Get style for a sensor status
    pub fn status_style(&self, status: SensorStatus) -> Style {
        match status {
            SensorStatus::Waiting => Style::default().fg(self.waiting),
            SensorStatus::Normal => Style::default().fg(self.normal),
            SensorStatus::Alarmed => Style::default().fg(self.alarm).add_modifier(Modifier::BOLD),
        }
    }
}
