//! Terminal UI rendering using ratatui.
//!
//! ## Submodules
//!
//! - [`chart`]: One line chart per sensor over the trailing window
//! - [`common`]: Shared components (header, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Temp1 panel                          │
//! ├──────────────────────────────────────┤
//! │ Temp2 panel        (chart::render)   │
//! ├──────────────────────────────────────┤
//! │ Temp3 panel                          │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    common::render_help is drawn on top
//! ```

pub mod chart;
pub mod common;
pub mod theme;

pub use theme::Theme;
