use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use thermowatch::data::duration::parse_duration;
use thermowatch::{
    events, startup, ui, App, IngestionCoordinator, LogDisplay, Settings, Store,
    WindowedViewRefresher, WorkerReport,
};

/// Application log file, written inside the sensor log directory in TUI mode.
const LOG_FILE: &str = "thermowatch.log";

#[derive(Parser, Debug)]
#[command(name = "thermowatch")]
#[command(about = "Simulated temperature sensors with alarm detection and a live chart")]
struct Args {
    /// Configuration file (TOML). Defaults to thermowatch.toml if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Persist documents to this JSON file instead of keeping them in memory
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Directory for the per-sensor log files
    #[arg(short, long)]
    log_dir: Option<PathBuf>,

    /// Seed for the random generators (sensor i uses seed + i)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop each sensor after this many readings
    #[arg(long)]
    max_readings: Option<u64>,

    /// Stop ingestion after this long (e.g., "30s", "5m")
    #[arg(long)]
    run_for: Option<String>,

    /// Log each redraw instead of drawing the terminal chart
    #[arg(long)]
    headless: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded settings.
    fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(ref path) = self.store {
            settings.store.path = Some(path.clone());
        }
        if let Some(ref dir) = self.log_dir {
            settings.logs.dir = dir.clone();
        }
        if self.seed.is_some() {
            settings.sensors.seed = self.seed;
        }
        if self.max_readings.is_some() {
            settings.ingest.max_readings = self.max_readings;
        }
        if let Some(ref run_for) = self.run_for {
            let deadline = parse_duration(run_for).context("invalid --run-for")?;
            settings.ingest.run_for = Some(deadline);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings =
        Settings::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut settings)?;
    settings.validate()?;

    let rt = Runtime::new()?;

    // An unreachable store aborts before anything is written to disk.
    let ready = rt.block_on(startup(&settings)).context("startup failed")?;
    let store = ready.store;

    init_logging(&settings.logs.dir, args.headless)?;
    if ready.log_dir_created {
        info!(dir = %settings.logs.dir.display(), "created log directory");
    } else {
        info!(dir = %settings.logs.dir.display(), "log directory already exists");
    }
    info!(
        store = store.description(),
        sensors = ?settings.sensors.ids,
        "starting ingestion"
    );

    if args.headless {
        rt.block_on(run_headless(&settings, store))
    } else {
        run_tui(&rt, &settings, store)
    }
}

fn init_logging(log_dir: &Path, headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if headless {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init()
    } else {
        // The terminal belongs to the chart, so logs go to a file.
        let path = log_dir.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

/// Run ingestion with a display that only logs, until every worker stops.
async fn run_headless(settings: &Settings, store: Arc<dyn Store>) -> Result<()> {
    let coordinator = IngestionCoordinator::new(settings, store.clone());
    let cancel = coordinator.cancellation_token();
    let refresher = WindowedViewRefresher::from_settings(settings, store);

    let closed = CancellationToken::new();
    let mut display = LogDisplay::new(&settings.sensors.unit, closed.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling ingestion");
                cancel.cancel();
            }
        }
    });

    let ingestion = tokio::spawn(async move {
        let reports = coordinator.run().await;
        closed.cancel();
        reports
    });

    if !settings.view.wait_for_ingestion {
        refresher.run(&mut display).await;
    }

    let reports = ingestion.await.context("ingestion task failed")?;
    refresher.refresh(&mut display).await.context("final refresh failed")?;
    print_summary(&reports);
    Ok(())
}

/// Ingestion progress as seen from the TUI thread.
enum Ingestion {
    Running(JoinHandle<Vec<WorkerReport>>),
    Finished(Vec<WorkerReport>),
}

impl Ingestion {
    /// Collect the reports once every worker has stopped.
    ///
    /// Returns `true` only on the call that observes completion.
    fn collect(&mut self, rt: &Runtime) -> Result<bool> {
        let Ingestion::Running(handle) = self else {
            return Ok(false);
        };
        if !handle.is_finished() {
            return Ok(false);
        }
        let reports = rt.block_on(handle).context("ingestion task failed")?;
        *self = Ingestion::Finished(reports);
        Ok(true)
    }

    fn is_finished(&self) -> bool {
        matches!(self, Ingestion::Finished(_))
    }

    fn reports(&self) -> Option<&[WorkerReport]> {
        match self {
            Ingestion::Finished(reports) => Some(reports),
            Ingestion::Running(_) => None,
        }
    }

    /// Wait for the workers to stop and return their reports.
    fn finish(self, rt: &Runtime) -> Result<Vec<WorkerReport>> {
        match self {
            Ingestion::Running(handle) => rt.block_on(handle).context("ingestion task failed"),
            Ingestion::Finished(reports) => Ok(reports),
        }
    }
}

/// Run ingestion in the background and the chart in the foreground.
fn run_tui(rt: &Runtime, settings: &Settings, store: Arc<dyn Store>) -> Result<()> {
    let coordinator = IngestionCoordinator::new(settings, store.clone());
    let cancel = coordinator.cancellation_token();
    let refresher = WindowedViewRefresher::from_settings(settings, store.clone());
    let mut ingestion = Ingestion::Running(rt.spawn(coordinator.run()));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let mut app = App::new(settings, store.description());

    let result = run_app(
        &mut terminal,
        &mut app,
        rt,
        &refresher,
        &mut ingestion,
        settings.view.wait_for_ingestion,
    );

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    // Closing the display ends the run.
    cancel.cancel();
    let reports = ingestion.finish(rt)?;
    print_summary(&reports);

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    rt: &Runtime,
    refresher: &WindowedViewRefresher,
    ingestion: &mut Ingestion,
    wait_for_ingestion: bool,
) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        if ingestion.collect(rt)? {
            if let Some(reports) = ingestion.reports() {
                app.set_ingestion_finished(reports);
            }
        }

        // Refresh inline, so a slow query delays the next redraw instead of
        // overlapping it.
        let ready = !wait_for_ingestion || ingestion.is_finished();
        if ready && app.refresh_due() {
            let error = match rt.block_on(refresher.refresh(app)) {
                Ok(()) => None,
                Err(e) => {
                    warn!(error = %e, "refresh failed");
                    Some(e.to_string())
                }
            };
            app.mark_refreshed(error);
        }

        terminal.draw(|frame| {
            let area = frame.area();

            // Check for minimum terminal size
            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered =
                    ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5);
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Min(8),    // Chart panels
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::chart::render(frame, app, chunks[1]);
            ui::common::render_status_bar(frame, app, chunks[2]);

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse),
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }
    }

    info!("display closed");
    Ok(())
}

fn print_summary(reports: &[WorkerReport]) {
    for report in reports {
        if report.stop.is_failure() {
            error!(sensor = %report.sensor_id, stop = ?report.stop, "worker failed");
        }
        println!(
            "{}: {} readings, stopped: {:?}",
            report.sensor_id, report.readings, report.stop
        );
    }
}
