use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use funguessr::{
    api::HttpGameApi,
    app::{App, AppSettings},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    route::Route,
    runtime::{CrosstermEventSource, FixedTicker, Runner, SystemClock},
    ui::screen::draw,
    TICK_RATE_MS,
};

/// terminal client for the FunGuessr timed function-guessing game
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Probe a hidden function f(x) by substituting values, question an AI analyst, and submit your formula before the clock runs out."
)]
pub struct Cli {
    /// base URL of the game server
    #[clap(short = 's', long)]
    server: Option<String>,

    /// request timeout in seconds
    #[clap(short = 't', long)]
    timeout: Option<u64>,

    /// join an existing session instead of starting at the home screen
    #[clap(long, conflicts_with = "result")]
    session: Option<String>,

    /// show the result of a finished session
    #[clap(long)]
    result: Option<String>,

    /// persist the effective server and timeout settings to the config file
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layer command line overrides on top of the stored config
    fn apply(&self, config: Config) -> Config {
        Config {
            server_url: self.server.clone().unwrap_or(config.server_url),
            request_timeout_secs: self.timeout.unwrap_or(config.request_timeout_secs),
            ..config
        }
    }

    fn initial_route(&self) -> Route {
        match (&self.session, &self.result) {
            (Some(id), _) => Route::Session(id.clone()),
            (None, Some(id)) => Route::Result(id.clone()),
            (None, None) => Route::Home,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    let log_path = init_logging(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), log = %log_path.display(), "funguessr starting");

    if cli.save_config {
        store.save(&config)?;
        info!(path = %store.path().display(), "saved config");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let api = HttpGameApi::new(&config.server_url, config.request_timeout())?;
    info!(server = %api.base_url(), "using game server");

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let mut app = App::new(
        Arc::new(api),
        Arc::new(SystemClock),
        runner.sender(),
        runtime.handle().clone(),
        AppSettings::default(),
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.navigate(cli.initial_route());
    let outcome = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    info!("funguessr exiting");
    outcome
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<CrosstermEventSource, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| draw(app, f))?;

        let event = runner.step();
        app.handle_event(event);

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// File-backed tracing; the terminal itself belongs to the TUI
fn init_logging(config: &Config) -> Result<PathBuf, Box<dyn Error>> {
    let path = AppDirs::log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match config.log_filter.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: log_filter '{}' is not a valid tracing filter ({}); falling back to 'info'",
                    config.log_filter, e
                );
                EnvFilter::new("info")
            }
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(path)
}
