use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use webbrowser::Browser;

use crate::api::{ApiCall, ApiReply, GameApi, GameResult};
use crate::app_dirs::AppDirs;
use crate::countdown::{CountdownTask, COUNTDOWN_PERIOD};
use crate::route::Route;
use crate::runtime::{Clock, GameEvent};
use crate::session::{Effect, SessionView, TRANSITION_DELAY};

const START_FAILED: &str = "Could not start the game. Check that the server is running.";
const SESSION_GONE: &str = "That session is not available any more.";
const RESULT_FAILED: &str = "Could not load the result for that session.";

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub countdown_period: Duration,
    pub transition_delay: Duration,
    pub hint_dir: PathBuf,
    /// Hand saved hint images to the system viewer
    pub open_hints: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            countdown_period: COUNTDOWN_PERIOD,
            transition_delay: TRANSITION_DELAY,
            hint_dir: AppDirs::hint_dir(),
            open_hints: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Home,
    Session,
    Result,
}

#[derive(Debug, Default)]
pub struct HomeState {
    pub starting: bool,
    pub notice: Option<String>,
}

#[derive(Debug)]
pub struct ResultState {
    pub session: String,
    pub result: Option<GameResult>,
}

pub struct App {
    pub state: AppState,
    pub home: HomeState,
    /// Session being entered or played; the view exists once liveness is confirmed
    pub session_id: Option<String>,
    pub session: Option<SessionView>,
    pub result: Option<ResultState>,
    pub input: String,
    /// Lines scrolled up from the bottom of the message log
    pub scroll: u16,
    /// Furthest `scroll` may go, written back by the renderer each frame
    scroll_limit: Cell<u16>,
    /// Transient status line on the session screen
    pub notice: Option<String>,
    pub should_quit: bool,
    api: Arc<dyn GameApi>,
    clock: Arc<dyn Clock>,
    events: Sender<GameEvent>,
    runtime: Handle,
    countdown: Option<CountdownTask>,
    settings: AppSettings,
}

impl App {
    pub fn new(
        api: Arc<dyn GameApi>,
        clock: Arc<dyn Clock>,
        events: Sender<GameEvent>,
        runtime: Handle,
        settings: AppSettings,
    ) -> Self {
        Self {
            state: AppState::Home,
            home: HomeState::default(),
            session_id: None,
            session: None,
            result: None,
            input: String::new(),
            scroll: 0,
            scroll_limit: Cell::new(0),
            notice: None,
            should_quit: false,
            api,
            clock,
            events,
            runtime,
            countdown: None,
            settings,
        }
    }

    pub fn handle_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::Key(key) => self.on_key(key),
            GameEvent::Resize | GameEvent::Tick => {}
            GameEvent::Countdown => {
                let now = self.clock.now();
                if let Some(view) = self.session.as_mut() {
                    let effects = view.on_countdown(now);
                    self.apply(effects);
                }
            }
            GameEvent::Api(reply) => self.on_reply(reply),
            GameEvent::Navigate(route) => self.navigate(route),
        }
    }

    pub fn set_scroll_limit(&self, limit: u16) {
        self.scroll_limit.set(limit);
    }

    fn scroll_up(&mut self, rows: u16) {
        self.scroll = self
            .scroll
            .saturating_add(rows)
            .min(self.scroll_limit.get());
    }

    // the log may have shrunk on screen since the last scroll
    fn scroll_down(&mut self, rows: u16) {
        self.scroll = self
            .scroll
            .min(self.scroll_limit.get())
            .saturating_sub(rows);
    }

    pub fn countdown_running(&self) -> bool {
        self.countdown.as_ref().is_some_and(|c| c.is_running())
    }

    pub fn navigate(&mut self, route: Route) {
        info!(to = %route.path(), "navigating");
        // leaving a screen drops its session, which cancels the countdown
        self.countdown = None;
        self.session = None;
        self.session_id = None;
        self.result = None;
        self.input.clear();
        self.scroll = 0;
        self.scroll_limit.set(0);
        self.notice = None;

        match route {
            Route::Home => {
                self.state = AppState::Home;
                self.home.starting = false;
            }
            Route::Session(id) => {
                self.state = AppState::Session;
                self.session_id = Some(id.clone());
                self.dispatch(ApiCall::Alive(id));
            }
            Route::Result(id) => {
                self.state = AppState::Result;
                self.result = Some(ResultState {
                    session: id.clone(),
                    result: None,
                });
                self.dispatch(ApiCall::Result(id));
            }
        }
    }

    pub fn start_game(&mut self) {
        if self.state != AppState::Home {
            self.navigate(Route::Home);
        }
        if self.home.starting {
            return;
        }
        self.home.starting = true;
        self.home.notice = None;
        self.dispatch(ApiCall::Start);
    }

    fn go_home(&mut self, notice: &str) {
        self.navigate(Route::Home);
        self.home.notice = Some(notice.to_string());
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            self.should_quit = true;
            return;
        }

        match self.state {
            AppState::Home => {
                if key.code == KeyCode::Enter {
                    self.start_game();
                }
            }
            AppState::Session => self.on_session_key(key),
            AppState::Result => match key.code {
                KeyCode::Enter | KeyCode::Char('n') => self.start_game(),
                KeyCode::Char('h') => self.navigate(Route::Home),
                _ => {}
            },
        }
    }

    fn on_session_key(&mut self, key: KeyEvent) {
        let Some(view) = self.session.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Enter => {
                if let Some(effects) = view.submit(&self.input) {
                    self.input.clear();
                    self.scroll = 0;
                    self.apply(effects);
                }
            }
            KeyCode::Tab => view.toggle_mode(),
            KeyCode::BackTab => view.toggle_command(),
            KeyCode::Backspace => {
                if !view.controls_disabled() {
                    self.input.pop();
                }
            }
            KeyCode::Up => self.scroll_up(1),
            KeyCode::Down => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(10),
            KeyCode::PageDown => self.scroll_down(10),
            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.open_hint();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if !view.controls_disabled() {
                    self.input.push(c);
                }
            }
            _ => {}
        }
    }

    fn on_reply(&mut self, reply: ApiReply) {
        match reply {
            ApiReply::Started(outcome) => {
                if self.state != AppState::Home || !self.home.starting {
                    debug!("ignoring start reply outside the home screen");
                    return;
                }
                match outcome {
                    Ok(resp) => {
                        info!(session = %resp.session_hash, "game started");
                        self.navigate(Route::Session(resp.session_hash));
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to start game");
                        self.home.starting = false;
                        self.home.notice = Some(START_FAILED.to_string());
                    }
                }
            }
            ApiReply::Alive { session, outcome } => {
                if self.session.is_some() || self.session_id.as_deref() != Some(session.as_str())
                {
                    debug!(%session, "ignoring stale liveness reply");
                    return;
                }
                match outcome {
                    Ok(()) => {
                        let mut view = SessionView::new(session)
                            .with_transition_delay(self.settings.transition_delay);
                        let effects = view.begin();
                        self.session = Some(view);
                        self.apply(effects);
                    }
                    Err(e) => {
                        warn!(%session, error = %e, "session is not alive");
                        self.go_home(SESSION_GONE);
                    }
                }
            }
            ApiReply::Image { session, outcome } => {
                let now = self.clock.now();
                if let Some(view) = self.current_view(&session) {
                    let effects = view.on_image(outcome, now);
                    self.apply(effects);
                }
            }
            ApiReply::Command {
                session,
                ticket,
                outcome,
            } => {
                if let Some(view) = self.current_view(&session) {
                    let effects = view.on_reply(ticket, outcome);
                    self.apply(effects);
                }
            }
            ApiReply::Result { session, outcome } => {
                let Some(state) = self.result.as_mut().filter(|r| r.session == session) else {
                    debug!(%session, "ignoring result for another session");
                    return;
                };
                match outcome {
                    Ok(result) => state.result = Some(result),
                    Err(e) => {
                        warn!(%session, error = %e, "failed to load result");
                        self.go_home(RESULT_FAILED);
                    }
                }
            }
        }
    }

    fn current_view(&mut self, session: &str) -> Option<&mut SessionView> {
        match self.session.as_mut() {
            Some(view) if view.id() == session => Some(view),
            _ => {
                debug!(session, "ignoring reply for an inactive session");
                None
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        let Some(session) = self.session.as_ref().map(|v| v.id().to_string()) else {
            return;
        };

        for effect in effects {
            match effect {
                Effect::FetchImage => self.dispatch(ApiCall::Image(session.clone())),
                Effect::Send(ticket) => self.dispatch(ApiCall::Command {
                    session: session.clone(),
                    ticket,
                }),
                Effect::StartCountdown => {
                    self.countdown = Some(CountdownTask::spawn(
                        &self.runtime,
                        self.events.clone(),
                        self.settings.countdown_period,
                    ));
                }
                Effect::StopCountdown => {
                    if let Some(mut countdown) = self.countdown.take() {
                        countdown.cancel();
                    }
                }
                Effect::Navigate { to, after } => self.schedule(to, after),
            }
        }
    }

    fn dispatch(&self, call: ApiCall) {
        debug!(?call, "dispatching");
        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let reply = call.perform(api.as_ref()).await;
            let _ = events.send(GameEvent::Api(reply));
        });
    }

    fn schedule(&self, to: Route, after: Duration) {
        let events = self.events.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(GameEvent::Navigate(to));
        });
    }

    fn open_hint(&mut self) {
        let Some(view) = self.session.as_ref() else {
            return;
        };
        let Some(png) = view.hint_png() else {
            self.notice = Some("No hint image has been revealed yet.".to_string());
            return;
        };

        match save_hint(&self.settings.hint_dir, view.id(), png) {
            Ok(path) => {
                info!(path = %path.display(), "saved hint image");
                self.notice = Some(format!("Hint saved to {}", path.display()));
                if self.settings.open_hints && Browser::is_available() {
                    if let Err(e) = webbrowser::open(&format!("file://{}", path.display())) {
                        warn!(error = %e, "could not open hint image");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "could not save hint image");
                self.notice = Some("Could not save the hint image.".to_string());
            }
        }
    }
}

/// Writes the hint graph as `<session>.png` under `dir`
pub fn save_hint(dir: &Path, session: &str, png: &[u8]) -> io::Result<PathBuf> {
    let name: String = session
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let name = if name.is_empty() { "hint".to_string() } else { name };

    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.png", name));
    fs::write(&path, png)?;
    Ok(path)
}
