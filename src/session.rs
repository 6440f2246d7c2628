use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};

use crate::api::{AnswerResponse, ApiError, ChatResponse, ImageResponse, InputResponse};
use crate::countdown::TimeWindow;
use crate::message::{Message, MessageLog};
use crate::route::Route;
use crate::util::format_value;

/// Delay between a terminal event and the follow-up navigation
pub const TRANSITION_DELAY: Duration = Duration::from_millis(1500);

const GAME_STARTED: &str =
    "Game started. Begin your analysis.\nA hint image will be shown when time is running low.";
const SESSION_INVALID: &str = "The session is invalid or has timed out.";
const COMMUNICATION_ERROR: &str = "A server communication error occurred.";
const HINT_REVEALED: &str = "⚠️ Emergency hint: time is almost up! Revealing the graph image.";
const TIME_UP: &str = "⏰ Time's up! Moving to the results screen...";
const CALCULATION_ERROR: &str = "Calculation error. Please enter a valid number.";
const AI_ERROR: &str = "Failed to get a response from the AI.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CommandKind {
    #[strum(to_string = "ANS")]
    Answer,
    #[strum(to_string = "INPUT")]
    Substitute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Command(CommandKind),
    Chat,
}

impl Default for InputMode {
    fn default() -> Self {
        InputMode::Command(CommandKind::Answer)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Answer { formula: String },
    /// `raw` is the text the player typed, echoed back in the result line
    Substitute { x: f64, raw: String },
    Chat { question: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Answer(AnswerResponse),
    Substitute(InputResponse),
    Chat(ChatResponse),
}

/// An in-flight command, stamped with the session epoch it was issued in
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub epoch: u64,
    pub request: Request,
}

/// Work the controller asks its host to perform
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchImage,
    Send(Ticket),
    StartCountdown,
    StopCountdown,
    Navigate { to: Route, after: Duration },
}

/// State and rules of one session screen.
///
/// Time is always passed in as epoch seconds so the controller never reads
/// the clock itself; every state change returns the effects the host must
/// carry out.
#[derive(Debug)]
pub struct SessionView {
    id: String,
    window: Option<TimeWindow>,
    image_png: Option<Vec<u8>>,
    image_uri: Option<String>,
    remaining: Option<u64>,
    revealed: bool,
    ended: bool,
    loading: bool,
    transition_started: bool,
    initialized: bool,
    epoch: u64,
    mode: InputMode,
    messages: MessageLog,
    transition_delay: Duration,
}

impl SessionView {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            window: None,
            image_png: None,
            image_uri: None,
            remaining: None,
            revealed: false,
            ended: false,
            loading: false,
            transition_started: false,
            initialized: false,
            epoch: 0,
            mode: InputMode::default(),
            messages: MessageLog::default(),
            transition_delay: TRANSITION_DELAY,
        }
    }

    pub fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = delay;
        self
    }

    /// Requests the session data. Only the first call has any effect.
    pub fn begin(&mut self) -> Vec<Effect> {
        if self.initialized {
            return vec![];
        }
        self.initialized = true;
        debug!(session = %self.id, "fetching session image");
        vec![Effect::FetchImage]
    }

    pub fn on_image(&mut self, outcome: Result<ImageResponse, ApiError>, now: f64) -> Vec<Effect> {
        let mut effects = vec![];
        if self.window.is_some() || self.ended {
            return effects;
        }

        let decoded = outcome.and_then(|resp| resp.decode_image().map(|png| (resp, png)));
        match decoded {
            Ok((resp, png)) => {
                let window = TimeWindow::new(resp.start_time, resp.end_time);
                let remaining = window.remaining(now);
                info!(session = %self.id, remaining, total = window.total(), "session loaded");

                self.image_uri = Some(format!("data:image/png;base64,{}", STANDARD.encode(&png)));
                self.image_png = Some(png);
                self.window = Some(window);
                self.remaining = Some(remaining);
                self.messages.push(Message::system(GAME_STARTED));

                if remaining == 0 {
                    self.finish(&mut effects);
                } else {
                    effects.push(Effect::StartCountdown);
                }
                self.evaluate(&mut effects);
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "failed to load session");
                let text = match e {
                    ApiError::Status { .. } => SESSION_INVALID,
                    _ => COMMUNICATION_ERROR,
                };
                self.messages.push(Message::error(text));
                self.finish(&mut effects);
                self.begin_transition(Route::Home, &mut effects);
            }
        }
        effects
    }

    /// Re-derives remaining time from the wall clock
    pub fn on_countdown(&mut self, now: f64) -> Vec<Effect> {
        let mut effects = vec![];
        if self.ended {
            return effects;
        }
        let Some(window) = self.window else {
            return effects;
        };

        let remaining = window.remaining(now);
        // a clock stepping backwards must not add time back
        self.remaining = Some(self.remaining.map_or(remaining, |r| r.min(remaining)));
        self.evaluate(&mut effects);
        effects
    }

    /// Returns `None` when the submission is rejected outright
    pub fn submit(&mut self, input: &str) -> Option<Vec<Effect>> {
        let text = input.trim();
        if text.is_empty() || self.loading || self.ended {
            return None;
        }

        let request = match self.mode {
            InputMode::Command(kind @ CommandKind::Answer) => {
                self.messages
                    .push(Message::user(format!("[COMMAND: {}] {}", kind, text)));
                Request::Answer {
                    formula: text.to_string(),
                }
            }
            InputMode::Command(kind @ CommandKind::Substitute) => {
                self.messages
                    .push(Message::user(format!("[COMMAND: {}] {}", kind, text)));
                match text.parse::<f64>() {
                    Ok(x) if x.is_finite() => Request::Substitute {
                        x,
                        raw: text.to_string(),
                    },
                    _ => {
                        debug!(input = text, "rejected non-numeric substitution");
                        self.messages.push(Message::error(CALCULATION_ERROR));
                        return Some(vec![]);
                    }
                }
            }
            InputMode::Chat => {
                self.messages.push(Message::user(text));
                Request::Chat {
                    question: text.to_string(),
                }
            }
        };

        self.loading = true;
        Some(vec![Effect::Send(Ticket {
            epoch: self.epoch,
            request,
        })])
    }

    pub fn on_reply(&mut self, ticket: Ticket, outcome: Result<Reply, ApiError>) -> Vec<Effect> {
        let mut effects = vec![];
        if ticket.epoch != self.epoch {
            debug!(session = %self.id, ticket = ticket.epoch, current = self.epoch, "discarding stale reply");
            return effects;
        }

        match (ticket.request, outcome) {
            (Request::Answer { .. }, Ok(Reply::Answer(resp))) => {
                if resp.is_correct {
                    info!(session = %self.id, "answer accepted");
                    self.messages
                        .push(Message::success(format!("🎉 {}", resp.message)));
                    self.finish(&mut effects);
                    self.begin_transition(Route::Result(self.id.clone()), &mut effects);
                } else {
                    self.messages
                        .push(Message::error(format!("❌ Incorrect... {}", resp.message)));
                }
            }
            (Request::Substitute { raw, .. }, Ok(Reply::Substitute(resp))) => {
                self.messages.push(Message::system(format!(
                    "📝 Result: f({}) = {}",
                    raw,
                    format_value(&resp.y_value)
                )));
            }
            (Request::Chat { .. }, Ok(Reply::Chat(resp))) => {
                self.messages.push(Message::ai(resp.response));
            }
            (Request::Substitute { .. }, Err(e)) => {
                warn!(error = %e, "substitution failed");
                self.messages.push(Message::error(CALCULATION_ERROR));
            }
            (Request::Chat { .. }, Err(e)) => {
                warn!(error = %e, "chat failed");
                self.messages.push(Message::error(AI_ERROR));
            }
            (request, outcome) => {
                if let Err(e) = outcome {
                    warn!(error = %e, "command failed");
                } else {
                    warn!(?request, "reply does not match request");
                }
                self.messages.push(Message::error(COMMUNICATION_ERROR));
            }
        }

        if !self.transition_started {
            self.loading = false;
        }
        effects
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            InputMode::Command(_) => InputMode::Chat,
            InputMode::Chat => InputMode::Command(CommandKind::Answer),
        };
    }

    /// Flips between answer and substitution; no-op in chat mode
    pub fn toggle_command(&mut self) {
        if self.controls_disabled() {
            return;
        }
        if let InputMode::Command(kind) = self.mode {
            self.mode = InputMode::Command(match kind {
                CommandKind::Answer => CommandKind::Substitute,
                CommandKind::Substitute => CommandKind::Answer,
            });
        }
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    fn finish(&mut self, effects: &mut Vec<Effect>) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.epoch += 1;
        effects.push(Effect::StopCountdown);
    }

    fn begin_transition(&mut self, to: Route, effects: &mut Vec<Effect>) -> bool {
        if self.transition_started {
            return false;
        }
        self.transition_started = true;
        info!(session = %self.id, to = %to.path(), "scheduling navigation");
        effects.push(Effect::Navigate {
            to,
            after: self.transition_delay,
        });
        true
    }

    fn evaluate(&mut self, effects: &mut Vec<Effect>) {
        let (Some(window), Some(remaining)) = (self.window, self.remaining) else {
            return;
        };

        if !self.revealed
            && remaining > 0
            && remaining as f64 <= window.reveal_threshold()
            && self.image_uri.is_some()
        {
            self.revealed = true;
            info!(session = %self.id, remaining, "revealing hint image");
            let uri = self.image_uri.clone().unwrap_or_default();
            self.messages.push(Message::image(HINT_REVEALED, uri));
        }

        if remaining == 0 {
            if !self.transition_started {
                self.finish(effects);
                self.messages.push(Message::error(TIME_UP));
                self.begin_transition(Route::Result(self.id.clone()), effects);
            } else {
                self.finish(effects);
            }
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.window
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn transition_started(&self) -> bool {
        self.transition_started
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    /// PNG bytes of the hint graph, available once revealed
    pub fn hint_png(&self) -> Option<&[u8]> {
        if self.revealed {
            self.image_png.as_deref()
        } else {
            None
        }
    }

    pub fn controls_disabled(&self) -> bool {
        self.loading || self.ended
    }
}
