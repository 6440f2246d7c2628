use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::{Reply, Request, Ticket};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Malformed(e.to_string())
    }
}

/// Only the session handle is used; timing comes from the image endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartResponse {
    pub session_hash: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageResponse {
    pub image_base64: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl ImageResponse {
    pub fn decode_image(&self) -> Result<Vec<u8>, ApiError> {
        STANDARD
            .decode(self.image_base64.trim())
            .map_err(|e| ApiError::Malformed(format!("image_base64: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnswerResponse {
    pub is_correct: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputResponse {
    /// Either a number or a server-side explanation such as "Undefined"
    pub y_value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Result payload; typed fields are read when present, the rest is kept raw
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub is_succeed: Option<bool>,
    pub clear_time: Option<f64>,
    pub correct_formula: Option<String>,
    pub raw: serde_json::Value,
}

impl GameResult {
    pub fn from_value(raw: serde_json::Value) -> Self {
        Self {
            is_succeed: raw.get("is_succeed").and_then(|v| v.as_bool()),
            clear_time: raw.get("clear_time").and_then(|v| v.as_f64()),
            correct_formula: raw
                .get("correct_formula")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw,
        }
    }
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    user_formula: &'a str,
}

#[derive(Serialize)]
struct InputRequest {
    x_value: f64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
}

/// The remote game backend
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn is_alive(&self, session: &str) -> Result<(), ApiError>;
    async fn start(&self) -> Result<StartResponse, ApiError>;
    async fn image(&self, session: &str) -> Result<ImageResponse, ApiError>;
    async fn answer(&self, session: &str, formula: &str) -> Result<AnswerResponse, ApiError>;
    async fn substitute(&self, session: &str, x: f64) -> Result<InputResponse, ApiError>;
    async fn chat(&self, session: &str, question: &str) -> Result<ChatResponse, ApiError>;
    async fn result(&self, session: &str) -> Result<GameResult, ApiError>;
}

/// reqwest-backed client for the FunGuessr REST API
pub struct HttpGameApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGameApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/game/{}", self.base_url, path)
    }

    async fn read(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), %body, "backend rejected request");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.read(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn is_alive(&self, session: &str) -> Result<(), ApiError> {
        debug!(session, "checking session liveness");
        self.read(self.client.get(self.url(&format!("{}/is_alive", session))))
            .await
            .map(|_| ())
    }

    async fn start(&self) -> Result<StartResponse, ApiError> {
        debug!("starting new game");
        self.read_json(self.client.post(self.url("start"))).await
    }

    async fn image(&self, session: &str) -> Result<ImageResponse, ApiError> {
        self.read_json(self.client.get(self.url(&format!("{}/image", session))))
            .await
    }

    async fn answer(&self, session: &str, formula: &str) -> Result<AnswerResponse, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("{}/answer", session)))
            .json(&AnswerRequest {
                user_formula: formula,
            });
        self.read_json(request).await
    }

    async fn substitute(&self, session: &str, x: f64) -> Result<InputResponse, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("{}/input", session)))
            .json(&InputRequest { x_value: x });
        self.read_json(request).await
    }

    async fn chat(&self, session: &str, question: &str) -> Result<ChatResponse, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("{}/chat", session)))
            .json(&ChatRequest { question });
        self.read_json(request).await
    }

    async fn result(&self, session: &str) -> Result<GameResult, ApiError> {
        let raw: serde_json::Value = self
            .read_json(self.client.get(self.url(&format!("{}/result", session))))
            .await?;
        Ok(GameResult::from_value(raw))
    }
}

/// Canned backend behaviour for `ScriptedApi`; `None` answers 404
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub session_hash: Option<String>,
    pub alive: bool,
    pub image: Option<ImageResponse>,
    /// Consumed front to back; an empty queue answers 404
    pub answers: VecDeque<AnswerResponse>,
    pub y_value: Option<serde_json::Value>,
    pub chat: Option<String>,
    pub result: Option<serde_json::Value>,
}

/// In-memory `GameApi` for headless tests; records every call it serves
#[derive(Debug, Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn update(&self, f: impl FnOnce(&mut Script)) {
        if let Ok(mut script) = self.script.lock() {
            f(&mut script);
        }
    }

    fn serve<T>(
        &self,
        call: String,
        pick: impl FnOnce(&mut Script) -> Option<T>,
    ) -> Result<T, ApiError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        let picked = self.script.lock().ok().and_then(|mut s| pick(&mut *s));
        picked.ok_or_else(|| ApiError::Status {
            status: 404,
            body: "Session not found".to_string(),
        })
    }
}

#[async_trait]
impl GameApi for ScriptedApi {
    async fn is_alive(&self, session: &str) -> Result<(), ApiError> {
        self.serve(format!("is_alive {}", session), |s| s.alive.then_some(()))
    }

    async fn start(&self) -> Result<StartResponse, ApiError> {
        self.serve("start".to_string(), |s| {
            s.session_hash
                .clone()
                .map(|session_hash| StartResponse { session_hash })
        })
    }

    async fn image(&self, session: &str) -> Result<ImageResponse, ApiError> {
        self.serve(format!("image {}", session), |s| s.image.clone())
    }

    async fn answer(&self, session: &str, formula: &str) -> Result<AnswerResponse, ApiError> {
        self.serve(format!("answer {} {}", session, formula), |s| s.answers.pop_front())
    }

    async fn substitute(&self, session: &str, x: f64) -> Result<InputResponse, ApiError> {
        self.serve(format!("input {} {}", session, x), |s| {
            s.y_value.clone().map(|y_value| InputResponse { y_value })
        })
    }

    async fn chat(&self, session: &str, question: &str) -> Result<ChatResponse, ApiError> {
        self.serve(format!("chat {} {}", session, question), |s| {
            s.chat.clone().map(|response| ChatResponse { response })
        })
    }

    async fn result(&self, session: &str) -> Result<GameResult, ApiError> {
        self.serve(format!("result {}", session), |s| {
            s.result.clone().map(GameResult::from_value)
        })
    }
}

/// A backend call issued from the UI thread and run on the async runtime
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Start,
    Alive(String),
    Image(String),
    Command { session: String, ticket: Ticket },
    Result(String),
}

/// Outcome of an `ApiCall`, posted back into the event queue
#[derive(Debug)]
pub enum ApiReply {
    Started(Result<StartResponse, ApiError>),
    Alive {
        session: String,
        outcome: Result<(), ApiError>,
    },
    Image {
        session: String,
        outcome: Result<ImageResponse, ApiError>,
    },
    Command {
        session: String,
        ticket: Ticket,
        outcome: Result<Reply, ApiError>,
    },
    Result {
        session: String,
        outcome: Result<GameResult, ApiError>,
    },
}

impl ApiCall {
    pub async fn perform(self, api: &dyn GameApi) -> ApiReply {
        match self {
            ApiCall::Start => ApiReply::Started(api.start().await),
            ApiCall::Alive(session) => {
                let outcome = api.is_alive(&session).await;
                ApiReply::Alive { session, outcome }
            }
            ApiCall::Image(session) => {
                let outcome = api.image(&session).await;
                ApiReply::Image { session, outcome }
            }
            ApiCall::Command { session, ticket } => {
                let outcome = match &ticket.request {
                    Request::Answer { formula } => {
                        api.answer(&session, formula).await.map(Reply::Answer)
                    }
                    Request::Substitute { x, .. } => {
                        api.substitute(&session, *x).await.map(Reply::Substitute)
                    }
                    Request::Chat { question } => {
                        api.chat(&session, question).await.map(Reply::Chat)
                    }
                };
                ApiReply::Command {
                    session,
                    ticket,
                    outcome,
                }
            }
            ApiCall::Result(session) => {
                let outcome = api.result(&session).await;
                ApiReply::Result { session, outcome }
            }
        }
    }
}
