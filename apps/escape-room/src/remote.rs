//! # Escape Room HTTP Client
//!
//! A `SessionGateway` that persists through a running escape room server,
//! the way a browser front end would.
//!
//! Uses the blocking reqwest client: the controller is synchronous and the
//! play loop runs off the async runtime.

use crate::api::types::{
    CreateSessionRequest, ErrorResponse, SessionJson, StageCompletionJson, StageRequest,
    UpdateSessionRequest,
};
use escape_core::{
    EscapeError, GameSession, NewSession, SessionGateway, SessionId, SessionUpdate,
    StageCompletion, StageCompletionInput,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client that wraps calls to the escape room REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    /// Create a client pointing at the given server URL.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, EscapeError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EscapeError::Gateway(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// The server this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional Bearer auth.
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Send a request and handle connection errors.
    fn send(&self, req: RequestBuilder) -> Result<Response, EscapeError> {
        req.send().map_err(|e| {
            EscapeError::Gateway(format!("Cannot connect to {}: {e}", self.base_url))
        })
    }

    /// Check the status code and decode the JSON body.
    ///
    /// `missing` names the session a 404 refers to.
    fn handle_response<T: DeserializeOwned>(
        resp: Response,
        missing: Option<SessionId>,
    ) -> Result<T, EscapeError> {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND
            && let Some(id) = missing
        {
            return Err(EscapeError::SessionNotFound(id));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(EscapeError::Gateway(
                "Unauthorized: invalid or missing API key".to_string(),
            ));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EscapeError::Gateway(
                "Rate limited: too many requests".to_string(),
            ));
        }
        if !status.is_success() {
            let message = resp
                .json::<ErrorResponse>()
                .map(|e| e.error)
                .unwrap_or_default();
            if status == StatusCode::BAD_REQUEST {
                return Err(EscapeError::Validation(message));
            }
            return Err(EscapeError::Gateway(format!(
                "Server error ({}): {message}",
                status.as_u16()
            )));
        }
        resp.json::<T>()
            .map_err(|e| EscapeError::DeserializationError(e.to_string()))
    }
}

impl SessionGateway for HttpGateway {
    fn create_session(&mut self, new: &NewSession) -> Result<SessionId, EscapeError> {
        let req = self
            .request(reqwest::Method::POST, "/game-sessions")
            .json(&CreateSessionRequest::from(new));
        let resp = self.send(req)?;
        let session: SessionJson = Self::handle_response(resp, None)?;
        Ok(SessionId(session.id))
    }

    fn update_session(
        &mut self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<GameSession, EscapeError> {
        let req = self
            .request(reqwest::Method::PUT, &format!("/game-sessions/{id}"))
            .json(&UpdateSessionRequest::from(update));
        let resp = self.send(req)?;
        let session: SessionJson = Self::handle_response(resp, Some(id))?;
        session.to_session()
    }

    fn upsert_stage_completion(
        &mut self,
        input: &StageCompletionInput,
    ) -> Result<StageCompletion, EscapeError> {
        let req = self
            .request(reqwest::Method::POST, "/stages")
            .json(&StageRequest::from(input));
        let resp = self.send(req)?;
        let stage: StageCompletionJson = Self::handle_response(resp, Some(input.game_session_id))?;
        Ok(stage.to_stage())
    }

    fn delete_session(&mut self, id: SessionId) -> Result<(), EscapeError> {
        let req = self.request(reqwest::Method::DELETE, &format!("/game-sessions/{id}"));
        let resp = self.send(req)?;
        let _: serde_json::Value = Self::handle_response(resp, Some(id))?;
        Ok(())
    }
}
