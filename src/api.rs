//! HTTP access layer. Every backend call in the crate goes through
//! `ApiClient`, which owns the two cross-cutting policies: bearer-token
//! injection on the way out, and session teardown on any 401 on the way
//! back. Domain code never touches headers or the unauthorized hook.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::ErrorBody;

/// Shared cell holding the current bearer token. The session store writes
/// it, the client reads it per request.
pub type TokenCell = Rc<RefCell<Option<String>>>;

/// Errors surfaced by `ApiClient`. Messages are taken from the server's
/// error body when one is present, so they are displayable as-is.
#[derive(Debug)]
pub enum ApiError {
    /// The server returned 404 for the requested resource.
    NotFound,

    /// The server rejected the credentials or the bearer token.
    Unauthorized(String),

    /// Any other non-2xx status.
    Http { status: u16, message: String },

    /// The request never completed (DNS, connect, timeout).
    Transport(String),

    /// The response body did not match the expected shape.
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound => write!(f, "not found"),
            ApiError::Unauthorized(msg) => write!(f, "{msg}"),
            ApiError::Http { status, message } => write!(f, "{message} (HTTP {status})"),
            ApiError::Transport(msg) => write!(f, "request failed: {msg}"),
            ApiError::Decode(msg) => write!(f, "unexpected response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Pull a displayable message out of an error response body.
/// Prefers `error`, falls back to `message`, then to a generic line.
fn extract_message(body: &str, status: u16) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error
        .or(parsed.message)
        .unwrap_or_else(|| format!("request failed with status {status}"))
}

/// Single point of egress to the backend.
///
/// The unauthorized hook is injected at construction so the client stays
/// testable without the CLI attached. It fires on any 401 except those
/// from auth-endpoint calls, whose failures the caller renders inline.
pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
    token: TokenCell,
    on_unauthorized: Box<dyn Fn()>,
    verbose: bool,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        token: TokenCell,
        on_unauthorized: Box<dyn Fn()>,
        verbose: bool,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new(),
            token,
            on_unauthorized,
            verbose,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.request("GET", path, None, false)?;
        decode(&body)
    }

    pub fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<T, ApiError> {
        let body = self.request("POST", path, Some(to_value(payload)?), false)?;
        decode(&body)
    }

    /// POST with an empty body (the join endpoint carries everything in
    /// the path).
    pub fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.request("POST", path, None, false)?;
        decode(&body)
    }

    /// POST to an auth endpoint. A 401 here means bad credentials, not an
    /// expired session, so the unauthorized hook is suppressed and the
    /// error is returned for inline display.
    pub fn post_auth<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<T, ApiError> {
        let body = self.request("POST", path, Some(to_value(payload)?), true)?;
        decode(&body)
    }

    pub fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<T, ApiError> {
        let body = self.request("PUT", path, Some(to_value(payload)?), false)?;
        decode(&body)
    }

    pub fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request("DELETE", path, None, false)?;
        Ok(())
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        payload: Option<serde_json::Value>,
        auth_call: bool,
    ) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.agent.request(method, &url);

        if let Some(token) = self.token.borrow().as_deref() {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }

        let result = match payload {
            Some(json) => req.send_json(json),
            None => req.call(),
        };

        match result {
            Ok(resp) => {
                let status = resp.status();
                if self.verbose {
                    eprintln!("[http] {method} {path} -> {status}");
                }
                resp.into_string()
                    .map_err(|e| ApiError::Transport(e.to_string()))
            }
            Err(ureq::Error::Status(status, resp)) => {
                if self.verbose {
                    eprintln!("[http] {method} {path} -> {status}");
                }
                let body = resp.into_string().unwrap_or_default();
                let message = extract_message(&body, status);
                match status {
                    401 => {
                        if !auth_call {
                            (self.on_unauthorized)();
                        }
                        Err(ApiError::Unauthorized(message))
                    }
                    404 => Err(ApiError::NotFound),
                    _ => Err(ApiError::Http { status, message }),
                }
            }
            Err(ureq::Error::Transport(t)) => Err(ApiError::Transport(t.to_string())),
        }
    }
}

fn to_value(payload: &impl Serialize) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}
