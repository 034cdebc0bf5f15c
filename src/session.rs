//! Session lifecycle: a single-writer store over the token and user
//! persisted under the data directory. The token and user are kept in
//! separate files; the store only ever reports authenticated when both
//! are present, so a partial write never produces a half-logged-in state.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::api::{ApiClient, TokenCell};
use crate::types::{LoginRequest, LoginResponse, RegisterRequest, User};

const TOKEN_FILE: &str = "token";
const USER_FILE: &str = "user.json";

/// Where the store is in its lifecycle. `Unknown` only exists between
/// construction and `hydrate()`; commands must not render user-specific
/// state until hydration has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Anonymous,
    Authenticated,
}

pub struct SessionStore {
    dir: PathBuf,
    state: SessionState,
    user: Option<User>,
    token: TokenCell,
}

impl SessionStore {
    /// The store takes its directory and the shared token cell at
    /// construction, so tests can run against a temp dir and a private
    /// cell.
    pub fn new(dir: PathBuf, token: TokenCell) -> Self {
        Self {
            dir,
            state: SessionState::Unknown,
            user: None,
            token,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token AND user, never one alone.
    pub fn is_authenticated(&self) -> bool {
        self.token.borrow().is_some() && self.user.is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.clone()
    }

    /// Load any persisted session. Both files must exist and parse;
    /// anything partial is discarded so the next start is clean.
    pub fn hydrate(&mut self) {
        let token = fs::read_to_string(self.dir.join(TOKEN_FILE))
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let user = fs::read_to_string(self.dir.join(USER_FILE))
            .ok()
            .and_then(|raw| serde_json::from_str::<User>(&raw).ok());

        match (token, user) {
            (Some(token), Some(user)) => {
                *self.token.borrow_mut() = Some(token);
                self.user = Some(user);
                self.state = SessionState::Authenticated;
            }
            _ => {
                self.clear();
            }
        }
    }

    /// Exchange credentials for a session. On success both keys are
    /// persisted and the store flips to `Authenticated`; on failure
    /// nothing changes and the error carries the server's message.
    pub fn login(&mut self, api: &ApiClient, email: &str, password: &str) -> Result<User> {
        let resp: LoginResponse = api.post_auth(
            "/auth/login",
            &LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            },
        )?;

        self.persist(&resp.token, &resp.user)?;
        *self.token.borrow_mut() = Some(resp.token);
        self.user = Some(resp.user.clone());
        self.state = SessionState::Authenticated;
        Ok(resp.user)
    }

    /// Create the account, then log in with the same credentials. If the
    /// login leg fails the account still exists server-side; the error
    /// surfaces and no local state is written.
    pub fn register(
        &mut self,
        api: &ApiClient,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User> {
        let _created: User = api.post_auth(
            "/auth/register",
            &RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            },
        )?;
        self.login(api, email, password)
    }

    /// Local-only teardown. Never touches the network, always succeeds.
    pub fn logout(&mut self) {
        self.clear();
    }

    /// Same teardown as `logout`; the API client's unauthorized hook
    /// calls this when the server signals an expired session.
    pub fn expire(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        fs::remove_file(self.dir.join(TOKEN_FILE)).ok();
        fs::remove_file(self.dir.join(USER_FILE)).ok();
        *self.token.borrow_mut() = None;
        self.user = None;
        self.state = SessionState::Anonymous;
    }

    fn persist(&self, token: &str, user: &User) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating session dir {}", self.dir.display()))?;
        fs::write(self.dir.join(TOKEN_FILE), token).context("writing session token")?;
        let raw = serde_json::to_string(user)?;
        fs::write(self.dir.join(USER_FILE), raw).context("writing session user")?;
        Ok(())
    }
}
