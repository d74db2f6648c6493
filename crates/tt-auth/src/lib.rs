//! Hosted auth collaborator for the time tracker.
//!
//! Signs users in against a GoTrue-compatible service and keeps the issued
//! tokens on disk so later invocations can restore the session:
//! - [`AuthClient`] speaks HTTP to the service
//! - [`SessionStore`] persists tokens between runs
//! - [`Auth`] combines the two into sign-in, sign-out and restore

mod client;
mod session;

use std::io;

use thiserror::Error;

pub use client::AuthClient;
pub use session::{FileSessionStore, Session, SessionStore, User};

/// Auth errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The client was configured with a blank URL or key.
    #[error("invalid auth configuration: {reason}")]
    InvalidConfig { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed before a response arrived.
    #[error("auth request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service rejected the request.
    #[error("auth service error: {message}")]
    Api { status: u16, message: String },
    /// The service answered with something we could not parse.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
    #[error("failed to access session file: {0}")]
    SessionIo(#[from] io::Error),
    #[error("session file is corrupt: {0}")]
    SessionFormat(#[from] serde_json::Error),
}

impl AuthError {
    /// True when the service could not be reached at all.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// True when the service refused the credentials or token.
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Api {
                status: 400 | 401 | 403,
                ..
            }
        )
    }

    /// A user-facing hint for recognisable failures.
    pub const fn hint(&self) -> Option<&'static str> {
        if self.is_network() {
            Some("Could not reach the auth server. Check your network connection and auth_url.")
        } else if self.is_unauthorized() {
            Some("Your session is invalid or has expired. Run 'tt login' to sign in again.")
        } else {
            None
        }
    }
}

/// Sign-in state backed by an auth service and a session store.
#[derive(Debug)]
pub struct Auth<S> {
    client: AuthClient,
    sessions: S,
}

impl<S: SessionStore> Auth<S> {
    pub const fn new(client: AuthClient, sessions: S) -> Self {
        Self { client, sessions }
    }

    /// Signs in with email and password and persists the new session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let session = self.client.sign_in_with_password(email, password).await?;
        self.sessions.save(&session)?;
        tracing::info!(user = %session.user.id, "signed in");
        Ok(session.user)
    }

    /// Revokes the remote session when possible and always clears local tokens.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        match self.sessions.load() {
            Ok(Some(session)) => {
                if let Err(err) = self.client.logout(&session.access_token).await {
                    tracing::warn!(error = %err, "remote logout failed");
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "could not read session before logout"),
        }
        self.sessions.clear()?;
        tracing::info!("signed out");
        Ok(())
    }

    /// Returns the user behind the persisted access token.
    ///
    /// A rejected token reads as "nobody signed in"; other failures propagate.
    pub async fn current_user(&self) -> Result<Option<User>, AuthError> {
        let Some(session) = self.sessions.load()? else {
            return Ok(None);
        };
        match self.client.get_user(&session.access_token).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.is_unauthorized() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Restores the persisted session by refreshing it.
    ///
    /// The refreshed tokens are written back only if the access token
    /// changed. Any failure clears the persisted tokens and yields `None`.
    pub async fn init_auth_session(&self) -> Result<Option<User>, AuthError> {
        let stored = match self.sessions.load() {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable session");
                self.sessions.clear()?;
                return Ok(None);
            }
        };

        match self.client.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => {
                if refreshed.access_token != stored.access_token {
                    self.sessions.save(&refreshed)?;
                }
                tracing::debug!(user = %refreshed.user.id, "restored session");
                Ok(Some(refreshed.user))
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to restore session");
                self.sessions.clear()?;
                Ok(None)
            }
        }
    }
}
