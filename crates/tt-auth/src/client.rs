//! HTTP client for a GoTrue-compatible auth endpoint.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AuthError;
use crate::session::{Session, User};

/// Default request timeout for auth calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Auth service client.
///
/// The client is cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: Option<String>,
}

impl UserResponse {
    fn into_user(self) -> Result<User, AuthError> {
        let id = tt_core::UserId::new(self.id)
            .map_err(|err| AuthError::InvalidResponse(err.to_string()))?;
        Ok(User {
            id,
            email: self.email.unwrap_or_default(),
        })
    }
}

impl TokenResponse {
    fn into_session(self) -> Result<Session, AuthError> {
        let expires_at = self
            .expires_in
            .map(|seconds| Utc::now().timestamp() + seconds);
        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into_user()?,
        })
    }
}

impl AuthClient {
    /// Creates a client for the auth endpoint at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or API key is blank, or if the HTTP client
    /// fails to build.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AuthError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let api_key = api_key.into();

        if base_url.is_empty() {
            return Err(AuthError::InvalidConfig {
                reason: "auth URL cannot be empty",
            });
        }
        if api_key.trim().is_empty() {
            return Err(AuthError::InvalidConfig {
                reason: "auth API key cannot be empty",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(AuthError::ClientBuild)?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Exchanges email and password for a session.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let payload: TokenResponse = read_json(response).await?;
        payload.into_session()
    }

    /// Exchanges a refresh token for a new session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&RefreshGrant { refresh_token })
            .send()
            .await?;
        let payload: TokenResponse = read_json(response).await?;
        payload.into_session()
    }

    /// Fetches the user an access token belongs to.
    pub async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let payload: UserResponse = read_json(response).await?;
        payload.into_user()
    }

    /// Revokes the session behind an access token.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await?;
        Err(parse_api_error(status.as_u16(), &body))
    }
}

async fn read_json<T>(response: reqwest::Response) -> Result<T, AuthError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(parse_api_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|err| AuthError::InvalidResponse(err.to_string()))
}

/// Extracts the most specific message the service gave us.
fn parse_api_error(status: u16, body: &str) -> AuthError {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error_description: Option<String>,
        msg: Option<String>,
        message: Option<String>,
        error: Option<String>,
    }

    let message = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| {
            payload
                .error_description
                .or(payload.msg)
                .or(payload.message)
                .or(payload.error)
        })
        .unwrap_or_else(|| format!("status {status}: {body}"));
    AuthError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    const TOKEN_BODY: &str = r#"{
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": {"id": "user-1", "email": "sam@example.com"}
    }"#;

    #[test]
    fn client_rejects_blank_config() {
        assert!(matches!(
            AuthClient::new("", "key"),
            Err(AuthError::InvalidConfig { .. })
        ));
        assert!(matches!(
            AuthClient::new("https://auth.example.com", "   "),
            Err(AuthError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn client_debug_redacts_api_key() {
        let client = AuthClient::new("https://auth.example.com/", "secret-key").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("https://auth.example.com\""));
    }

    #[test]
    fn parse_api_error_prefers_description() {
        let err = parse_api_error(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert!(matches!(
            err,
            AuthError::Api { status: 400, ref message } if message == "Invalid login credentials"
        ));
    }

    #[test]
    fn parse_api_error_falls_back_to_body() {
        let err = parse_api_error(502, "bad gateway");
        assert_eq!(err.to_string(), "auth service error: status 502: bad gateway");
    }

    #[tokio::test]
    async fn sign_in_with_password_returns_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .match_header("apikey", "anon-key")
            .match_body(Matcher::Json(serde_json::json!({
                "email": "sam@example.com",
                "password": "hunter2"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let client = AuthClient::new(server.url(), "anon-key").unwrap();
        let session = client
            .sign_in_with_password("sam@example.com", "hunter2")
            .await
            .unwrap();

        assert_eq!(session.access_token, "access-1");
        assert_eq!(session.refresh_token, "refresh-1");
        assert_eq!(session.user.email, "sam@example.com");
        assert_eq!(session.user.id.as_str(), "user-1");
        assert!(session.expires_at.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sign_in_surfaces_rejection() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let client = AuthClient::new(server.url(), "anon-key").unwrap();
        let err = client
            .sign_in_with_password("sam@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[tokio::test]
    async fn get_user_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer access-1")
            .with_status(200)
            .with_body(r#"{"id":"user-1","email":"sam@example.com"}"#)
            .create_async()
            .await;

        let client = AuthClient::new(server.url(), "anon-key").unwrap();
        let user = client.get_user("access-1").await.unwrap();
        assert_eq!(user.email, "sam@example.com");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_response_is_invalid() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/user")
            .with_status(200)
            .with_body("not-json")
            .create_async()
            .await;

        let client = AuthClient::new(server.url(), "anon-key").unwrap();
        let err = client.get_user("access-1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }
}
