//! `tt login`, `tt logout` and `tt whoami`.

use std::io::Write;

use anyhow::{Context, Result};
use tt_auth::{Auth, AuthClient, FileSessionStore, SessionStore};

use crate::Config;

/// Builds the auth facade from configuration.
pub fn auth_from_config(config: &Config) -> Result<Auth<FileSessionStore>> {
    let (Some(url), Some(api_key)) = (&config.auth_url, &config.auth_api_key) else {
        anyhow::bail!(
            "Auth is not configured. Set auth_url and auth_api_key in ~/.config/tt/config.toml \
             or TT_AUTH_URL and TT_AUTH_API_KEY."
        );
    };
    let client = AuthClient::new(url.as_str(), api_key.as_str())
        .context("failed to create auth client")?;
    Ok(Auth::new(
        client,
        FileSessionStore::new(config.session_path.clone()),
    ))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")
}

pub async fn login_with<W, S>(
    writer: &mut W,
    auth: &Auth<S>,
    email: &str,
    password: &str,
) -> Result<()>
where
    W: Write,
    S: SessionStore,
{
    let user = auth
        .sign_in(email.trim(), password)
        .await
        .context("failed to sign in")?;
    writeln!(writer, "Logged in as {}", user.email)?;
    Ok(())
}

pub async fn logout_with<W, S>(writer: &mut W, auth: &Auth<S>) -> Result<()>
where
    W: Write,
    S: SessionStore,
{
    auth.sign_out().await.context("failed to sign out")?;
    writeln!(writer, "Logged out")?;
    Ok(())
}

/// Restores the persisted session and reports who it belongs to.
pub async fn whoami_with<W, S>(writer: &mut W, auth: &Auth<S>) -> Result<()>
where
    W: Write,
    S: SessionStore,
{
    match auth
        .init_auth_session()
        .await
        .context("failed to restore session")?
    {
        Some(user) => writeln!(writer, "Logged in as {} ({})", user.email, user.id)?,
        None => writeln!(writer, "Not logged in. Run 'tt login' to sign in.")?,
    }
    Ok(())
}

/// Runs `tt login`, prompting for whatever was not passed.
pub fn login<W: Write>(writer: &mut W, config: &Config, email: Option<&str>) -> Result<()> {
    let auth = auth_from_config(config)?;
    let runtime = runtime()?;

    if let Some(user) = runtime
        .block_on(auth.current_user())
        .context("failed to check current session")?
    {
        writeln!(
            writer,
            "Already logged in as {}. Run 'tt logout' first to switch accounts.",
            user.email
        )?;
        return Ok(());
    }

    let email = match email {
        Some(email) => email.to_string(),
        None => inquire::Text::new("Email:")
            .prompt()
            .context("failed to read email")?,
    };
    let password = inquire::Password::new("Password:")
        .without_confirmation()
        .prompt()
        .context("failed to read password")?;

    runtime.block_on(login_with(writer, &auth, &email, &password))
}

pub fn logout<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let auth = auth_from_config(config)?;
    runtime()?.block_on(logout_with(writer, &auth))
}

pub fn whoami<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let auth = auth_from_config(config)?;
    runtime()?.block_on(whoami_with(writer, &auth))
}
