//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Base URL of the auth service, e.g. `https://<project>.supabase.co/auth/v1`.
    #[serde(default)]
    pub auth_url: Option<String>,

    /// Public API key sent with every auth request.
    #[serde(default)]
    pub auth_api_key: Option<String>,

    /// Where the signed-in session is kept.
    pub session_path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("auth_url", &self.auth_url)
            .field(
                "auth_api_key",
                &self.auth_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_path", &self.session_path)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tt.db"),
            auth_url: None,
            auth_api_key: None,
            session_path: data_dir.join("session.json"),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(dirs_config_path().as_deref(), config_path).extract()
    }

    fn figment(config_dir: Option<&Path>, config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = config_dir {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TT_*)
        figment.merge(Env::prefixed("TT_"))
    }
}

/// Returns the platform-specific config directory for tt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tt"))
}

/// Returns the platform-specific data directory for tt.
///
/// On Linux: `~/.local/share/tt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_tt() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "tt");
    }

    #[test]
    fn test_default_config_uses_data_dir() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("tt.db"));
        assert_eq!(config.session_path, data_dir.join("session.json"));
        assert!(config.auth_url.is_none());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
            database_path = "/tmp/custom.db"
            auth_url = "https://auth.example.com"
            auth_api_key = "anon"
            "#,
        )
        .unwrap();

        let config: Config = Config::figment(None, Some(&path)).extract().unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.auth_url.as_deref(), Some("https://auth.example.com"));
        assert_eq!(config.auth_api_key.as_deref(), Some("anon"));
        assert_eq!(config.session_path, Config::default().session_path);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            auth_api_key: Some("super-secret".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
