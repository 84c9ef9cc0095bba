//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILWINDOW_CONFIG` (environment variable)
//! 2. `~/.config/mailwindow/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailwindow\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! `MAILWINDOW_IMAP_HOST`, `MAILWINDOW_IMAP_PORT`, `MAILWINDOW_IMAP_USER` and
//! `MAILWINDOW_IMAP_PASSWORD` override the file, so secrets can stay out of it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// IMAP server and credentials.
    pub imap: ImapConfig,
    /// Retry and timeout policy.
    pub fetch: FetchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// IMAP server and credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (IMAPS). `false` means plain TCP.
    pub tls: bool,
    /// Skip certificate verification. Only for self-signed test servers.
    pub accept_invalid_certs: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Mailbox to read, opened read-only.
    pub mailbox: String,
}

/// Retry and timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Messages returned when the caller does not ask for a number.
    pub default_limit: u32,
    /// Connection attempts per request.
    pub max_attempts: u32,
    /// Time budget of one attempt, in milliseconds.
    pub attempt_timeout_ms: u64,
    /// Pause between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// How long a timed-out attempt may spend closing its session, in milliseconds.
    pub teardown_grace_ms: u64,
}

/// Login credentials, present only when both parts are non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: "imap.qq.com".to_string(),
            port: 993,
            tls: true,
            accept_invalid_certs: false,
            user: None,
            password: None,
            mailbox: "INBOX".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_limit: 3,
            max_attempts: 2,
            attempt_timeout_ms: 5_000,
            retry_backoff_ms: 1_000,
            teardown_grace_ms: 1_000,
        }
    }
}

// ── Accessors ───────────────────────────────────────────────────

impl ImapConfig {
    /// Credentials, or `None` when the user or password is missing or blank.
    pub fn credentials(&self) -> Option<Credentials> {
        let user = self.user.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some(Credentials {
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }
}

impl FetchConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

// Never print the password.
impl std::fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("user", &self.user.as_deref().map(mask_user))
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &mask_user(&self.user))
            .finish_non_exhaustive()
    }
}

/// Hide most of a login: `"alice@example.com"` → `"ali***@example.com"`.
pub fn mask_user(user: &str) -> String {
    let (local, domain) = match user.split_once('@') {
        Some((local, domain)) => (local, Some(domain)),
        None => (user, None),
    };
    let visible: String = local.chars().take(3).collect();
    match domain {
        Some(domain) => format!("{visible}***@{domain}"),
        None => format!("{visible}***"),
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations, then apply environment
/// overrides.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    let mut config = config_file_path()
        .filter(|path| path.exists())
        .map(|path| load_config_from(&path))
        .unwrap_or_default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Apply `MAILWINDOW_IMAP_*` overrides looked up through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("MAILWINDOW_IMAP_HOST").filter(|h| !h.is_empty()) {
        config.imap.host = host;
    }
    if let Some(port) = lookup("MAILWINDOW_IMAP_PORT") {
        match port.parse() {
            Ok(port) => config.imap.port = port,
            Err(e) => tracing::warn!(value = %port, error = %e, "Ignoring invalid MAILWINDOW_IMAP_PORT"),
        }
    }
    if let Some(user) = lookup("MAILWINDOW_IMAP_USER") {
        config.imap.user = Some(user);
    }
    if let Some(password) = lookup("MAILWINDOW_IMAP_PASSWORD") {
        config.imap.password = Some(password);
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILWINDOW_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailwindow").join("config.toml"))
}

/// Return the directory for log files.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailwindow")
}
