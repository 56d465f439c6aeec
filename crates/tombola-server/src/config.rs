// Configuration loading and parsing (server.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use tombola_core::{DrawError, RoundConfig};

/// Operator password used when neither credentials.toml nor the environment
/// provides one.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Environment variable that overrides the configured operator password.
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerSection,
    pub round: RoundConfig,
    pub draw: DrawSection,
    pub admin_password: String,
}

impl Config {
    /// `bind:port` for the WebSocket listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire server.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    server: ServerSection,
    round: RoundSection,
    #[serde(default)]
    draw: DrawSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

#[derive(Debug, Clone, Deserialize)]
struct RoundSection {
    max: u32,
    touches_to_win: u32,
    winners_per_round: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrawSection {
    /// Timer-driven draw period in milliseconds; 0 disables the timer.
    #[serde(default)]
    pub auto_draw_interval_ms: u64,
    /// Generator seed. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub admin_password: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/server.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// This is the lower-level loading primitive: it neither copies defaults nor
/// reads the environment. Prefer `load_config()`.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- server.toml (required) ---
    let server_path = config_dir.join("server.toml");
    let server_text = read_file(&server_path)?;
    let server_file: ServerFile =
        toml::from_str(&server_text).map_err(|e| ConfigError::ParseError {
            path: server_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials: CredentialsConfig = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let round = RoundConfig::new(
        server_file.round.max,
        server_file.round.touches_to_win,
        server_file.round.winners_per_round,
    );

    let config = Config {
        server: server_file.server,
        round,
        draw: server_file.draw,
        admin_password: credentials
            .admin_password
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
    };

    validate(&config)?;

    Ok(config)
}

/// Files seeded into `config/` from `defaults/` on first start.
///
/// `credentials.toml` is never seeded. The operator writes it from
/// `credentials.toml.example`, or sets `ADMIN_PASSWORD`.
pub const SEEDED_FILES: &[&str] = &["server.toml"];

/// Seed the files in [`SEEDED_FILES`] that `config/` is missing. Returns the
/// files written. Without `defaults/`, an existing `config/` is used as is.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no defaults/ or config/ directory under {}; run from the server crate root",
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create {}: {e}", config_dir.display()),
    })?;

    let mut seeded = Vec::new();
    for name in SEEDED_FILES {
        let target = config_dir.join(name);
        if target.exists() {
            continue;
        }
        let source = defaults_dir.join(name);
        if !source.is_file() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("shipped default {} is missing", source.display()),
            });
        }
        std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to seed {}: {e}", target.display()),
        })?;
        info!("Seeded {} from defaults", target.display());
        seeded.push(target);
    }

    Ok(seeded)
}

/// Convenience wrapper: loads config relative to the current working
/// directory after copying defaults, then applies the `ADMIN_PASSWORD`
/// override.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = load_config_from(&cwd)?;
    if let Ok(password) = std::env::var(ADMIN_PASSWORD_ENV) {
        if !password.is_empty() {
            config.admin_password = password;
        }
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if let Err(DrawError::InvalidConfig { field, message }) = config.round.validate() {
        let field = match field {
            "touchesToWin" => "round.touches_to_win",
            "winnersPerRound" => "round.winners_per_round",
            "min" => "round.min",
            _ => "round.max",
        };
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message,
        });
    }

    if config.admin_password.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "credentials.admin_password".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
