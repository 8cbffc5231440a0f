//! Repository configuration: `BRIG_PATH`/`BRIG_PORT` environment
//! variables (spec.md §6), plus an optional `brig.toml` for settings
//! the environment doesn't cover. `toml` is already in the retrieval
//! pack's dependency set (`yuja-jj`'s config loader); using it here
//! keeps config parsing off hand-rolled ini-style code.

use serde::Deserialize;
use std::{env, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid BRIG_PORT value: {0}")]
    InvalidPort(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const DEFAULT_PORT: u16 = 6666;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum CipherChoice {
    #[serde(rename = "aes256gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20poly1305")]
    ChaCha20Poly1305,
}

impl From<CipherChoice> for crate::bit::CipherId {
    fn from(choice: CipherChoice) -> Self {
        match choice {
            CipherChoice::Aes256Gcm => crate::bit::CipherId::Aes256Gcm,
            CipherChoice::ChaCha20Poly1305 => crate::bit::CipherId::ChaCha20Poly1305,
        }
    }
}

/// Settings that only make sense in `brig.toml` (not sensibly
/// expressed as an environment variable): cipher selection and the
/// chunk read cache size.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
struct FileSettings {
    cipher: CipherChoice,
    chunk_cache_size: usize,
}

impl Default for FileSettings {
    fn default() -> Self {
        FileSettings {
            cipher: CipherChoice::Aes256Gcm,
            chunk_cache_size: 256,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub repo_path: PathBuf,
    pub port: u16,
    pub cipher: CipherChoice,
    pub chunk_cache_size: usize,
}

impl Config {
    /// Reads `BRIG_PATH`/`BRIG_PORT`, defaulting to `./.brig` and
    /// `6666` respectively, then layers `<repo_path>/brig.toml` over
    /// the defaults if present.
    pub fn load() -> Result<Self> {
        let repo_path = env::var("BRIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".brig"));

        let port = match env::var("BRIG_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let settings = Self::load_file_settings(&repo_path)?;

        Ok(Config {
            repo_path,
            port,
            cipher: settings.cipher,
            chunk_cache_size: settings.chunk_cache_size,
        })
    }

    fn load_file_settings(repo_path: &std::path::Path) -> Result<FileSettings> {
        let config_path = repo_path.join("brig.toml");
        if !config_path.exists() {
            return Ok(FileSettings::default());
        }

        let raw = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })
    }
}
