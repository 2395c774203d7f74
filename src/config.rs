//! Runtime configuration
//!
//! Settings come from command-line flags first, then environment variables
//! (optionally sourced from a dotenv file), then built-in defaults.

use crate::credentials::CredentialSource;
use crate::storage::StagingStore;
use eyre::{Context, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Environment variable naming the staging directory
pub const STAGING_DIR_ENV: &str = "STAGEHAND_STAGING_DIR";

/// Staging directory used when nothing else is configured
pub const DEFAULT_STAGING_DIR: &str = "temp_data";

/// Source a dotenv file into the process environment.
///
/// A missing file is not an error; returns whether a file was read.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match dotenvy::from_filename(path) {
        Ok(_) => {
            log::debug!("Loaded environment from {}", path.display());
            Ok(true)
        }
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to read env file: {}", path.display())),
    }
}

/// Where staged files live and whether credentials may be prompted for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingConfig {
    pub staging_dir: PathBuf,
    pub interactive: bool,
}

impl StagingConfig {
    /// Resolve from flags and the environment
    pub fn resolve(staging_dir: Option<PathBuf>, no_input: bool) -> Self {
        let staging_dir = staging_dir
            .or_else(|| {
                std::env::var_os(STAGING_DIR_ENV)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR));
        let interactive = !no_input && std::io::stdin().is_terminal();
        Self {
            staging_dir,
            interactive,
        }
    }

    pub fn store(&self) -> StagingStore {
        StagingStore::new(&self.staging_dir)
    }

    pub fn credential_source(&self) -> CredentialSource {
        match self.interactive {
            true => CredentialSource::terminal(),
            false => CredentialSource::NonInteractive,
        }
    }
}
