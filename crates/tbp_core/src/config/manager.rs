//! Config manager for loading, validating and writing the settings file.
//!
//! Key features:
//! - Fail-fast validation on load (every missing field reported at once)
//! - Environment overrides for machine-specific paths
//! - Atomic writes (write to temp file, then rename)

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::settings::Settings;

/// Override for `paths.working_dir`.
pub const WORKING_DIR_ENV: &str = "TBP_WORKING_DIR";
/// Override for `paths.git_repo_path`.
pub const GIT_REPO_PATH_ENV: &str = "TBP_GIT_REPO_PATH";
/// Override for `paths.cache_dir`.
pub const CACHE_DIR_ENV: &str = "TBP_CACHE_DIR";

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("No {what} available: set it in the config, export {env_var}, or run interactively")]
    MissingCredential { what: String, env_var: String },
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages the pipeline configuration file.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Current settings loaded in memory.
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Take ownership of the loaded settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Load config from file, apply environment overrides and validate.
    ///
    /// Returns error if the file doesn't exist or any required field is
    /// missing.
    pub fn load(&mut self) -> ConfigResult<()> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit environment lookup.
    pub fn load_with_env(&mut self, env: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let settings = self.read_with_env(env)?;
        settings.validate().map_err(ConfigError::Invalid)?;

        self.settings = settings;
        Ok(())
    }

    /// Load without validating, for commands that need only part of the
    /// settings. A missing file yields the defaults.
    pub fn load_partial(&mut self) -> ConfigResult<()> {
        self.settings = match self.read_with_env(|key| std::env::var(key).ok()) {
            Ok(settings) => settings,
            Err(ConfigError::NotFound(_)) => {
                let mut settings = Settings::default();
                apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
                settings
            }
            Err(e) => return Err(e),
        };
        Ok(())
    }

    fn read_with_env(&self, env: impl Fn(&str) -> Option<String>) -> ConfigResult<Settings> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        let mut settings: Settings = toml::from_str(&content)?;
        apply_env_overrides(&mut settings, env);
        Ok(settings)
    }

    /// Write a commented default config file.
    ///
    /// Refuses to overwrite an existing file.
    pub fn create_default(&self) -> ConfigResult<()> {
        if self.config_path.exists() {
            return Err(ConfigError::ReadError(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", self.config_path.display()),
            )));
        }
        let content = generate_config_with_comments(&Settings::default())?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Ensure the working, cache and logs directories exist.
    ///
    /// Should be called after `load()`.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let dirs = [
            self.settings.working_dir(),
            self.settings.cache_dir(),
            self.settings.hf_cache_dir(),
            self.settings.nltk_cache_dir(),
            self.settings.logs_dir(),
        ];

        for dir in dirs {
            if !dir.exists() {
                fs::create_dir_all(&dir)?;
            }
        }

        if let Some(parent) = self.settings.git_repo_path().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(())
    }

    /// Write content to config file atomically.
    ///
    /// Writes to a temp file first, then renames.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

/// Apply machine-specific path overrides from the environment.
///
/// Credentials are not overridden here; they follow the
/// config → environment → prompt order in
/// [`CredentialResolver`](super::CredentialResolver).
pub fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(dir) = non_empty(WORKING_DIR_ENV) {
        settings.paths.working_dir = dir;
    }
    if let Some(path) = non_empty(GIT_REPO_PATH_ENV) {
        settings.paths.git_repo_path = Some(path);
    }
    if let Some(dir) = non_empty(CACHE_DIR_ENV) {
        settings.paths.cache_dir = dir;
    }
}

/// Render a config file with section comments and placeholder values for
/// the required fields.
fn generate_config_with_comments(settings: &Settings) -> ConfigResult<String> {
    let mut output = String::new();

    output.push_str("# Transcription batch pipeline configuration\n");
    output.push_str("# Fields left empty below are required.\n");
    output.push_str("# Secrets: leave share.password and git.token unset and export\n");
    output.push_str("# SMB_PASSWORD / GIT_TOKEN, or answer the prompt at run time.\n\n");

    let sections: [(&str, &str, String); 8] = [
        ("paths", "Working tree, staging and cache", toml::to_string_pretty(&settings.paths)?),
        ("share", "Remote file share holding one folder per work item", toml::to_string_pretty(&settings.share)?),
        ("sheet", "Spreadsheet listing work items (CSV export)", toml::to_string_pretty(&settings.sheet)?),
        ("scheduler", "Cluster scheduler; publish_gate = \"completed_only\" | \"always\"", toml::to_string_pretty(&settings.scheduler)?),
        ("git", "Repository receiving transcription outputs", toml::to_string_pretty(&settings.git)?),
        ("environment", "Environment modules loaded before the run (best effort)", toml::to_string_pretty(&settings.environment)?),
        ("preparation", "Model/data preparation; add [[preparation.commands]] entries", toml::to_string_pretty(&settings.preparation)?),
        ("logging", "Logging", toml::to_string_pretty(&settings.logging)?),
    ];

    for (name, comment, body) in sections {
        output.push_str(&format!("# {}\n[{}]\n", comment, name));
        for line in body.lines() {
            output.push_str(line);
            output.push('\n');
        }
        output.push('\n');
    }

    Ok(output)
}
