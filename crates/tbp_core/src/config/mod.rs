//! Configuration for the transcription batch pipeline.
//!
//! This module provides:
//! - A strongly typed [`Settings`] struct loaded from TOML
//! - Environment overrides for machine-specific paths
//! - Fail-fast validation of required fields at load time
//! - Credential resolution (config value → environment → prompt)
//!
//! # Example
//!
//! ```no_run
//! use tbp_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new("config/pipeline.toml");
//! config.load().unwrap();
//!
//! println!("Input staging: {}", config.settings().input_dir().display());
//! ```

mod credentials;
mod manager;
mod settings;

pub use credentials::{
    CredentialResolver, NoPrompt, Secret, SecretPrompt, TerminalPrompt, GIT_TOKEN_ENV,
    SHARE_PASSWORD_ENV,
};
pub use manager::{apply_env_overrides, ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    EnvironmentSettings, GitSettings, LoggingSettings, PathSettings, PreparationCommand,
    PreparationSettings, PublishGate, SchedulerSettings, Settings, ShareBackend, ShareSettings,
    SheetSettings,
};
