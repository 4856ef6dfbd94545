//! Secrets and credential resolution.

use std::fmt;
use std::io;

use super::manager::{ConfigError, ConfigResult};

/// Environment variable consulted for the share password.
pub const SHARE_PASSWORD_ENV: &str = "SMB_PASSWORD";
/// Environment variable consulted for the git access token.
pub const GIT_TOKEN_ENV: &str = "GIT_TOKEN";

/// A credential that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value. Only hand this to the component that needs it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

/// Asks a human for a secret.
pub trait SecretPrompt: Send + Sync {
    fn prompt(&self, label: &str) -> io::Result<String>;
}

/// Reads a secret from the controlling terminal without echo.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn prompt(&self, label: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("{}: ", label))
    }
}

/// Non-interactive runs: never prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl SecretPrompt for NoPrompt {
    fn prompt(&self, _label: &str) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "interactive prompt disabled",
        ))
    }
}

/// Resolves credentials as config value → environment variable → prompt.
pub struct CredentialResolver {
    prompt: Box<dyn SecretPrompt>,
    env: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl CredentialResolver {
    /// Resolver reading the process environment.
    pub fn new(prompt: impl SecretPrompt + 'static) -> Self {
        Self::with_env(prompt, |key| std::env::var(key).ok())
    }

    pub fn with_env(
        prompt: impl SecretPrompt + 'static,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            prompt: Box::new(prompt),
            env: Box::new(env),
        }
    }

    /// Resolve one credential.
    ///
    /// `what` names the credential in the prompt and in the error.
    pub fn resolve(
        &self,
        configured: Option<&str>,
        env_var: &str,
        what: &str,
    ) -> ConfigResult<Secret> {
        if let Some(value) = configured.filter(|v| !v.is_empty()) {
            return Ok(Secret::new(value));
        }

        if let Some(value) = (self.env)(env_var).filter(|v| !v.is_empty()) {
            tracing::debug!("Using {} from ${}", what, env_var);
            return Ok(Secret::new(value));
        }

        let missing = || ConfigError::MissingCredential {
            what: what.to_string(),
            env_var: env_var.to_string(),
        };

        match self.prompt.prompt(what) {
            Ok(value) if !value.is_empty() => Ok(Secret::new(value)),
            Ok(_) => Err(missing()),
            Err(e) => {
                tracing::debug!("Prompt for {} unavailable: {}", what, e);
                Err(missing())
            }
        }
    }
}
