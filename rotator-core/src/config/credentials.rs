//! Tunnel credential lookup
//!
//! Credentials come from the `USERNAME` and `PASSWORD` environment variables,
//! optionally supplemented by a dotenv-style file. Process environment wins
//! over the file, and the process environment is never modified.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::CredentialError;
use crate::types::Credentials;

/// Environment variable holding the tunnel username
pub const USERNAME_VAR: &str = "USERNAME";

/// Environment variable holding the tunnel password
pub const PASSWORD_VAR: &str = "PASSWORD";

/// Env file consulted when none is given explicitly
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Load credentials from the process environment and an env file
///
/// An explicit `env_file` must exist. Without one, `.env` in the working
/// directory is read if present and silently skipped otherwise.
pub fn load_credentials(env_file: Option<&Path>) -> Result<Credentials, CredentialError> {
    let file_vars = match env_file {
        Some(path) => read_env_file(path)?,
        None => {
            let default = Path::new(DEFAULT_ENV_FILE);
            if default.is_file() {
                read_env_file(default)?
            } else {
                HashMap::new()
            }
        }
    };

    resolve_credentials(|var| std::env::var(var).ok(), &file_vars)
}

/// Parse a dotenv-style file into a map
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, CredentialError> {
    let env_file_error = |message: String| CredentialError::EnvFile {
        path: path.display().to_string(),
        message,
    };

    let iter = dotenvy::from_path_iter(path).map_err(|e| env_file_error(e.to_string()))?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| env_file_error(e.to_string()))?;
        vars.insert(key, value);
    }

    debug!("Read {} variables from env file {}", vars.len(), path.display());
    Ok(vars)
}

/// Combine an environment lookup with env file values
///
/// Empty values count as missing.
pub fn resolve_credentials<F>(
    lookup: F,
    file_vars: &HashMap<String, String>,
) -> Result<Credentials, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    let fetch = |var: &str| -> Result<String, CredentialError> {
        lookup(var)
            .filter(|value| !value.is_empty())
            .or_else(|| file_vars.get(var).filter(|v| !v.is_empty()).cloned())
            .ok_or_else(|| CredentialError::Missing {
                var: var.to_string(),
            })
    };

    let username = fetch(USERNAME_VAR)?;
    let password = fetch(PASSWORD_VAR)?;

    Ok(Credentials::new(username, password))
}
