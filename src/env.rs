//! Environment variable substitution for credential values
//!
//! Credential fields in the configuration may reference environment variables
//! with the `${VAR_NAME}` syntax, so secrets can stay out of the config file.

use once_cell::sync::Lazy;
use regex::Regex;
use std::env;

use crate::error::{MountError, Result};

static VAR_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitute `${VAR_NAME}` references in a credential string.
///
/// Returns an error listing every missing variable rather than failing on the
/// first one, so a misconfigured environment is reported in one pass.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();
    let mut result = input.to_string();

    for caps in VAR_REFERENCE.captures_iter(input) {
        let reference = caps.get(0).unwrap().as_str();
        let name = caps.get(1).unwrap().as_str();

        match env::var(name) {
            Ok(value) => result = result.replace(reference, &value),
            Err(_) => {
                if !missing.contains(&name.to_string()) {
                    missing.push(name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(MountError::Config(format!(
            "missing environment variables: {}",
            missing.join(", ")
        )));
    }

    Ok(result)
}
