//! Environment variable helpers used by the `Default` impls of config structs.
//!
//! Blank values are treated the same as unset ones.

use crate::PlatformError;
use std::{str::FromStr, time::Duration};

/// Read a variable, trimming whitespace. Unset or blank yields `None`.
#[must_use]
pub fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a variable or fall back to `default`.
#[must_use]
pub fn var_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_string())
}

/// Read and parse a variable.
///
/// # Errors
///
/// Returns [`PlatformError::InvalidInput`] naming the variable when the value
/// does not parse.
pub fn parse<T>(key: &str) -> Result<Option<T>, PlatformError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| PlatformError::invalid_input(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

/// Read a whole number of seconds as a [`Duration`].
///
/// # Errors
///
/// Same as [`parse`].
pub fn duration_secs(key: &str) -> Result<Option<Duration>, PlatformError> {
    Ok(parse::<u64>(key)?.map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys are unique per test so parallel tests don't observe each other.

    #[test]
    fn test_unset_var_is_none() {
        assert_eq!(var("SUBHUB_TEST_ENV_NEVER_SET"), None);
        assert_eq!(var_or("SUBHUB_TEST_ENV_NEVER_SET", "fallback"), "fallback");
    }

    #[test]
    fn test_parse_missing_is_ok_none() {
        let parsed: Option<u64> = parse("SUBHUB_TEST_ENV_PARSE_MISSING").unwrap();
        assert!(parsed.is_none());
        assert!(duration_secs("SUBHUB_TEST_ENV_PARSE_MISSING").unwrap().is_none());
    }
}
