//! Container options.
//!
//! Options can be built in code, read from prefixed environment variables,
//! or (with the `config` feature) parsed from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Environment prefix used by [`ContainerOptions::from_env`].
pub const ENV_PREFIX: &str = "DIBOX";

/// Behavior switches of a [`Container`](crate::Container).
///
/// # Examples
///
/// ```
/// use dibox::{Container, ContainerOptions};
///
/// let options = ContainerOptions::default().implicit_construction(false);
/// let container = Container::with_options(options);
/// assert!(!container.options().implicit_construction);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// Build unbound `Injectable` types from their own dependencies
    pub implicit_construction: bool,
    /// Log a warning when a container is dropped with undisposed instances
    pub warn_on_undisposed: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            implicit_construction: true,
            warn_on_undisposed: true,
        }
    }
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn implicit_construction(mut self, enabled: bool) -> Self {
        self.implicit_construction = enabled;
        self
    }

    pub fn warn_on_undisposed(mut self, enabled: bool) -> Self {
        self.warn_on_undisposed = enabled;
        self
    }

    /// Reads `DIBOX_IMPLICIT_CONSTRUCTION` and `DIBOX_WARN_ON_UNDISPOSED`.
    pub fn from_env() -> DiResult<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Reads `<PREFIX>_<OPTION>` variables; unset variables keep their
    /// default.
    pub fn from_env_with_prefix(prefix: &str) -> DiResult<Self> {
        let mut options = Self::default();
        if let Some(value) = env_flag(prefix, "implicit_construction")? {
            options.implicit_construction = value;
        }
        if let Some(value) = env_flag(prefix, "warn_on_undisposed")? {
            options.warn_on_undisposed = value;
        }
        Ok(options)
    }

    /// Parses options from JSON; missing fields keep their default.
    ///
    /// ```
    /// # #[cfg(feature = "config")]
    /// # {
    /// use dibox::ContainerOptions;
    ///
    /// let options = ContainerOptions::from_json_str(r#"{ "warn_on_undisposed": false }"#).unwrap();
    /// assert!(options.implicit_construction);
    /// assert!(!options.warn_on_undisposed);
    /// # }
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|err| DiError::Config(err.to_string()))
    }
}

fn env_flag(prefix: &str, option: &str) -> DiResult<Option<bool>> {
    let key = format!("{}_{}", prefix.to_uppercase(), option.to_uppercase());
    match env::var(&key) {
        Ok(value) => parse_flag(&value)
            .map(Some)
            .ok_or_else(|| DiError::Config(format!("{key} is not a boolean: '{value}'"))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ContainerOptions::new();
        assert!(options.implicit_construction);
        assert!(options.warn_on_undisposed);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_with_prefix() {
        env::set_var("DIBOX_TEST_ENV_IMPLICIT_CONSTRUCTION", "false");
        let options = ContainerOptions::from_env_with_prefix("dibox_test_env").unwrap();
        assert!(!options.implicit_construction);
        assert!(options.warn_on_undisposed);

        env::set_var("DIBOX_TEST_ENV_WARN_ON_UNDISPOSED", "sometimes");
        let err = ContainerOptions::from_env_with_prefix("dibox_test_env").unwrap_err();
        assert!(matches!(err, DiError::Config(_)));

        env::remove_var("DIBOX_TEST_ENV_IMPLICIT_CONSTRUCTION");
        env::remove_var("DIBOX_TEST_ENV_WARN_ON_UNDISPOSED");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_json_str() {
        let options = ContainerOptions::from_json_str(r#"{"implicit_construction": false}"#).unwrap();
        assert_eq!(options, ContainerOptions::default().implicit_construction(false));
        assert!(matches!(
            ContainerOptions::from_json_str("not json"),
            Err(DiError::Config(_))
        ));
    }
}
