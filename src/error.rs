//! Error types for the dependency injection container.

use thiserror::Error;

/// Dependency injection errors
///
/// Represents the error conditions that can occur while registering
/// bindings, resolving instances, or tearing the container down.
///
/// # Examples
///
/// ```rust
/// use dibox::{Container, DiError};
///
/// struct Missing;
///
/// let container = Container::new();
/// match container.get::<Missing>() {
///     Err(DiError::NotFound { type_name, .. }) => {
///         assert!(type_name.ends_with("Missing"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No exact, predicate or implicit binding matches the request
    #[error("No binding found for ({type_name}, {})", display_name(.name))]
    NoBindingFound {
        type_name: String,
        name: Option<String>,
    },
    /// A `bind` call supplied a malformed combination of arguments
    #[error("Ambiguous binding spec: {0}")]
    AmbiguousBindingSpec(&'static str),
    /// A factory asked for an argument that was neither resolved nor bound
    #[error("Missing required argument '{param}' for {factory}")]
    MissingRequiredArgument {
        param: String,
        factory: &'static str,
    },
    /// A synchronous call was made on a record that only has an async factory
    #[error("Synchronous call is not supported by async factory for {0}")]
    SyncCallOnAsyncFactory(String),
    /// Lookup-only access found no created instance
    #[error("Instance of ({type_name}, {}) is not found", display_name(.name))]
    NotFound {
        type_name: String,
        name: Option<String>,
    },
    /// Type downcast failed
    #[error("Type mismatch for {param}: expected {expected}")]
    TypeMismatch {
        expected: &'static str,
        param: String,
    },
    /// A user factory reported a failure
    #[error("Factory failed: {0}")]
    Factory(String),
    /// A start or close capability reported a failure
    #[error("Lifecycle {phase} failed for {type_name}: {message}")]
    Lifecycle {
        type_name: &'static str,
        phase: &'static str,
        message: String,
    },
    /// Container options could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// One or more instances failed to close
    #[error("Teardown failed for {} instance(s): {}", .0.len(), join_errors(.0))]
    Teardown(Vec<DiError>),
}

impl DiError {
    /// Wraps an arbitrary error raised inside a factory.
    ///
    /// ```rust
    /// use dibox::DiError;
    ///
    /// let err = DiError::factory("connection refused");
    /// assert_eq!(err.to_string(), "Factory failed: connection refused");
    /// ```
    pub fn factory(err: impl std::fmt::Display) -> Self {
        DiError::Factory(err.to_string())
    }

    pub(crate) fn lifecycle(type_name: &'static str, phase: &'static str, err: &DiError) -> Self {
        DiError::Lifecycle {
            type_name,
            phase,
            message: err.to_string(),
        }
    }
}

fn display_name(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or("None")
}

fn join_errors(errors: &[DiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for DI operations
///
/// A convenience alias for `Result<T, DiError>` used throughout dibox.
///
/// ```rust
/// use dibox::{DiResult, DiError};
///
/// fn lookup() -> DiResult<u32> {
///     Err(DiError::factory("not wired yet"))
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
