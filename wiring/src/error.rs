use std::fmt;

/// Type alias for boxed errors that can be sent across threads.
///
/// Constructors and factories report failures with this type; the container
/// wraps them into [`ContainerError::Construction`].
pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while resolving services from a [`Container`](crate::Container).
#[derive(Debug)]
pub enum ContainerError {
    /// The identifier has no definition, no alias, no binding and is not a known class.
    NotFound(String),
    /// A placeholder could not be substituted from the parameter store.
    Config(String),
    /// A required constructor parameter cannot be satisfied.
    DependencyInjection {
        id: String,
        parameter: String,
        reason: String,
    },
    /// Resolution re-entered an identifier that is still being built.
    CircularDependency(Vec<String>),
    /// The constructor or factory itself returned an error.
    Construction { id: String, source: StdError },
    /// The resolved service cannot be viewed as the requested type.
    TypeMismatch { id: String, expected: &'static str },
}

impl ContainerError {
    pub(crate) fn not_defined(path: &str) -> Self {
        Self::Config(format!("`{path}` is not defined"))
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::NotFound(id) => write!(f, "Service `{id}` is not found"),
            ContainerError::Config(message) => write!(f, "Config error: {message}"),
            ContainerError::DependencyInjection {
                id,
                parameter,
                reason,
            } => write!(
                f,
                "Cannot resolve parameter `{parameter}` of `{id}`: {reason}"
            ),
            ContainerError::CircularDependency(path) => {
                write!(f, "Circular dependency detected: {}", path.join(" -> "))
            }
            ContainerError::Construction { id, source } => {
                write!(f, "Cannot construct `{id}`: {source}")
            }
            ContainerError::TypeMismatch { id, expected } => {
                write!(f, "Service `{id}` is not of type `{expected}`")
            }
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContainerError::Construction { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
