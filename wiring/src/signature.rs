use std::any::type_name;

use serde_json::Value;

/// Returns the identifier the container uses for type `T`.
///
/// Works for concrete types as well as trait objects, so both
/// `id_of::<Actor>()` and `id_of::<dyn ActorInterface>()` are valid service ids.
pub fn id_of<T>() -> String
where
    T: ?Sized + 'static,
{
    type_name::<T>().to_string()
}

/// Ordered constructor parameters of a class or factory.
///
/// # Examples
///
/// ```rust
/// use wiring::{Parameter, Signature};
///
/// let signature = Signature::new()
///     .param("name")
///     .param(Parameter::new("age").with_default(26));
/// assert_eq!(signature.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Signature {
    parameters: Vec<Parameter>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter after the already declared ones.
    pub fn param(mut self, parameter: impl Into<Parameter>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Metadata of one constructor parameter.
///
/// A parameter with a declared type can be autowired; a nullable parameter or
/// one with a default value is optional and never fails resolution.
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    declared_type: Option<String>,
    default: Option<Value>,
    nullable: bool,
}

impl Parameter {
    /// Creates an untyped, required parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            default: None,
            nullable: false,
        }
    }

    /// Creates a parameter whose declared type is `T`.
    pub fn typed<T>(name: impl Into<String>) -> Self
    where
        T: ?Sized + 'static,
    {
        Self::new(name).with_type(id_of::<T>())
    }

    /// Sets the declared type to an arbitrary service identifier.
    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.declared_type = Some(type_id.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the parameter as accepting null.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_optional(&self) -> bool {
        self.nullable || self.default.is_some()
    }
}

impl From<&str> for Parameter {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Parameter {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
