use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Class, Instance, Parameter, ResolvedArguments, Signature, StdError};

/// Marker forcing an argument to be resolved as another service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference(String);

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// A configured argument override.
///
/// JSON values may contain `%path%` placeholders; references are resolved
/// through the container; lists and maps may nest both.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    Value(Value),
    Reference(Reference),
    List(Vec<Argument>),
    Map(BTreeMap<String, Argument>),
}

macro_rules! argument_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Argument::Value(value.into())
                }
            }
        )*
    };
}

argument_from_value!(Value, &str, String, bool, i32, i64, u32, u64, f64);

impl From<Reference> for Argument {
    fn from(value: Reference) -> Self {
        Argument::Reference(value)
    }
}

impl From<Vec<Argument>> for Argument {
    fn from(value: Vec<Argument>) -> Self {
        Argument::List(value)
    }
}

impl From<BTreeMap<String, Argument>> for Argument {
    fn from(value: BTreeMap<String, Argument>) -> Self {
        Argument::Map(value)
    }
}

/// Key of an argument override: a constructor parameter's position or name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArgumentKey {
    Index(usize),
    Name(String),
}

impl From<usize> for ArgumentKey {
    fn from(value: usize) -> Self {
        ArgumentKey::Index(value)
    }
}

impl From<&str> for ArgumentKey {
    fn from(value: &str) -> Self {
        ArgumentKey::Name(value.to_string())
    }
}

impl From<String> for ArgumentKey {
    fn from(value: String) -> Self {
        ArgumentKey::Name(value)
    }
}

type FactoryFn = Arc<dyn Fn(&ResolvedArguments) -> Result<Instance, StdError> + Send + Sync>;

/// A closure building a service from resolved arguments.
///
/// ```rust
/// use wiring::{Container, Factory};
///
/// let container = Container::new();
/// container
///     .register(
///         "greeting",
///         Factory::new(|args| Ok(format!("Hello, {}", args.value::<String>("name")?)))
///             .param("name"),
///     )
///     .set_argument("name", "James");
///
/// let greeting = container.get_as::<String>("greeting").unwrap();
/// assert_eq!(greeting.as_str(), "Hello, James");
/// ```
#[derive(Clone)]
pub struct Factory {
    signature: Signature,
    call: FactoryFn,
}

impl Factory {
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolvedArguments) -> Result<T, StdError> + Send + Sync + 'static,
    {
        Self {
            signature: Signature::new(),
            call: Arc::new(move |args: &ResolvedArguments| Ok(Instance::new(factory(args)?))),
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn param(mut self, parameter: impl Into<Parameter>) -> Self {
        self.signature = self.signature.param(parameter);
        self
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn invoke(&self, args: &ResolvedArguments) -> Result<Instance, StdError> {
        (self.call)(args)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// How a definition produces its service.
#[derive(Clone, Debug)]
pub enum Source {
    Class(Class),
    Factory(Factory),
    Instance(Instance),
    /// The owning container itself.
    Container,
}

impl From<Class> for Source {
    fn from(value: Class) -> Self {
        Source::Class(value)
    }
}

impl From<Factory> for Source {
    fn from(value: Factory) -> Self {
        Source::Factory(value)
    }
}

impl From<Instance> for Source {
    fn from(value: Instance) -> Self {
        Source::Instance(value)
    }
}

/// Container-wide defaults copied into every definition at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub share: bool,
    pub autowire: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            share: true,
            autowire: true,
        }
    }
}

/// One registered recipe.
#[derive(Clone, Debug)]
pub struct Definition {
    id: String,
    source: Source,
    arguments: BTreeMap<ArgumentKey, Argument>,
    shared: bool,
    autowired: bool,
}

impl Definition {
    pub(crate) fn new(id: String, source: Source, defaults: Defaults) -> Self {
        Self {
            id,
            source,
            arguments: BTreeMap::new(),
            shared: defaults.share,
            autowired: defaults.autowire,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// How the service is produced.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// All configured overrides, positional ones first.
    pub fn arguments(&self) -> &BTreeMap<ArgumentKey, Argument> {
        &self.arguments
    }

    /// Override for the parameter at `index`, looked up by name first.
    pub fn argument(&self, index: usize, name: &str) -> Option<&Argument> {
        self.arguments
            .get(&ArgumentKey::Name(name.to_string()))
            .or_else(|| self.arguments.get(&ArgumentKey::Index(index)))
    }

    /// Literal instances are always shared.
    pub fn is_shared(&self) -> bool {
        self.shared || matches!(self.source, Source::Instance(_))
    }

    /// Whether typed parameters without an override are resolved from the container.
    pub fn is_autowired(&self) -> bool {
        self.autowired
    }

    /// Replaces all overrides. Objects set named overrides, arrays set
    /// positional ones, any other value becomes the first positional argument.
    pub fn set_arguments(&mut self, arguments: Value) {
        self.arguments.clear();
        match arguments {
            Value::Object(entries) => {
                for (name, value) in entries {
                    self.arguments
                        .insert(ArgumentKey::Name(name), Argument::Value(value));
                }
            }
            Value::Array(items) => {
                for (index, value) in items.into_iter().enumerate() {
                    self.arguments
                        .insert(ArgumentKey::Index(index), Argument::Value(value));
                }
            }
            Value::Null => {}
            value => {
                self.arguments
                    .insert(ArgumentKey::Index(0), Argument::Value(value));
            }
        }
    }

    pub fn set_argument(&mut self, key: impl Into<ArgumentKey>, argument: impl Into<Argument>) {
        self.arguments.insert(key.into(), argument.into());
    }

    pub fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
    }

    pub fn set_autowired(&mut self, autowired: bool) {
        self.autowired = autowired;
    }

    /// Constructor parameters, if the source has any.
    pub fn signature(&self) -> Option<&Signature> {
        match &self.source {
            Source::Class(class) => Some(class.signature()),
            Source::Factory(factory) => Some(factory.signature()),
            Source::Instance(_) | Source::Container => None,
        }
    }
}
