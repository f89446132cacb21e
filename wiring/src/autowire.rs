use std::any::type_name;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::{Argument, Container, ContainerError, Definition, Instance, Parameter, Signature, StdError};

/// A fully resolved argument handed to a constructor.
#[derive(Clone, Debug)]
pub enum ResolvedArgument {
    Value(Value),
    Service(Instance),
    List(Vec<ResolvedArgument>),
    Map(BTreeMap<String, ResolvedArgument>),
}

impl ResolvedArgument {
    fn list(items: Vec<ResolvedArgument>) -> Self {
        if items.iter().all(|item| matches!(item, ResolvedArgument::Value(_))) {
            return ResolvedArgument::Value(Value::Array(
                items.into_iter().filter_map(ResolvedArgument::into_value).collect(),
            ));
        }
        ResolvedArgument::List(items)
    }

    fn map(entries: BTreeMap<String, ResolvedArgument>) -> Self {
        if entries
            .values()
            .all(|item| matches!(item, ResolvedArgument::Value(_)))
        {
            return ResolvedArgument::Value(Value::Object(
                entries
                    .into_iter()
                    .filter_map(|(key, item)| Some((key, item.into_value()?)))
                    .collect(),
            ));
        }
        ResolvedArgument::Map(entries)
    }

    fn into_value(self) -> Option<Value> {
        match self {
            ResolvedArgument::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ResolvedArgument::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            ResolvedArgument::Service(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResolvedArgument::Value(Value::Null))
    }
}

/// Arguments resolved for one constructor call, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ResolvedArguments {
    id: String,
    entries: Vec<(String, ResolvedArgument)>,
}

impl ResolvedArguments {
    pub fn new(id: impl Into<String>, entries: Vec<(String, ResolvedArgument)>) -> Self {
        Self {
            id: id.into(),
            entries,
        }
    }

    /// Identifier of the service being constructed.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedArgument> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, argument)| argument)
    }

    pub fn at(&self, index: usize) -> Option<&ResolvedArgument> {
        self.entries.get(index).map(|(_, argument)| argument)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedArgument)> {
        self.entries
            .iter()
            .map(|(name, argument)| (name.as_str(), argument))
    }

    /// Deserializes a plain value argument.
    pub fn value<T>(&self, name: &str) -> Result<T, StdError>
    where
        T: DeserializeOwned,
    {
        match self.require(name)? {
            ResolvedArgument::Value(value) => Ok(serde_json::from_value(value.clone())?),
            _ => Err(format!(
                "Argument `{name}` of `{}` is not a plain value",
                self.id
            )
            .into()),
        }
    }

    /// Returns a service argument viewed as `T`.
    pub fn service<T>(&self, name: &str) -> Result<Arc<T>, StdError>
    where
        T: ?Sized + 'static,
    {
        self.optional(name)?.ok_or_else(|| {
            format!("Argument `{name}` of `{}` is null", self.id).into()
        })
    }

    /// Like [`service`](Self::service), but maps a null argument to `None`.
    pub fn optional<T>(&self, name: &str) -> Result<Option<Arc<T>>, StdError>
    where
        T: ?Sized + 'static,
    {
        match self.require(name)? {
            ResolvedArgument::Value(Value::Null) => Ok(None),
            ResolvedArgument::Service(instance) => instance.cast::<T>().map(Some).ok_or_else(|| {
                format!(
                    "Argument `{name}` of `{}` is `{}`, not `{}`",
                    self.id,
                    instance.class(),
                    type_name::<T>()
                )
                .into()
            }),
            _ => Err(format!("Argument `{name}` of `{}` is not a service", self.id).into()),
        }
    }

    fn require(&self, name: &str) -> Result<&ResolvedArgument, StdError> {
        self.get(name)
            .ok_or_else(|| format!("Missing argument `{name}` of `{}`", self.id).into())
    }
}

/// Produces constructor arguments from overrides, parameters and autowiring.
pub(crate) struct AutowireResolver<'a> {
    container: &'a Container,
}

impl<'a> AutowireResolver<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub(crate) fn resolve(
        &self,
        definition: &Definition,
        signature: &Signature,
    ) -> Result<ResolvedArguments, ContainerError> {
        let mut entries = Vec::with_capacity(signature.len());
        for (index, parameter) in signature.parameters().iter().enumerate() {
            let argument = self.resolve_parameter(definition, index, parameter)?;
            entries.push((parameter.name().to_string(), argument));
        }
        Ok(ResolvedArguments::new(definition.id(), entries))
    }

    fn resolve_parameter(
        &self,
        definition: &Definition,
        index: usize,
        parameter: &Parameter,
    ) -> Result<ResolvedArgument, ContainerError> {
        if let Some(argument) = definition.argument(index, parameter.name()) {
            return self.expand(argument);
        }
        if let Some(type_id) = parameter.declared_type()
            && definition.is_autowired()
        {
            if self.container.has(type_id) {
                let instance = self.container.get(type_id)?;
                return Ok(ResolvedArgument::Service(instance));
            }
            if parameter.is_optional() {
                warn!(
                    id = definition.id(),
                    parameter = parameter.name(),
                    declared_type = type_id,
                    "Optional dependency is not registered, using default"
                );
                return Ok(default_of(parameter));
            }
            return Err(ContainerError::DependencyInjection {
                id: definition.id().to_string(),
                parameter: parameter.name().to_string(),
                reason: format!("type `{type_id}` is not registered"),
            });
        }
        if parameter.is_optional() {
            return Ok(default_of(parameter));
        }
        let reason = match parameter.declared_type() {
            Some(type_id) => format!("autowiring is disabled for `{type_id}` and no argument is given"),
            None => "no argument is given and the parameter has no default".to_string(),
        };
        Err(ContainerError::DependencyInjection {
            id: definition.id().to_string(),
            parameter: parameter.name().to_string(),
            reason,
        })
    }

    fn expand(&self, argument: &Argument) -> Result<ResolvedArgument, ContainerError> {
        match argument {
            Argument::Value(value) => Ok(ResolvedArgument::Value(
                self.container.resolve_placeholders(value)?,
            )),
            Argument::Reference(reference) => Ok(ResolvedArgument::Service(
                self.container.get(reference.id())?,
            )),
            Argument::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(self.expand(item)?);
                }
                Ok(ResolvedArgument::list(resolved))
            }
            Argument::Map(entries) => {
                let mut resolved = BTreeMap::new();
                for (key, item) in entries {
                    resolved.insert(key.clone(), self.expand(item)?);
                }
                Ok(ResolvedArgument::map(resolved))
            }
        }
    }
}

fn default_of(parameter: &Parameter) -> ResolvedArgument {
    ResolvedArgument::Value(parameter.default_value().cloned().unwrap_or(Value::Null))
}
