use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use dashmap::DashMap;
use serde_json::Value;

use crate::{
    Argument, ArgumentKey, Class, ContainerError, Defaults, Definition, Instance, Source,
};

/// Identifier -> definition mapping with aliases, type bindings and the
/// catalog of classes that can be instantiated without registration.
#[derive(Default)]
pub(crate) struct DefinitionRegistry {
    definitions: DashMap<String, Definition>,
    aliases: DashMap<String, String>,
    bindings: DashMap<String, String>,
    classes: DashMap<String, Class>,
    defaults: RwLock<Defaults>,
}

impl DefinitionRegistry {
    pub(crate) fn defaults(&self) -> Defaults {
        *self.defaults.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_defaults(&self, defaults: Defaults) {
        *self.defaults.write().unwrap_or_else(PoisonError::into_inner) = defaults;
    }

    pub(crate) fn register(&self, id: String, source: Source) {
        if let Source::Class(class) = &source {
            self.declare(class.clone());
        }
        let definition = Definition::new(id.clone(), source, self.defaults());
        self.definitions.insert(id, definition);
    }

    pub(crate) fn declare(&self, class: Class) {
        self.classes.insert(class.name().to_string(), class);
    }

    pub(crate) fn class(&self, name: &str) -> Option<Class> {
        self.classes.get(name).map(|v| v.value().clone())
    }

    /// Gives an instance the interface casts of its class, when the class is known.
    pub(crate) fn adopt(&self, instance: Instance) -> Instance {
        match self.class(instance.class()) {
            Some(class) => instance.adopt(class.casts()),
            None => instance,
        }
    }

    pub(crate) fn set_alias(&self, alias: String, target: String) {
        self.aliases.insert(alias, target);
    }

    pub(crate) fn get_alias(&self, alias: &str) -> Option<String> {
        self.aliases.get(alias).map(|v| v.value().clone())
    }

    pub(crate) fn bind_type(&self, type_id: String, id: String) {
        self.bindings.insert(type_id, id);
    }

    /// Follows aliases and type bindings until an identifier with its own
    /// definition, or nothing further to follow, is reached.
    pub(crate) fn canonical(&self, id: &str) -> String {
        let mut current = id.to_string();
        let mut visited = HashSet::new();
        while visited.insert(current.clone()) {
            let next = match self.aliases.get(&current) {
                Some(target) => target.value().clone(),
                None if self.definitions.contains_key(&current) => break,
                None => match self.bindings.get(&current) {
                    Some(target) => target.value().clone(),
                    None => break,
                },
            };
            current = next;
        }
        current
    }

    pub(crate) fn has(&self, id: &str) -> bool {
        let id = self.canonical(id);
        self.definitions.contains_key(&id) || self.classes.contains_key(&id)
    }

    /// Fetches the definition of a canonical identifier, registering known
    /// classes on first use.
    pub(crate) fn lookup(&self, id: &str) -> Result<Definition, ContainerError> {
        if let Some(definition) = self.definitions.get(id) {
            return Ok(definition.value().clone());
        }
        let class = self
            .class(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        let definition = self
            .definitions
            .entry(id.to_string())
            .or_insert_with(|| Definition::new(id.to_string(), Source::Class(class), self.defaults()));
        Ok(definition.value().clone())
    }

    pub(crate) fn definition(&self, id: &str) -> Option<Definition> {
        self.definitions.get(id).map(|v| v.value().clone())
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut Definition)) {
        if let Some(mut definition) = self.definitions.get_mut(id) {
            f(definition.value_mut());
        }
    }
}

/// Handle returned by registration methods for fluent configuration.
///
/// Every setter writes through to the stored definition.
pub struct Registration<'a> {
    registry: &'a DefinitionRegistry,
    id: String,
}

impl<'a> Registration<'a> {
    pub(crate) fn new(registry: &'a DefinitionRegistry, id: String) -> Self {
        Self { registry, id }
    }

    /// Identifier the definition was registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces all argument overrides; see [`Definition::set_arguments`].
    pub fn set_arguments(self, arguments: Value) -> Self {
        self.registry
            .update(&self.id, |definition| definition.set_arguments(arguments));
        self
    }

    /// Sets one override, keyed by parameter position or name.
    ///
    /// # Arguments
    ///
    /// * `key` - A `usize` position or a parameter name.
    /// * `argument` - A JSON value (placeholders allowed), a [`Reference`](crate::Reference)
    ///   or a nested list or map of arguments.
    pub fn set_argument(self, key: impl Into<ArgumentKey>, argument: impl Into<Argument>) -> Self {
        let (key, argument) = (key.into(), argument.into());
        self.registry
            .update(&self.id, |definition| definition.set_argument(key, argument));
        self
    }

    /// Controls whether one instance is built and reused for every request.
    ///
    /// Has no effect on pre-built instances, which are always shared.
    pub fn set_shared(self, shared: bool) -> Self {
        self.registry
            .update(&self.id, |definition| definition.set_shared(shared));
        self
    }

    /// Controls whether typed parameters without an override are resolved
    /// from the container.
    pub fn set_autowired(self, autowired: bool) -> Self {
        self.registry
            .update(&self.id, |definition| definition.set_autowired(autowired));
        self
    }

    /// Snapshot of the current definition.
    pub fn definition(&self) -> Option<Definition> {
        self.registry.definition(&self.id)
    }
}
