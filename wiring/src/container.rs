use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, trace};

use crate::autowire::AutowireResolver;
use crate::instance::InstanceCache;
use crate::registry::{DefinitionRegistry, Registration};
use crate::{
    Class, ContainerError, Defaults, Definition, Injectable, Instance, ParameterStore, Source,
    StdError, id_of,
};

thread_local! {
    /// Services being built on this thread, tagged with their container.
    static BUILDING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// The dependency injection container.
///
/// A `Container` is a cheap handle: clones share the same definitions,
/// parameters and built services. The container registers itself under
/// `id_of::<Container>()`, so constructors can ask for it like any other
/// dependency.
///
/// Resolving `id_of::<Container>()` yields a new handle to the same shared
/// state every time. Unlike other shared services, two such handles are not
/// [`Instance::ptr_eq`]; caching one would make the container own itself.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use wiring::{Container, Factory};
///
/// struct Director {
///     name: String,
///     age: u32,
/// }
///
/// let container = Container::new();
/// container.set_parameters([("foo", json!("James")), ("bar", json!(45))]);
/// container
///     .register(
///         "director",
///         Factory::new(|args| {
///             Ok(Director {
///                 name: args.value("name")?,
///                 age: args.value("age")?,
///             })
///         })
///         .param("name")
///         .param("age"),
///     )
///     .set_arguments(json!({"name": "%foo% Bob", "age": "%bar%"}));
///
/// let director = container.get_as::<Director>("director").unwrap();
/// assert_eq!(director.name, "James Bob");
/// assert_eq!(director.age, 45);
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: DefinitionRegistry,
    parameters: RwLock<ParameterStore>,
    cache: InstanceCache,
}

impl Container {
    /// Creates an empty container with default settings.
    ///
    /// The container is registered under `id_of::<Container>()` right away.
    pub fn new() -> Self {
        let container = Self {
            inner: Arc::new(ContainerInner {
                registry: DefinitionRegistry::default(),
                parameters: RwLock::new(ParameterStore::new()),
                cache: InstanceCache::default(),
            }),
        };
        container
            .inner
            .registry
            .register(id_of::<Container>(), Source::Container);
        container
    }

    /// Creates a container with the given defaults already applied.
    pub fn with_defaults(defaults: Defaults) -> Self {
        let container = Self::new();
        container.set_defaults(defaults);
        container
    }

    /// Registers (or replaces) the definition for `id`.
    ///
    /// A pre-built [`Instance`] is also registered under its class name,
    /// unless that name is `id` itself.
    ///
    /// # Arguments
    ///
    /// * `id` - Service identifier.
    /// * `source` - A [`Class`], a [`Factory`](crate::Factory) or an [`Instance`].
    ///
    /// # Returns
    ///
    /// A [`Registration`] handle for configuring arguments and flags.
    pub fn register(&self, id: impl Into<String>, source: impl Into<Source>) -> Registration<'_> {
        let id = id.into();
        let source = match source.into() {
            Source::Instance(instance) => {
                let instance = self.inner.registry.adopt(instance);
                if instance.class() != id {
                    self.inner
                        .registry
                        .register(instance.class().to_string(), Source::Instance(instance.clone()));
                }
                Source::Instance(instance)
            }
            source => source,
        };
        self.inner.registry.register(id.clone(), source);
        Registration::new(&self.inner.registry, id)
    }

    /// Registers a pre-built value under `id` and under its type identifier.
    pub fn register_instance<T>(&self, id: impl Into<String>, value: T) -> Registration<'_>
    where
        T: Any + Send + Sync,
    {
        self.register(id, Instance::new(value))
    }

    /// Registers a pre-built value under its type identifier only.
    pub fn add_instance<T>(&self, value: T) -> Registration<'_>
    where
        T: Any + Send + Sync,
    {
        self.register_instance(id_of::<T>(), value)
    }

    /// Registers a class under its own type identifier.
    pub fn register_class<T>(&self) -> Registration<'_>
    where
        T: Injectable,
    {
        self.register(id_of::<T>(), Class::of::<T>())
    }

    /// Makes a class instantiable on demand without registering a definition.
    pub fn declare<T>(&self) -> &Self
    where
        T: Injectable,
    {
        self.inner.registry.declare(Class::of::<T>());
        self
    }

    /// Records that requests for `type_id` resolve the service `id`.
    pub fn bind_type(&self, type_id: impl Into<String>, id: impl Into<String>) -> &Self {
        self.inner.registry.bind_type(type_id.into(), id.into());
        self
    }

    /// Binds the interface `I` to the class `T`, declaring `T` on the way.
    pub fn bind<I, T>(&self) -> &Self
    where
        I: ?Sized + 'static,
        T: Injectable,
    {
        self.declare::<T>();
        self.bind_type(id_of::<I>(), id_of::<T>())
    }

    /// Makes `alias` resolve to the same service as `id`.
    ///
    /// Aliases may point at other aliases. A shared service is cached under
    /// its final identifier, so every alias yields the identical instance.
    pub fn set_alias(&self, alias: impl Into<String>, id: impl Into<String>) -> &Self {
        self.inner.registry.set_alias(alias.into(), id.into());
        self
    }

    /// Returns the direct target of `alias`, if it is one.
    pub fn get_alias(&self, alias: &str) -> Option<String> {
        self.inner.registry.get_alias(alias)
    }

    /// Changes the defaults for definitions registered from now on.
    pub fn set_defaults(&self, defaults: Defaults) -> &Self {
        self.inner.registry.set_defaults(defaults);
        self
    }

    /// Defaults applied to the next registration.
    pub fn defaults(&self) -> Defaults {
        self.inner.registry.defaults()
    }

    /// Snapshot of the definition registered for `id`, aliases followed.
    pub fn definition(&self, id: &str) -> Option<Definition> {
        let id = self.inner.registry.canonical(id);
        self.inner.registry.definition(&id)
    }

    /// Returns `true` if `id` can be resolved without a `NotFound` error.
    ///
    /// This holds for registered identifiers, aliases and type bindings
    /// leading to one, and declared classes. It says nothing about whether
    /// construction would succeed.
    pub fn has(&self, id: &str) -> bool {
        self.inner.registry.has(id)
    }

    /// Resolves a service by identifier.
    ///
    /// Shared services are built at most once. Constructors may call back
    /// into the container; asking for a service that is still being built,
    /// on this thread or by another thread that is itself waiting for this
    /// one, fails with [`ContainerError::CircularDependency`] instead of
    /// blocking.
    ///
    /// # Errors
    ///
    /// * [`ContainerError::NotFound`] - `id` is unknown.
    /// * [`ContainerError::DependencyInjection`] - a parameter cannot be satisfied.
    /// * [`ContainerError::Config`] - a placeholder cannot be substituted.
    /// * [`ContainerError::CircularDependency`] - the graph loops back on itself.
    /// * [`ContainerError::Construction`] - the constructor returned an error.
    pub fn get(&self, requested: &str) -> Result<Instance, ContainerError> {
        let registry = &self.inner.registry;
        let id = registry.canonical(requested);
        if id != requested {
            trace!(requested, id = %id, "Resolved alias");
        }
        if let Some(path) = self.cycle(&id) {
            return Err(ContainerError::CircularDependency(path));
        }
        let definition = registry.lookup(&id)?;
        match definition.source() {
            Source::Instance(instance) => return Ok(instance.clone()),
            Source::Container => return Ok(Instance::new(self.clone())),
            Source::Class(_) | Source::Factory(_) => {}
        }
        if !definition.is_shared() {
            return self.build(&definition);
        }
        let cache = &self.inner.cache;
        if let Some(instance) = cache.get(&id) {
            trace!(id = %id, "Using cached instance");
            return Ok(instance);
        }
        let lock = cache.construction_lock(&id);
        if !cache.wait_for(&id) {
            let mut path = self.building();
            path.push(id);
            return Err(ContainerError::CircularDependency(path));
        }
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _claim = cache.claim(&id);
        // Another thread may have finished the construction while we waited.
        if let Some(instance) = cache.get(&id) {
            return Ok(instance);
        }
        let instance = self.build(&definition)?;
        cache.insert(id, instance.clone());
        Ok(instance)
    }

    /// Resolves a service and views it as `T`.
    ///
    /// `T` may be the concrete type or an interface the class provides.
    pub fn get_as<T>(&self, id: &str) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + 'static,
    {
        let instance = self.get(id)?;
        instance
            .cast::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                id: id.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Resolves the service registered under the identifier of `T`.
    pub fn resolve<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + 'static,
    {
        self.get_as::<T>(&id_of::<T>())
    }

    /// Replaces all parameters.
    pub fn set_parameters<K, V>(&self, parameters: impl IntoIterator<Item = (K, V)>) -> &Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameters_mut().set_all(parameters);
        self
    }

    /// Adds parameters, overwriting existing top-level keys.
    pub fn add_parameters<K, V>(&self, parameters: impl IntoIterator<Item = (K, V)>) -> &Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameters_mut().add(parameters);
        self
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.parameters_mut().set(name, value);
        self
    }

    /// Deep-merges a loaded parameter store into the container's parameters.
    pub fn merge_parameters(&self, parameters: ParameterStore) -> &Self {
        self.parameters_mut().merge_from(parameters);
        self
    }

    /// Looks up a parameter by name or dotted path, without substitution.
    pub fn get_parameter(&self, path: &str) -> Option<Value> {
        self.parameters().get(path).cloned()
    }

    pub fn get_parameters(&self) -> BTreeMap<String, Value> {
        self.parameters().get_all().clone()
    }

    pub(crate) fn resolve_placeholders(&self, value: &Value) -> Result<Value, ContainerError> {
        self.parameters().resolve(value)
    }

    fn parameters(&self) -> RwLockReadGuard<'_, ParameterStore> {
        self.inner
            .parameters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn parameters_mut(&self) -> RwLockWriteGuard<'_, ParameterStore> {
        self.inner
            .parameters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Identifiers of this container being built on the current thread.
    fn building(&self) -> Vec<String> {
        let key = self.key();
        BUILDING.with_borrow(|entries| {
            entries
                .iter()
                .filter(|(owner, _)| *owner == key)
                .map(|(_, id)| id.clone())
                .collect()
        })
    }

    /// Returns the cycle path if `id` is already being built on this thread.
    fn cycle(&self, id: &str) -> Option<Vec<String>> {
        let building = self.building();
        let start = building.iter().position(|entry| entry == id)?;
        let mut path = building[start..].to_vec();
        path.push(id.to_string());
        Some(path)
    }

    fn build(&self, definition: &Definition) -> Result<Instance, ContainerError> {
        let result = {
            let _building = Building::enter(self.key(), definition.id());
            self.construct(definition)
        };
        let instance = result?;
        debug!(
            id = definition.id(),
            class = instance.class(),
            shared = definition.is_shared(),
            "Built service"
        );
        Ok(instance)
    }

    fn construct(&self, definition: &Definition) -> Result<Instance, ContainerError> {
        let wrap = |source: StdError| construction_error(definition.id(), source);
        let resolver = AutowireResolver::new(self);
        match definition.source() {
            Source::Class(class) => {
                let args = resolver.resolve(definition, class.signature())?;
                class.instantiate(&args).map_err(wrap)
            }
            Source::Factory(factory) => {
                let args = resolver.resolve(definition, factory.signature())?;
                let instance = factory.invoke(&args).map_err(wrap)?;
                Ok(self.inner.registry.adopt(instance))
            }
            Source::Instance(instance) => Ok(instance.clone()),
            Source::Container => Ok(Instance::new(self.clone())),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors returned by constructors that are container errors themselves are
/// passed through unchanged.
fn construction_error(id: &str, source: StdError) -> ContainerError {
    match source.downcast::<ContainerError>() {
        Ok(error) => *error,
        Err(source) => ContainerError::Construction {
            id: id.to_string(),
            source,
        },
    }
}

/// Entry on the thread's build stack, popped when dropped.
struct Building;

impl Building {
    fn enter(owner: usize, id: &str) -> Self {
        BUILDING.with_borrow_mut(|entries| entries.push((owner, id.to_string())));
        Self
    }
}

impl Drop for Building {
    fn drop(&mut self) {
        BUILDING.with_borrow_mut(|entries| {
            entries.pop();
        });
    }
}
