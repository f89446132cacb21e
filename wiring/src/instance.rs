use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use dashmap::DashMap;

pub(crate) type Object = Arc<dyn Any + Send + Sync>;

type Caster = Arc<dyn Fn(Object) -> Option<Box<dyn Any>> + Send + Sync>;

/// Conversions from a concrete object to the views it can be injected as.
///
/// Keyed by the `TypeId` of the target view (`T` itself or some `dyn Trait`).
#[derive(Clone, Default)]
pub(crate) struct CastTable {
    casters: HashMap<TypeId, Caster>,
}

impl CastTable {
    pub(crate) fn identity<T>() -> Self
    where
        T: Any + Send + Sync,
    {
        let mut table = Self::default();
        table.insert::<T, T>(|object| object);
        table
    }

    pub(crate) fn insert<T, I>(&mut self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static)
    where
        T: Any + Send + Sync,
        I: ?Sized + 'static,
    {
        let caster: Caster = Arc::new(move |object: Object| {
            let object = object.downcast::<T>().ok()?;
            Some(Box::new(cast(object)) as Box<dyn Any>)
        });
        self.casters.insert(TypeId::of::<I>(), caster);
    }

    fn cast<I>(&self, object: &Object) -> Option<Arc<I>>
    where
        I: ?Sized + 'static,
    {
        let caster = self.casters.get(&TypeId::of::<I>())?;
        let view = caster(object.clone())?;
        view.downcast::<Arc<I>>().ok().map(|view| *view)
    }
}

/// A type-erased handle to a built service.
///
/// Cloning an `Instance` never clones the service; two handles are the same
/// service when [`Instance::ptr_eq`] holds.
#[derive(Clone)]
pub struct Instance {
    object: Object,
    class: &'static str,
    casts: Arc<CastTable>,
}

impl Instance {
    /// Wraps a value that can only be viewed as its own type.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T>(value: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            object: value,
            class: type_name::<T>(),
            casts: Arc::new(CastTable::identity::<T>()),
        }
    }

    pub(crate) fn with_casts(object: Object, class: &'static str, casts: Arc<CastTable>) -> Self {
        Self {
            object,
            class,
            casts,
        }
    }

    /// Replaces the cast table, keeping the same object.
    pub(crate) fn adopt(self, casts: Arc<CastTable>) -> Self {
        Self { casts, ..self }
    }

    /// The concrete type name of the service.
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Returns the service as its concrete type.
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.object.clone().downcast::<T>().ok()
    }

    /// Returns the service as `T`, which may be the concrete type or any
    /// interface the class declared through [`Capabilities`](crate::Capabilities).
    pub fn cast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        self.casts.cast::<T>(&self.object)
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.object), Arc::as_ptr(&other.object))
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// Shared services built so far, keyed by canonical identifier.
///
/// Besides the instances it tracks which thread is building which identifier
/// and what each thread is waiting for, so that a wait closing a cycle across
/// threads is refused instead of blocking forever.
#[derive(Default)]
pub(crate) struct InstanceCache {
    instances: DashMap<String, Instance>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    owners: DashMap<String, ThreadId>,
    waiting: DashMap<ThreadId, String>,
}

impl InstanceCache {
    pub(crate) fn get(&self, id: &str) -> Option<Instance> {
        self.instances.get(id).map(|v| v.value().clone())
    }

    pub(crate) fn insert(&self, id: String, instance: Instance) {
        self.instances.insert(id, instance);
    }

    /// Lock serializing the construction of one shared identifier.
    pub(crate) fn construction_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Records that the current thread is about to wait for `id`.
    ///
    /// Returns `false` (and forgets the wait) when the thread building `id`
    /// waits, directly or through other threads, for an identifier the
    /// current thread is building.
    pub(crate) fn wait_for(&self, id: &str) -> bool {
        let current = thread::current().id();
        self.waiting.insert(current, id.to_string());
        let mut next = id.to_string();
        for _ in 0..=self.waiting.len() {
            let Some(owner) = self.owners.get(&next).map(|v| *v.value()) else {
                return true;
            };
            if owner == current {
                self.waiting.remove(&current);
                return false;
            }
            let Some(target) = self.waiting.get(&owner).map(|v| v.value().clone()) else {
                return true;
            };
            next = target;
        }
        true
    }

    /// Marks the current thread as the builder of `id` until the claim drops.
    pub(crate) fn claim(&self, id: &str) -> Claim<'_> {
        let current = thread::current().id();
        self.waiting.remove(&current);
        self.owners.insert(id.to_string(), current);
        Claim {
            cache: self,
            id: id.to_string(),
        }
    }
}

pub(crate) struct Claim<'a> {
    cache: &'a InstanceCache,
    id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.cache.owners.remove(&self.id);
    }
}
