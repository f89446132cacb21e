use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::instance::{CastTable, Object};
use crate::{Instance, ResolvedArguments, Signature, StdError};

/// Trait for types the container can construct by itself.
///
/// The signature is the constructor metadata used by autowiring; `construct`
/// receives the arguments resolved for that signature, in declaration order.
///
/// # Examples
///
/// ```rust
/// use wiring::{Container, Injectable, Parameter, ResolvedArguments, Signature, StdError};
///
/// struct Director {
///     name: String,
///     age: u32,
/// }
///
/// impl Injectable for Director {
///     fn signature() -> Signature {
///         Signature::new()
///             .param(Parameter::new("name").with_default("Unknown"))
///             .param(Parameter::new("age").with_default(0))
///     }
///
///     fn construct(args: &ResolvedArguments) -> Result<Self, StdError> {
///         Ok(Self {
///             name: args.value("name")?,
///             age: args.value("age")?,
///         })
///     }
/// }
///
/// let container = Container::new();
/// container.declare::<Director>();
/// let director = container.resolve::<Director>().unwrap();
/// assert_eq!(director.name, "Unknown");
/// ```
pub trait Injectable: Any + Send + Sync + Sized {
    /// Describes the constructor parameters.
    fn signature() -> Signature {
        Signature::new()
    }

    /// Builds the value from resolved arguments.
    fn construct(args: &ResolvedArguments) -> Result<Self, StdError>;

    /// Declares the interfaces this type can be injected as.
    fn capabilities(capabilities: Capabilities<Self>) -> Capabilities<Self> {
        capabilities
    }
}

/// Interface views a class provides in addition to its own type.
///
/// ```rust
/// use std::sync::Arc;
/// use wiring::{Capabilities, Injectable, ResolvedArguments, StdError};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
///
/// impl Injectable for English {
///     fn construct(_args: &ResolvedArguments) -> Result<Self, StdError> {
///         Ok(Self)
///     }
///
///     fn capabilities(capabilities: Capabilities<Self>) -> Capabilities<Self> {
///         capabilities.provide::<dyn Greeter>(|this: Arc<Self>| -> Arc<dyn Greeter> { this })
///     }
/// }
/// ```
pub struct Capabilities<T> {
    casts: CastTable,
    interfaces: Vec<&'static str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Capabilities<T>
where
    T: Any + Send + Sync,
{
    fn new() -> Self {
        Self {
            casts: CastTable::identity::<T>(),
            interfaces: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Allows instances of `T` to be injected where `I` is expected.
    pub fn provide<I>(mut self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + 'static,
    {
        self.casts.insert::<T, I>(cast);
        self.interfaces.push(type_name::<I>());
        self
    }
}

type Constructor = Arc<dyn Fn(&ResolvedArguments) -> Result<Object, StdError> + Send + Sync>;

/// A constructible type known to the container catalog.
#[derive(Clone)]
pub struct Class {
    name: &'static str,
    signature: Signature,
    interfaces: Vec<&'static str>,
    constructor: Constructor,
    casts: Arc<CastTable>,
}

impl Class {
    pub fn of<T>() -> Self
    where
        T: Injectable,
    {
        let capabilities = T::capabilities(Capabilities::new());
        Self {
            name: type_name::<T>(),
            signature: T::signature(),
            interfaces: capabilities.interfaces,
            constructor: Arc::new(|args: &ResolvedArguments| {
                Ok(Arc::new(T::construct(args)?) as Object)
            }),
            casts: Arc::new(capabilities.casts),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Identifiers of the interfaces declared through [`Capabilities::provide`].
    pub fn interfaces(&self) -> &[&'static str] {
        &self.interfaces
    }

    pub(crate) fn casts(&self) -> Arc<CastTable> {
        self.casts.clone()
    }

    pub(crate) fn instantiate(&self, args: &ResolvedArguments) -> Result<Instance, StdError> {
        let object = (self.constructor)(args)?;
        Ok(Instance::with_casts(object, self.name, self.casts.clone()))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}
