//! # wiring
//!
//! A dependency injection container that resolves services by identifier,
//! building their constructor dependencies on demand.
//!
//! ## Core Concepts
//!
//! - **Container**: The registry of definitions, parameters and shared instances
//! - **Definition**: A recipe for one service: a class, a factory or a pre-built instance
//! - **Injectable**: A trait describing a type's constructor so the container can autowire it
//! - **Parameters**: Configuration values interpolated into arguments through `%path%` placeholders
//! - **Reference**: An argument that resolves to another service
//! - **Alias** and **type binding**: Alternate identifiers forwarding to a service
//!
//! ## Basic Usage
//!
//! Registering a factory and resolving it:
//!
//! ```rust
//! use wiring::{Container, Factory};
//!
//! struct Director {
//!     name: String,
//! }
//!
//! let container = Container::new();
//! container.register(
//!     "director",
//!     Factory::new(|_| Ok(Director { name: "James".into() })),
//! );
//!
//! let director = container.get_as::<Director>("director").unwrap();
//! assert_eq!(director.name, "James");
//!
//! // Definitions are shared by default.
//! let again = container.get_as::<Director>("director").unwrap();
//! assert!(std::sync::Arc::ptr_eq(&director, &again));
//! ```
//!
//! ## Autowiring
//!
//! Constructor parameters with a declared type are resolved from the container:
//!
//! ```rust
//! use std::sync::Arc;
//! use wiring::{Container, Injectable, Parameter, ResolvedArguments, Signature, StdError};
//!
//! struct Database;
//!
//! impl Injectable for Database {
//!     fn construct(_args: &ResolvedArguments) -> Result<Self, StdError> {
//!         Ok(Self)
//!     }
//! }
//!
//! struct Repository {
//!     database: Arc<Database>,
//! }
//!
//! impl Injectable for Repository {
//!     fn signature() -> Signature {
//!         Signature::new().param(Parameter::typed::<Database>("database"))
//!     }
//!
//!     fn construct(args: &ResolvedArguments) -> Result<Self, StdError> {
//!         Ok(Self {
//!             database: args.service("database")?,
//!         })
//!     }
//! }
//!
//! let container = Container::new();
//! container.declare::<Database>().declare::<Repository>();
//!
//! let repository = container.resolve::<Repository>().unwrap();
//! let database = container.resolve::<Database>().unwrap();
//! assert!(Arc::ptr_eq(&repository.database, &database));
//! ```
//!
//! ## Using Macros
//!
//! With the `macros` feature enabled, the constructor metadata is derived:
//!
//! ```rust
//! use std::sync::Arc;
//! use wiring::{Container, Injectable};
//!
//! #[derive(Injectable)]
//! struct Database {
//!     #[inject(default = "sqlite::memory:")]
//!     url: String,
//! }
//!
//! #[derive(Injectable)]
//! struct Repository {
//!     database: Arc<Database>,
//! }
//!
//! let container = Container::new();
//! container.declare::<Database>().declare::<Repository>();
//!
//! let repository = container.resolve::<Repository>().unwrap();
//! assert_eq!(repository.database.url, "sqlite::memory:");
//! ```
//!
//! ## Features
//!
//! - `macros` (default): Enables the `Injectable` derive and the `#[injectable]` attribute

mod autowire;
mod class;
mod container;
mod definition;
mod error;
mod instance;
mod parameters;
mod registry;
mod signature;

pub use autowire::{ResolvedArgument, ResolvedArguments};
pub use class::*;
pub use container::Container;
pub use definition::*;
pub use error::*;
pub use instance::Instance;
pub use parameters::ParameterStore;
pub use registry::Registration;
pub use serde_json::Value;
pub use signature::*;

#[cfg(feature = "macros")]
pub use wiring_macros::*;
