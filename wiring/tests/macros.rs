use std::sync::Arc;

use serde_json::json;
use wiring::{Container, ContainerError, Injectable, id_of, injectable};

#[derive(Injectable)]
struct Database {
    #[inject(default = "sqlite::memory:")]
    url: String,
}

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

#[derive(Injectable)]
#[inject(implements(dyn Greeter))]
struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {name}")
    }
}

#[derive(Injectable)]
struct Repository {
    database: Arc<Database>,
    greeter: Arc<dyn Greeter>,
    cache: Option<Arc<Cache>>,
    #[inject(default = 10)]
    limit: u32,
    label: Option<String>,
}

struct Cache;

struct Service {
    repository: Arc<Repository>,
    name: String,
}

#[injectable]
impl Service {
    #[constructor]
    fn new(repository: Arc<Repository>, #[inject(default = "service")] name: String) -> Self {
        Self { repository, name }
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.name, self.repository.database.url)
    }
}

#[derive(Debug)]
struct CustomError(String);

impl std::fmt::Display for CustomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Custom error: {}", self.0)
    }
}

impl std::error::Error for CustomError {}

struct FallibleService;

#[injectable]
impl FallibleService {
    #[constructor]
    fn new(fail: bool) -> Result<Self, CustomError> {
        if fail {
            return Err(CustomError("refused".to_string()));
        }
        Ok(Self)
    }
}

struct NamedDependency {
    database: Arc<Database>,
}

#[injectable]
impl NamedDependency {
    #[constructor]
    fn new(#[inject(id = "primary")] database: Arc<Database>) -> Self {
        Self { database }
    }
}

fn container() -> Container {
    let container = Container::new();
    container
        .declare::<Database>()
        .bind::<dyn Greeter, EnglishGreeter>()
        .declare::<Repository>()
        .declare::<Service>();
    container
}

#[test]
fn test_derived_signature() {
    let signature = Repository::signature();
    let parameters = signature.parameters();
    assert_eq!(parameters.len(), 5);

    assert_eq!(parameters[0].name(), "database");
    assert_eq!(parameters[0].declared_type(), Some(id_of::<Database>().as_str()));
    assert!(!parameters[0].is_optional());

    assert_eq!(parameters[1].declared_type(), Some(id_of::<dyn Greeter>().as_str()));

    assert_eq!(parameters[2].declared_type(), Some(id_of::<Cache>().as_str()));
    assert!(parameters[2].is_nullable());

    assert_eq!(parameters[3].declared_type(), None);
    assert_eq!(parameters[3].default_value(), Some(&json!(10)));

    assert!(parameters[4].is_nullable());
    assert!(parameters[4].is_optional());
}

#[test]
fn test_derive_injectable() {
    let container = container();
    let repository = container.resolve::<Repository>().unwrap();

    assert_eq!(repository.database.url, "sqlite::memory:");
    assert_eq!(repository.greeter.greet("James"), "Hello, James");
    assert!(repository.cache.is_none());
    assert_eq!(repository.limit, 10);
    assert_eq!(repository.label, None);

    let database = container.resolve::<Database>().unwrap();
    assert!(Arc::ptr_eq(&repository.database, &database));
}

#[test]
fn test_derive_injectable_with_arguments() {
    let container = container();
    container.add_instance(Cache);
    container
        .register_class::<Repository>()
        .set_arguments(json!({"limit": 20, "label": "main"}));

    let repository = container.resolve::<Repository>().unwrap();
    assert!(repository.cache.is_some());
    assert_eq!(repository.limit, 20);
    assert_eq!(repository.label.as_deref(), Some("main"));
}

#[test]
fn test_injectable_impl() {
    let container = container();
    let service = container.resolve::<Service>().unwrap();
    assert_eq!(service.describe(), "service (sqlite::memory:)");

    container
        .register("custom", wiring::Class::of::<Service>())
        .set_argument("name", "custom");
    let custom = container.get_as::<Service>("custom").unwrap();
    assert_eq!(custom.describe(), "custom (sqlite::memory:)");
    assert!(Arc::ptr_eq(&custom.repository, &service.repository));
}

#[test]
fn test_injectable_impl_with_result() {
    let container = Container::new();
    container
        .register("ok", wiring::Class::of::<FallibleService>())
        .set_argument("fail", false);
    container
        .register("refused", wiring::Class::of::<FallibleService>())
        .set_argument("fail", true);

    assert!(container.get("ok").is_ok());
    let error = container.get("refused").unwrap_err();
    assert!(matches!(&error, ContainerError::Construction { id, .. } if id == "refused"));
    assert!(error.to_string().contains("Custom error: refused"));
}

#[test]
fn test_injectable_impl_with_service_id() {
    let container = Container::new();
    container
        .register("primary", wiring::Class::of::<Database>())
        .set_argument("url", "postgres://primary");
    container.declare::<NamedDependency>();

    let dependency = container.resolve::<NamedDependency>().unwrap();
    assert_eq!(dependency.database.url, "postgres://primary");
}
