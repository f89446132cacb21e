use std::fs;

use serde_json::json;
use tempfile::NamedTempFile;
use wiring::{Container, ContainerError, Factory, ParameterStore};

#[tokio::test]
async fn test_parameters_new() {
    let parameters = ParameterStore::new();
    assert!(parameters.is_empty());
    assert_eq!(parameters.len(), 0);
}

#[tokio::test]
async fn test_parameters_parse_from_string() {
    let parameters = ParameterStore::parse(
        r#"
    {
        "director": {
            "name": "James",
            "age": 26
        },
        "servers": [
            {"host": "db1.example.com"},
            {"host": "db2.example.com"}
        ]
    }
    "#,
    )
    .unwrap();

    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters.get("director.name"), Some(&json!("James")));
    assert_eq!(parameters.get("director.age"), Some(&json!(26)));
    assert_eq!(
        parameters.get("servers.1.host"),
        Some(&json!("db2.example.com"))
    );
    assert_eq!(parameters.get("servers.2.host"), None);
    assert_eq!(parameters.get("director.name.first"), None);
}

#[tokio::test]
async fn test_parameters_parse_invalid_json() {
    assert!(ParameterStore::parse(r#"{ "invalid": json }"#).is_err());
    assert!(ParameterStore::parse(r#"["not", "an", "object"]"#).is_err());
}

#[tokio::test]
async fn test_parameters_parse_file() {
    let json_content = r#"
    {
        "database": {
            "host": "localhost",
            "port": 5432
        },
        "dsn": "postgres://%database.host%:%database.port%/app"
    }
    "#;

    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), json_content).unwrap();

    let parameters = ParameterStore::parse_file(temp_file.path()).await.unwrap();
    assert_eq!(parameters.get("database.port"), Some(&json!(5432)));
    assert_eq!(
        parameters.resolve(&json!("%dsn%")).unwrap(),
        json!("postgres://localhost:5432/app")
    );
}

#[tokio::test]
async fn test_parameters_parse_file_not_found() {
    let result = ParameterStore::parse_file("nonexistent_file.json").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_parameters_exact_key_wins() {
    let mut parameters = ParameterStore::new();
    parameters.set("app.name", "flat");
    parameters.set("app", json!({"name": "nested"}));
    assert_eq!(parameters.get("app.name"), Some(&json!("flat")));
}

#[tokio::test]
async fn test_parameters_merge_objects() {
    let mut base = ParameterStore::parse(
        r#"
    {
        "server": {"bind_addr": "localhost:8080", "workers": 1},
        "database": {"host": "localhost"}
    }
    "#,
    )
    .unwrap();
    let overrides = ParameterStore::parse(
        r#"
    {
        "server": {"bind_addr": "0.0.0.0:8080", "workers": 4},
        "database": {"port": 5432},
        "cache": {"enabled": true}
    }
    "#,
    )
    .unwrap();

    base.merge_from(overrides);

    assert_eq!(base.get("server.bind_addr"), Some(&json!("0.0.0.0:8080")));
    assert_eq!(base.get("server.workers"), Some(&json!(4)));
    assert_eq!(base.get("database.host"), Some(&json!("localhost")));
    assert_eq!(base.get("database.port"), Some(&json!(5432)));
    assert_eq!(base.get("cache.enabled"), Some(&json!(true)));
}

#[tokio::test]
async fn test_parameters_merge_arrays_and_primitives() {
    let mut base = ParameterStore::parse(r#"{"tags": ["production", "web"], "port": 8080}"#).unwrap();
    let overrides = ParameterStore::parse(r#"{"tags": ["monitoring"], "port": 9090}"#).unwrap();

    base.merge_from(overrides);

    assert_eq!(
        base.get("tags"),
        Some(&json!(["production", "web", "monitoring"]))
    );
    assert_eq!(base.get("port"), Some(&json!(9090)));
}

#[tokio::test]
async fn test_resolve_whole_placeholder_keeps_type() {
    let mut parameters = ParameterStore::new();
    parameters.set("bar", 45);
    parameters.set("list", json!([1, 2]));
    parameters.set("flag", true);

    assert_eq!(parameters.resolve(&json!("%bar%")).unwrap(), json!(45));
    assert_eq!(parameters.resolve(&json!("%list%")).unwrap(), json!([1, 2]));
    assert_eq!(parameters.resolve(&json!("%flag%")).unwrap(), json!(true));
}

#[tokio::test]
async fn test_resolve_embedded_placeholders() {
    let mut parameters = ParameterStore::new();
    parameters.set("name", "James");
    parameters.set("age", 45);
    parameters.set("flag", false);
    parameters.set("nothing", json!(null));

    assert_eq!(
        parameters
            .resolve(&json!("%name% is %age%, %flag%[%nothing%]"))
            .unwrap(),
        json!("James is 45, false[]")
    );
    assert_eq!(
        parameters.resolve(&json!("100% literal")).unwrap(),
        json!("100% literal")
    );
}

#[tokio::test]
async fn test_resolve_nested_values() {
    let mut parameters = ParameterStore::new();
    parameters.set("foo", "James");

    let resolved = parameters
        .resolve(&json!({"profile": {"names": ["%foo%", "Bob"]}, "age": 3}))
        .unwrap();
    assert_eq!(
        resolved,
        json!({"profile": {"names": ["James", "Bob"]}, "age": 3})
    );
}

#[tokio::test]
async fn test_resolve_missing_parameter() {
    let parameters = ParameterStore::new();
    let error = parameters.resolve(&json!("%baz% Bob")).unwrap_err();
    assert!(matches!(error, ContainerError::Config(_)));
    assert!(error.to_string().contains("`baz` is not defined"));
}

#[tokio::test]
async fn test_resolve_collection_in_string() {
    let mut parameters = ParameterStore::new();
    parameters.set("list", json!([1, 2]));
    let error = parameters.resolve(&json!("items: %list%")).unwrap_err();
    assert!(matches!(error, ContainerError::Config(_)));
}

#[tokio::test]
async fn test_resolve_depth() {
    let mut parameters = ParameterStore::new();
    parameters.set("first", "%second%");
    parameters.set("second", "%third%");
    parameters.set("third", "value");

    // One extra pass is applied to looked-up values, deeper tokens stay verbatim.
    assert_eq!(parameters.resolve(&json!("%first%")).unwrap(), json!("%third%"));
    assert_eq!(parameters.resolve(&json!("%second%")).unwrap(), json!("value"));
}

#[tokio::test]
async fn test_container_merge_parameters() {
    let container = Container::new();
    container.set_parameters([("database", json!({"host": "localhost"}))]);

    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), r#"{"database": {"port": 5432}}"#).unwrap();
    container.merge_parameters(ParameterStore::parse_file(temp_file.path()).await.unwrap());

    container
        .register(
            "dsn",
            Factory::new(|args| args.value::<String>("dsn")).param("dsn"),
        )
        .set_argument("dsn", "%database.host%:%database.port%");
    assert_eq!(
        container.get_as::<String>("dsn").unwrap().as_str(),
        "localhost:5432"
    );
}
