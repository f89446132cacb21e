use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ContainerError, StdError};

/// Number of extra substitution passes applied to a value looked up for a
/// placeholder. Placeholders left after these passes are kept verbatim.
const NESTED_PASSES: usize = 1;

/// Name-keyed tree of configuration values with `%path%` interpolation.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use wiring::ParameterStore;
///
/// let mut parameters = ParameterStore::new();
/// parameters.set("foo", "James");
/// parameters.set("bar", 45);
///
/// let resolved = parameters
///     .resolve(&json!({"name": "%foo% Bob", "age": "%bar%"}))
///     .unwrap();
/// assert_eq!(resolved, json!({"name": "James Bob", "age": 45}));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterStore {
    #[serde(flatten)]
    parameters: BTreeMap<String, Value>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object of parameters.
    pub fn parse<T>(text: T) -> Result<Self, StdError>
    where
        T: AsRef<str>,
    {
        Ok(serde_json::from_str(text.as_ref())?)
    }

    pub async fn parse_file(path: impl AsRef<Path>) -> Result<Self, StdError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::parse(text)
    }

    /// Replaces all parameters.
    pub fn set_all<K, V>(&mut self, parameters: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameters.clear();
        self.add(parameters);
    }

    /// Adds parameters, overwriting existing top-level keys.
    pub fn add<K, V>(&mut self, parameters: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in parameters {
            self.parameters.insert(name.into(), value.into());
        }
    }

    /// Sets one top-level parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Looks up a parameter by exact name or by dotted path.
    ///
    /// Path segments address object keys and array indices.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.parameters.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let mut current = self.parameters.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(entries) => entries.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn get_all(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    /// Deep-merges another store: objects are merged key by key, arrays are
    /// concatenated and any other value is replaced.
    pub fn merge_from(&mut self, other: Self) {
        for (key, value) in other.parameters {
            let entry = self.parameters.entry(key);
            merge_json_from(entry.or_insert(Value::Null), value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Substitutes placeholders in every string of `value`.
    ///
    /// A string that is exactly one placeholder takes the typed value of the
    /// parameter; otherwise substitutions are concatenated into a string.
    pub fn resolve(&self, value: &Value) -> Result<Value, ContainerError> {
        self.resolve_value(value, NESTED_PASSES)
    }

    fn resolve_value(&self, value: &Value, depth: usize) -> Result<Value, ContainerError> {
        match value {
            Value::String(text) => self.resolve_string(text, depth),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, depth))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(entries) => {
                let mut resolved = serde_json::Map::with_capacity(entries.len());
                for (key, item) in entries {
                    resolved.insert(key.clone(), self.resolve_value(item, depth)?);
                }
                Ok(Value::Object(resolved))
            }
            _ => Ok(value.clone()),
        }
    }

    fn resolve_string(&self, text: &str, depth: usize) -> Result<Value, ContainerError> {
        let segments = scan(text);
        if let [Segment::Placeholder(path)] = segments.as_slice() {
            return self.lookup(path, depth);
        }
        if !segments
            .iter()
            .any(|segment| matches!(segment, Segment::Placeholder(_)))
        {
            return Ok(Value::String(text.to_string()));
        }
        let mut output = String::with_capacity(text.len());
        for segment in segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Placeholder(path) => match self.lookup(path, depth)? {
                    Value::String(value) => output.push_str(&value),
                    Value::Number(value) => output.push_str(&value.to_string()),
                    Value::Bool(value) => output.push_str(&value.to_string()),
                    Value::Null => {}
                    Value::Array(_) | Value::Object(_) => {
                        return Err(ContainerError::Config(format!(
                            "`{path}` cannot be embedded in a string"
                        )));
                    }
                },
            }
        }
        Ok(Value::String(output))
    }

    fn lookup(&self, path: &str, depth: usize) -> Result<Value, ContainerError> {
        let value = self
            .get(path)
            .ok_or_else(|| ContainerError::not_defined(path))?;
        if depth == 0 {
            return Ok(value.clone());
        }
        self.resolve_value(value, depth - 1)
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Splits a string into literal text and `%path%` tokens.
///
/// A path is one or more characters other than `%` and whitespace; a `%`
/// that does not open such a token stays literal.
fn scan(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;
    while let Some(offset) = input[cursor..].find('%') {
        let open = cursor + offset;
        let Some(length) = input[open + 1..].find('%') else {
            break;
        };
        let close = open + 1 + length;
        let path = &input[open + 1..close];
        if path.is_empty() || path.contains(char::is_whitespace) {
            cursor = open + 1;
            continue;
        }
        if text_start < open {
            segments.push(Segment::Text(&input[text_start..open]));
        }
        segments.push(Segment::Placeholder(path));
        cursor = close + 1;
        text_start = cursor;
    }
    if text_start < input.len() {
        segments.push(Segment::Text(&input[text_start..]));
    }
    segments
}

fn merge_json_from(lhs: &mut Value, rhs: Value) {
    match lhs {
        Value::Object(l) => match rhs {
            Value::Object(r) => {
                for (key, value) in r {
                    let entry = l.entry(key);
                    merge_json_from(entry.or_insert(Value::Null), value);
                }
            }
            _ => *lhs = rhs,
        },
        Value::Array(l) => match rhs {
            Value::Array(r) => {
                l.extend(r);
            }
            _ => *lhs = rhs,
        },
        _ => *lhs = rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_whole_placeholder() {
        assert_eq!(scan("%foo%"), vec![Segment::Placeholder("foo")]);
    }

    #[test]
    fn test_scan_mixed() {
        assert_eq!(
            scan("%foo% Bob %director.age%!"),
            vec![
                Segment::Placeholder("foo"),
                Segment::Text(" Bob "),
                Segment::Placeholder("director.age"),
                Segment::Text("!"),
            ]
        );
    }

    #[test]
    fn test_scan_literal_percent() {
        assert_eq!(scan("100% and 50%"), vec![Segment::Text("100% and 50%")]);
        assert_eq!(scan("50%"), vec![Segment::Text("50%")]);
        assert_eq!(
            scan("%%foo%"),
            vec![Segment::Text("%"), Segment::Placeholder("foo")]
        );
    }

    #[test]
    fn test_scan_empty() {
        assert!(scan("").is_empty());
    }
}
