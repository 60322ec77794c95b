use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single field value of a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(Record),
}

impl Value {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Map(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Map(_) => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Map(r)
    }
}

// Integral values print without a fractional part, so 42.0 sorts and renders as "42".
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// An opaque mapping from field name to [`Value`].
///
/// Fields are addressed by dotted paths: `"LastModifiedBy.Name"` descends into
/// the nested `LastModifiedBy` map and reads its `Name` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert of a top level field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Resolves a dotted path, returning `None` if any segment is missing or
    /// an intermediate value is not a map.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_record()?.0.get(segment)?;
        }
        Some(current)
    }

    /// Display text of the field at `path`. Missing and null fields are empty.
    pub fn text(&self, path: &str) -> String {
        self.resolve(path).map(|v| v.to_string()).unwrap_or_default()
    }

    /// Inserts `value` at a dotted path, creating intermediate maps as needed.
    /// A non-map value in the way is replaced.
    pub fn insert_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => {
                self.0.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                let entry = self
                    .0
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Map(Record::new()));
                if !matches!(entry, Value::Map(_)) {
                    *entry = Value::Map(Record::new());
                }
                if let Value::Map(inner) = entry {
                    inner.insert_path(rest, value);
                }
            }
        }
    }

    /// Dotted paths of all leaf fields, in key order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_leaf_paths("", &mut paths);
        paths
    }

    fn collect_leaf_paths(&self, prefix: &str, paths: &mut Vec<String>) {
        for (key, value) in self.0.iter() {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Map(inner) => inner.collect_leaf_paths(&path, paths),
                _ => paths.push(path),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Record {
        Record::new()
            .with("Name", "Welcome")
            .with("Count", 10.0)
            .with("LastModifiedBy", Record::new().with("Name", "Ada"))
    }

    #[test]
    fn resolves_nested_paths() {
        let r = template();
        assert_eq!(r.text("LastModifiedBy.Name"), "Ada");
        assert_eq!(r.text("Name"), "Welcome");
    }

    #[test]
    fn missing_segments_are_empty() {
        let r = template();
        assert!(r.resolve("LastModifiedBy.Email").is_none());
        assert!(r.resolve("Name.First").is_none());
        assert_eq!(r.text("Nope.Name"), "");
        assert_eq!(Record::new().with("Owner", Value::Null).text("Owner"), "");
    }

    #[test]
    fn numbers_format_canonically() {
        assert_eq!(template().text("Count"), "10");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn insert_path_builds_nested_maps() {
        let mut r = Record::new();
        r.insert_path("Owner.Name", "Grace".into());
        r.insert_path("Owner.Id", 7.0.into());
        r.insert_path("Name", "Invite".into());
        assert_eq!(r.text("Owner.Name"), "Grace");
        assert_eq!(r.leaf_paths(), vec!["Name", "Owner.Id", "Owner.Name"]);
    }

    #[test]
    fn deserializes_from_json() {
        let r: Record =
            serde_json::from_str(r#"{"Name": "A", "Size": 3, "By": {"Name": null}}"#).unwrap();
        assert_eq!(r.resolve("Size"), Some(&Value::Number(3.0)));
        assert_eq!(r.resolve("By.Name"), Some(&Value::Null));
        assert_eq!(r.text("By.Name"), "");
    }
}
