use serde::de::DeserializeOwned;
use serde::Serialize;

/// How a document is addressed inside its collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocId {
    /// Natural key chosen by the caller (item id, category name, ...)
    Key(String),
    /// Auto-increment sequence handed out by the store on insert
    Seq(i64),
    /// Auto-keyed document that hasn't been inserted yet
    Unassigned,
}

/// A record that lives in a named collection.
///
/// Documents are stored as JSON, so anything serde can round-trip works.
/// Auto-keyed documents get their sequence back through `assign_seq` on insert
/// and again on every load - the sequence column is the source of truth, not
/// whatever id happens to be inside the JSON blob.
pub trait Document: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;

    fn id(&self) -> DocId;

    fn assign_seq(&mut self, _seq: i64) {}
}

/// Value side of a filter clause
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<FieldValue> for rusqlite::types::Value {
    fn from(v: FieldValue) -> Self {
        match v {
            FieldValue::Text(s) => rusqlite::types::Value::Text(s),
            FieldValue::Integer(i) => rusqlite::types::Value::Integer(i),
            // json_extract yields 1/0 for JSON booleans
            FieldValue::Bool(b) => rusqlite::types::Value::Integer(b as i64),
        }
    }
}

/// AND-ed list of `field == value` clauses, evaluated against the stored JSON
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, FieldValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a filter with a single equality clause
    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::new().and(field, value)
    }

    pub fn and(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    /// WHERE fragment plus its bound parameters (json path, value, json path, value, ...)
    pub(crate) fn to_sql(&self) -> (String, Vec<rusqlite::types::Value>) {
        if self.clauses.is_empty() {
            return ("1 = 1".to_string(), Vec::new());
        }

        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::with_capacity(self.clauses.len() * 2);
        for (i, (field, value)) in self.clauses.iter().enumerate() {
            parts.push(format!(
                "json_extract(data, ?{}) = ?{}",
                i * 2 + 1,
                i * 2 + 2
            ));
            params.push(rusqlite::types::Value::Text(json_path(field)));
            params.push(value.clone().into());
        }

        (parts.join(" AND "), params)
    }
}

/// Quote the field so names like `_id` or ones with dots survive json_extract
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}
