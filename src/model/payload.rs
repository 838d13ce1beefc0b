use serde::Serialize;
use serde_json::{Map, Value};

/// Field map sent to create and update calls. Unset fields are left unchanged
/// server-side; insertion order is kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn extend(&mut self, fields: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in fields {
            self.set(key, value);
        }
    }

    /// Request body shape expected by the service: `{"<Type>": {fields...}}`.
    pub fn envelope(&self, work_type: &str) -> Value {
        let mut body = Map::new();
        body.insert(work_type.to_string(), Value::Object(self.fields.clone()));
        Value::Object(body)
    }
}
