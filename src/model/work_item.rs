use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result object as returned by the service, with keys in response order.
pub type Record = Map<String, Value>;

pub const REF_FIELD: &str = "_ref";
pub const REF_OBJECT_NAME: &str = "_refObjectName";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    /// Human-readable identifier, e.g. `US123`.
    #[serde(rename = "FormattedID", skip_serializing_if = "Option::is_none")]
    pub formatted_id: Option<String>,
    #[serde(rename = "ObjectID", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<u64>,
    /// Opaque reference used for update and delete calls.
    #[serde(rename = "_ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub fields: Record,
}

impl WorkItem {
    /// Reads the identifying fields out of a response object. Missing fields stay `None`.
    pub fn from_object(object: &Value) -> Self {
        serde_json::from_value(object.clone()).unwrap_or_else(|_| WorkItem {
            formatted_id: None,
            object_id: None,
            reference: None,
            fields: object.as_object().cloned().unwrap_or_default(),
        })
    }

    pub fn display_id(&self) -> &str {
        self.formatted_id.as_deref().unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_identifying_fields() {
        let item = WorkItem::from_object(&json!({
            "FormattedID": "US42",
            "ObjectID": 1234,
            "_ref": "https://example.com/slm/webservice/v2.0/hierarchicalrequirement/1234",
            "Name": "Login page"
        }));
        assert_eq!(item.formatted_id.as_deref(), Some("US42"));
        assert_eq!(item.object_id, Some(1234));
        assert!(item.reference.as_deref().unwrap().ends_with("/1234"));
        assert_eq!(item.fields.get("Name"), Some(&json!("Login page")));
    }

    #[test]
    fn missing_fields_are_none() {
        let item = WorkItem::from_object(&json!({ "Name": "x" }));
        assert_eq!(item.formatted_id, None);
        assert_eq!(item.display_id(), "<unknown>");
    }

    #[test]
    fn unexpected_shapes_do_not_fail() {
        let item = WorkItem::from_object(&json!({ "FormattedID": 7 }));
        assert_eq!(item.formatted_id, None);
        assert_eq!(item.fields.get("FormattedID"), Some(&json!(7)));
    }
}
