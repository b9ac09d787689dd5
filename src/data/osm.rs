use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::Result;

/// An element as read from the .osm file. Only elements below the document
/// root keep their children, so one of these never holds more than a single
/// node, way or relation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<RawElement>,
}

impl RawElement {
    pub fn new(name: &str) -> Self {
        RawElement {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn required_attribute(&self, key: &str) -> Result<&str> {
        self.attribute(key)
            .ok_or_else(|| format!("<{}> element is missing the '{}' attribute", self.name, key).into())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }
}

#[cfg(test)]
impl RawElement {
    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_child(mut self, child: RawElement) -> Self {
        self.children.push(child);
        self
    }

    /// Shorthand for a `<tag k=".." v=".."/>` child.
    pub fn with_tag(self, key: &str, value: &str) -> Self {
        self.with_child(RawElement::new("tag").with_attribute("k", key).with_attribute("v", value))
    }
}

/// A node or way reshaped into a document for the store.
///
/// Fields are kept in insertion order and every write replaces what was
/// stored under the same key before, so the order in which the normalizer
/// applies attributes and tags decides collisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: Map<String, Value>,
}

impl NormalizedRecord {
    pub fn new(element_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::from(element_type));
        fields.insert("pos".to_string(), Value::Array(Vec::new()));
        NormalizedRecord { fields }
    }

    pub(crate) fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub(crate) fn insert_lat(&mut self, lat: f64) {
        self.array_field("pos").insert(0, Value::from(lat));
    }

    pub(crate) fn push_lon(&mut self, lon: f64) {
        self.array_field("pos").push(Value::from(lon));
    }

    pub(crate) fn insert_created(&mut self, key: &str, value: &str) {
        self.object_field("created").insert(key.to_string(), Value::from(value));
    }

    pub(crate) fn insert_address(&mut self, key: &str, value: &str) {
        self.object_field("address").insert(key.to_string(), Value::from(value));
    }

    pub(crate) fn push_node_ref(&mut self, node_ref: &str) {
        self.array_field("node_refs").push(Value::from(node_ref));
    }

    // A plain value stored under a structured key is replaced, not merged into.
    fn object_field(&mut self, key: &str) -> &mut Map<String, Value> {
        let entry = self.fields.entry(key).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        entry.as_object_mut().expect("field was just made an object")
    }

    fn array_field(&mut self, key: &str) -> &mut Vec<Value> {
        let entry = self.fields.entry(key).or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        entry.as_array_mut().expect("field was just made an array")
    }
}

#[cfg(test)]
impl NormalizedRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn element_type(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    /// `[lat, lon]` when both were present. Anything shorter means the
    /// element was missing a coordinate.
    pub fn pos(&self) -> Vec<f64> {
        self.get("pos")
            .and_then(Value::as_array)
            .map(|pos| pos.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_record_starts_with_type_and_empty_pos() {
        let record = NormalizedRecord::new("node");
        assert_eq!(record.element_type(), Some("node"));
        assert!(record.pos().is_empty());
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["type", "pos"]);
    }

    #[test]
    fn lat_lands_first_whatever_the_order() {
        let mut record = NormalizedRecord::new("node");
        record.push_lon(24.9);
        record.insert_lat(60.1);
        assert_eq!(record.pos(), vec![60.1, 24.9]);
    }

    #[test]
    fn structured_field_replaces_plain_value() {
        let mut record = NormalizedRecord::new("way");
        record.set("address", "somewhere");
        record.insert_address("city", "Helsinki");
        assert_eq!(record.get("address"), Some(&json!({"city": "Helsinki"})));
    }

    #[test]
    fn plain_value_replaces_structured_field_in_place() {
        let mut record = NormalizedRecord::new("node");
        record.insert_created("user", "alice");
        record.set("created", "yesterday");
        assert_eq!(record.get("created"), Some(&json!("yesterday")));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["type", "pos", "created"]);
    }

    #[test]
    fn serializes_fields_in_insertion_order() {
        let mut record = NormalizedRecord::new("way");
        record.set("id", "7");
        record.push_node_ref("1");
        record.push_node_ref("2");
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"type":"way","pos":[],"id":"7","node_refs":["1","2"]}"#
        );
    }

    #[test]
    fn raw_element_attribute_lookup() {
        let element = RawElement::new("nd").with_attribute("ref", "42");
        assert_eq!(element.attribute("ref"), Some("42"));
        assert!(element.required_attribute("k").is_err());
    }

    #[test]
    fn children_named_filters_and_keeps_order() {
        let element = RawElement::new("way")
            .with_child(RawElement::new("nd").with_attribute("ref", "1"))
            .with_tag("name", "Road")
            .with_child(RawElement::new("nd").with_attribute("ref", "2"));
        let refs: Vec<_> = element.children_named("nd")
            .filter_map(|nd| nd.attribute("ref"))
            .collect();
        assert_eq!(refs, vec!["1", "2"]);
        assert_eq!(element.children_named("tag").count(), 1);
    }
}
