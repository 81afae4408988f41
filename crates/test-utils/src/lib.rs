//! Tessera test utilities.
//!
//! Fixture builders producing the JSON shapes the API accepts, plus
//! assertion helpers for API responses.

use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

/// A name that will not collide with other test runs sharing a database.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix} {}", Uuid::now_v7().simple())
}

/// Create a test block of `block_type` with no data.
pub fn test_block(block_type: &str) -> TestBlock {
    TestBlock {
        id: format!("blk_{}", Uuid::now_v7().simple()),
        block_type: block_type.to_string(),
        data: Map::new(),
        visibility: "visible".to_string(),
        animation: "none".to_string(),
    }
}

/// A heading block with `text` at `level`.
pub fn heading(text: &str, level: u8) -> TestBlock {
    test_block("heading")
        .with_field("text", json!(text))
        .with_field("level", json!(level))
}

/// A text block with HTML `content`.
pub fn text(content: &str) -> TestBlock {
    test_block("text").with_field("content", json!(content))
}

/// A block builder for section content fixtures.
#[derive(Debug, Clone)]
pub struct TestBlock {
    pub id: String,
    pub block_type: String,
    pub data: Map<String, JsonValue>,
    pub visibility: String,
    pub animation: String,
}

impl TestBlock {
    /// Set a custom id.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Add a single data field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.data.insert(name.to_string(), value);
        self
    }

    /// Set as hidden.
    pub fn hidden(mut self) -> Self {
        self.visibility = "hidden".to_string();
        self
    }

    pub fn with_animation(mut self, animation: &str) -> Self {
        self.animation = animation.to_string();
        self
    }

    /// Stored JSON form.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "type": self.block_type,
            "data": self.data,
            "settings": {
                "visibility": self.visibility,
                "animation": self.animation,
                "customClass": "",
            }
        })
    }
}

/// Block-builder section content holding `blocks` in order.
pub fn block_content(blocks: &[TestBlock]) -> JsonValue {
    json!({ "blocks": blocks.iter().map(TestBlock::to_json).collect::<Vec<_>>() })
}

/// Create a test section request of `component_type`.
pub fn test_section(component_type: &str) -> TestSection {
    TestSection {
        component_type: component_type.to_string(),
        content: None,
        styles: None,
        is_visible: true,
    }
}

/// A section request builder.
#[derive(Debug, Clone)]
pub struct TestSection {
    pub component_type: String,
    pub content: Option<JsonValue>,
    pub styles: Option<JsonValue>,
    pub is_visible: bool,
}

impl TestSection {
    pub fn with_content(mut self, content: JsonValue) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_blocks(self, blocks: &[TestBlock]) -> Self {
        self.with_content(block_content(blocks))
    }

    pub fn with_styles(mut self, styles: JsonValue) -> Self {
        self.styles = Some(styles);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }

    /// Request body for `POST /api/pages/{id}/sections`.
    pub fn to_json(&self) -> JsonValue {
        let mut body = json!({
            "component_type": self.component_type,
            "is_visible": self.is_visible,
        });
        if let Some(content) = &self.content {
            body["content"] = content.clone();
        }
        if let Some(styles) = &self.styles {
            body["styles"] = styles.clone();
        }
        body
    }
}

/// Request body creating a page titled `title`.
pub fn test_page(title: &str) -> JsonValue {
    json!({ "title": title, "is_published": true })
}

/// Request body creating a tenant with a unique name.
pub fn test_tenant(prefix: &str) -> JsonValue {
    json!({ "name": unique_name(prefix) })
}

/// Assertion helpers for JSON responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that a validation error body names `field`.
    pub fn field_error(body: &Value, field: &str) {
        assert!(
            body["fields"].get(field).is_some(),
            "Expected a validation error for '{}', got: {}",
            field,
            body
        );
    }

    /// Assert the ids of a JSON array of records, in order.
    pub fn ids(list: &Value, expected: &[i64]) {
        let actual: Vec<i64> = list
            .as_array()
            .map(|items| items.iter().filter_map(|i| i["id"].as_i64()).collect())
            .unwrap_or_default();
        assert_eq!(actual, expected, "id order mismatch in {}", list);
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_builder_uses_stored_shape() {
        let block = heading("Welcome", 2).hidden().with_id("blk_1");
        let value = block.to_json();

        assert_eq!(value["id"], "blk_1");
        assert_eq!(value["type"], "heading");
        assert_eq!(value["data"]["text"], "Welcome");
        assert_eq!(value["settings"]["visibility"], "hidden");
    }

    #[test]
    fn section_builder_includes_blocks_in_order() {
        let section = test_section("custom").with_blocks(&[
            text("<p>one</p>").with_id("a"),
            text("<p>two</p>").with_id("b"),
        ]);
        let body = section.to_json();

        assert_eq!(body["component_type"], "custom");
        assert_eq!(body["content"]["blocks"][0]["id"], "a");
        assert_eq!(body["content"]["blocks"][1]["id"], "b");
        assert!(body.get("styles").is_none());
    }

    #[test]
    fn unique_names_differ() {
        assert_ne!(unique_name("Acme"), unique_name("Acme"));
        assert!(test_tenant("Acme")["name"].as_str().is_some_and(|n| n.starts_with("Acme ")));
    }

    #[test]
    fn assertions() {
        let body = json!({"error": "validation failed", "fields": {"title": "required"}});
        assert::field_error(&body, "title");
        assert::ids(&json!([{"id": 3}, {"id": 1}]), &[3, 1]);
        assert::contains("hello world", "world");
        assert::not_contains("hello world", "foo");
    }
}
