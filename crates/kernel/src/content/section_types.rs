//! Section type registry.
//!
//! A static catalog mapping section component types to their field schema,
//! default content and content kind. Lookups of unknown types return `None`
//! or an empty value; nothing here panics or touches I/O.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::block::ContentBlock;
use super::block_types::BlockTypeRegistry;
use super::schema::{FieldKind, FieldSchema, Schema, defaults_of, schema, validate_required};
use crate::error::FieldErrors;

/// How a section type stores its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A flat object of schema fields.
    Fields,
    /// An ordered array of content blocks.
    Blocks,
}

/// Registry entry for one section type.
#[derive(Debug, Clone, Serialize)]
pub struct SectionTypeDefinition {
    pub name: String,
    pub label: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub content_kind: ContentKind,
    pub schema: Schema,
    pub defaults: Map<String, Value>,
}

impl SectionTypeDefinition {
    fn fields(
        name: &str,
        label: &str,
        description: &str,
        icon: &str,
        category: &str,
        schema: Schema,
    ) -> Self {
        let defaults = defaults_of(&schema);
        Self {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            category: category.to_string(),
            content_kind: ContentKind::Fields,
            schema,
            defaults,
        }
    }
}

/// The section type catalog.
#[derive(Debug, Clone)]
pub struct SectionTypeRegistry {
    types: BTreeMap<String, SectionTypeDefinition>,
    blocks: BlockTypeRegistry,
}

impl Default for SectionTypeRegistry {
    fn default() -> Self {
        Self::with_standard_types()
    }
}

impl SectionTypeRegistry {
    /// Registry holding the built-in section types.
    pub fn with_standard_types() -> Self {
        let mut types = BTreeMap::new();
        for def in standard_types() {
            types.insert(def.name.clone(), def);
        }
        Self {
            types,
            blocks: BlockTypeRegistry::with_standard_types(),
        }
    }

    /// The block registry used for block-kind sections.
    pub fn blocks(&self) -> &BlockTypeRegistry {
        &self.blocks
    }

    pub fn is_valid_type(&self, component_type: &str) -> bool {
        self.types.contains_key(component_type)
    }

    pub fn get(&self, component_type: &str) -> Option<&SectionTypeDefinition> {
        self.types.get(component_type)
    }

    pub fn get_type_schema(&self, component_type: &str) -> Option<&Schema> {
        self.types.get(component_type).map(|d| &d.schema)
    }

    pub fn content_kind(&self, component_type: &str) -> Option<ContentKind> {
        self.types.get(component_type).map(|d| d.content_kind)
    }

    /// Default content for a type. Unknown types get an empty object.
    ///
    /// Block-kind types default to `{"blocks": []}`.
    pub fn get_default_content(&self, component_type: &str) -> Value {
        match self.types.get(component_type) {
            Some(def) => Value::Object(def.defaults.clone()),
            None => Value::Object(Map::new()),
        }
    }

    /// All definitions, sorted by name.
    pub fn list_types(&self) -> Vec<&SectionTypeDefinition> {
        self.types.values().collect()
    }

    /// Definitions grouped by category.
    pub fn types_by_category(&self) -> BTreeMap<&str, Vec<&SectionTypeDefinition>> {
        let mut grouped: BTreeMap<&str, Vec<&SectionTypeDefinition>> = BTreeMap::new();
        for def in self.types.values() {
            grouped.entry(def.category.as_str()).or_default().push(def);
        }
        grouped
    }

    /// Shallow required-field check of section content.
    ///
    /// Returns an empty map when the content is valid or the type is unknown.
    /// For block-kind types each block is also checked against its block
    /// schema, with errors keyed `blocks.<index>.<field>`.
    pub fn validate_content(&self, component_type: &str, content: &Value) -> FieldErrors {
        let Some(def) = self.types.get(component_type) else {
            return FieldErrors::new();
        };
        let empty = Map::new();
        let data = content.as_object().unwrap_or(&empty);

        let mut errors = validate_required(&def.schema, data, "");
        if def.content_kind == ContentKind::Blocks {
            errors.extend(self.validate_blocks(data.get("blocks")));
        }
        errors
    }

    /// Merge `supplied` over the type's defaults, validate, and sanitize
    /// block HTML.
    pub fn prepare_content(
        &self,
        component_type: &str,
        supplied: Option<&Value>,
    ) -> Result<Value, FieldErrors> {
        if !self.is_valid_type(component_type) {
            let mut errors = FieldErrors::new();
            errors.insert(
                "component_type".to_string(),
                format!("Unknown section type '{component_type}'."),
            );
            return Err(errors);
        }

        let defaults = self.get_default_content(component_type);
        let content = match supplied {
            Some(patch) => {
                let patch = self.shape_content(component_type, patch)?;
                super::section_content::merge_content(&defaults, &patch)
            }
            None => defaults,
        };
        self.check_content(component_type, content)
    }

    /// Bring supplied content into the stored object shape.
    ///
    /// Block-kind types also accept a bare block array, which becomes
    /// `{"blocks": [...]}`. Null means no fields. Anything else that is not
    /// an object is a `content` error.
    pub fn shape_content(&self, component_type: &str, supplied: &Value) -> Result<Value, FieldErrors> {
        let kind = self.content_kind(component_type);
        match supplied {
            Value::Object(_) => Ok(supplied.clone()),
            Value::Null => Ok(Value::Object(Map::new())),
            Value::Array(_) if kind == Some(ContentKind::Blocks) => {
                Ok(json!({ "blocks": supplied }))
            }
            _ => {
                let message = if kind == Some(ContentKind::Blocks) {
                    "Content must be an object or an array of blocks."
                } else {
                    "Content must be an object."
                };
                let mut errors = FieldErrors::new();
                errors.insert("content".to_string(), message.to_string());
                Err(errors)
            }
        }
    }

    /// Validate full content and sanitize block HTML.
    pub fn check_content(&self, component_type: &str, mut content: Value) -> Result<Value, FieldErrors> {
        let errors = self.validate_content(component_type, &content);
        if !errors.is_empty() {
            return Err(errors);
        }
        if self.content_kind(component_type) == Some(ContentKind::Blocks) {
            self.sanitize_blocks(&mut content);
        }
        Ok(content)
    }

    fn sanitize_blocks(&self, content: &mut Value) {
        let Some(Value::Array(items)) = content.get_mut("blocks") else {
            return;
        };
        for item in items.iter_mut() {
            if let Ok(mut block) = serde_json::from_value::<ContentBlock>(item.clone()) {
                self.blocks.sanitize_block(&mut block);
                if let Ok(clean) = serde_json::to_value(&block) {
                    *item = clean;
                }
            }
        }
    }

    fn validate_blocks(&self, blocks: Option<&Value>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let items = match blocks {
            None | Some(Value::Null) => return errors,
            Some(Value::Array(items)) => items,
            Some(_) => {
                errors.insert("blocks".to_string(), "Blocks must be an array.".to_string());
                return errors;
            }
        };

        for (index, item) in items.iter().enumerate() {
            let prefix = format!("blocks.{index}.");
            match serde_json::from_value::<ContentBlock>(item.clone()) {
                Ok(block) => errors.extend(self.blocks.validate_block(&block, &prefix)),
                Err(_) => {
                    errors.insert(
                        format!("blocks.{index}"),
                        "The block is malformed or has an unknown type.".to_string(),
                    );
                }
            }
        }
        errors
    }
}

fn text(label: &str) -> FieldSchema {
    FieldSchema::new(FieldKind::Text, label)
}

fn textarea(label: &str) -> FieldSchema {
    FieldSchema::new(FieldKind::Textarea, label)
}

fn url(label: &str) -> FieldSchema {
    FieldSchema::new(FieldKind::Url, label)
}

fn image(label: &str) -> FieldSchema {
    FieldSchema::new(FieldKind::Image, label)
}

fn repeater(label: &str) -> FieldSchema {
    FieldSchema::new(FieldKind::Repeater, label).default_value(json!([]))
}

fn number(label: &str, default: i64) -> FieldSchema {
    FieldSchema::new(FieldKind::Number, label).default_value(json!(default))
}

fn boolean(label: &str, default: bool) -> FieldSchema {
    FieldSchema::new(FieldKind::Boolean, label).default_value(json!(default))
}

fn select(label: &str, options: &[&str], default: &str) -> FieldSchema {
    FieldSchema::new(FieldKind::Select, label)
        .options(options)
        .default_value(json!(default))
}

fn standard_types() -> Vec<SectionTypeDefinition> {
    let mut types = vec![
        SectionTypeDefinition::fields(
            "hero",
            "Hero",
            "Large banner with heading, subheading and call to action",
            "layout",
            "header",
            schema(vec![
                ("heading", text("Heading").required()),
                ("subheading", textarea("Subheading")),
                ("background_image", image("Background Image")),
                ("cta_text", text("Button Text")),
                ("cta_url", url("Button URL")),
                ("alignment", select("Alignment", &["left", "center", "right"], "center")),
            ]),
        ),
        SectionTypeDefinition::fields(
            "text",
            "Text",
            "Rich text content block",
            "file-text",
            "content",
            schema(vec![
                ("title", text("Title")),
                ("body", FieldSchema::new(FieldKind::Richtext, "Body").required()),
            ]),
        ),
        SectionTypeDefinition::fields(
            "features",
            "Features",
            "Grid of features with icons",
            "grid",
            "content",
            schema(vec![
                ("title", text("Title")),
                ("subtitle", textarea("Subtitle")),
                ("items", repeater("Features").required()),
                ("columns", number("Columns", 3)),
            ]),
        ),
        SectionTypeDefinition::fields(
            "services",
            "Services",
            "Listing of published services",
            "briefcase",
            "collections",
            schema(vec![
                ("title", text("Title")),
                ("subtitle", textarea("Subtitle")),
                ("category_slug", text("Category")),
                ("limit", number("Limit", 6)),
                ("show_featured_only", boolean("Featured Only", false)),
            ]),
        ),
        SectionTypeDefinition::fields(
            "testimonials",
            "Testimonials",
            "Customer testimonials carousel",
            "message-square",
            "collections",
            schema(vec![
                ("title", text("Title")),
                ("limit", number("Limit", 6)),
                ("layout", select("Layout", &["carousel", "grid"], "carousel")),
            ]),
        ),
        SectionTypeDefinition::fields(
            "team",
            "Team",
            "Team member profiles",
            "users",
            "collections",
            schema(vec![
                ("title", text("Title")),
                ("subtitle", textarea("Subtitle")),
                ("columns", number("Columns", 4)),
            ]),
        ),
        SectionTypeDefinition::fields(
            "faq",
            "FAQ",
            "Frequently asked questions",
            "help-circle",
            "collections",
            schema(vec![
                ("title", text("Title")),
                ("category", text("Category")),
                ("style", select("Style", &["accordion", "list"], "accordion")),
            ]),
        ),
        SectionTypeDefinition::fields(
            "cta",
            "Call to Action",
            "Banner prompting visitors to act",
            "megaphone",
            "conversion",
            schema(vec![
                ("heading", text("Heading").required()),
                ("text", textarea("Text")),
                ("button_text", text("Button Text").required()),
                ("button_url", url("Button URL").required()),
            ]),
        ),
        SectionTypeDefinition::fields(
            "contact",
            "Contact",
            "Contact details and form",
            "mail",
            "conversion",
            schema(vec![
                ("title", text("Title")),
                ("email", text("Email")),
                ("phone", text("Phone")),
                ("address", textarea("Address")),
                ("show_form", boolean("Show Form", true)),
                ("show_map", boolean("Show Map", false)),
            ]),
        ),
        SectionTypeDefinition::fields(
            "gallery",
            "Gallery",
            "Image gallery",
            "image",
            "media",
            schema(vec![
                ("title", text("Title")),
                ("images", repeater("Images").required()),
                ("columns", number("Columns", 3)),
            ]),
        ),
        SectionTypeDefinition::fields(
            "stats",
            "Stats",
            "Key figures with labels",
            "bar-chart",
            "content",
            schema(vec![
                ("title", text("Title")),
                ("items", repeater("Stats").required()),
            ]),
        ),
    ];

    let blocks_schema = schema(vec![("blocks", repeater("Blocks"))]);
    let defaults = defaults_of(&blocks_schema);
    types.push(SectionTypeDefinition {
        name: "custom".to_string(),
        label: "Custom".to_string(),
        description: "Free-form section assembled from content blocks".to_string(),
        icon: "blocks".to_string(),
        category: "builder".to_string(),
        content_kind: ContentKind::Blocks,
        schema: blocks_schema,
        defaults,
    });

    types
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> SectionTypeRegistry {
        SectionTypeRegistry::with_standard_types()
    }

    #[test]
    fn standard_types_are_registered() {
        let registry = registry();
        for name in [
            "hero", "text", "features", "services", "testimonials", "team", "faq", "cta",
            "contact", "gallery", "stats", "custom",
        ] {
            assert!(registry.is_valid_type(name), "{name} missing");
        }
        assert_eq!(registry.list_types().len(), 12);
    }

    #[test]
    fn unknown_type_yields_empty_results() {
        let registry = registry();
        assert!(!registry.is_valid_type("carousel"));
        assert!(registry.get_type_schema("carousel").is_none());
        assert_eq!(registry.get_default_content("carousel"), json!({}));
        assert!(
            registry
                .validate_content("carousel", &json!({}))
                .is_empty()
        );
        assert!(registry.content_kind("carousel").is_none());
    }

    #[test]
    fn default_content_comes_from_schema_defaults() {
        let content = registry().get_default_content("hero");
        assert_eq!(content, json!({"alignment": "center"}));

        let custom = registry().get_default_content("custom");
        assert_eq!(custom, json!({"blocks": []}));
    }

    #[test]
    fn validate_reports_missing_required_fields() {
        let errors = registry().validate_content("cta", &json!({"heading": "Go"}));
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("button_text"));
        assert!(errors.contains_key("button_url"));
    }

    #[test]
    fn validate_accepts_complete_content() {
        let content = json!({"heading": "Welcome", "alignment": "left"});
        assert!(registry().validate_content("hero", &content).is_empty());
    }

    #[test]
    fn non_object_content_is_treated_as_empty() {
        let errors = registry().validate_content("hero", &json!("oops"));
        assert!(errors.contains_key("heading"));
    }

    #[test]
    fn block_sections_validate_each_block() {
        let content = json!({
            "blocks": [
                {"id": "a", "type": "heading", "data": {"text": "Hi"}},
                {"id": "b", "type": "button", "data": {"text": "Go"}},
                {"id": "c", "type": "warp_drive", "data": {}}
            ]
        });
        let errors = registry().validate_content("custom", &content);
        assert!(errors.contains_key("blocks.1.url"));
        assert!(errors.contains_key("blocks.2"));
        assert!(!errors.keys().any(|k| k.starts_with("blocks.0")));
    }

    #[test]
    fn empty_block_section_is_valid() {
        let errors = registry().validate_content("custom", &json!({"blocks": []}));
        assert!(errors.is_empty());
    }

    #[test]
    fn non_array_blocks_are_rejected() {
        let registry = registry();
        let errors = registry.validate_content("custom", &json!({"blocks": "oops"}));
        assert_eq!(errors.get("blocks").map(String::as_str), Some("Blocks must be an array."));

        assert!(registry.check_content("custom", json!({"blocks": {"a": 1}})).is_err());
        assert!(registry.validate_content("custom", &json!({"blocks": null})).is_empty());
    }

    #[test]
    fn prepare_accepts_bare_block_array() {
        let registry = registry();
        let blocks = json!([{"id": "b1", "type": "heading", "data": {"text": "Hi"}}]);

        let from_array = registry.prepare_content("custom", Some(&blocks)).unwrap();
        let from_object = registry
            .prepare_content("custom", Some(&json!({"blocks": blocks.clone()})))
            .unwrap();
        assert_eq!(from_array, from_object);
        assert_eq!(from_array["blocks"][0]["id"], "b1");
        assert_eq!(from_array["blocks"][0]["data"]["text"], "Hi");
    }

    #[test]
    fn prepare_rejects_content_of_the_wrong_shape() {
        let registry = registry();
        let errors = registry
            .prepare_content("hero", Some(&json!([{"heading": "Hi"}])))
            .unwrap_err();
        assert!(errors.contains_key("content"));

        let errors = registry.prepare_content("custom", Some(&json!("oops"))).unwrap_err();
        assert!(errors.contains_key("content"));

        let errors = registry
            .prepare_content("custom", Some(&json!([{"id": "b1", "type": "button", "data": {}}])))
            .unwrap_err();
        assert!(errors.contains_key("blocks.0.url"));
    }

    #[test]
    fn prepare_merges_defaults_and_validates() {
        let registry = registry();
        let content = registry
            .prepare_content("hero", Some(&json!({"heading": "Hello"})))
            .unwrap();
        assert_eq!(content, json!({"heading": "Hello", "alignment": "center"}));

        let errors = registry.prepare_content("hero", None).unwrap_err();
        assert!(errors.contains_key("heading"));

        let errors = registry.prepare_content("nope", None).unwrap_err();
        assert!(errors.contains_key("component_type"));
    }

    #[test]
    fn prepare_sanitizes_block_html() {
        let content = registry()
            .prepare_content(
                "custom",
                Some(&json!({"blocks": [
                    {"id": "a", "type": "text", "data": {"content": "<b>hi</b><script>x()</script>"}}
                ]})),
            )
            .unwrap();
        let html = content["blocks"][0]["data"]["content"].as_str().unwrap();
        assert!(html.contains("<b>hi</b>"));
        assert!(!html.contains("script"));
    }

    #[test]
    fn content_kind_distinguishes_builder() {
        let registry = registry();
        assert_eq!(registry.content_kind("custom"), Some(ContentKind::Blocks));
        assert_eq!(registry.content_kind("hero"), Some(ContentKind::Fields));
    }

    #[test]
    fn categories_group_all_types() {
        let registry = registry();
        let grouped = registry.types_by_category();
        let total: usize = grouped.values().map(Vec::len).sum();
        assert_eq!(total, registry.list_types().len());
        assert!(grouped["collections"].iter().any(|d| d.name == "faq"));
    }

    #[test]
    fn definition_serializes_for_admin_ui() {
        let registry = registry();
        let json = serde_json::to_value(registry.get("hero").unwrap()).unwrap();
        assert_eq!(json["content_kind"], "fields");
        assert_eq!(json["schema"]["heading"]["type"], "text");
        assert_eq!(json["schema"]["heading"]["required"], true);
        assert_eq!(json["defaults"]["alignment"], "center");
    }
}
