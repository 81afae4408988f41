//! Block type registry and server-side block validation.
//!
//! Provides:
//! - `BlockTypeDefinition`: Schema, defaults and palette metadata for a block type
//! - `BlockTypeRegistry`: Registry of the standard block types with validation
//! - `sanitize_html`: HTML sanitization via ammonia
//! - `sanitize_block`: In-place sanitization of the rich-text fields of a block

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::block::{BlockType, ContentBlock};
use super::schema::{FieldKind, FieldSchema, Schema, defaults_of, schema, validate_required};
use crate::error::FieldErrors;

/// Definition of a single block type in the editor.
#[derive(Debug, Clone, Serialize)]
pub struct BlockTypeDefinition {
    /// Block type (e.g. heading, slider).
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Human-readable label (e.g. "Heading").
    pub label: String,
    /// Icon name shown in the block palette.
    pub icon: String,
    /// Field schema of the block's `data`.
    pub schema: Schema,
}

impl BlockTypeDefinition {
    /// Default `data` for a freshly added block.
    pub fn default_data(&self) -> Map<String, Value> {
        defaults_of(&self.schema)
    }
}

/// Registry of block type definitions.
#[derive(Debug, Clone)]
pub struct BlockTypeRegistry {
    types: BTreeMap<BlockType, BlockTypeDefinition>,
}

impl Default for BlockTypeRegistry {
    fn default() -> Self {
        Self::with_standard_types()
    }
}

impl BlockTypeRegistry {
    /// Create a registry holding every standard block type.
    pub fn with_standard_types() -> Self {
        let mut registry = Self {
            types: BTreeMap::new(),
        };
        registry.register_standard_types();
        registry
    }

    fn register(&mut self, block_type: BlockType, label: &str, icon: &str, schema: Schema) {
        self.types.insert(
            block_type,
            BlockTypeDefinition {
                block_type,
                label: label.to_string(),
                icon: icon.to_string(),
                schema,
            },
        );
    }

    /// Look up a block type definition.
    pub fn get(&self, block_type: BlockType) -> Option<&BlockTypeDefinition> {
        self.types.get(&block_type)
    }

    /// All definitions in palette order.
    pub fn list(&self) -> Vec<&BlockTypeDefinition> {
        BlockType::ALL
            .iter()
            .filter_map(|t| self.types.get(t))
            .collect()
    }

    /// Return the number of registered block types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build a new block of the given type populated with default data.
    pub fn new_block(&self, block_type: BlockType) -> ContentBlock {
        let data = self
            .get(block_type)
            .map(BlockTypeDefinition::default_data)
            .unwrap_or_default();
        ContentBlock::new(block_type, data)
    }

    fn register_standard_types(&mut self) {
        let alignment = || {
            FieldSchema::new(FieldKind::Select, "Alignment")
                .options(&["left", "center", "right"])
                .default_value(json!("left"))
        };

        self.register(
            BlockType::Heading,
            "Heading",
            "heading",
            schema(vec![
                ("text", FieldSchema::new(FieldKind::Text, "Text").required()),
                (
                    "level",
                    FieldSchema::new(FieldKind::Select, "Level")
                        .options(&["1", "2", "3", "4", "5", "6"])
                        .default_value(json!(2)),
                ),
                ("alignment", alignment()),
            ]),
        );

        self.register(
            BlockType::Text,
            "Text",
            "align-left",
            schema(vec![
                (
                    "content",
                    FieldSchema::new(FieldKind::Richtext, "Content").required(),
                ),
                ("alignment", alignment()),
            ]),
        );

        self.register(
            BlockType::Image,
            "Image",
            "image",
            schema(vec![
                ("src", FieldSchema::new(FieldKind::Image, "Image").required()),
                ("alt", FieldSchema::new(FieldKind::Text, "Alt text")),
                ("caption", FieldSchema::new(FieldKind::Text, "Caption")),
                ("link", FieldSchema::new(FieldKind::Url, "Link")),
                (
                    "width",
                    FieldSchema::new(FieldKind::Select, "Width")
                        .options(&["auto", "full", "half"])
                        .default_value(json!("auto")),
                ),
            ]),
        );

        self.register(
            BlockType::Button,
            "Button",
            "mouse-pointer",
            schema(vec![
                ("text", FieldSchema::new(FieldKind::Text, "Label").required()),
                ("url", FieldSchema::new(FieldKind::Url, "URL").required()),
                (
                    "style",
                    FieldSchema::new(FieldKind::Select, "Style")
                        .options(&["primary", "secondary", "outline"])
                        .default_value(json!("primary")),
                ),
                (
                    "target",
                    FieldSchema::new(FieldKind::Select, "Open in")
                        .options(&["_self", "_blank"])
                        .default_value(json!("_self")),
                ),
            ]),
        );

        self.register(
            BlockType::Slider,
            "Slider",
            "layers",
            schema(vec![
                (
                    "items",
                    FieldSchema::new(FieldKind::Repeater, "Slides")
                        .required()
                        .default_value(json!([])),
                ),
                (
                    "autoPlay",
                    FieldSchema::new(FieldKind::Boolean, "Auto play").default_value(json!(true)),
                ),
                (
                    "showDots",
                    FieldSchema::new(FieldKind::Boolean, "Show dots").default_value(json!(true)),
                ),
                (
                    "showArrows",
                    FieldSchema::new(FieldKind::Boolean, "Show arrows").default_value(json!(true)),
                ),
                (
                    "interval",
                    FieldSchema::new(FieldKind::Number, "Interval (ms)").default_value(json!(5000)),
                ),
            ]),
        );

        self.register(
            BlockType::Gallery,
            "Gallery",
            "grid",
            schema(vec![
                (
                    "images",
                    FieldSchema::new(FieldKind::Repeater, "Images")
                        .required()
                        .default_value(json!([])),
                ),
                (
                    "columns",
                    FieldSchema::new(FieldKind::Number, "Columns").default_value(json!(3)),
                ),
                (
                    "lightbox",
                    FieldSchema::new(FieldKind::Boolean, "Lightbox").default_value(json!(true)),
                ),
            ]),
        );

        self.register(
            BlockType::Video,
            "Video",
            "video",
            schema(vec![
                ("url", FieldSchema::new(FieldKind::Url, "Video URL").required()),
                (
                    "autoplay",
                    FieldSchema::new(FieldKind::Boolean, "Autoplay").default_value(json!(false)),
                ),
                (
                    "controls",
                    FieldSchema::new(FieldKind::Boolean, "Controls").default_value(json!(true)),
                ),
            ]),
        );

        self.register(
            BlockType::FaqList,
            "FAQ List",
            "help-circle",
            schema(vec![
                (
                    "items",
                    FieldSchema::new(FieldKind::Repeater, "Questions")
                        .required()
                        .default_value(json!([])),
                ),
                (
                    "style",
                    FieldSchema::new(FieldKind::Select, "Style")
                        .options(&["accordion", "list"])
                        .default_value(json!("accordion")),
                ),
            ]),
        );

        self.register(
            BlockType::Spacer,
            "Spacer",
            "move-vertical",
            schema(vec![(
                "height",
                FieldSchema::new(FieldKind::Select, "Height")
                    .options(&["sm", "md", "lg", "xl"])
                    .default_value(json!("md")),
            )]),
        );

        self.register(
            BlockType::Divider,
            "Divider",
            "minus",
            schema(vec![
                (
                    "style",
                    FieldSchema::new(FieldKind::Select, "Style")
                        .options(&["solid", "dashed", "dotted"])
                        .default_value(json!("solid")),
                ),
                ("color", FieldSchema::new(FieldKind::Color, "Color")),
            ]),
        );

        self.register(
            BlockType::Html,
            "Custom HTML",
            "code",
            schema(vec![(
                "code",
                FieldSchema::new(FieldKind::Code, "HTML").required(),
            )]),
        );
    }

    /// Validate a block's data against its type schema.
    ///
    /// Checks required fields plus a few per-type constraints. Keys of the
    /// returned map are prefixed with `prefix`. An empty map means valid.
    pub fn validate_block(&self, block: &ContentBlock, prefix: &str) -> FieldErrors {
        let Some(definition) = self.get(block.block_type) else {
            let mut errors = FieldErrors::new();
            errors.insert(
                format!("{prefix}type"),
                format!("unknown block type '{}'", block.block_type),
            );
            return errors;
        };

        let mut errors = validate_required(&definition.schema, &block.data, prefix);

        if block.block_type == BlockType::Heading
            && let Some(level) = block.data.get("level")
        {
            let level = level
                .as_i64()
                .or_else(|| level.as_str().and_then(|s| s.parse().ok()));
            match level {
                Some(n) if (1..=6).contains(&n) => {}
                Some(n) => {
                    errors.insert(
                        format!("{prefix}level"),
                        format!("level must be between 1 and 6, got {n}"),
                    );
                }
                None => {
                    errors.insert(
                        format!("{prefix}level"),
                        "level must be an integer".to_string(),
                    );
                }
            }
        }

        if block.block_type == BlockType::FaqList
            && let Some(items) = block.data.get("items").and_then(Value::as_array)
        {
            for (i, item) in items.iter().enumerate() {
                let question = item.get("question").and_then(Value::as_str).unwrap_or("");
                if question.trim().is_empty() {
                    errors.insert(
                        format!("{prefix}items.{i}.question"),
                        "Each FAQ item needs a question.".to_string(),
                    );
                }
            }
        }

        errors
    }

    /// Sanitize the text-bearing fields of a block in-place.
    pub fn sanitize_block(&self, block: &mut ContentBlock) {
        let data = &mut block.data;
        match block.block_type {
            BlockType::Heading | BlockType::Button => sanitize_field(data, "text"),
            BlockType::Text => sanitize_field(data, "content"),
            BlockType::Image => sanitize_field(data, "caption"),
            BlockType::Html => sanitize_field(data, "code"),
            BlockType::Slider => sanitize_items(data, "items", &["title", "description"]),
            BlockType::FaqList => sanitize_items(data, "items", &["question", "answer"]),
            BlockType::Gallery => sanitize_items(data, "images", &["caption"]),
            BlockType::Video | BlockType::Spacer | BlockType::Divider => {}
        }
    }
}

/// Sanitize a string field inside a JSON object in-place using ammonia.
fn sanitize_field(data: &mut Map<String, Value>, field: &str) {
    if let Some(Value::String(text)) = data.get_mut(field) {
        *text = sanitize_html(text);
    }
}

/// Sanitize the named string fields of every object in an array field.
fn sanitize_items(data: &mut Map<String, Value>, field: &str, keys: &[&str]) {
    let Some(items) = data.get_mut(field).and_then(Value::as_array_mut) else {
        return;
    };
    for item in items.iter_mut() {
        if let Some(obj) = item.as_object_mut() {
            for key in keys {
                sanitize_field(obj, key);
            }
        }
    }
}

/// Sanitize HTML input using ammonia with default settings.
///
/// Strips dangerous elements like `<script>`, event handlers, and
/// other XSS vectors while preserving safe formatting tags.
pub fn sanitize_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn block(block_type: BlockType, data: Value) -> ContentBlock {
        ContentBlock::new(block_type, data.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn register_all_standard_types() {
        let registry = BlockTypeRegistry::with_standard_types();
        assert_eq!(registry.len(), BlockType::ALL.len());
        for t in BlockType::ALL {
            assert!(registry.get(t).is_some(), "expected block type '{t}'");
        }
    }

    #[test]
    fn list_follows_palette_order() {
        let registry = BlockTypeRegistry::with_standard_types();
        let types: Vec<BlockType> = registry.list().iter().map(|d| d.block_type).collect();
        assert_eq!(types, BlockType::ALL.to_vec());
    }

    #[test]
    fn new_block_uses_schema_defaults() {
        let registry = BlockTypeRegistry::with_standard_types();
        let slider = registry.new_block(BlockType::Slider);
        assert_eq!(slider.data["autoPlay"], json!(true));
        assert_eq!(slider.data["showDots"], json!(true));
        assert_eq!(slider.data["showArrows"], json!(true));
        assert_eq!(slider.data["items"], json!([]));

        let heading = registry.new_block(BlockType::Heading);
        assert_eq!(heading.data["level"], json!(2));
        assert!(!heading.data.contains_key("text"));
    }

    #[test]
    fn validate_valid_heading() {
        let registry = BlockTypeRegistry::with_standard_types();
        let errors = registry.validate_block(
            &block(BlockType::Heading, json!({"text": "Title", "level": 2})),
            "",
        );
        assert!(errors.is_empty(), "Expected no errors, got: {errors:?}");
    }

    #[test]
    fn heading_level_accepts_numeric_strings() {
        let registry = BlockTypeRegistry::with_standard_types();
        let errors = registry.validate_block(
            &block(BlockType::Heading, json!({"text": "Title", "level": "3"})),
            "",
        );
        assert!(errors.is_empty(), "Expected no errors, got: {errors:?}");
    }

    #[test]
    fn heading_invalid_level() {
        let registry = BlockTypeRegistry::with_standard_types();
        let errors = registry.validate_block(
            &block(BlockType::Heading, json!({"text": "Title", "level": 7})),
            "",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors["level"].contains("between 1 and 6"));
    }

    #[test]
    fn missing_required_fields_reported_with_prefix() {
        let registry = BlockTypeRegistry::with_standard_types();
        let errors = registry.validate_block(&block(BlockType::Button, json!({})), "blocks.1.");
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("blocks.1.text"));
        assert!(errors.contains_key("blocks.1.url"));
    }

    #[test]
    fn empty_slider_is_invalid() {
        let registry = BlockTypeRegistry::with_standard_types();
        let slider = registry.new_block(BlockType::Slider);
        let errors = registry.validate_block(&slider, "");
        assert!(errors.contains_key("items"));
    }

    #[test]
    fn faq_items_need_questions() {
        let registry = BlockTypeRegistry::with_standard_types();
        let errors = registry.validate_block(
            &block(
                BlockType::FaqList,
                json!({"items": [
                    {"question": "Why?", "answer": "Because."},
                    {"question": "", "answer": "Orphan answer"}
                ]}),
            ),
            "",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("items.1.question"));
    }

    #[test]
    fn optional_blocks_validate_empty() {
        let registry = BlockTypeRegistry::with_standard_types();
        for t in [BlockType::Spacer, BlockType::Divider] {
            let errors = registry.validate_block(&registry.new_block(t), "");
            assert!(errors.is_empty(), "{t} should be valid with defaults");
        }
    }

    #[test]
    fn sanitize_html_strips_script() {
        let output = sanitize_html("<p>Hello</p><script>alert('xss')</script>");
        assert!(!output.contains("<script>"));
        assert!(output.contains("<p>Hello</p>"));
    }

    #[test]
    fn sanitize_html_preserves_safe_tags() {
        let input = "<p>Hello <strong>world</strong></p>";
        assert_eq!(sanitize_html(input), input);
    }

    #[test]
    fn sanitize_html_strips_event_handlers() {
        let output = sanitize_html(r#"<a href="/page" onclick="alert('xss')">Link</a>"#);
        assert!(!output.contains("onclick"));
    }

    #[test]
    fn sanitize_block_cleans_text_content() {
        let registry = BlockTypeRegistry::with_standard_types();
        let mut b = block(
            BlockType::Text,
            json!({"content": "<p>Hi</p><script>bad()</script>"}),
        );
        registry.sanitize_block(&mut b);
        let content = b.data["content"].as_str().unwrap();
        assert!(!content.contains("<script>"));
        assert!(content.contains("<p>Hi</p>"));
    }

    #[test]
    fn sanitize_block_cleans_repeater_items() {
        let registry = BlockTypeRegistry::with_standard_types();
        let mut b = block(
            BlockType::Slider,
            json!({"items": [
                {"image": "/a.jpg", "title": "Hi<script>x</script>", "description": "<b>ok</b>"}
            ]}),
        );
        registry.sanitize_block(&mut b);
        let item = &b.data["items"][0];
        assert!(!item["title"].as_str().unwrap().contains("<script>"));
        assert_eq!(item["description"], "<b>ok</b>");
        assert_eq!(item["image"], "/a.jpg");
    }

    #[test]
    fn sanitize_block_leaves_non_text_blocks_unchanged() {
        let registry = BlockTypeRegistry::with_standard_types();
        let mut b = block(BlockType::Video, json!({"url": "https://example.com/v.mp4"}));
        let before = b.clone();
        registry.sanitize_block(&mut b);
        assert_eq!(b, before);
    }
}
