//! Content blocks: the typed units a block-builder section is assembled from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The fixed set of block types the editor offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Heading,
    Text,
    Image,
    Button,
    Slider,
    Gallery,
    Video,
    FaqList,
    Spacer,
    Divider,
    Html,
}

impl BlockType {
    /// Every block type, in palette order.
    pub const ALL: [BlockType; 11] = [
        BlockType::Heading,
        BlockType::Text,
        BlockType::Image,
        BlockType::Button,
        BlockType::Slider,
        BlockType::Gallery,
        BlockType::Video,
        BlockType::FaqList,
        BlockType::Spacer,
        BlockType::Divider,
        BlockType::Html,
    ];

    /// Machine name as stored in JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Heading => "heading",
            BlockType::Text => "text",
            BlockType::Image => "image",
            BlockType::Button => "button",
            BlockType::Slider => "slider",
            BlockType::Gallery => "gallery",
            BlockType::Video => "video",
            BlockType::FaqList => "faq_list",
            BlockType::Spacer => "spacer",
            BlockType::Divider => "divider",
            BlockType::Html => "html",
        }
    }

    /// Parse a machine name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render-time visibility of a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    /// The opposite visibility.
    pub fn toggled(self) -> Self {
        match self {
            Visibility::Visible => Visibility::Hidden,
            Visibility::Hidden => Visibility::Visible,
        }
    }
}

/// Presentation settings carried by every block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockSettings {
    pub visibility: Visibility,
    pub animation: String,
    pub custom_class: String,
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            visibility: Visibility::Visible,
            animation: "none".to_string(),
            custom_class: String::new(),
        }
    }
}

/// One block inside a section's content array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub settings: BlockSettings,
}

impl ContentBlock {
    /// Create a block with a freshly generated id.
    pub fn new(block_type: BlockType, data: Map<String, Value>) -> Self {
        Self {
            id: new_block_id(),
            block_type,
            data,
            settings: BlockSettings::default(),
        }
    }

    /// Whether the block renders.
    pub fn is_visible(&self) -> bool {
        self.settings.visibility == Visibility::Visible
    }

    /// Deep copy with a new id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: new_block_id(),
            ..self.clone()
        }
    }
}

/// Generate a unique block id.
pub fn new_block_id() -> String {
    format!("blk_{}", Uuid::now_v7().simple())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_json_shape() {
        let block: ContentBlock = serde_json::from_value(json!({
            "id": "b1",
            "type": "faq_list",
            "data": {"items": []},
            "settings": {"visibility": "hidden", "customClass": "dark"}
        }))
        .unwrap();

        assert_eq!(block.block_type, BlockType::FaqList);
        assert_eq!(block.settings.visibility, Visibility::Hidden);
        assert_eq!(block.settings.custom_class, "dark");
        // Missing settings keys fall back to defaults
        assert_eq!(block.settings.animation, "none");

        let out = serde_json::to_value(&block).unwrap();
        assert_eq!(out["type"], "faq_list");
        assert_eq!(out["settings"]["customClass"], "dark");
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        let result = serde_json::from_value::<ContentBlock>(json!({
            "id": "b1",
            "type": "carousel3d",
            "data": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn missing_settings_default_to_visible() {
        let block: ContentBlock =
            serde_json::from_value(json!({"id": "b1", "type": "spacer"})).unwrap();
        assert!(block.is_visible());
        assert!(block.data.is_empty());
    }

    #[test]
    fn duplicate_changes_only_id() {
        let mut data = Map::new();
        data.insert("text".into(), json!("Hello"));
        let original = ContentBlock::new(BlockType::Heading, data);
        let copy = original.duplicate();

        assert_ne!(copy.id, original.id);
        assert_eq!(copy.block_type, original.block_type);
        assert_eq!(copy.data, original.data);
        assert_eq!(copy.settings, original.settings);
    }

    #[test]
    fn block_type_names_round_trip_through_parse() {
        for t in BlockType::ALL {
            assert_eq!(BlockType::parse(t.as_str()), Some(t));
            assert_eq!(
                serde_json::to_value(t).unwrap(),
                Value::String(t.as_str().to_string())
            );
        }
        assert_eq!(BlockType::parse("nope"), None);
    }

    #[test]
    fn visibility_toggles() {
        assert_eq!(Visibility::Visible.toggled(), Visibility::Hidden);
        assert_eq!(Visibility::Hidden.toggled(), Visibility::Visible);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = new_block_id();
        let b = new_block_id();
        assert!(a.starts_with("blk_"));
        assert_ne!(a, b);
    }
}
