//! Section content as a sum type keyed by the section type's content kind.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::block::ContentBlock;
use super::editor::BlockList;
use super::section_types::ContentKind;

/// Parsed content of a section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionContent {
    /// Block-builder content, stored as `{"blocks": [...]}`.
    Blocks(BlockList),
    /// Legacy flat field object.
    Fields(Map<String, Value>),
}

impl SectionContent {
    /// Interpret stored JSON according to `kind`.
    ///
    /// Missing or null block arrays parse as empty. Non-object field content
    /// parses as an empty object.
    pub fn from_value(kind: ContentKind, value: &Value) -> Result<Self, serde_json::Error> {
        match kind {
            ContentKind::Blocks => {
                let blocks = match value.get("blocks") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(raw) => serde_json::from_value::<Vec<ContentBlock>>(raw.clone())?,
                };
                Ok(SectionContent::Blocks(BlockList::new(blocks)))
            }
            ContentKind::Fields => Ok(SectionContent::Fields(
                value.as_object().cloned().unwrap_or_default(),
            )),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            SectionContent::Blocks(_) => ContentKind::Blocks,
            SectionContent::Fields(_) => ContentKind::Fields,
        }
    }

    /// Stored JSON form.
    pub fn to_value(&self) -> Value {
        match self {
            SectionContent::Blocks(list) => {
                let blocks = serde_json::to_value(list.blocks()).unwrap_or(Value::Array(Vec::new()));
                let mut map = Map::new();
                map.insert("blocks".to_string(), blocks);
                Value::Object(map)
            }
            SectionContent::Fields(map) => Value::Object(map.clone()),
        }
    }

    /// JSON for public rendering: hidden blocks removed.
    pub fn to_public_value(&self) -> Value {
        match self {
            SectionContent::Blocks(list) => {
                let visible: Vec<&ContentBlock> = list.visible().collect();
                let blocks = serde_json::to_value(visible).unwrap_or(Value::Array(Vec::new()));
                let mut map = Map::new();
                map.insert("blocks".to_string(), blocks);
                Value::Object(map)
            }
            SectionContent::Fields(_) => self.to_value(),
        }
    }

    /// Borrow the block list, if this is block content.
    pub fn blocks(&self) -> Option<&BlockList> {
        match self {
            SectionContent::Blocks(list) => Some(list),
            SectionContent::Fields(_) => None,
        }
    }

    pub fn blocks_mut(&mut self) -> Option<&mut BlockList> {
        match self {
            SectionContent::Blocks(list) => Some(list),
            SectionContent::Fields(_) => None,
        }
    }
}

impl Serialize for SectionContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Shallow-merge `patch` over `base`. Non-object inputs are treated as empty.
pub fn merge_content(base: &Value, patch: &Value) -> Value {
    let mut merged = base.as_object().cloned().unwrap_or_default();
    if let Some(patch) = patch.as_object() {
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_content_parses_into_list() {
        let value = json!({
            "blocks": [
                {"id": "a", "type": "heading", "data": {"text": "Hi"}},
                {"id": "b", "type": "spacer", "settings": {"visibility": "hidden"}}
            ]
        });
        let content = SectionContent::from_value(ContentKind::Blocks, &value).unwrap();
        assert_eq!(content.kind(), ContentKind::Blocks);
        assert_eq!(content.blocks().unwrap().len(), 2);
    }

    #[test]
    fn missing_blocks_parse_as_empty() {
        let content = SectionContent::from_value(ContentKind::Blocks, &json!({})).unwrap();
        assert!(content.blocks().unwrap().is_empty());
        assert_eq!(content.to_value(), json!({"blocks": []}));
    }

    #[test]
    fn malformed_blocks_are_rejected() {
        let value = json!({"blocks": [{"id": "a", "type": "nope"}]});
        assert!(SectionContent::from_value(ContentKind::Blocks, &value).is_err());
    }

    #[test]
    fn public_value_drops_hidden_blocks() {
        let value = json!({
            "blocks": [
                {"id": "a", "type": "heading", "data": {"text": "Hi"}},
                {"id": "b", "type": "spacer", "settings": {"visibility": "hidden"}}
            ]
        });
        let content = SectionContent::from_value(ContentKind::Blocks, &value).unwrap();
        let public = content.to_public_value();
        let blocks = public["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["id"], "a");

        // Stored form still carries both
        assert_eq!(content.to_value()["blocks"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn field_content_passes_through() {
        let value = json!({"heading": "Welcome", "alignment": "left"});
        let content = SectionContent::from_value(ContentKind::Fields, &value).unwrap();
        assert!(content.blocks().is_none());
        assert_eq!(serde_json::to_value(&content).unwrap(), value);
    }

    #[test]
    fn merge_is_shallow() {
        let base = json!({"heading": "Default", "items": [1, 2], "alignment": "center"});
        let patch = json!({"heading": "Custom", "items": [3]});
        assert_eq!(
            merge_content(&base, &patch),
            json!({"heading": "Custom", "items": [3], "alignment": "center"})
        );
    }
}
