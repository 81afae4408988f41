//! Block editor data flow.
//!
//! A section's block array is edited through a [`BlockList`]. Individual
//! blocks are edited as a [`BlockDraft`]: field patches touch only the draft,
//! and nothing reaches the list until the draft is committed. Dropping a draft
//! discards it. There is no locking; the last committed save wins.

use serde_json::{Map, Value};
use thiserror::Error;

use super::block::{BlockType, ContentBlock, Visibility};
use super::block_types::BlockTypeRegistry;
use crate::error::FieldErrors;

/// Errors from block list operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("block '{0}' not found")]
    BlockNotFound(String),

    #[error("index {index} is out of range for {len} blocks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("block failed validation")]
    Invalid(FieldErrors),
}

/// Where a committed draft landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The draft replaced the block with the same id at this index.
    Replaced(usize),
    /// The draft was a new block, inserted at this index.
    Inserted(usize),
}

/// The ordered blocks of one section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockList {
    blocks: Vec<ContentBlock>,
}

impl BlockList {
    /// Wrap an existing block array.
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }

    /// Blocks in order.
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Consume the list, returning the block array.
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Index of the block with the given id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// Look up a block by id.
    pub fn get(&self, id: &str) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Blocks a renderer should output.
    pub fn visible(&self) -> impl Iterator<Item = &ContentBlock> {
        self.blocks.iter().filter(|b| b.is_visible())
    }

    /// Start a draft for a new block of `block_type`, seeded with defaults.
    pub fn new_draft(registry: &BlockTypeRegistry, block_type: BlockType) -> BlockDraft {
        BlockDraft {
            block: registry.new_block(block_type),
            insert_at: None,
        }
    }

    /// Start a draft editing a copy of an existing block.
    pub fn open_draft(&self, id: &str) -> Result<BlockDraft, EditorError> {
        let block = self
            .get(id)
            .cloned()
            .ok_or_else(|| EditorError::BlockNotFound(id.to_string()))?;
        Ok(BlockDraft {
            block,
            insert_at: None,
        })
    }

    /// Commit a draft into the list.
    ///
    /// A draft whose id already exists replaces that block in place; any other
    /// draft is inserted at its requested position (clamped) or appended.
    pub fn commit(&mut self, draft: BlockDraft) -> SaveOutcome {
        let BlockDraft { block, insert_at } = draft;

        if let Some(index) = self.position(&block.id) {
            self.blocks[index] = block;
            return SaveOutcome::Replaced(index);
        }

        let index = insert_at.map_or(self.blocks.len(), |i| i.min(self.blocks.len()));
        self.blocks.insert(index, block);
        SaveOutcome::Inserted(index)
    }

    /// Validate and sanitize a draft, then commit it.
    pub fn save(
        &mut self,
        registry: &BlockTypeRegistry,
        mut draft: BlockDraft,
    ) -> Result<SaveOutcome, EditorError> {
        let errors = registry.validate_block(&draft.block, "");
        if !errors.is_empty() {
            return Err(EditorError::Invalid(errors));
        }
        registry.sanitize_block(&mut draft.block);
        Ok(self.commit(draft))
    }

    /// Move the block at `from` to index `to`.
    ///
    /// Every other block keeps its relative order.
    pub fn move_block(&mut self, from: usize, to: usize) -> Result<(), EditorError> {
        let len = self.blocks.len();
        if from >= len {
            return Err(EditorError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(EditorError::IndexOutOfRange { index: to, len });
        }
        if from != to {
            let block = self.blocks.remove(from);
            self.blocks.insert(to, block);
        }
        Ok(())
    }

    /// Clone the block with `id` under a fresh id, right after the original.
    ///
    /// Returns the new block's index.
    pub fn duplicate(&mut self, id: &str) -> Result<usize, EditorError> {
        let index = self
            .position(id)
            .ok_or_else(|| EditorError::BlockNotFound(id.to_string()))?;
        let copy = self.blocks[index].duplicate();
        self.blocks.insert(index + 1, copy);
        Ok(index + 1)
    }

    /// Flip a block between visible and hidden. Returns the new visibility.
    pub fn toggle_visibility(&mut self, id: &str) -> Result<Visibility, EditorError> {
        let index = self
            .position(id)
            .ok_or_else(|| EditorError::BlockNotFound(id.to_string()))?;
        let settings = &mut self.blocks[index].settings;
        settings.visibility = settings.visibility.toggled();
        Ok(settings.visibility)
    }

    /// Remove a block by id.
    pub fn remove(&mut self, id: &str) -> Result<ContentBlock, EditorError> {
        let index = self
            .position(id)
            .ok_or_else(|| EditorError::BlockNotFound(id.to_string()))?;
        Ok(self.blocks.remove(index))
    }
}

/// A block being edited outside its list.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDraft {
    block: ContentBlock,
    insert_at: Option<usize>,
}

impl BlockDraft {
    /// The draft's current state.
    pub fn block(&self) -> &ContentBlock {
        &self.block
    }

    /// Request insertion at `index` when the draft is a new block.
    pub fn insert_at(mut self, index: usize) -> Self {
        self.insert_at = Some(index);
        self
    }

    /// Set one data field.
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.block.data.insert(name.to_string(), value);
    }

    /// Shallow-merge a patch into the data. `null` values remove the field.
    pub fn patch(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if value.is_null() {
                self.block.data.remove(&key);
            } else {
                self.block.data.insert(key, value);
            }
        }
    }

    /// Replace the presentation settings.
    pub fn set_settings(&mut self, settings: super::block::BlockSettings) {
        self.block.settings = settings;
    }
}

impl From<ContentBlock> for BlockDraft {
    /// Wrap a client-supplied block as a draft, keeping its id.
    fn from(block: ContentBlock) -> Self {
        Self {
            block,
            insert_at: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heading(text: &str) -> ContentBlock {
        let mut data = Map::new();
        data.insert("text".into(), json!(text));
        ContentBlock::new(BlockType::Heading, data)
    }

    fn list_of(texts: &[&str]) -> BlockList {
        BlockList::new(texts.iter().map(|t| heading(t)).collect())
    }

    fn texts(list: &BlockList) -> Vec<String> {
        list.blocks()
            .iter()
            .map(|b| b.data["text"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn move_forward_keeps_others_in_order() {
        let mut list = list_of(&["a", "b", "c", "d", "e"]);
        list.move_block(1, 3).unwrap();
        assert_eq!(texts(&list), ["a", "c", "d", "b", "e"]);
    }

    #[test]
    fn move_backward_keeps_others_in_order() {
        let mut list = list_of(&["a", "b", "c", "d", "e"]);
        list.move_block(4, 0).unwrap();
        assert_eq!(texts(&list), ["e", "a", "b", "c", "d"]);
    }

    #[test]
    fn move_to_same_index_is_noop() {
        let mut list = list_of(&["a", "b", "c"]);
        let before = list.clone();
        list.move_block(1, 1).unwrap();
        assert_eq!(list, before);
    }

    #[test]
    fn move_out_of_range_is_rejected() {
        let mut list = list_of(&["a", "b"]);
        assert_eq!(
            list.move_block(0, 2),
            Err(EditorError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            list.move_block(5, 0),
            Err(EditorError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(texts(&list), ["a", "b"]);
    }

    #[test]
    fn duplicate_inserts_right_after_source() {
        let mut list = list_of(&["a", "b", "c"]);
        let source = list.blocks()[1].clone();

        let index = list.duplicate(&source.id).unwrap();
        assert_eq!(index, 2);
        assert_eq!(texts(&list), ["a", "b", "b", "c"]);

        let copy = &list.blocks()[2];
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.block_type, source.block_type);
        assert_eq!(copy.data, source.data);
        assert_eq!(copy.settings, source.settings);
    }

    #[test]
    fn duplicate_unknown_block_fails() {
        let mut list = list_of(&["a"]);
        assert_eq!(
            list.duplicate("missing"),
            Err(EditorError::BlockNotFound("missing".into()))
        );
    }

    #[test]
    fn hidden_blocks_stay_in_the_array() {
        let mut list = list_of(&["a", "b", "c"]);
        let id = list.blocks()[1].id.clone();

        assert_eq!(list.toggle_visibility(&id).unwrap(), Visibility::Hidden);
        assert_eq!(list.len(), 3);
        let visible: Vec<_> = list.visible().map(|b| b.id.clone()).collect();
        assert_eq!(visible.len(), 2);
        assert!(!visible.contains(&id));

        assert_eq!(list.toggle_visibility(&id).unwrap(), Visibility::Visible);
        assert_eq!(list.visible().count(), 3);
    }

    #[test]
    fn draft_edits_do_not_touch_list_until_commit() {
        let mut list = list_of(&["a", "b"]);
        let id = list.blocks()[0].id.clone();

        let mut draft = list.open_draft(&id).unwrap();
        draft.set_field("text", json!("changed"));
        assert_eq!(texts(&list), ["a", "b"]);

        assert_eq!(list.commit(draft), SaveOutcome::Replaced(0));
        assert_eq!(texts(&list), ["changed", "b"]);
    }

    #[test]
    fn cancelled_draft_is_discarded() {
        let list = list_of(&["a"]);
        let id = list.blocks()[0].id.clone();
        let before = list.clone();

        let mut draft = list.open_draft(&id).unwrap();
        draft.set_field("text", json!("never saved"));
        drop(draft);

        assert_eq!(list, before);
    }

    #[test]
    fn new_draft_appends_or_inserts() {
        let registry = BlockTypeRegistry::with_standard_types();
        let mut list = list_of(&["a", "b"]);

        let mut draft = BlockList::new_draft(&registry, BlockType::Heading);
        draft.set_field("text", json!("end"));
        assert_eq!(list.save(&registry, draft).unwrap(), SaveOutcome::Inserted(2));

        let mut draft = BlockList::new_draft(&registry, BlockType::Heading).insert_at(0);
        draft.set_field("text", json!("start"));
        assert_eq!(list.save(&registry, draft).unwrap(), SaveOutcome::Inserted(0));

        assert_eq!(texts(&list), ["start", "a", "b", "end"]);
    }

    #[test]
    fn save_rejects_invalid_draft() {
        let registry = BlockTypeRegistry::with_standard_types();
        let mut list = BlockList::default();
        let draft = BlockList::new_draft(&registry, BlockType::Heading);

        let Err(EditorError::Invalid(errors)) = list.save(&registry, draft) else {
            panic!("expected validation failure");
        };
        assert!(errors.contains_key("text"));
        assert!(list.is_empty());
    }

    #[test]
    fn save_sanitizes_html() {
        let registry = BlockTypeRegistry::with_standard_types();
        let mut list = BlockList::default();
        let mut draft = BlockList::new_draft(&registry, BlockType::Text);
        draft.set_field("content", json!("<p>ok</p><script>evil()</script>"));

        list.save(&registry, draft).unwrap();
        let content = list.blocks()[0].data["content"].as_str().unwrap();
        assert!(!content.contains("script"));
    }

    #[test]
    fn patch_merges_and_removes_fields() {
        let registry = BlockTypeRegistry::with_standard_types();
        let mut draft = BlockList::new_draft(&registry, BlockType::Heading);
        let patch = json!({"text": "Hi", "alignment": null, "level": 3});
        draft.patch(patch.as_object().cloned().unwrap());

        let data = &draft.block().data;
        assert_eq!(data["text"], "Hi");
        assert_eq!(data["level"], 3);
        assert!(!data.contains_key("alignment"));
    }

    #[test]
    fn remove_drops_block() {
        let mut list = list_of(&["a", "b", "c"]);
        let id = list.blocks()[1].id.clone();
        let removed = list.remove(&id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(texts(&list), ["a", "c"]);
        assert!(list.remove(&id).is_err());
    }
}
