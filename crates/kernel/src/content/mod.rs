//! Section and block content model.
//!
//! This module provides:
//! - SectionTypeRegistry: section component types, schemas and defaults
//! - BlockTypeRegistry: block type definitions, validation and sanitization
//! - BlockList / BlockDraft: the block editor data flow
//! - SectionContent: block array or flat field content, keyed by content kind
//! - Style normalization for section presentation settings

pub mod block;
pub mod block_types;
pub mod editor;
pub mod schema;
pub mod section_content;
pub mod section_types;
pub mod styles;

pub use block::{BlockSettings, BlockType, ContentBlock, Visibility};
pub use block_types::{BlockTypeDefinition, BlockTypeRegistry, sanitize_html};
pub use editor::{BlockDraft, BlockList, EditorError, SaveOutcome};
pub use schema::{FieldKind, FieldSchema, Schema};
pub use section_content::{SectionContent, merge_content};
pub use section_types::{ContentKind, SectionTypeDefinition, SectionTypeRegistry};
pub use styles::{STYLE_DEFAULTS, merge_styles, normalize_styles};
