//! Block editor operations on a block-builder section.
//!
//! Each request loads the section's block list, applies one editor
//! operation and stores the whole list back. Drafts live in the client
//! until saved; `POST .../blocks/draft` only hands out a seeded draft.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::content::{
    BlockDraft, BlockList, BlockType, ContentBlock, ContentKind, EditorError, SaveOutcome,
    SectionContent,
};
use crate::error::{AppError, AppResult};
use crate::models::{Page, Section};
use crate::routes::helpers::require_editor;
use crate::routes::sections::{load_section, section_event};
use crate::services::events::ContentAction;
use crate::state::AppState;
use crate::tenant::TenantContext;

/// Create the block editor router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sections/{id}/blocks", get(list_blocks).put(save_block))
        .route("/api/sections/{id}/blocks/draft", post(new_draft))
        .route("/api/sections/{id}/blocks/move", post(move_block))
        .route("/api/sections/{id}/blocks/{block_id}", delete(remove_block))
        .route(
            "/api/sections/{id}/blocks/{block_id}/duplicate",
            post(duplicate_block),
        )
        .route(
            "/api/sections/{id}/blocks/{block_id}/toggle-visibility",
            post(toggle_visibility),
        )
}

#[derive(Debug, Deserialize)]
struct DraftRequest {
    #[serde(rename = "type")]
    block_type: String,
}

/// A saved block. New blocks go to `insert_at` (clamped) or the end.
#[derive(Debug, Deserialize)]
struct SaveRequest {
    block: ContentBlock,
    insert_at: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    from: usize,
    to: usize,
}

#[derive(Debug, Serialize)]
struct BlocksResponse {
    section_id: i64,
    blocks: Vec<ContentBlock>,
    /// Index of the block the operation touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    /// `replaced` or `inserted` for saves.
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'static str>,
}

impl BlocksResponse {
    fn new(section: &Section, list: BlockList) -> Self {
        Self {
            section_id: section.id,
            blocks: list.into_blocks(),
            index: None,
            outcome: None,
        }
    }

    fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

fn editor_error(error: EditorError) -> AppError {
    match error {
        EditorError::BlockNotFound(_) => AppError::NotFound,
        EditorError::IndexOutOfRange { index, len } => AppError::field(
            "index",
            format!("Index {index} is out of range for {len} blocks."),
        ),
        EditorError::Invalid(fields) => AppError::Validation(fields),
    }
}

/// Load a block-builder section and parse its block list.
async fn load_blocks(
    state: &AppState,
    tenant: &TenantContext,
    id: i64,
) -> AppResult<(Section, Page, BlockList)> {
    let (section, page) = load_section(state, tenant, id).await?;

    if state.section_types().content_kind(&section.component_type) != Some(ContentKind::Blocks) {
        return Err(AppError::BadRequest(format!(
            "section type '{}' does not hold blocks",
            section.component_type
        )));
    }

    let list = blocks_of(&section)?;
    Ok((section, page, list))
}

/// Persist `list` as the section's content.
async fn store_blocks(
    state: &AppState,
    section: &Section,
    page: &Page,
    list: BlockList,
    action: ContentAction,
) -> AppResult<Section> {
    let content = SectionContent::Blocks(list).to_value();
    let updated = Section::replace_content(state.db(), section, &content).await?;
    state.emit(section_event(&updated, page, action));
    Ok(updated)
}

/// Parse the stored block list of a section.
fn blocks_of(section: &Section) -> AppResult<BlockList> {
    match SectionContent::from_value(ContentKind::Blocks, &section.content) {
        Ok(SectionContent::Blocks(list)) => Ok(list),
        Ok(SectionContent::Fields(_)) => Ok(BlockList::default()),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!("stored blocks are malformed: {e}"))),
    }
}

async fn list_blocks(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<BlocksResponse>> {
    require_editor(&state, &session, &tenant).await?;
    let (section, _, list) = load_blocks(&state, &tenant, id).await?;
    Ok(Json(BlocksResponse::new(&section, list)))
}

/// Hand out a new block seeded with its type's defaults. Nothing is stored.
async fn new_draft(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<DraftRequest>,
) -> AppResult<Json<ContentBlock>> {
    require_editor(&state, &session, &tenant).await?;
    load_blocks(&state, &tenant, id).await?;

    let Some(block_type) = BlockType::parse(&input.block_type) else {
        return Err(AppError::field(
            "type",
            format!("Unknown block type '{}'.", input.block_type),
        ));
    };
    let draft = BlockList::new_draft(state.section_types().blocks(), block_type);
    Ok(Json(draft.block().clone()))
}

async fn save_block(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<SaveRequest>,
) -> AppResult<Json<BlocksResponse>> {
    require_editor(&state, &session, &tenant).await?;
    let (section, page, mut list) = load_blocks(&state, &tenant, id).await?;

    let mut draft = BlockDraft::from(input.block);
    if let Some(index) = input.insert_at {
        draft = draft.insert_at(index);
    }
    let outcome = list
        .save(state.section_types().blocks(), draft)
        .map_err(editor_error)?;

    let (index, label) = match outcome {
        SaveOutcome::Replaced(i) => (i, "replaced"),
        SaveOutcome::Inserted(i) => (i, "inserted"),
    };
    let action = match outcome {
        SaveOutcome::Replaced(_) => ContentAction::Updated,
        SaveOutcome::Inserted(_) => ContentAction::Created,
    };

    let stored = store_blocks(&state, &section, &page, list, action).await?;
    let mut response = BlocksResponse::new(&stored, blocks_of(&stored)?).at(index);
    response.outcome = Some(label);
    Ok(Json(response))
}

async fn move_block(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<MoveRequest>,
) -> AppResult<Json<BlocksResponse>> {
    require_editor(&state, &session, &tenant).await?;
    let (section, page, mut list) = load_blocks(&state, &tenant, id).await?;

    list.move_block(input.from, input.to).map_err(editor_error)?;

    let stored = store_blocks(&state, &section, &page, list, ContentAction::Reordered).await?;
    Ok(Json(BlocksResponse::new(&stored, blocks_of(&stored)?).at(input.to)))
}

async fn duplicate_block(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path((id, block_id)): Path<(i64, String)>,
) -> AppResult<(StatusCode, Json<BlocksResponse>)> {
    require_editor(&state, &session, &tenant).await?;
    let (section, page, mut list) = load_blocks(&state, &tenant, id).await?;

    let index = list.duplicate(&block_id).map_err(editor_error)?;

    let stored = store_blocks(&state, &section, &page, list, ContentAction::Created).await?;
    Ok((
        StatusCode::CREATED,
        Json(BlocksResponse::new(&stored, blocks_of(&stored)?).at(index)),
    ))
}

async fn toggle_visibility(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path((id, block_id)): Path<(i64, String)>,
) -> AppResult<Json<BlocksResponse>> {
    require_editor(&state, &session, &tenant).await?;
    let (section, page, mut list) = load_blocks(&state, &tenant, id).await?;

    list.toggle_visibility(&block_id).map_err(editor_error)?;
    let index = list.position(&block_id);

    let stored = store_blocks(&state, &section, &page, list, ContentAction::Updated).await?;
    let mut response = BlocksResponse::new(&stored, blocks_of(&stored)?);
    response.index = index;
    Ok(Json(response))
}

async fn remove_block(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path((id, block_id)): Path<(i64, String)>,
) -> AppResult<Json<BlocksResponse>> {
    require_editor(&state, &session, &tenant).await?;
    let (section, page, mut list) = load_blocks(&state, &tenant, id).await?;

    list.remove(&block_id).map_err(editor_error)?;

    let stored = store_blocks(&state, &section, &page, list, ContentAction::Deleted).await?;
    Ok(Json(BlocksResponse::new(&stored, blocks_of(&stored)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_errors_map_to_statuses() {
        assert!(matches!(
            editor_error(EditorError::BlockNotFound("blk_x".into())),
            AppError::NotFound
        ));
        assert!(matches!(
            editor_error(EditorError::IndexOutOfRange { index: 5, len: 2 }),
            AppError::Validation(_)
        ));
    }
}
