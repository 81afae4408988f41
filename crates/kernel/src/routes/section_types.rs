//! Section and block type catalog. Public and tenant independent.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::content::{BlockTypeDefinition, SectionTypeDefinition};
use crate::error::AppResult;
use crate::routes::helpers::found;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/section-types", get(list_types))
        .route("/api/section-types/categories", get(types_by_category))
        .route("/api/section-types/{name}", get(get_type))
        .route("/api/block-types", get(list_block_types))
}

async fn list_types(State(state): State<AppState>) -> Json<Vec<SectionTypeDefinition>> {
    Json(
        state
            .section_types()
            .list_types()
            .into_iter()
            .cloned()
            .collect(),
    )
}

async fn types_by_category(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, Vec<SectionTypeDefinition>>> {
    Json(
        state
            .section_types()
            .types_by_category()
            .into_iter()
            .map(|(category, types)| {
                (category.to_string(), types.into_iter().cloned().collect())
            })
            .collect(),
    )
}

async fn get_type(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<SectionTypeDefinition>> {
    Ok(Json(found(state.section_types().get(&name).cloned())?))
}

async fn list_block_types(State(state): State<AppState>) -> Json<Vec<BlockTypeDefinition>> {
    Json(
        state
            .section_types()
            .blocks()
            .list()
            .into_iter()
            .cloned()
            .collect(),
    )
}
