//! FAQ API routes.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{CreateFaq, Faq, ListFilters, Paginated, UpdateFaq};
use crate::routes::helpers::{
    ReorderRequest, check, found, reject_blank, reordered, require_editor, require_text,
};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/faqs", get(list_faqs).post(create_faq))
        .route("/api/faqs/categories", get(list_categories))
        .route("/api/faqs/reorder", post(reorder_faqs))
        .route(
            "/api/faqs/{id}",
            get(get_faq).put(update_faq).delete(delete_faq),
        )
        .route("/api/faqs/{id}/toggle-published", post(toggle_published))
}

fn event(faq: &Faq, action: ContentAction) -> ContentEvent {
    ContentEvent::new(faq.tenant_id, "faq", faq.id, action)
}

async fn load(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<Faq> {
    found(Faq::find_by_id(state.db(), tenant, id).await?)
}

/// `?category=` narrows the list to one FAQ category.
async fn list_faqs(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Paginated<Faq>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Faq::paginate(state.db(), &tenant, &filters).await?))
}

/// Distinct categories in use.
async fn list_categories(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
) -> AppResult<Json<Vec<String>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Faq::categories(state.db(), &tenant).await?))
}

async fn get_faq(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Faq>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load(&state, &tenant, id).await?))
}

async fn create_faq(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateFaq>,
) -> AppResult<(StatusCode, Json<Faq>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "question", Some(&input.question));
    require_text(&mut errors, "answer", Some(&input.answer));
    check(errors)?;

    let faq = Faq::create(state.db(), &tenant, input).await?;
    state.emit(event(&faq, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(faq)))
}

async fn update_faq(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateFaq>,
) -> AppResult<Json<Faq>> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "question", input.question.as_deref());
    reject_blank(&mut errors, "answer", input.answer.as_deref());
    check(errors)?;

    let existing = load(&state, &tenant, id).await?;
    let faq = Faq::update(state.db(), &existing, input).await?;
    state.emit(event(&faq, ContentAction::Updated));
    Ok(Json(faq))
}

async fn delete_faq(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    if !Faq::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(event(&existing, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_published(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Faq>> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    let faq = Faq::toggle_published(state.db(), &existing).await?;
    state.emit(event(&faq, ContentAction::publication(faq.is_published)));
    Ok(Json(faq))
}

async fn reorder_faqs(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<ReorderRequest>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    reordered(Faq::reorder(state.db(), &tenant, &input.ids).await?)?;
    state.emit(ContentEvent::new(tenant.id, "faq", 0, ContentAction::Reordered));
    Ok(StatusCode::NO_CONTENT)
}
