//! Testimonial API routes.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{CreateTestimonial, ListFilters, Paginated, Testimonial, UpdateTestimonial};
use crate::routes::helpers::{
    ReorderRequest, check, found, reject_blank, reordered, require_editor, require_text,
};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/testimonials",
            get(list_testimonials).post(create_testimonial),
        )
        .route("/api/testimonials/reorder", post(reorder_testimonials))
        .route(
            "/api/testimonials/{id}",
            get(get_testimonial)
                .put(update_testimonial)
                .delete(delete_testimonial),
        )
        .route("/api/testimonials/{id}/toggle-published", post(toggle_published))
}

fn event(testimonial: &Testimonial, action: ContentAction) -> ContentEvent {
    ContentEvent::new(testimonial.tenant_id, "testimonial", testimonial.id, action)
}

async fn load(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<Testimonial> {
    found(Testimonial::find_by_id(state.db(), tenant, id).await?)
}

fn check_rating(errors: &mut FieldErrors, rating: Option<i16>) {
    if rating.is_some_and(|r| !(1..=5).contains(&r)) {
        errors.insert("rating".into(), "The rating must be between 1 and 5.".into());
    }
}

async fn list_testimonials(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Paginated<Testimonial>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Testimonial::paginate(state.db(), &tenant, &filters).await?))
}

async fn get_testimonial(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Testimonial>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load(&state, &tenant, id).await?))
}

async fn create_testimonial(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateTestimonial>,
) -> AppResult<(StatusCode, Json<Testimonial>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "author_name", Some(&input.author_name));
    require_text(&mut errors, "quote", Some(&input.quote));
    check_rating(&mut errors, input.rating);
    check(errors)?;

    let testimonial = Testimonial::create(state.db(), &tenant, input).await?;
    state.emit(event(&testimonial, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(testimonial)))
}

async fn update_testimonial(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTestimonial>,
) -> AppResult<Json<Testimonial>> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "author_name", input.author_name.as_deref());
    reject_blank(&mut errors, "quote", input.quote.as_deref());
    check_rating(&mut errors, input.rating);
    check(errors)?;

    let existing = load(&state, &tenant, id).await?;
    let testimonial = Testimonial::update(state.db(), &existing, input).await?;
    state.emit(event(&testimonial, ContentAction::Updated));
    Ok(Json(testimonial))
}

async fn delete_testimonial(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    if !Testimonial::delete(state.db(), &existing).await? {
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
) -> AppResult<Json<Testimonial>> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load(&state, &tenant, id).await?;
    let testimonial = Testimonial::toggle_published(state.db(), &existing).await?;
    state.emit(event(
        &testimonial,
        ContentAction::publication(testimonial.is_published),
    ));
    Ok(Json(testimonial))
}

async fn reorder_testimonials(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<ReorderRequest>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    reordered(Testimonial::reorder(state.db(), &tenant, &input.ids).await?)?;
    state.emit(ContentEvent::new(tenant.id, "testimonial", 0, ContentAction::Reordered));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        let mut errors = FieldErrors::new();
        check_rating(&mut errors, Some(5));
        check_rating(&mut errors, None);
        assert!(errors.is_empty());

        check_rating(&mut errors, Some(0));
        assert!(errors.contains_key("rating"));
    }
}
