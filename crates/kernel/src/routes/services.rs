//! Service and service category API routes.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{
    CreateService, CreateServiceCategory, DeleteOutcome, ListFilters, Paginated, Service,
    ServiceCategory, ServiceFilters, UpdateService, UpdateServiceCategory,
};
use crate::routes::helpers::{
    ReorderRequest, check, found, reject_blank, reordered, require_editor, require_text,
};
use crate::services::events::{ContentAction, ContentEvent};
use crate::state::AppState;
use crate::tenant::TenantContext;

/// Create the services router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/service-categories",
            get(list_categories).post(create_category),
        )
        .route("/api/service-categories/reorder", post(reorder_categories))
        .route(
            "/api/service-categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route(
            "/api/service-categories/{id}/services/reorder",
            post(reorder_services),
        )
        .route("/api/services", get(list_services).post(create_service))
        .route(
            "/api/services/{id}",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route("/api/services/{id}/toggle-published", post(toggle_published))
}

fn category_event(category: &ServiceCategory, action: ContentAction) -> ContentEvent {
    ContentEvent::new(category.tenant_id, "service_category", category.id, action)
        .with_slug(&category.slug)
}

fn service_event(service: &Service, action: ContentAction) -> ContentEvent {
    ContentEvent::new(service.tenant_id, "service", service.id, action).with_slug(&service.slug)
}

async fn load_category(
    state: &AppState,
    tenant: &TenantContext,
    id: i64,
) -> AppResult<ServiceCategory> {
    found(ServiceCategory::find_by_id(state.db(), tenant, id).await?)
}

/// Resolve a category named in a request body; unknown ids are a field error.
async fn category_field(
    state: &AppState,
    tenant: &TenantContext,
    id: i64,
) -> AppResult<ServiceCategory> {
    ServiceCategory::find_by_id(state.db(), tenant, id)
        .await?
        .ok_or_else(|| AppError::field("category_id", "The selected category does not exist."))
}

async fn load_service(state: &AppState, tenant: &TenantContext, id: i64) -> AppResult<Service> {
    found(Service::find_by_id(state.db(), tenant, id).await?)
}

async fn list_categories(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ListFilters>,
) -> AppResult<Json<Vec<ServiceCategory>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(ServiceCategory::list(state.db(), &tenant, &filters).await?))
}

async fn get_category(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<ServiceCategory>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load_category(&state, &tenant, id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateServiceCategory>,
) -> AppResult<(StatusCode, Json<ServiceCategory>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", Some(&input.name));
    check(errors)?;

    let category = ServiceCategory::create(state.db(), &tenant, input).await?;
    state.emit(category_event(&category, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateServiceCategory>,
) -> AppResult<Json<ServiceCategory>> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "name", input.name.as_deref());
    reject_blank(&mut errors, "slug", input.slug.as_deref());
    check(errors)?;

    let existing = load_category(&state, &tenant, id).await?;
    let category = ServiceCategory::update(state.db(), &existing, input).await?;
    state.emit(category_event(&category, ContentAction::Updated));
    Ok(Json(category))
}

/// Refused with 409 while services still belong to the category.
async fn delete_category(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load_category(&state, &tenant, id).await?;
    match ServiceCategory::delete(state.db(), &existing).await? {
        DeleteOutcome::Deleted => {
            state.emit(category_event(&existing, ContentAction::Deleted));
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound),
        DeleteOutcome::HasDependents(count) => Err(AppError::Conflict(format!(
            "category still has {count} service(s); move or delete them first"
        ))),
    }
}

async fn reorder_categories(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<ReorderRequest>,
) -> AppResult<Json<Vec<ServiceCategory>>> {
    require_editor(&state, &session, &tenant).await?;

    reordered(ServiceCategory::reorder(state.db(), &tenant, &input.ids).await?)?;
    state.emit(ContentEvent::new(
        tenant.id,
        "service_category",
        0,
        ContentAction::Reordered,
    ));
    Ok(Json(
        ServiceCategory::list(state.db(), &tenant, &ListFilters::default()).await?,
    ))
}

async fn reorder_services(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<ReorderRequest>,
) -> AppResult<Json<Vec<Service>>> {
    require_editor(&state, &session, &tenant).await?;

    let category = load_category(&state, &tenant, id).await?;
    reordered(Service::reorder(state.db(), &category, &input.ids).await?)?;
    state.emit(category_event(&category, ContentAction::Reordered));

    let filters = ServiceFilters {
        category_id: Some(category.id),
        ..ServiceFilters::default()
    };
    Ok(Json(Service::list(state.db(), &tenant, &filters).await?))
}

async fn list_services(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Query(filters): Query<ServiceFilters>,
) -> AppResult<Json<Paginated<Service>>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(Service::paginate(state.db(), &tenant, &filters).await?))
}

async fn get_service(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Service>> {
    require_editor(&state, &session, &tenant).await?;
    Ok(Json(load_service(&state, &tenant, id).await?))
}

async fn create_service(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Json(input): Json<CreateService>,
) -> AppResult<(StatusCode, Json<Service>)> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    require_text(&mut errors, "title", Some(&input.title));
    check(errors)?;

    let category = category_field(&state, &tenant, input.category_id).await?;
    let service = Service::create(state.db(), &category, input).await?;
    state.emit(service_event(&service, ContentAction::Created));
    Ok((StatusCode::CREATED, Json(service)))
}

/// Partial update. A new `category_id` moves the service to the end of
/// that category.
async fn update_service(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
    Json(input): Json<UpdateService>,
) -> AppResult<Json<Service>> {
    require_editor(&state, &session, &tenant).await?;

    let mut errors = FieldErrors::new();
    reject_blank(&mut errors, "title", input.title.as_deref());
    reject_blank(&mut errors, "slug", input.slug.as_deref());
    check(errors)?;

    let existing = load_service(&state, &tenant, id).await?;
    let category = match input.category_id {
        Some(category_id) => Some(category_field(&state, &tenant, category_id).await?),
        None => None,
    };

    let service = Service::update(state.db(), &existing, category.as_ref(), input).await?;
    state.emit(service_event(&service, ContentAction::Updated));
    Ok(Json(service))
}

async fn delete_service(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load_service(&state, &tenant, id).await?;
    if !Service::delete(state.db(), &existing).await? {
        return Err(AppError::NotFound);
    }
    state.emit(service_event(&existing, ContentAction::Deleted));
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_published(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Service>> {
    require_editor(&state, &session, &tenant).await?;

    let existing = load_service(&state, &tenant, id).await?;
    let service = Service::toggle_published(state.db(), &existing).await?;
    state.emit(service_event(&service, ContentAction::publication(service.is_published)));
    Ok(Json(service))
}
