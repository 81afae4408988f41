//! Read-only content for the tenant's public site.
//!
//! Only published rows are served and hidden blocks are stripped from
//! section content. Responses are cached per tenant in the two-tier cache
//! and dropped by the content events that touch them.

use std::future::Future;

use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CacheLayer;
use crate::content::SectionContent;
use crate::error::{AppError, AppResult};
use crate::models::{
    Faq, ListFilters, Menu, Page, Section, Service, ServiceCategory, ServiceFilters, Setting,
    TeamMember, Testimonial,
};
use crate::routes::helpers::found;
use crate::state::AppState;
use crate::tenant::TenantContext;

/// Seconds a public response stays cached.
const PUBLIC_TTL: u64 = 300;

/// Settings group exposed to the public site.
const PUBLIC_SETTINGS_GROUP: &str = "public";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/public/pages", get(list_pages))
        .route("/api/public/pages/home", get(home_page))
        .route("/api/public/pages/{slug}", get(page_by_slug))
        .route("/api/public/services", get(list_services))
        .route("/api/public/team", get(list_team))
        .route("/api/public/testimonials", get(list_testimonials))
        .route("/api/public/faqs", get(list_faqs))
        .route("/api/public/menus/{location}", get(menu_by_location))
        .route("/api/public/settings", get(public_settings))
}

#[derive(Debug, Serialize)]
struct PublicSection {
    id: i64,
    component_type: String,
    order: i32,
    content: Value,
    styles: Value,
    settings: Value,
}

#[derive(Debug, Serialize)]
struct PublicPage {
    #[serde(flatten)]
    page: Page,
    sections: Vec<PublicSection>,
}

#[derive(Debug, Serialize)]
struct CategoryWithServices {
    #[serde(flatten)]
    category: ServiceCategory,
    services: Vec<Service>,
}

#[derive(Debug, Deserialize)]
struct FaqQuery {
    category: Option<String>,
}

fn published() -> ListFilters {
    ListFilters {
        is_published: Some(true),
        ..ListFilters::default()
    }
}

fn json_body(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Serve `key` from the cache, or await `load` and cache its JSON.
/// `load` is dropped unpolled on a hit.
async fn cached<T, Fut>(state: &AppState, key: String, load: Fut) -> AppResult<Response>
where
    T: Serialize,
    Fut: Future<Output = AppResult<T>>,
{
    if let Some(body) = state.cache().get(&key).await {
        state.metrics().record_cache_hit();
        return Ok(json_body(body));
    }
    state.metrics().record_cache_miss();

    let value = load.await?;
    let body = serde_json::to_string(&value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode response: {e}")))?;
    state.cache().set(&key, &body, PUBLIC_TTL).await;
    Ok(json_body(body))
}

/// Section as the public site sees it. Unknown types pass through as stored.
fn public_section(state: &AppState, section: Section) -> PublicSection {
    let section = section.normalized();
    let content = match state.section_types().content_kind(&section.component_type) {
        Some(kind) => SectionContent::from_value(kind, &section.content)
            .map(|c| c.to_public_value())
            .unwrap_or(section.content),
        None => section.content,
    };
    PublicSection {
        id: section.id,
        component_type: section.component_type,
        order: section.sort_order,
        content,
        styles: section.styles,
        settings: section.settings,
    }
}

async fn render_page(state: &AppState, page: Page) -> AppResult<PublicPage> {
    let sections = Section::visible_for_page(state.db(), &page)
        .await?
        .into_iter()
        .map(|s| public_section(state, s))
        .collect();
    Ok(PublicPage { page, sections })
}

async fn list_pages(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "page", "list");
    cached(&state, key, async {
        Ok(Page::list(state.db(), &tenant, &published()).await?)
    })
    .await
}

async fn home_page(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "page", "home");
    cached(&state, key, async {
        let page = found(Page::homepage(state.db(), &tenant).await?)?;
        render_page(&state, page).await
    })
    .await
}

async fn page_by_slug(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "page", &format!("slug:{slug}"));
    cached(&state, key, async {
        let page = match Page::find_by_slug(state.db(), &tenant, &slug).await? {
            Some(page) if page.is_published => page,
            _ => return Err(AppError::NotFound),
        };
        render_page(&state, page).await
    })
    .await
}

/// Published services grouped under their categories, both in order.
async fn list_services(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "service", "list");
    cached(&state, key, async {
        let categories = ServiceCategory::list(state.db(), &tenant, &ListFilters::default()).await?;
        let filters = ServiceFilters {
            is_published: Some(true),
            ..ServiceFilters::default()
        };
        let services = Service::list(state.db(), &tenant, &filters).await?;

        let grouped: Vec<CategoryWithServices> = categories
            .into_iter()
            .map(|category| CategoryWithServices {
                services: services
                    .iter()
                    .filter(|s| s.category_id == category.id)
                    .cloned()
                    .collect(),
                category,
            })
            .filter(|group| !group.services.is_empty())
            .collect();
        Ok(grouped)
    })
    .await
}

async fn list_team(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "team_member", "list");
    cached(&state, key, async {
        Ok(TeamMember::list(state.db(), &tenant, &published()).await?)
    })
    .await
}

async fn list_testimonials(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "testimonial", "list");
    cached(&state, key, async {
        Ok(Testimonial::list(state.db(), &tenant, &published()).await?)
    })
    .await
}

async fn list_faqs(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<FaqQuery>,
) -> AppResult<Response> {
    let id = match &query.category {
        Some(category) => format!("category:{category}"),
        None => "list".to_string(),
    };
    let key = CacheLayer::key(tenant.id, "faq", &id);
    cached(&state, key, async {
        let filters = ListFilters {
            category: query.category.clone(),
            ..published()
        };
        Ok(Faq::list(state.db(), &tenant, &filters).await?)
    })
    .await
}

async fn menu_by_location(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(location): Path<String>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "menu", &location);
    cached(&state, key, async {
        match Menu::find_by_location(state.db(), &tenant, &location).await? {
            Some(menu) if menu.is_active => Ok(menu),
            _ => Err(AppError::NotFound),
        }
    })
    .await
}

async fn public_settings(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> AppResult<Response> {
    let key = CacheLayer::key(tenant.id, "setting", PUBLIC_SETTINGS_GROUP);
    cached(&state, key, async {
        Ok(Setting::group(state.db(), &tenant, PUBLIC_SETTINGS_GROUP).await?)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_filter_only_sets_publication() {
        let filters = published();
        assert_eq!(filters.is_published, Some(true));
        assert!(filters.search.is_none());
        assert!(filters.category.is_none());
    }
}
