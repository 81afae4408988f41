//! HTTP route handlers.

pub mod auth;
pub mod blocks;
pub mod deploy;
pub mod faqs;
pub mod files;
pub mod health;
pub mod helpers;
pub mod media;
pub mod menus;
pub mod metrics;
pub mod pages;
pub mod public;
pub mod section_types;
pub mod sections;
pub mod services;
pub mod settings;
pub mod team;
pub mod templates;
pub mod tenants;
pub mod testimonials;
pub mod users;
pub mod webhooks;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::middleware::{resolve_tenant, track_metrics};
use crate::state::AppState;

/// Routes operating on one tenant's content. The tenant is resolved from
/// the request before any of them run.
fn tenant_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(pages::router())
        .merge(sections::router())
        .merge(blocks::router())
        .merge(services::router())
        .merge(testimonials::router())
        .merge(team::router())
        .merge(faqs::router())
        .merge(menus::router())
        .merge(templates::router())
        .merge(settings::router())
        .merge(media::router())
        .merge(users::router())
        .merge(webhooks::router())
        .merge(public::router())
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant))
}

/// Build the application router without the session layer.
///
/// Middleware order (last added runs first): metrics → tenant → handler.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(metrics::router())
        .merge(section_types::router())
        .merge(auth::router())
        .merge(tenants::router())
        .merge(deploy::router())
        .merge(files::router(&state.config().files_url))
        .merge(tenant_routes(&state))
        .layer(from_fn_with_state(state.clone(), track_metrics))
        .with_state(state)
}
