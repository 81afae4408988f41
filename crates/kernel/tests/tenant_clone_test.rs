#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Clone planning over in-memory snapshots.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use tessera_kernel::models::Tenant;
use tessera_kernel::services::tenant_clone::{ClonePlan, CloneError, TenantSnapshot};

const NOW: &str = "2025-01-01T00:00:00Z";

/// Build a row from JSON, filling in timestamps.
fn row<T: DeserializeOwned>(mut value: Value) -> T {
    value["created_at"] = json!(NOW);
    value["updated_at"] = json!(NOW);
    serde_json::from_value(value).unwrap()
}

fn tenant(id: i64, name: &str, slug: &str) -> Tenant {
    row(json!({
        "id": id, "name": name, "slug": slug, "domain": null,
        "is_active": true, "settings": {}
    }))
}

fn master_snapshot() -> TenantSnapshot {
    TenantSnapshot {
        tenant: tenant(1, "Tessera", "tessera"),
        pages: vec![row(json!({
            "id": 10, "tenant_id": 1, "title": "About Tessera", "slug": "about-tessera",
            "meta_title": "Tessera | About", "meta_description": null,
            "is_published": true, "is_homepage": false, "order": 0
        }))],
        sections: vec![row(json!({
            "id": 100, "tenant_id": 1, "page_id": 10, "component_type": "custom",
            "order": 0, "is_visible": true,
            "content": {"blocks": [{
                "id": "blk_1", "type": "heading",
                "data": {"text": "Why Tessera?", "level": 2},
                "settings": {"visibility": "visible", "animation": "none", "customClass": ""}
            }]},
            "styles": {"backgroundColor": "#fff"},
            "settings": {}
        }))],
        categories: vec![row(json!({
            "id": 20, "tenant_id": 1, "name": "Tessera Consulting", "slug": "consulting",
            "description": "What Tessera offers", "order": 0
        }))],
        services: vec![row(json!({
            "id": 30, "tenant_id": 1, "category_id": 20, "title": "Audits",
            "slug": "audits", "summary": "Tessera audits", "description": null,
            "icon": null, "image": null, "is_featured": false, "is_published": true, "order": 0
        }))],
        team: vec![],
        testimonials: vec![row(json!({
            "id": 40, "tenant_id": 1, "author_name": "Sam", "author_title": null,
            "company": "Tessera Fans", "quote": "Tessera changed our site.",
            "rating": 5, "avatar": null, "is_published": true, "order": 0
        }))],
        faqs: vec![],
        menus: vec![row(json!({
            "id": 50, "tenant_id": 1, "name": "Tessera header", "location": "header",
            "items": [{"label": "About Tessera", "url": "/about-tessera"}],
            "is_active": true
        }))],
        settings: vec![row(json!({
            "id": 60, "tenant_id": 1, "key": "site_name", "value": "Tessera",
            "group": "public"
        }))],
    }
}

#[test]
fn plan_retargets_every_row() {
    let target = tenant(7, "Acme", "acme");
    let plan = ClonePlan::build(&master_snapshot(), &target).unwrap();

    assert_eq!(plan.target_tenant_id, 7);
    assert_eq!(plan.len(), 7);
    assert!(plan.pages.iter().all(|p| p.tenant_id == 7));
    assert!(plan.sections.iter().all(|s| s.section.tenant_id == 7));
    assert!(plan.services.iter().all(|s| s.service.tenant_id == 7));
    assert!(plan.settings.iter().all(|s| s.tenant_id == 7));
}

#[test]
fn plan_rebrands_text_but_not_identifiers() {
    let target = tenant(7, "Acme", "acme");
    let plan = ClonePlan::build(&master_snapshot(), &target).unwrap();

    let page = &plan.pages[0];
    assert_eq!(page.title, "About Acme");
    assert_eq!(page.meta_title.as_deref(), Some("Acme | About"));
    assert_eq!(page.slug, "about-tessera");

    let section = &plan.sections[0];
    assert_eq!(section.page_slug, "about-tessera");
    assert_eq!(section.section.content["blocks"][0]["data"]["text"], "Why Acme?");
    assert_eq!(section.section.content["blocks"][0]["id"], "blk_1");

    assert_eq!(plan.categories[0].name, "Acme Consulting");
    assert_eq!(plan.services[0].category_slug, "consulting");
    assert_eq!(plan.services[0].service.summary.as_deref(), Some("Acme audits"));
    assert_eq!(plan.testimonials[0].quote, "Acme changed our site.");

    let menu = &plan.menus[0];
    assert_eq!(menu.location, "header");
    assert_eq!(menu.items[0]["label"], "About Acme");
    // Replacement is case-sensitive, so lowercase slugs in URLs survive
    assert_eq!(menu.items[0]["url"], "/about-tessera");

    assert_eq!(plan.settings[0].key, "site_name");
    assert_eq!(plan.settings[0].value, "Acme");
}

#[test]
fn orphan_rows_abort_the_plan() {
    let mut snapshot = master_snapshot();
    snapshot.pages.clear();

    let err = ClonePlan::build(&snapshot, &tenant(7, "Acme", "acme")).unwrap_err();
    assert!(matches!(
        err,
        CloneError::OrphanSection {
            section_id: 100,
            page_id: 10
        }
    ));

    let mut snapshot = master_snapshot();
    snapshot.categories.clear();
    let err = ClonePlan::build(&snapshot, &tenant(7, "Acme", "acme")).unwrap_err();
    assert!(matches!(err, CloneError::OrphanService { service_id: 30, .. }));
}

#[test]
fn same_name_leaves_text_untouched() {
    let plan = ClonePlan::build(&master_snapshot(), &tenant(7, "Tessera", "tessera-2")).unwrap();
    assert_eq!(plan.pages[0].title, "About Tessera");
    assert_eq!(plan.testimonials[0].company.as_deref(), Some("Tessera Fans"));
}
