#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Database integration tests. Each test returns early when `DATABASE_URL`
//! is not set.

mod common;

use serde_json::{Value, json};

use tessera_kernel::content::section_types::SectionTypeRegistry;
use tessera_kernel::models::{
    CreatePage, CreateService, CreateServiceCategory, CreateTenant, ListFilters, NewSection, Page,
    Section, Service, ServiceCategory, ServiceFilters, Setting, Tenant, UpdateService,
};
use tessera_kernel::services::tenant_clone::{CloneOptions, clone_tenant_content};
use tessera_kernel::tenant::TenantContext;
use tessera_test_utils::{TestSection, assert, heading, test_page, test_section, text, unique_name};

use common::{create_tenant, database, drop_tenant};

fn page_input(title: &str) -> CreatePage {
    serde_json::from_value(test_page(title)).unwrap()
}

/// Turn a section request body into an insertable section, the way the
/// section create endpoint does.
fn section_input(request: &TestSection) -> NewSection {
    let body = request.to_json();
    let content = SectionTypeRegistry::with_standard_types()
        .prepare_content(&request.component_type, body.get("content"))
        .unwrap();
    NewSection {
        component_type: request.component_type.clone(),
        content,
        styles: body.get("styles").cloned().unwrap_or(Value::Null),
        settings: json!({}),
        is_visible: body["is_visible"].as_bool().unwrap(),
    }
}

async fn category(pool: &sqlx::PgPool, ctx: &TenantContext, name: &str) -> ServiceCategory {
    let input = CreateServiceCategory {
        name: name.to_string(),
        slug: None,
        description: None,
    };
    ServiceCategory::create(pool, ctx, input).await.unwrap()
}

async fn service(pool: &sqlx::PgPool, category: &ServiceCategory, title: &str) -> Service {
    let input = CreateService {
        category_id: category.id,
        title: title.to_string(),
        slug: None,
        summary: None,
        description: None,
        icon: None,
        image: None,
        is_featured: None,
        is_published: Some(true),
    };
    Service::create(pool, category, input).await.unwrap()
}

fn json_list<T: serde::Serialize>(rows: &[T]) -> Value {
    serde_json::to_value(rows).unwrap()
}

#[tokio::test]
async fn page_order_stays_dense_through_reorder_and_delete() {
    let Some(pool) = database().await else { return };
    let tenant = create_tenant(&pool, "Ordering").await;
    let ctx = TenantContext::from(&tenant);

    let a = Page::create(&pool, &ctx, page_input("Alpha")).await.unwrap();
    let b = Page::create(&pool, &ctx, page_input("Beta")).await.unwrap();
    let c = Page::create(&pool, &ctx, page_input("Gamma")).await.unwrap();
    assert_eq!((a.sort_order, b.sort_order, c.sort_order), (0, 1, 2));

    assert!(Page::reorder(&pool, &ctx, &[c.id, a.id, b.id]).await.unwrap());
    assert!(!Page::reorder(&pool, &ctx, &[c.id, a.id]).await.unwrap());

    let a = Page::find_by_id(&pool, &ctx, a.id).await.unwrap().unwrap();
    assert!(Page::delete(&pool, &a).await.unwrap());

    let pages = Page::list(&pool, &ctx, &ListFilters::default()).await.unwrap();
    assert::ids(&json_list(&pages), &[c.id, b.id]);
    let order: Vec<i32> = pages.iter().map(|p| p.sort_order).collect();
    assert_eq!(order, [0, 1]);

    drop_tenant(&pool, &tenant).await;
}

#[tokio::test]
async fn rows_are_invisible_across_tenants() {
    let Some(pool) = database().await else { return };
    let first = create_tenant(&pool, "Isolated A").await;
    let second = create_tenant(&pool, "Isolated B").await;

    let page = Page::create(&pool, &TenantContext::from(&first), page_input("Private"))
        .await
        .unwrap();

    let other = TenantContext::from(&second);
    assert!(Page::find_by_id(&pool, &other, page.id).await.unwrap().is_none());
    assert!(
        Page::find_by_slug(&pool, &other, &page.slug)
            .await
            .unwrap()
            .is_none()
    );

    drop_tenant(&pool, &first).await;
    drop_tenant(&pool, &second).await;
}

#[tokio::test]
async fn clone_copies_and_rebrands_then_skips_existing() {
    let Some(pool) = database().await else { return };
    let source = create_tenant(&pool, "Source").await;
    let target = create_tenant(&pool, "Target").await;
    let ctx = TenantContext::from(&source);

    let page = Page::create(&pool, &ctx, page_input(&format!("About {}", source.name)))
        .await
        .unwrap();
    Section::create(
        &pool,
        &page,
        NewSection {
            component_type: "hero".to_string(),
            content: json!({"heading": format!("Welcome to {}", source.name)}),
            styles: json!({}),
            settings: json!({}),
            is_visible: true,
        },
    )
    .await
    .unwrap();
    let category = ServiceCategory::create(
        &pool,
        &ctx,
        CreateServiceCategory {
            name: "Consulting".to_string(),
            slug: None,
            description: None,
        },
    )
    .await
    .unwrap();
    Service::create(
        &pool,
        &category,
        CreateService {
            category_id: category.id,
            title: "Audits".to_string(),
            slug: None,
            summary: Some(format!("{} audits", source.name)),
            description: None,
            icon: None,
            image: None,
            is_featured: None,
            is_published: Some(true),
        },
    )
    .await
    .unwrap();
    Setting::set(&pool, source.id, "site_name", &json!(source.name), Some("public"))
        .await
        .unwrap();

    let options = CloneOptions {
        source_tenant_id: source.id,
        skip_existing: false,
    };
    let report = clone_tenant_content(&pool, &target, options).await.unwrap();
    assert_eq!(report.counts("pages").created, 1);
    assert_eq!(report.counts("sections").created, 1);
    assert_eq!(report.counts("services").created, 1);

    let target_ctx = TenantContext::from(&target);
    let cloned = Page::find_by_slug(&pool, &target_ctx, &page.slug)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cloned.title, format!("About {}", target.name));

    let sections = Section::list_for_page(&pool, &cloned).await.unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(
        sections[0].content["heading"],
        json!(format!("Welcome to {}", target.name))
    );

    let site_name = Setting::get(&pool, &target_ctx, "site_name").await.unwrap();
    assert_eq!(site_name, Some(json!(target.name)));

    // A second run leaves everything in place
    let again = CloneOptions {
        source_tenant_id: source.id,
        skip_existing: true,
    };
    let report = clone_tenant_content(&pool, &target, again).await.unwrap();
    assert_eq!(report.total_created(), 0);
    assert_eq!(report.counts("pages").skipped, 1);
    assert_eq!(report.counts("settings").skipped, 1);

    drop_tenant(&pool, &source).await;
    drop_tenant(&pool, &target).await;
}

#[tokio::test]
async fn clone_into_itself_is_rejected() {
    let Some(pool) = database().await else { return };
    let tenant = create_tenant(&pool, "Self").await;

    let options = CloneOptions {
        source_tenant_id: tenant.id,
        skip_existing: false,
    };
    let err = clone_tenant_content(&pool, &tenant, options).await.unwrap_err();
    assert!(err.to_string().contains("itself"));

    drop_tenant(&pool, &tenant).await;
}

#[tokio::test]
async fn sections_stay_dense_through_duplicate_and_delete() {
    let Some(pool) = database().await else { return };
    let tenant = create_tenant(&pool, "Sections").await;
    let ctx = TenantContext::from(&tenant);
    let page = Page::create(&pool, &ctx, page_input("Home")).await.unwrap();

    let first = test_section("custom").with_blocks(&[heading("Welcome", 1)]);
    let second = test_section("custom")
        .with_blocks(&[text("<p>Hidden for now</p>")])
        .with_styles(json!({"background_color": "#000000", "unknown": "x"}))
        .hidden();
    let third = test_section("custom");

    let s0 = Section::create(&pool, &page, section_input(&first)).await.unwrap();
    let s1 = Section::create(&pool, &page, section_input(&second)).await.unwrap();
    let s2 = Section::create(&pool, &page, section_input(&third)).await.unwrap();
    assert!(!s1.is_visible);
    assert_eq!(s1.styles["background_color"], "#000000");
    assert!(s1.styles.get("unknown").is_none());

    // The copy lands right after its source and later siblings shift down
    let copy = Section::duplicate(&pool, &s0).await.unwrap();
    assert_eq!(copy.sort_order, s0.sort_order + 1);
    assert_eq!(copy.content, s0.content);

    let sections = Section::list_for_page(&pool, &page).await.unwrap();
    assert::ids(&json_list(&sections), &[s0.id, copy.id, s1.id, s2.id]);
    let order: Vec<i32> = sections.iter().map(|s| s.sort_order).collect();
    assert_eq!(order, [0, 1, 2, 3]);

    assert!(Section::delete(&pool, &copy).await.unwrap());
    let sections = Section::list_for_page(&pool, &page).await.unwrap();
    assert::ids(&json_list(&sections), &[s0.id, s1.id, s2.id]);
    let order: Vec<i32> = sections.iter().map(|s| s.sort_order).collect();
    assert_eq!(order, [0, 1, 2]);

    drop_tenant(&pool, &tenant).await;
}

#[tokio::test]
async fn moving_a_service_compacts_its_old_category() {
    let Some(pool) = database().await else { return };
    let tenant = create_tenant(&pool, "Services").await;
    let ctx = TenantContext::from(&tenant);

    let repairs = category(&pool, &ctx, "Repairs").await;
    let installs = category(&pool, &ctx, "Installs").await;
    let boilers = service(&pool, &repairs, "Boilers").await;
    let pipes = service(&pool, &repairs, "Pipes").await;
    let drains = service(&pool, &repairs, "Drains").await;
    let heaters = service(&pool, &installs, "Heaters").await;

    let input = UpdateService {
        category_id: Some(installs.id),
        ..UpdateService::default()
    };
    let moved = Service::update(&pool, &boilers, Some(&installs), input).await.unwrap();
    assert_eq!(moved.category_id, installs.id);
    assert_eq!(moved.sort_order, 1);

    let in_category = |id| ServiceFilters {
        category_id: Some(id),
        ..ServiceFilters::default()
    };
    let old = Service::list(&pool, &ctx, &in_category(repairs.id)).await.unwrap();
    assert::ids(&json_list(&old), &[pipes.id, drains.id]);
    assert_eq!(old.iter().map(|s| s.sort_order).collect::<Vec<_>>(), [0, 1]);

    let new = Service::list(&pool, &ctx, &in_category(installs.id)).await.unwrap();
    assert::ids(&json_list(&new), &[heaters.id, boilers.id]);
    assert_eq!(new.iter().map(|s| s.sort_order).collect::<Vec<_>>(), [0, 1]);

    drop_tenant(&pool, &tenant).await;
}

#[tokio::test]
async fn new_tenant_gets_unique_slug_and_a_full_copy_of_content() {
    let Some(pool) = database().await else { return };
    let source = create_tenant(&pool, "Master").await;
    let ctx = TenantContext::from(&source);

    for title in ["Home", "About"] {
        let page = Page::create(&pool, &ctx, page_input(title)).await.unwrap();
        let request = test_section("custom").with_blocks(&[heading(&source.name, 1)]);
        Section::create(&pool, &page, section_input(&request)).await.unwrap();
        Section::create(&pool, &page, section_input(&test_section("custom")))
            .await
            .unwrap();
    }
    let consulting = category(&pool, &ctx, "Consulting").await;
    service(&pool, &consulting, "Audits").await;
    service(&pool, &consulting, "Training").await;
    Setting::set(&pool, source.id, "site_name", &json!(source.name), Some("public"))
        .await
        .unwrap();

    let name = unique_name("Acme");
    let input = || CreateTenant {
        name: name.clone(),
        slug: None,
        domain: None,
        is_active: Some(true),
        settings: None,
    };
    let first = Tenant::create(&pool, input()).await.unwrap();
    let target = Tenant::create(&pool, input()).await.unwrap();
    assert_eq!(target.slug, format!("{}-1", first.slug));

    let options = CloneOptions {
        source_tenant_id: source.id,
        skip_existing: false,
    };
    clone_tenant_content(&pool, &target, options).await.unwrap();

    let expected = Tenant::content_counts(&pool, source.id).await.unwrap();
    let copied = Tenant::content_counts(&pool, target.id).await.unwrap();
    assert_eq!(copied, expected);
    assert_eq!((copied.pages, copied.sections, copied.services), (2, 4, 2));

    // Nothing in the copy points back at the source tenant's rows
    let leaked: i64 = sqlx::query_scalar(
        r#"
        SELECT
            (SELECT COUNT(*) FROM sections s JOIN pages p ON p.id = s.page_id
             WHERE s.tenant_id = $1 AND p.tenant_id <> $1)
          + (SELECT COUNT(*) FROM services s JOIN service_categories c ON c.id = s.category_id
             WHERE s.tenant_id = $1 AND c.tenant_id <> $1)
        "#,
    )
    .bind(target.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(leaked, 0);

    let target_ctx = TenantContext::from(&target);
    let home = Page::find_by_slug(&pool, &target_ctx, "home").await.unwrap().unwrap();
    let sections = Section::list_for_page(&pool, &home).await.unwrap();
    assert_eq!(sections[0].content["blocks"][0]["data"]["text"], json!(target.name));

    drop_tenant(&pool, &first).await;
    drop_tenant(&pool, &target).await;
    drop_tenant(&pool, &source).await;
}
