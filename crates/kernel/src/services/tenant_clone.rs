//! Copy the content of one tenant (the master, by default) into another.
//!
//! Cloning runs in three steps:
//!
//! 1. [`TenantSnapshot::load`] reads every content row of the source tenant.
//! 2. [`ClonePlan::build`] retargets the rows at the new tenant and replaces
//!    the source brand name with the target's in every text field and JSON
//!    string leaf. This step is pure.
//! 3. [`apply_plan`] writes the plan inside one transaction as upserts keyed
//!    by each entity's natural key, remapping `page_id` and `category_id`
//!    through slugs. Any error rolls the whole clone back.
//!
//! Slugs, setting keys, menu locations and section types are identifiers and
//! are never rebranded.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::ordering::{self, OrderScope};
use crate::models::{
    Faq, Menu, Page, Section, Service, ServiceCategory, Setting, TeamMember, Tenant, Testimonial,
};

/// Options of one clone run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneOptions {
    pub source_tenant_id: i64,
    /// Leave rows whose natural key already exists untouched instead of
    /// overwriting them. Applies to every entity.
    pub skip_existing: bool,
}

/// Errors a clone run reports to its caller.
#[derive(Debug, Error)]
pub enum CloneError {
    #[error("source tenant {0} not found")]
    SourceNotFound(i64),

    #[error("a tenant cannot be cloned into itself")]
    SameTenant,

    #[error("section {section_id} belongs to page {page_id}, which is not in the snapshot")]
    OrphanSection { section_id: i64, page_id: i64 },

    #[error("service {service_id} belongs to category {category_id}, which is not in the snapshot")]
    OrphanService { service_id: i64, category_id: i64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Every content row of one tenant.
#[derive(Debug, Clone)]
pub struct TenantSnapshot {
    pub tenant: Tenant,
    pub pages: Vec<Page>,
    pub sections: Vec<Section>,
    pub categories: Vec<ServiceCategory>,
    pub services: Vec<Service>,
    pub team: Vec<TeamMember>,
    pub testimonials: Vec<Testimonial>,
    pub faqs: Vec<Faq>,
    pub menus: Vec<Menu>,
    pub settings: Vec<Setting>,
}

async fn load_rows<T>(pool: &PgPool, sql: &str, tenant_id: i64, what: &str) -> anyhow::Result<Vec<T>>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    sqlx::query_as::<_, T>(sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to load {what} snapshot"))
}

impl TenantSnapshot {
    pub async fn load(pool: &PgPool, tenant_id: i64) -> Result<Self, CloneError> {
        let tenant = Tenant::find_by_id(pool, tenant_id)
            .await?
            .ok_or(CloneError::SourceNotFound(tenant_id))?;

        Ok(Self {
            tenant,
            pages: load_rows(
                pool,
                "SELECT * FROM pages WHERE tenant_id = $1 ORDER BY sort_order, id",
                tenant_id,
                "page",
            )
            .await?,
            sections: load_rows(
                pool,
                "SELECT * FROM sections WHERE tenant_id = $1 ORDER BY page_id, sort_order, id",
                tenant_id,
                "section",
            )
            .await?,
            categories: load_rows(
                pool,
                "SELECT * FROM service_categories WHERE tenant_id = $1 ORDER BY sort_order, id",
                tenant_id,
                "service category",
            )
            .await?,
            services: load_rows(
                pool,
                "SELECT * FROM services WHERE tenant_id = $1 ORDER BY category_id, sort_order, id",
                tenant_id,
                "service",
            )
            .await?,
            team: load_rows(
                pool,
                "SELECT * FROM team_members WHERE tenant_id = $1 ORDER BY sort_order, id",
                tenant_id,
                "team member",
            )
            .await?,
            testimonials: load_rows(
                pool,
                "SELECT * FROM testimonials WHERE tenant_id = $1 ORDER BY sort_order, id",
                tenant_id,
                "testimonial",
            )
            .await?,
            faqs: load_rows(
                pool,
                "SELECT * FROM faqs WHERE tenant_id = $1 ORDER BY sort_order, id",
                tenant_id,
                "faq",
            )
            .await?,
            menus: load_rows(
                pool,
                "SELECT * FROM menus WHERE tenant_id = $1 ORDER BY location",
                tenant_id,
                "menu",
            )
            .await?,
            settings: load_rows(
                pool,
                "SELECT * FROM settings WHERE tenant_id = $1 ORDER BY key",
                tenant_id,
                "setting",
            )
            .await?,
        })
    }
}

/// Block keys that identify rather than describe.
const BLOCK_IDENTIFIERS: [&str; 2] = ["id", "type"];

/// A content block object: string `id` and `type` alongside a `data` object.
fn is_block(map: &serde_json::Map<String, Value>) -> bool {
    matches!(map.get("id"), Some(Value::String(_)))
        && matches!(map.get("type"), Some(Value::String(_)))
        && map.contains_key("data")
}

/// Replaces one brand name with another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebrand {
    from: String,
    to: String,
}

impl Rebrand {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// An empty source brand or identical names change nothing.
    fn is_noop(&self) -> bool {
        self.from.is_empty() || self.from == self.to
    }

    pub fn text(&self, s: &str) -> String {
        if self.is_noop() {
            s.to_string()
        } else {
            s.replace(&self.from, &self.to)
        }
    }

    pub fn opt(&self, s: &Option<String>) -> Option<String> {
        s.as_deref().map(|s| self.text(s))
    }

    /// Rewrite every string leaf of `value` in place. Object keys, numbers,
    /// booleans and nulls are left alone, as are the `id` and `type` of
    /// content blocks.
    pub fn json(&self, value: &mut Value) {
        if self.is_noop() {
            return;
        }
        match value {
            Value::String(s) => {
                if s.contains(&self.from) {
                    *s = s.replace(&self.from, &self.to);
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|v| self.json(v)),
            Value::Object(map) => {
                let block = is_block(map);
                for (key, v) in map.iter_mut() {
                    if block && BLOCK_IDENTIFIERS.contains(&key.as_str()) {
                        continue;
                    }
                    self.json(v);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    fn json_owned(&self, value: &Value) -> Value {
        let mut value = value.clone();
        self.json(&mut value);
        value
    }
}

/// A section to write, keyed by its page's slug.
#[derive(Debug, Clone)]
pub struct PlannedSection {
    pub page_slug: String,
    pub section: Section,
}

/// A service to write, keyed by its category's slug.
#[derive(Debug, Clone)]
pub struct PlannedService {
    pub category_slug: String,
    pub service: Service,
}

/// Rows to write into the target tenant, in write order. Ids are the source
/// ids; only natural keys and parent slugs matter when applying.
#[derive(Debug, Clone)]
pub struct ClonePlan {
    pub target_tenant_id: i64,
    pub pages: Vec<Page>,
    pub sections: Vec<PlannedSection>,
    pub categories: Vec<ServiceCategory>,
    pub services: Vec<PlannedService>,
    pub team: Vec<TeamMember>,
    pub testimonials: Vec<Testimonial>,
    pub faqs: Vec<Faq>,
    pub menus: Vec<Menu>,
    pub settings: Vec<Setting>,
}

impl ClonePlan {
    /// Retarget and rebrand a snapshot for `target`.
    pub fn build(snapshot: &TenantSnapshot, target: &Tenant) -> Result<Self, CloneError> {
        let brand = Rebrand::new(&snapshot.tenant.name, &target.name);
        let tenant_id = target.id;

        let page_slugs: HashMap<i64, &str> =
            snapshot.pages.iter().map(|p| (p.id, p.slug.as_str())).collect();
        let category_slugs: HashMap<i64, &str> = snapshot
            .categories
            .iter()
            .map(|c| (c.id, c.slug.as_str()))
            .collect();

        let pages = snapshot
            .pages
            .iter()
            .map(|p| Page {
                tenant_id,
                title: brand.text(&p.title),
                meta_title: brand.opt(&p.meta_title),
                meta_description: brand.opt(&p.meta_description),
                ..p.clone()
            })
            .collect();

        let sections = snapshot
            .sections
            .iter()
            .map(|s| {
                let page_slug = page_slugs.get(&s.page_id).ok_or(CloneError::OrphanSection {
                    section_id: s.id,
                    page_id: s.page_id,
                })?;
                Ok(PlannedSection {
                    page_slug: (*page_slug).to_string(),
                    section: Section {
                        tenant_id,
                        content: brand.json_owned(&s.content),
                        styles: brand.json_owned(&s.styles),
                        settings: brand.json_owned(&s.settings),
                        ..s.clone()
                    },
                })
            })
            .collect::<Result<Vec<_>, CloneError>>()?;

        let categories = snapshot
            .categories
            .iter()
            .map(|c| ServiceCategory {
                tenant_id,
                name: brand.text(&c.name),
                description: brand.opt(&c.description),
                ..c.clone()
            })
            .collect();

        let services = snapshot
            .services
            .iter()
            .map(|s| {
                let category_slug =
                    category_slugs
                        .get(&s.category_id)
                        .ok_or(CloneError::OrphanService {
                            service_id: s.id,
                            category_id: s.category_id,
                        })?;
                Ok(PlannedService {
                    category_slug: (*category_slug).to_string(),
                    service: Service {
                        tenant_id,
                        title: brand.text(&s.title),
                        summary: brand.opt(&s.summary),
                        description: brand.opt(&s.description),
                        ..s.clone()
                    },
                })
            })
            .collect::<Result<Vec<_>, CloneError>>()?;

        let team = snapshot
            .team
            .iter()
            .map(|m| TeamMember {
                tenant_id,
                name: brand.text(&m.name),
                position: brand.opt(&m.position),
                bio: brand.opt(&m.bio),
                social_links: brand.json_owned(&m.social_links),
                ..m.clone()
            })
            .collect();

        let testimonials = snapshot
            .testimonials
            .iter()
            .map(|t| Testimonial {
                tenant_id,
                author_name: brand.text(&t.author_name),
                author_title: brand.opt(&t.author_title),
                company: brand.opt(&t.company),
                quote: brand.text(&t.quote),
                ..t.clone()
            })
            .collect();

        let faqs = snapshot
            .faqs
            .iter()
            .map(|f| Faq {
                tenant_id,
                question: brand.text(&f.question),
                answer: brand.text(&f.answer),
                category: brand.opt(&f.category),
                ..f.clone()
            })
            .collect();

        let menus = snapshot
            .menus
            .iter()
            .map(|m| Menu {
                tenant_id,
                name: brand.text(&m.name),
                items: brand.json_owned(&m.items),
                ..m.clone()
            })
            .collect();

        let settings = snapshot
            .settings
            .iter()
            .map(|s| Setting {
                tenant_id,
                value: brand.json_owned(&s.value),
                ..s.clone()
            })
            .collect();

        Ok(Self {
            target_tenant_id: tenant_id,
            pages,
            sections,
            categories,
            services,
            team,
            testimonials,
            faqs,
            menus,
            settings,
        })
    }

    /// Number of rows the plan writes.
    pub fn len(&self) -> usize {
        self.pages.len()
            + self.sections.len()
            + self.categories.len()
            + self.services.len()
            + self.team.len()
            + self.testimonials.len()
            + self.faqs.len()
            + self.menus.len()
            + self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Created, updated and skipped rows of one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

/// Outcome of a clone run, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloneReport {
    pub source_tenant_id: i64,
    pub target_tenant_id: i64,
    pub entities: BTreeMap<&'static str, EntityCounts>,
}

impl CloneReport {
    fn record(&mut self, entity: &'static str, write: Write) {
        let counts = self.entities.entry(entity).or_default();
        match write {
            Write::Created(_) => counts.created += 1,
            Write::Updated(_) => counts.updated += 1,
            Write::Skipped(_) => counts.skipped += 1,
        }
    }

    pub fn counts(&self, entity: &str) -> EntityCounts {
        self.entities.get(entity).copied().unwrap_or_default()
    }

    pub fn total_created(&self) -> u64 {
        self.entities.values().map(|c| c.created).sum()
    }
}

/// What happened to one planned row, with the target row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Created(i64),
    Updated(i64),
    Skipped(i64),
}

impl Write {
    fn id(self) -> i64 {
        match self {
            Write::Created(id) | Write::Updated(id) | Write::Skipped(id) => id,
        }
    }
}

/// Load, plan and apply in one call.
pub async fn clone_tenant_content(
    pool: &PgPool,
    target: &Tenant,
    options: CloneOptions,
) -> Result<CloneReport, CloneError> {
    if options.source_tenant_id == target.id {
        return Err(CloneError::SameTenant);
    }

    let snapshot = TenantSnapshot::load(pool, options.source_tenant_id).await?;
    let plan = ClonePlan::build(&snapshot, target)?;
    info!(
        source_tenant_id = options.source_tenant_id,
        target_tenant_id = target.id,
        rows = plan.len(),
        skip_existing = options.skip_existing,
        "cloning tenant content"
    );

    let mut report = apply_plan(pool, &plan, options.skip_existing).await?;
    report.source_tenant_id = options.source_tenant_id;
    Ok(report)
}

/// Write a plan inside one transaction.
pub async fn apply_plan(pool: &PgPool, plan: &ClonePlan, skip_existing: bool) -> Result<CloneReport, CloneError> {
    let tenant_id = plan.target_tenant_id;
    let mut report = CloneReport {
        target_tenant_id: tenant_id,
        ..CloneReport::default()
    };

    let mut tx = pool.begin().await.context("failed to begin clone")?;
    let conn: &mut PgConnection = &mut tx;

    let mut page_ids: HashMap<&str, i64> = HashMap::new();
    for page in &plan.pages {
        let write = upsert_page(conn, page, skip_existing).await?;
        page_ids.insert(page.slug.as_str(), write.id());
        report.record("pages", write);
    }

    let mut touched_pages = BTreeSet::new();
    for planned in &plan.sections {
        let Some(&page_id) = page_ids.get(planned.page_slug.as_str()) else {
            warn!(page = %planned.page_slug, "skipping section of unplanned page");
            continue;
        };
        let write = upsert_section(conn, page_id, &planned.section, skip_existing).await?;
        touched_pages.insert(page_id);
        report.record("sections", write);
    }

    let mut category_ids: HashMap<&str, i64> = HashMap::new();
    for category in &plan.categories {
        let write = upsert_category(conn, category, skip_existing).await?;
        category_ids.insert(category.slug.as_str(), write.id());
        report.record("service_categories", write);
    }

    let mut touched_categories = BTreeSet::new();
    for planned in &plan.services {
        let Some(&category_id) = category_ids.get(planned.category_slug.as_str()) else {
            warn!(category = %planned.category_slug, "skipping service of unplanned category");
            continue;
        };
        let write = upsert_service(conn, category_id, &planned.service, skip_existing).await?;
        touched_categories.insert(category_id);
        report.record("services", write);
    }

    for member in &plan.team {
        let write = upsert_team_member(conn, member, skip_existing).await?;
        report.record("team_members", write);
    }
    for testimonial in &plan.testimonials {
        let write = upsert_testimonial(conn, testimonial, skip_existing).await?;
        report.record("testimonials", write);
    }
    for faq in &plan.faqs {
        let write = upsert_faq(conn, faq, skip_existing).await?;
        report.record("faqs", write);
    }
    for menu in &plan.menus {
        let write = upsert_menu(conn, menu, skip_existing).await?;
        report.record("menus", write);
    }
    for setting in &plan.settings {
        let write = upsert_setting(conn, setting, skip_existing).await?;
        report.record("settings", write);
    }

    // Merged rows may collide with existing orders; renumber every scope touched.
    let mut scopes = vec![
        OrderScope::new("pages", "tenant_id", tenant_id),
        OrderScope::new("service_categories", "tenant_id", tenant_id),
        OrderScope::new("team_members", "tenant_id", tenant_id),
        OrderScope::new("testimonials", "tenant_id", tenant_id),
        OrderScope::new("faqs", "tenant_id", tenant_id),
    ];
    scopes.extend(
        touched_pages
            .into_iter()
            .map(|id| OrderScope::new("sections", "page_id", id)),
    );
    scopes.extend(
        touched_categories
            .into_iter()
            .map(|id| OrderScope::new("services", "category_id", id)),
    );
    for scope in scopes {
        let ids = ordering::ordered_ids(&mut *conn, scope).await?;
        ordering::apply_order(conn, scope, &ids).await?;
    }

    tx.commit().await.context("failed to commit clone")?;
    info!(
        target_tenant_id = tenant_id,
        created = report.total_created(),
        "tenant content cloned"
    );
    Ok(report)
}

async fn existing_id(
    conn: &mut PgConnection,
    sql: &str,
    scope: i64,
    key: &str,
) -> anyhow::Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(scope)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .context("failed to look up clone target")
}

async fn upsert_page(conn: &mut PgConnection, page: &Page, skip_existing: bool) -> anyhow::Result<Write> {
    let existing = existing_id(
        conn,
        "SELECT id FROM pages WHERE tenant_id = $1 AND slug = $2",
        page.tenant_id,
        &page.slug,
    )
    .await?;
    if let (Some(id), true) = (existing, skip_existing) {
        return Ok(Write::Skipped(id));
    }

    if page.is_homepage {
        sqlx::query("UPDATE pages SET is_homepage = FALSE WHERE tenant_id = $1 AND slug <> $2")
            .bind(page.tenant_id)
            .bind(&page.slug)
            .execute(&mut *conn)
            .await
            .context("failed to clear homepage")?;
    }

    if let Some(id) = existing {
        sqlx::query(
            r#"
            UPDATE pages
            SET title = $1, meta_title = $2, meta_description = $3, is_published = $4,
                is_homepage = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(&page.title)
        .bind(&page.meta_title)
        .bind(&page.meta_description)
        .bind(page.is_published)
        .bind(page.is_homepage)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("failed to update cloned page")?;
        return Ok(Write::Updated(id));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO pages (tenant_id, title, slug, meta_title, meta_description,
                           is_published, is_homepage, sort_order)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(page.tenant_id)
    .bind(&page.title)
    .bind(&page.slug)
    .bind(&page.meta_title)
    .bind(&page.meta_description)
    .bind(page.is_published)
    .bind(page.is_homepage)
    .bind(page.sort_order)
    .fetch_one(&mut *conn)
    .await
    .context("failed to insert cloned page")?;
    Ok(Write::Created(id))
}

async fn upsert_section(
    conn: &mut PgConnection,
    page_id: i64,
    section: &Section,
    skip_existing: bool,
) -> anyhow::Result<Write> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM sections WHERE page_id = $1 AND sort_order = $2 ORDER BY id LIMIT 1")
            .bind(page_id)
            .bind(section.sort_order)
            .fetch_optional(&mut *conn)
            .await
            .context("failed to look up cloned section")?;

    match (existing, skip_existing) {
        (Some(id), true) => Ok(Write::Skipped(id)),
        (Some(id), false) => {
            sqlx::query(
                r#"
                UPDATE sections
                SET component_type = $1, is_visible = $2, content = $3, styles = $4,
                    settings = $5, updated_at = NOW()
                WHERE id = $6
                "#,
            )
            .bind(&section.component_type)
            .bind(section.is_visible)
            .bind(&section.content)
            .bind(&section.styles)
            .bind(&section.settings)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to update cloned section")?;
            Ok(Write::Updated(id))
        }
        (None, _) => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO sections (tenant_id, page_id, component_type, sort_order,
                                      is_visible, content, styles, settings)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(section.tenant_id)
            .bind(page_id)
            .bind(&section.component_type)
            .bind(section.sort_order)
            .bind(section.is_visible)
            .bind(&section.content)
            .bind(&section.styles)
            .bind(&section.settings)
            .fetch_one(&mut *conn)
            .await
            .context("failed to insert cloned section")?;
            Ok(Write::Created(id))
        }
    }
}

async fn upsert_category(
    conn: &mut PgConnection,
    category: &ServiceCategory,
    skip_existing: bool,
) -> anyhow::Result<Write> {
    let existing = existing_id(
        conn,
        "SELECT id FROM service_categories WHERE tenant_id = $1 AND slug = $2",
        category.tenant_id,
        &category.slug,
    )
    .await?;

    match (existing, skip_existing) {
        (Some(id), true) => Ok(Write::Skipped(id)),
        (Some(id), false) => {
            sqlx::query(
                "UPDATE service_categories SET name = $1, description = $2, updated_at = NOW() WHERE id = $3",
            )
            .bind(&category.name)
            .bind(&category.description)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to update cloned service category")?;
            Ok(Write::Updated(id))
        }
        (None, _) => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO service_categories (tenant_id, name, slug, description, sort_order)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(category.tenant_id)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(category.sort_order)
            .fetch_one(&mut *conn)
            .await
            .context("failed to insert cloned service category")?;
            Ok(Write::Created(id))
        }
    }
}

async fn upsert_service(
    conn: &mut PgConnection,
    category_id: i64,
    service: &Service,
    skip_existing: bool,
) -> anyhow::Result<Write> {
    let existing = existing_id(
        conn,
        "SELECT id FROM services WHERE tenant_id = $1 AND slug = $2",
        service.tenant_id,
        &service.slug,
    )
    .await?;

    match (existing, skip_existing) {
        (Some(id), true) => Ok(Write::Skipped(id)),
        (Some(id), false) => {
            sqlx::query(
                r#"
                UPDATE services
                SET category_id = $1, title = $2, summary = $3, description = $4, icon = $5,
                    image = $6, is_featured = $7, is_published = $8, updated_at = NOW()
                WHERE id = $9
                "#,
            )
            .bind(category_id)
            .bind(&service.title)
            .bind(&service.summary)
            .bind(&service.description)
            .bind(&service.icon)
            .bind(&service.image)
            .bind(service.is_featured)
            .bind(service.is_published)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to update cloned service")?;
            Ok(Write::Updated(id))
        }
        (None, _) => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO services (tenant_id, category_id, title, slug, summary, description,
                                      icon, image, is_featured, is_published, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING id
                "#,
            )
            .bind(service.tenant_id)
            .bind(category_id)
            .bind(&service.title)
            .bind(&service.slug)
            .bind(&service.summary)
            .bind(&service.description)
            .bind(&service.icon)
            .bind(&service.image)
            .bind(service.is_featured)
            .bind(service.is_published)
            .bind(service.sort_order)
            .fetch_one(&mut *conn)
            .await
            .context("failed to insert cloned service")?;
            Ok(Write::Created(id))
        }
    }
}

async fn upsert_team_member(
    conn: &mut PgConnection,
    member: &TeamMember,
    skip_existing: bool,
) -> anyhow::Result<Write> {
    let existing = existing_id(
        conn,
        "SELECT id FROM team_members WHERE tenant_id = $1 AND name = $2 ORDER BY id LIMIT 1",
        member.tenant_id,
        &member.name,
    )
    .await?;

    match (existing, skip_existing) {
        (Some(id), true) => Ok(Write::Skipped(id)),
        (Some(id), false) => {
            sqlx::query(
                r#"
                UPDATE team_members
                SET position = $1, bio = $2, photo = $3, email = $4, social_links = $5,
                    is_published = $6, updated_at = NOW()
                WHERE id = $7
                "#,
            )
            .bind(&member.position)
            .bind(&member.bio)
            .bind(&member.photo)
            .bind(&member.email)
            .bind(&member.social_links)
            .bind(member.is_published)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to update cloned team member")?;
            Ok(Write::Updated(id))
        }
        (None, _) => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO team_members (tenant_id, name, position, bio, photo, email,
                                          social_links, is_published, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id
                "#,
            )
            .bind(member.tenant_id)
            .bind(&member.name)
            .bind(&member.position)
            .bind(&member.bio)
            .bind(&member.photo)
            .bind(&member.email)
            .bind(&member.social_links)
            .bind(member.is_published)
            .bind(member.sort_order)
            .fetch_one(&mut *conn)
            .await
            .context("failed to insert cloned team member")?;
            Ok(Write::Created(id))
        }
    }
}

async fn upsert_testimonial(
    conn: &mut PgConnection,
    testimonial: &Testimonial,
    skip_existing: bool,
) -> anyhow::Result<Write> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM testimonials WHERE tenant_id = $1 AND author_name = $2 AND quote = $3 ORDER BY id LIMIT 1",
    )
    .bind(testimonial.tenant_id)
    .bind(&testimonial.author_name)
    .bind(&testimonial.quote)
    .fetch_optional(&mut *conn)
    .await
    .context("failed to look up cloned testimonial")?;

    match (existing, skip_existing) {
        (Some(id), true) => Ok(Write::Skipped(id)),
        (Some(id), false) => {
            sqlx::query(
                r#"
                UPDATE testimonials
                SET author_title = $1, company = $2, rating = $3, avatar = $4,
                    is_published = $5, updated_at = NOW()
                WHERE id = $6
                "#,
            )
            .bind(&testimonial.author_title)
            .bind(&testimonial.company)
            .bind(testimonial.rating)
            .bind(&testimonial.avatar)
            .bind(testimonial.is_published)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to update cloned testimonial")?;
            Ok(Write::Updated(id))
        }
        (None, _) => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO testimonials (tenant_id, author_name, author_title, company, quote,
                                          rating, avatar, is_published, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id
                "#,
            )
            .bind(testimonial.tenant_id)
            .bind(&testimonial.author_name)
            .bind(&testimonial.author_title)
            .bind(&testimonial.company)
            .bind(&testimonial.quote)
            .bind(testimonial.rating)
            .bind(&testimonial.avatar)
            .bind(testimonial.is_published)
            .bind(testimonial.sort_order)
            .fetch_one(&mut *conn)
            .await
            .context("failed to insert cloned testimonial")?;
            Ok(Write::Created(id))
        }
    }
}

async fn upsert_faq(conn: &mut PgConnection, faq: &Faq, skip_existing: bool) -> anyhow::Result<Write> {
    let existing = existing_id(
        conn,
        "SELECT id FROM faqs WHERE tenant_id = $1 AND question = $2 ORDER BY id LIMIT 1",
        faq.tenant_id,
        &faq.question,
    )
    .await?;

    match (existing, skip_existing) {
        (Some(id), true) => Ok(Write::Skipped(id)),
        (Some(id), false) => {
            sqlx::query(
                "UPDATE faqs SET answer = $1, category = $2, is_published = $3, updated_at = NOW() WHERE id = $4",
            )
            .bind(&faq.answer)
            .bind(&faq.category)
            .bind(faq.is_published)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to update cloned faq")?;
            Ok(Write::Updated(id))
        }
        (None, _) => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO faqs (tenant_id, question, answer, category, is_published, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(faq.tenant_id)
            .bind(&faq.question)
            .bind(&faq.answer)
            .bind(&faq.category)
            .bind(faq.is_published)
            .bind(faq.sort_order)
            .fetch_one(&mut *conn)
            .await
            .context("failed to insert cloned faq")?;
            Ok(Write::Created(id))
        }
    }
}

async fn upsert_menu(conn: &mut PgConnection, menu: &Menu, skip_existing: bool) -> anyhow::Result<Write> {
    let existing = existing_id(
        conn,
        "SELECT id FROM menus WHERE tenant_id = $1 AND location = $2",
        menu.tenant_id,
        &menu.location,
    )
    .await?;

    match (existing, skip_existing) {
        (Some(id), true) => Ok(Write::Skipped(id)),
        (Some(id), false) => {
            sqlx::query(
                "UPDATE menus SET name = $1, items = $2, is_active = $3, updated_at = NOW() WHERE id = $4",
            )
            .bind(&menu.name)
            .bind(&menu.items)
            .bind(menu.is_active)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to update cloned menu")?;
            Ok(Write::Updated(id))
        }
        (None, _) => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO menus (tenant_id, name, location, items, is_active)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(menu.tenant_id)
            .bind(&menu.name)
            .bind(&menu.location)
            .bind(&menu.items)
            .bind(menu.is_active)
            .fetch_one(&mut *conn)
            .await
            .context("failed to insert cloned menu")?;
            Ok(Write::Created(id))
        }
    }
}

async fn upsert_setting(
    conn: &mut PgConnection,
    setting: &Setting,
    skip_existing: bool,
) -> anyhow::Result<Write> {
    let existing = existing_id(
        conn,
        "SELECT id FROM settings WHERE tenant_id = $1 AND key = $2",
        setting.tenant_id,
        &setting.key,
    )
    .await?;

    if let (Some(id), true) = (existing, skip_existing) {
        return Ok(Write::Skipped(id));
    }

    let saved = Setting::set(
        &mut *conn,
        setting.tenant_id,
        &setting.key,
        &setting.value,
        Some(&setting.group),
    )
    .await?;
    Ok(match existing {
        Some(_) => Write::Updated(saved.id),
        None => Write::Created(saved.id),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rebrand_touches_string_leaves_only() {
        let brand = Rebrand::new("Tessera", "Acme");
        let mut value = json!({
            "heading": "Welcome to Tessera",
            "Tessera": "key stays",
            "count": 3,
            "enabled": true,
            "items": [{"title": "Tessera Pro"}, "plain", null],
        });
        brand.json(&mut value);
        assert_eq!(
            value,
            json!({
                "heading": "Welcome to Acme",
                "Tessera": "key stays",
                "count": 3,
                "enabled": true,
                "items": [{"title": "Acme Pro"}, "plain", null],
            })
        );
    }

    #[test]
    fn rebrand_keeps_block_identifiers() {
        let brand = Rebrand::new("heading", "banner");
        let mut value = json!({"blocks": [{
            "id": "heading_1",
            "type": "heading",
            "data": {"text": "A heading", "level": 2},
            "settings": {"visibility": "visible"}
        }]});
        brand.json(&mut value);

        let block = &value["blocks"][0];
        assert_eq!(block["id"], "heading_1");
        assert_eq!(block["type"], "heading");
        assert_eq!(block["data"]["text"], "A banner");
        assert!(serde_json::from_value::<crate::content::block::ContentBlock>(block.clone()).is_ok());

        // Outside a block, `type` is ordinary text
        let mut item = json!({"type": "heading link", "url": "/"});
        brand.json(&mut item);
        assert_eq!(item["type"], "banner link");
    }

    #[test]
    fn rebrand_with_empty_source_is_a_noop() {
        let brand = Rebrand::new("", "Acme");
        assert_eq!(brand.text("anything"), "anything");
        assert_eq!(brand.opt(&None), None);
    }

    #[test]
    fn report_counts_per_entity() {
        let mut report = CloneReport::default();
        report.record("pages", Write::Created(1));
        report.record("pages", Write::Skipped(2));
        report.record("faqs", Write::Updated(3));

        assert_eq!(
            report.counts("pages"),
            EntityCounts {
                created: 1,
                updated: 0,
                skipped: 1
            }
        );
        assert_eq!(report.counts("menus"), EntityCounts::default());
        assert_eq!(report.total_created(), 1);
    }
}
