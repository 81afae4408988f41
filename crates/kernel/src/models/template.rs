//! Page templates: named lists of section blueprints that can be stamped
//! onto a page.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery};
use super::ordering::{self, OrderScope};
use super::page::Page;
use super::section::Section;
use crate::content::{SectionTypeRegistry, normalize_styles};
use crate::error::FieldErrors;
use crate::services::slug::{available_slug, updated_slug};
use crate::tenant::TenantContext;

/// Template record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Template {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// `[SectionBlueprint]`
    pub sections: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One section a template creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBlueprint {
    pub component_type: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub styles: Option<Value>,
    #[serde(default)]
    pub settings: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTemplate {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub sections: Option<Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub sections: Option<Value>,
    pub is_active: Option<bool>,
}

/// Parse and check blueprints against the section registry.
///
/// Returns the fully prepared `(component_type, content)` pairs, or field
/// errors keyed `sections.<index>.<field>`.
pub fn prepare_blueprints(
    registry: &SectionTypeRegistry,
    sections: &Value,
) -> Result<Vec<(SectionBlueprint, Value)>, FieldErrors> {
    let blueprints: Vec<SectionBlueprint> = match serde_json::from_value(sections.clone()) {
        Ok(list) => list,
        Err(e) => {
            let mut errors = FieldErrors::new();
            errors.insert("sections".to_string(), format!("Invalid section list: {e}"));
            return Err(errors);
        }
    };

    let mut prepared = Vec::with_capacity(blueprints.len());
    let mut errors = FieldErrors::new();
    for (index, blueprint) in blueprints.into_iter().enumerate() {
        match registry.prepare_content(&blueprint.component_type, blueprint.content.as_ref()) {
            Ok(content) => prepared.push((blueprint, content)),
            Err(field_errors) => {
                for (field, message) in field_errors {
                    errors.insert(format!("sections.{index}.{field}"), message);
                }
            }
        }
    }

    if errors.is_empty() { Ok(prepared) } else { Err(errors) }
}

impl Template {
    pub async fn list(pool: &PgPool, tenant: &TenantContext, filters: &ListFilters) -> Result<Vec<Self>> {
        ListQuery::new("templates", tenant.id)
            .search(&["name", "description"], filters.search.as_deref())
            .order_by("name", Order::Asc)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let template =
            sqlx::query_as::<_, Self>("SELECT * FROM templates WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(tenant.id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch template")?;

        Ok(template)
    }

    pub async fn create(pool: &PgPool, tenant: &TenantContext, input: CreateTemplate) -> Result<Self> {
        let source = input.slug.as_deref().unwrap_or(&input.name);
        let slug = available_slug(pool, "templates", Some(tenant.id), source).await?;

        let template = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO templates (tenant_id, name, slug, description, sections, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.name)
        .bind(&slug)
        .bind(&input.description)
        .bind(input.sections.unwrap_or_else(|| Value::Array(Vec::new())))
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await
        .context("failed to create template")?;

        Ok(template)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateTemplate) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin template update")?;
        let slug = updated_slug(
            &mut tx,
            "templates",
            existing.tenant_id,
            &existing.slug,
            input.slug.as_deref(),
        )
        .await?;

        let template = sqlx::query_as::<_, Self>(
            r#"
            UPDATE templates
            SET name = $1, slug = $2, description = $3, sections = $4, is_active = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(input.name.as_deref().unwrap_or(&existing.name))
        .bind(&slug)
        .bind(input.description.or_else(|| existing.description.clone()))
        .bind(input.sections.unwrap_or_else(|| existing.sections.clone()))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(existing.id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to update template")?;

        tx.commit().await.context("failed to commit template update")?;
        Ok(template)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(existing.id)
            .execute(pool)
            .await
            .context("failed to delete template")?;

        Ok(result.rows_affected() > 0)
    }

    /// Append prepared blueprint sections to the end of `page`, in order,
    /// in one transaction.
    pub async fn apply(
        pool: &PgPool,
        page: &Page,
        prepared: Vec<(SectionBlueprint, Value)>,
    ) -> Result<Vec<Section>> {
        let mut tx = pool.begin().await.context("failed to begin template apply")?;
        let scope = OrderScope::new("sections", "page_id", page.id);
        let mut order = ordering::next_order(&mut *tx, scope).await?;

        let mut created = Vec::with_capacity(prepared.len());
        for (blueprint, content) in prepared {
            let styles = Value::Object(normalize_styles(
                blueprint.styles.as_ref().unwrap_or(&Value::Null),
            ));
            let settings = blueprint
                .settings
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

            let section = sqlx::query_as::<_, Section>(
                r#"
                INSERT INTO sections (tenant_id, page_id, component_type, sort_order, is_visible,
                                      content, styles, settings)
                VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(page.tenant_id)
            .bind(page.id)
            .bind(&blueprint.component_type)
            .bind(order)
            .bind(&content)
            .bind(&styles)
            .bind(&settings)
            .fetch_one(&mut *tx)
            .await
            .context("failed to create section from template")?;

            created.push(section.normalized());
            order += 1;
        }

        tx.commit().await.context("failed to commit template apply")?;
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blueprints_are_prepared_in_order() {
        let registry = SectionTypeRegistry::with_standard_types();
        let sections = json!([
            {"component_type": "hero", "content": {"heading": "Welcome"}},
            {"component_type": "custom"}
        ]);
        let prepared = prepare_blueprints(&registry, &sections).unwrap();
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].0.component_type, "hero");
        assert_eq!(prepared[0].1["alignment"], "center");
        assert_eq!(prepared[1].1, json!({"blocks": []}));
    }

    #[test]
    fn blueprint_errors_carry_index() {
        let registry = SectionTypeRegistry::with_standard_types();
        let sections = json!([
            {"component_type": "hero", "content": {"heading": "ok"}},
            {"component_type": "cta", "content": {"heading": "Go"}},
            {"component_type": "marquee"}
        ]);
        let errors = prepare_blueprints(&registry, &sections).unwrap_err();
        assert!(errors.contains_key("sections.1.button_url"));
        assert!(errors.contains_key("sections.2.component_type"));
    }

    #[test]
    fn malformed_list_is_rejected() {
        let registry = SectionTypeRegistry::with_standard_types();
        let errors = prepare_blueprints(&registry, &json!({"not": "a list"})).unwrap_err();
        assert!(errors.contains_key("sections"));
    }
}
