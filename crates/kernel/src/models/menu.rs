//! Navigation menus: one per tenant and location, holding a nested item tree.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery};
use crate::error::FieldErrors;
use crate::tenant::TenantContext;

/// Deepest nesting allowed in a menu tree.
pub const MAX_MENU_DEPTH: usize = 3;

/// Menu record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Menu {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    /// Placement key such as `header` or `footer`. Unique per tenant.
    pub location: String,
    /// `[{label, url, target?, children?: [...]}]`
    pub items: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMenu {
    pub name: String,
    pub location: String,
    pub items: Option<Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMenu {
    pub name: Option<String>,
    pub location: Option<String>,
    pub items: Option<Value>,
    pub is_active: Option<bool>,
}

/// Check a menu item tree: an array of objects with a non-empty `label` and
/// `url`, nested through `children` at most [`MAX_MENU_DEPTH`] levels deep.
pub fn validate_items(items: &Value) -> FieldErrors {
    let mut errors = FieldErrors::new();
    match items {
        Value::Array(list) => walk_items(list, "items", 1, &mut errors),
        _ => {
            errors.insert("items".to_string(), "Menu items must be a list.".to_string());
        }
    }
    errors
}

fn walk_items(list: &[Value], path: &str, depth: usize, errors: &mut FieldErrors) {
    if depth > MAX_MENU_DEPTH {
        errors.insert(
            path.to_string(),
            format!("Menus may nest at most {MAX_MENU_DEPTH} levels."),
        );
        return;
    }
    for (i, item) in list.iter().enumerate() {
        let here = format!("{path}.{i}");
        let Some(obj) = item.as_object() else {
            errors.insert(here, "Each menu item must be an object.".to_string());
            continue;
        };
        for field in ["label", "url"] {
            let blank = obj
                .get(field)
                .and_then(Value::as_str)
                .is_none_or(|s| s.trim().is_empty());
            if blank {
                errors.insert(format!("{here}.{field}"), format!("The {field} field is required."));
            }
        }
        match obj.get("children") {
            None | Some(Value::Null) => {}
            Some(Value::Array(children)) => {
                walk_items(children, &format!("{here}.children"), depth + 1, errors);
            }
            Some(_) => {
                errors.insert(format!("{here}.children"), "Children must be a list.".to_string());
            }
        }
    }
}

impl Menu {
    pub async fn list(pool: &PgPool, tenant: &TenantContext, filters: &ListFilters) -> Result<Vec<Self>> {
        ListQuery::new("menus", tenant.id)
            .search(&["name", "location"], filters.search.as_deref())
            .order_by("location", Order::Asc)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let menu = sqlx::query_as::<_, Self>("SELECT * FROM menus WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant.id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch menu")?;

        Ok(menu)
    }

    pub async fn find_by_location(
        pool: &PgPool,
        tenant: &TenantContext,
        location: &str,
    ) -> Result<Option<Self>> {
        let menu = sqlx::query_as::<_, Self>(
            "SELECT * FROM menus WHERE location = $1 AND tenant_id = $2",
        )
        .bind(location)
        .bind(tenant.id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch menu by location")?;

        Ok(menu)
    }

    /// Whether another menu of the tenant already uses `location`.
    pub async fn location_taken(
        pool: &PgPool,
        tenant: &TenantContext,
        location: &str,
        except: Option<i64>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM menus WHERE tenant_id = $1 AND location = $2 AND id <> COALESCE($3, 0))",
        )
        .bind(tenant.id)
        .bind(location)
        .bind(except)
        .fetch_one(pool)
        .await
        .context("failed to check menu location")?;

        Ok(taken)
    }

    pub async fn create(pool: &PgPool, tenant: &TenantContext, input: CreateMenu) -> Result<Self> {
        let menu = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO menus (tenant_id, name, location, items, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant.id)
        .bind(&input.name)
        .bind(&input.location)
        .bind(input.items.unwrap_or_else(|| Value::Array(Vec::new())))
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await
        .context("failed to create menu")?;

        Ok(menu)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateMenu) -> Result<Self> {
        let menu = sqlx::query_as::<_, Self>(
            r#"
            UPDATE menus
            SET name = $1, location = $2, items = $3, is_active = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(input.name.as_deref().unwrap_or(&existing.name))
        .bind(input.location.as_deref().unwrap_or(&existing.location))
        .bind(input.items.unwrap_or_else(|| existing.items.clone()))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update menu")?;

        Ok(menu)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(existing.id)
            .execute(pool)
            .await
            .context("failed to delete menu")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_tree_passes() {
        let items = json!([
            {"label": "Home", "url": "/"},
            {"label": "Services", "url": "/services", "children": [
                {"label": "Plumbing", "url": "/services/plumbing"}
            ]}
        ]);
        assert!(validate_items(&items).is_empty());
    }

    #[test]
    fn missing_fields_are_reported_with_paths() {
        let items = json!([
            {"label": "Home"},
            {"label": "About", "url": "/about", "children": [{"url": "/team"}]}
        ]);
        let errors = validate_items(&items);
        assert!(errors.contains_key("items.0.url"));
        assert!(errors.contains_key("items.1.children.0.label"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn non_list_is_rejected() {
        assert!(validate_items(&json!({"label": "x"})).contains_key("items"));
    }

    #[test]
    fn depth_is_limited() {
        let items = json!([{"label": "a", "url": "/a", "children": [
            {"label": "b", "url": "/b", "children": [
                {"label": "c", "url": "/c", "children": [
                    {"label": "d", "url": "/d"}
                ]}
            ]}
        ]}]);
        let errors = validate_items(&items);
        assert!(errors.contains_key("items.0.children.0.children.0.children"));
    }
}
