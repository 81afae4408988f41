//! Tenant users and password handling.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use sea_query::Order;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::listing::{ListFilters, ListQuery, Paginated};
use crate::tenant::TenantContext;

/// Shortest accepted password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// What a user may do within their tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages users, tenants, webhooks and deployment.
    Admin,
    /// Edits content.
    Editor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl User {
    /// Parsed role. Unknown stored values fall back to editor.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Editor)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    fn query(tenant: &TenantContext, filters: &ListFilters) -> ListQuery {
        ListQuery::new("users", tenant.id)
            .search(&["name", "email"], filters.search.as_deref())
            .order_by("name", Order::Asc)
    }

    pub async fn list(pool: &PgPool, tenant: &TenantContext, filters: &ListFilters) -> Result<Vec<Self>> {
        Self::query(tenant, filters).fetch_all(pool).await
    }

    pub async fn paginate(
        pool: &PgPool,
        tenant: &TenantContext,
        filters: &ListFilters,
    ) -> Result<Paginated<Self>> {
        Self::query(tenant, filters)
            .fetch_page(pool, filters.page_request())
            .await
    }

    /// Find by id without a tenant filter. Used for the session user.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by id")?;

        Ok(user)
    }

    pub async fn find_in_tenant(pool: &PgPool, tenant: &TenantContext, id: i64) -> Result<Option<Self>> {
        let user =
            sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(tenant.id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch user")?;

        Ok(user)
    }

    /// Emails are unique across tenants and compared case-insensitively.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by email")?;

        Ok(user)
    }

    pub async fn create(pool: &PgPool, tenant_id: i64, input: CreateUser) -> Result<Self> {
        let password_hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (tenant_id, name, email, password_hash, role, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&input.name)
        .bind(input.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(input.role.unwrap_or(Role::Editor).as_str())
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await
        .context("failed to create user")?;

        tracing::info!(user_id = user.id, tenant_id, "user created");
        Ok(user)
    }

    pub async fn update(pool: &PgPool, existing: &Self, input: UpdateUser) -> Result<Self> {
        let password_hash = match input.password.as_deref() {
            Some(password) => hash_password(password)?,
            None => existing.password_hash.clone(),
        };
        let email = input
            .email
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_else(|| existing.email.clone());
        let role = input.role.map(|r| r.as_str().to_string());

        let user = sqlx::query_as::<_, Self>(
            r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, role = $4, is_active = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(input.name.as_deref().unwrap_or(&existing.name))
        .bind(&email)
        .bind(&password_hash)
        .bind(role.as_deref().unwrap_or(&existing.role))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(existing.id)
        .fetch_one(pool)
        .await
        .context("failed to update user")?;

        Ok(user)
    }

    pub async fn delete(pool: &PgPool, existing: &Self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(existing.id)
            .execute(pool)
            .await
            .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(&self.password_hash, password)
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Check `password` against a PHC-format hash. Empty or malformed hashes
/// never match.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if hash.is_empty() {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
