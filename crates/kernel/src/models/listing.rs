//! Tenant-scoped list, search and pagination queries built with SeaQuery.
//!
//! Every list operation goes through [`ListQuery`], which always filters by
//! `tenant_id`. Column names are compile-time constants supplied by the model;
//! only values come from user input.

use anyhow::{Context, Result};
use sea_query::{
    Alias, Asterisk, Cond, Condition, Expr, Order, PostgresQueryBuilder, Query,
    SelectStatement,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgRow;

/// Largest page size a client may request.
pub const MAX_PER_PAGE: u64 = 100;

/// Page size when none is requested.
pub const DEFAULT_PER_PAGE: u64 = 15;

/// Common list filters accepted as query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilters {
    /// Case-insensitive substring match over the model's search columns.
    pub search: Option<String>,
    pub is_published: Option<bool>,
    /// Entity-specific grouping (FAQ category, media folder, setting group).
    pub category: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ListFilters {
    /// Normalized page request.
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

/// A 1-based page number and a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Clamp `per_page` to `1..=100` and `page` to at least 1.
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, request: PageRequest) -> Self {
        let total_u = u64::try_from(total).unwrap_or(0);
        let last_page = total_u.div_ceil(request.per_page).max(1);
        Self {
            data,
            total,
            per_page: request.per_page,
            current_page: request.page,
            last_page,
        }
    }

    /// Transform each row, keeping the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
        }
    }
}

/// A tenant-scoped SELECT over one table.
#[derive(Debug, Clone)]
pub struct ListQuery {
    table: &'static str,
    tenant_id: i64,
    conditions: Vec<Condition>,
    order_by: Vec<(&'static str, Order)>,
}

impl ListQuery {
    pub fn new(table: &'static str, tenant_id: i64) -> Self {
        Self {
            table,
            tenant_id,
            conditions: Vec::new(),
            order_by: Vec::new(),
        }
    }

    /// Case-insensitive substring search over `columns`, OR-ed together.
    ///
    /// Blank terms add no condition.
    pub fn search(mut self, columns: &[&'static str], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        let pattern = format!("%{}%", escape_like_wildcards(term));
        let mut any = Cond::any();
        for column in columns {
            any = any.add(Expr::cust_with_values(
                format!("\"{column}\" ILIKE $1"),
                [pattern.clone()],
            ));
        }
        self.conditions.push(any);
        self
    }

    /// Equality filter on a column, skipped when `value` is `None`.
    pub fn filter_eq<V>(mut self, column: &'static str, value: Option<V>) -> Self
    where
        V: Into<sea_query::Value>,
    {
        if let Some(value) = value {
            self.conditions
                .push(Cond::all().add(Expr::col(Alias::new(column)).eq(value.into())));
        }
        self
    }

    pub fn order_by(mut self, column: &'static str, order: Order) -> Self {
        self.order_by.push((column, order));
        self
    }

    fn base(&self) -> SelectStatement {
        let mut query = Query::select();
        query.from(Alias::new(self.table));
        let mut all = Cond::all().add(Expr::col(Alias::new("tenant_id")).eq(self.tenant_id));
        for condition in &self.conditions {
            all = all.add(condition.clone());
        }
        query.cond_where(all);
        query
    }

    fn select_rows(&self) -> SelectStatement {
        let mut query = self.base();
        query.column(Asterisk);
        for (column, order) in &self.order_by {
            query.order_by(Alias::new(*column), order.clone());
        }
        query.order_by(Alias::new("id"), Order::Asc);
        query
    }

    /// SQL for every matching row.
    pub fn build_all(&self) -> String {
        self.select_rows().to_string(PostgresQueryBuilder)
    }

    /// SQL for one page of rows.
    pub fn build_page(&self, request: PageRequest) -> String {
        let mut query = self.select_rows();
        query.limit(request.per_page);
        query.offset(request.offset());
        query.to_string(PostgresQueryBuilder)
    }

    /// SQL counting matching rows.
    pub fn build_count(&self) -> String {
        let mut query = self.base();
        query.expr(Expr::col(Asterisk).count());
        query.to_string(PostgresQueryBuilder)
    }

    /// Fetch every matching row.
    pub async fn fetch_all<T>(&self, pool: &PgPool) -> Result<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = self.build_all();
        sqlx::query_as::<_, T>(&sql)
            .fetch_all(pool)
            .await
            .with_context(|| format!("failed to list {}", self.table))
    }

    /// Fetch one page of rows plus the total count.
    pub async fn fetch_page<T>(&self, pool: &PgPool, request: PageRequest) -> Result<Paginated<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let count_sql = self.build_count();
        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count {}", self.table))?;

        let sql = self.build_page(request);
        let rows = sqlx::query_as::<_, T>(&sql)
            .fetch_all(pool)
            .await
            .with_context(|| format!("failed to page {}", self.table))?;

        Ok(Paginated::new(rows, total, request))
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, per_page: 15 });
        assert_eq!(PageRequest::new(Some(0), Some(0)).per_page, 1);
        assert_eq!(PageRequest::new(Some(0), Some(0)).page, 1);
        assert_eq!(PageRequest::new(Some(3), Some(500)).per_page, 100);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn last_page_rounds_up_and_is_at_least_one() {
        let request = PageRequest::new(Some(1), Some(10));
        assert_eq!(Paginated::<()>::new(vec![], 0, request).last_page, 1);
        assert_eq!(Paginated::<()>::new(vec![], 10, request).last_page, 1);
        assert_eq!(Paginated::<()>::new(vec![], 11, request).last_page, 2);
    }

    #[test]
    fn tenant_filter_is_always_present() {
        let sql = ListQuery::new("faqs", 7).build_all();
        assert!(sql.contains("FROM \"faqs\""), "{sql}");
        assert!(sql.contains("\"tenant_id\" = 7"), "{sql}");
    }

    #[test]
    fn search_ors_columns_with_escaped_pattern() {
        let sql = ListQuery::new("faqs", 1)
            .search(&["question", "answer"], Some("100%_off"))
            .build_all();
        assert!(sql.contains("\"question\" ILIKE"), "{sql}");
        assert!(sql.contains("\"answer\" ILIKE"), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert!(sql.contains("100\\\\%\\\\_off") || sql.contains("100\\%\\_off"), "{sql}");
    }

    #[test]
    fn blank_search_adds_nothing() {
        let plain = ListQuery::new("pages", 1).build_all();
        let blank = ListQuery::new("pages", 1).search(&["title"], Some("   ")).build_all();
        assert_eq!(plain, blank);
    }

    #[test]
    fn optional_filters_and_paging() {
        let sql = ListQuery::new("services", 2)
            .filter_eq("is_published", Some(true))
            .filter_eq::<i64>("category_id", None)
            .order_by("sort_order", Order::Asc)
            .build_page(PageRequest::new(Some(2), Some(5)));
        assert!(sql.contains("\"is_published\" = TRUE"), "{sql}");
        assert!(!sql.contains("category_id"), "{sql}");
        assert!(sql.contains("ORDER BY \"sort_order\" ASC"), "{sql}");
        assert!(sql.contains("LIMIT 5"), "{sql}");
        assert!(sql.contains("OFFSET 5"), "{sql}");
    }

    #[test]
    fn count_query_ignores_ordering() {
        let sql = ListQuery::new("team_members", 3)
            .order_by("sort_order", Order::Asc)
            .build_count();
        assert!(sql.contains("COUNT(*)"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn escape_like_wildcards_function() {
        assert_eq!(escape_like_wildcards("hello"), "hello");
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }
}
