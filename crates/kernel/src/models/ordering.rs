//! Dense `sort_order` maintenance for ordered collections.
//!
//! Ordered rows within one scope (sections of a page, services of a category,
//! FAQs of a tenant, ...) keep `sort_order` values `0..n-1`. New rows are
//! appended at `max + 1`; deletes shift later siblings down by one.

use std::collections::HashSet;

use anyhow::{Context, Result};
use sqlx::PgExecutor;

/// A table and the column that scopes its ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderScope {
    pub table: &'static str,
    pub column: &'static str,
    pub value: i64,
}

impl OrderScope {
    pub fn new(table: &'static str, column: &'static str, value: i64) -> Self {
        Self {
            table,
            column,
            value,
        }
    }
}

/// Order value for a row appended to `scope`: `max(sort_order) + 1`, or 0.
pub async fn next_order<'e, E: PgExecutor<'e>>(executor: E, scope: OrderScope) -> Result<i32> {
    let sql = format!(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM {} WHERE {} = $1",
        scope.table, scope.column
    );
    let next: i32 = sqlx::query_scalar(&sql)
        .bind(scope.value)
        .fetch_one(executor)
        .await
        .with_context(|| format!("failed to compute next order in {}", scope.table))?;

    Ok(next)
}

/// Close the gap left by a removed row at `removed`.
pub async fn compact_after_delete<'e, E: PgExecutor<'e>>(
    executor: E,
    scope: OrderScope,
    removed: i32,
) -> Result<u64> {
    let sql = format!(
        "UPDATE {} SET sort_order = sort_order - 1 WHERE {} = $1 AND sort_order > $2",
        scope.table, scope.column
    );
    let result = sqlx::query(&sql)
        .bind(scope.value)
        .bind(removed)
        .execute(executor)
        .await
        .with_context(|| format!("failed to compact order in {}", scope.table))?;

    Ok(result.rows_affected())
}

/// Open a slot right after `after` so a row can be inserted at `after + 1`.
pub async fn shift_after<'e, E: PgExecutor<'e>>(
    executor: E,
    scope: OrderScope,
    after: i32,
) -> Result<u64> {
    let sql = format!(
        "UPDATE {} SET sort_order = sort_order + 1 WHERE {} = $1 AND sort_order > $2",
        scope.table, scope.column
    );
    let result = sqlx::query(&sql)
        .bind(scope.value)
        .bind(after)
        .execute(executor)
        .await
        .with_context(|| format!("failed to shift order in {}", scope.table))?;

    Ok(result.rows_affected())
}

/// Ids of a scope in their current order.
pub async fn ordered_ids<'e, E: PgExecutor<'e>>(executor: E, scope: OrderScope) -> Result<Vec<i64>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = $1 ORDER BY sort_order, id",
        scope.table, scope.column
    );
    let ids: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(scope.value)
        .fetch_all(executor)
        .await
        .with_context(|| format!("failed to load order of {}", scope.table))?;

    Ok(ids)
}

/// Rewrite `sort_order` so row `ids[i]` gets order `i`.
///
/// Callers check the id set with [`check_reorder`] first.
pub async fn apply_order(
    conn: &mut sqlx::PgConnection,
    scope: OrderScope,
    ids: &[i64],
) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET sort_order = $1, updated_at = NOW() WHERE id = $2 AND {} = $3",
        scope.table, scope.column
    );
    for (index, id) in ids.iter().enumerate() {
        let order = i32::try_from(index).context("too many rows to order")?;
        sqlx::query(&sql)
            .bind(order)
            .bind(id)
            .bind(scope.value)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("failed to reorder {}", scope.table))?;
    }
    Ok(())
}

/// Reorder a whole scope in one transaction.
///
/// Returns `Ok(false)` without writing when `ids` is not a permutation of the
/// scope's current ids.
pub async fn reorder(pool: &sqlx::PgPool, scope: OrderScope, ids: &[i64]) -> Result<bool> {
    let mut tx = pool.begin().await.context("failed to begin reorder")?;

    let current = ordered_ids(&mut *tx, scope).await?;
    if check_reorder(&current, ids).is_err() {
        return Ok(false);
    }
    apply_order(&mut tx, scope, ids).await?;

    tx.commit().await.context("failed to commit reorder")?;
    Ok(true)
}

/// Why a requested order was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderMismatch {
    Length { expected: usize, got: usize },
    Duplicate(i64),
    Unknown(i64),
}

/// Verify `requested` is a permutation of `current`.
pub fn check_reorder(current: &[i64], requested: &[i64]) -> Result<(), ReorderMismatch> {
    if current.len() != requested.len() {
        return Err(ReorderMismatch::Length {
            expected: current.len(),
            got: requested.len(),
        });
    }
    let known: HashSet<i64> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(requested.len());
    for id in requested {
        if !known.contains(id) {
            return Err(ReorderMismatch::Unknown(*id));
        }
        if !seen.insert(*id) {
            return Err(ReorderMismatch::Duplicate(*id));
        }
    }
    Ok(())
}

/// Orders after removing the element at `removed` from a dense sequence.
///
/// Mirrors [`compact_after_delete`] for in-memory rows.
pub fn compact_orders(orders: &mut Vec<i32>, removed: i32) {
    orders.retain(|o| *o != removed);
    for order in orders.iter_mut() {
        if *order > removed {
            *order -= 1;
        }
    }
}

/// True when `orders`, sorted, is exactly `0..n`.
pub fn is_dense(orders: &[i32]) -> bool {
    let mut sorted = orders.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(i, o)| usize::try_from(*o).is_ok_and(|o| o == i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_accepts_permutation() {
        assert_eq!(check_reorder(&[1, 2, 3], &[3, 1, 2]), Ok(()));
        assert_eq!(check_reorder(&[], &[]), Ok(()));
    }

    #[test]
    fn reorder_rejects_mismatches() {
        assert_eq!(
            check_reorder(&[1, 2, 3], &[1, 2]),
            Err(ReorderMismatch::Length { expected: 3, got: 2 })
        );
        assert_eq!(
            check_reorder(&[1, 2, 3], &[1, 2, 9]),
            Err(ReorderMismatch::Unknown(9))
        );
        assert_eq!(
            check_reorder(&[1, 2, 3], &[1, 1, 2]),
            Err(ReorderMismatch::Duplicate(1))
        );
    }

    #[test]
    fn compaction_keeps_sequence_dense() {
        for removed in 0..5 {
            let mut orders: Vec<i32> = (0..5).collect();
            compact_orders(&mut orders, removed);
            assert_eq!(orders.len(), 4);
            assert!(is_dense(&orders), "removed {removed}: {orders:?}");
        }
    }

    #[test]
    fn compaction_preserves_relative_order() {
        // Rows listed in insertion order with their sort orders shuffled.
        let mut orders = vec![3, 0, 4, 1, 2];
        compact_orders(&mut orders, 1);
        assert_eq!(orders, vec![2, 0, 3, 1]);
    }

    #[test]
    fn dense_detection() {
        assert!(is_dense(&[]));
        assert!(is_dense(&[2, 0, 1]));
        assert!(!is_dense(&[0, 2]));
        assert!(!is_dense(&[1, 1]));
        assert!(!is_dense(&[-1, 0]));
    }

    #[test]
    fn scope_new_fills_fields() {
        let scope = OrderScope::new("sections", "page_id", 4);
        assert_eq!(scope.table, "sections");
        assert_eq!(scope.column, "page_id");
        assert_eq!(scope.value, 4);
    }
}
