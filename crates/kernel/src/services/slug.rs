//! URL slug generation and collision avoidance.

use std::collections::HashSet;

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::listing::escape_like_wildcards;

/// Longest slug we generate, counter suffix included.
pub const MAX_SLUG_LEN: usize = 128;

/// Convert text into a URL-safe slug.
///
/// Lowercases, maps every non-alphanumeric run to a single hyphen and trims
/// hyphens at both ends. Long slugs are cut at a word boundary.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        // ASCII only, so any byte index is a char boundary.
        let cut = &slug[..MAX_SLUG_LEN];
        let end = cut.rfind('-').unwrap_or(MAX_SLUG_LEN);
        slug.truncate(end);
    }

    slug
}

/// First of `base`, `base-1`, `base-2`, ... for which `taken` is false.
///
/// The base is shortened when needed so the result stays within
/// [`MAX_SLUG_LEN`].
pub fn unique_slug(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1u32;
    loop {
        let suffix = format!("-{n}");
        let candidate = format!("{}{suffix}", stem(base, MAX_SLUG_LEN - suffix.len()));
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// `base` cut to at most `max` bytes, without a trailing hyphen.
fn stem(base: &str, max: usize) -> &str {
    let mut end = base.len().min(max);
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    base[..end].trim_end_matches('-')
}

/// Resolve a requested slug for a row currently holding `current`.
///
/// The row's own slug never counts as taken, so a row already carrying a
/// suffixed form of `requested` keeps it.
pub fn reslug(requested: &str, current: &str, taken: &HashSet<String>) -> String {
    unique_slug(requested, |s| s != current && taken.contains(s))
}

/// Slugs in `table` equal to `base` or starting with `base-`.
///
/// `scope` limits the lookup to one tenant; `None` searches the whole table.
pub async fn existing_slugs<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &'static str,
    scope: Option<i64>,
    base: &str,
) -> Result<HashSet<String>> {
    let pattern = format!("{}-%", escape_like_wildcards(base));
    let slugs: Vec<String> = match scope {
        Some(tenant_id) => {
            let sql = format!(
                "SELECT slug FROM {table} WHERE tenant_id = $1 AND (slug = $2 OR slug LIKE $3)"
            );
            sqlx::query_scalar(&sql)
                .bind(tenant_id)
                .bind(base)
                .bind(&pattern)
                .fetch_all(executor)
                .await
        }
        None => {
            let sql = format!("SELECT slug FROM {table} WHERE slug = $1 OR slug LIKE $2");
            sqlx::query_scalar(&sql)
                .bind(base)
                .bind(&pattern)
                .fetch_all(executor)
                .await
        }
    }
    .with_context(|| format!("failed to load slugs from {table}"))?;

    Ok(slugs.into_iter().collect())
}

/// A slug derived from `text` that is free in `table`.
pub async fn available_slug<'e, E: PgExecutor<'e>>(
    executor: E,
    table: &'static str,
    scope: Option<i64>,
    text: &str,
) -> Result<String> {
    let mut base = slugify(text);
    if base.is_empty() {
        base = "untitled".to_string();
    }
    let taken = existing_slugs(executor, table, scope, &base).await?;
    Ok(unique_slug(&base, |s| taken.contains(s)))
}

/// Slug for an update: unchanged unless a different non-empty one is requested.
pub async fn updated_slug(
    conn: &mut sqlx::PgConnection,
    table: &'static str,
    tenant_id: i64,
    current: &str,
    requested: Option<&str>,
) -> Result<String> {
    match requested.map(slugify) {
        Some(slug) if !slug.is_empty() && slug != current => {
            let taken = existing_slugs(conn, table, Some(tenant_id), &slug).await?;
            Ok(reslug(&slug, current, &taken))
        }
        _ => Ok(current.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Acme Plumbing & Heating"), "acme-plumbing-heating");
        assert_eq!(slugify("  --Leading and trailing--  "), "leading-and-trailing");
        assert_eq!(slugify("multiple   spaces"), "multiple-spaces");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Münster"), "caf-m-nster");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_truncates_at_word_boundary() {
        let long = "word ".repeat(60);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(slug.ends_with("word"));
    }

    #[test]
    fn unique_slug_appends_counter() {
        let taken: HashSet<String> = ["acme", "acme-1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_slug("acme", |s| taken.contains(s)), "acme-2");
        assert_eq!(unique_slug("other", |s| taken.contains(s)), "other");
    }

    #[test]
    fn unique_slug_stays_within_max_length() {
        let base = "a".repeat(MAX_SLUG_LEN);
        let slug = unique_slug(&base, |s| s == base);
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with("a-1"));
    }

    #[test]
    fn reslug_keeps_own_suffixed_slug() {
        let taken: HashSet<String> = ["about", "about-1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(reslug("about", "about-1", &taken), "about-1");
        assert_eq!(reslug("about", "contact", &taken), "about-2");

        let taken: HashSet<String> = ["about-1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(reslug("about", "about-1", &taken), "about");
    }

    #[test]
    fn unique_slug_fills_first_gap() {
        let taken: HashSet<String> = ["acme", "acme-2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_slug("acme", |s| taken.contains(s)), "acme-1");
    }
}
