//! Services shared by routes and the CLI.
//!
//! - events: cache invalidation, frontend revalidation and webhook fan-out
//! - slug: unique slug generation
//! - tenant_clone: copying master content into a tenant
//! - webhook: signed webhook delivery with SSRF checks

pub mod events;
pub mod slug;
pub mod tenant_clone;
pub mod webhook;
