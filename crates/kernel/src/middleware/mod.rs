//! HTTP middleware components.
//!
//! Tenant resolution and request metrics.

pub mod metrics;
pub mod tenant;

pub use metrics::track_metrics;
pub use tenant::{TenantResolver, resolve_tenant};
