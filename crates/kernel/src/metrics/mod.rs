//! Prometheus metrics.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Outcome of a background operation (`success` or `failure`).
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

impl OutcomeLabels {
    fn of(success: bool) -> Self {
        Self {
            outcome: if success { "success" } else { "failure" }.to_string(),
        }
    }
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    pub http_requests: Family<HttpLabels, Counter>,
    pub http_duration_seconds: Family<HttpLabels, Histogram>,

    pub cache_hits: Counter,
    pub cache_misses: Counter,

    pub file_uploads: Counter,
    pub file_upload_bytes: Counter,

    /// Webhook POSTs by outcome.
    pub webhook_deliveries: Family<OutcomeLabels, Counter>,

    /// Frontend revalidation POSTs by outcome.
    pub revalidations: Family<OutcomeLabels, Counter>,

    /// Tenant content clone runs by outcome.
    pub tenant_clones: Family<OutcomeLabels, Counter>,

    /// NGINX/certbot deploy runs by outcome.
    pub deploys: Family<OutcomeLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests_total",
            "Total HTTP requests",
            http_requests.clone(),
        );

        let http_duration_seconds = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_duration_seconds.clone(),
        );

        let cache_hits = Counter::default();
        registry.register("cache_hits_total", "Cache hit count", cache_hits.clone());

        let cache_misses = Counter::default();
        registry.register(
            "cache_misses_total",
            "Cache miss count",
            cache_misses.clone(),
        );

        let file_uploads = Counter::default();
        registry.register(
            "file_uploads_total",
            "Total media uploads",
            file_uploads.clone(),
        );

        let file_upload_bytes = Counter::default();
        registry.register(
            "file_upload_bytes_total",
            "Total bytes uploaded",
            file_upload_bytes.clone(),
        );

        let webhook_deliveries = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "webhook_deliveries_total",
            "Webhook deliveries by outcome",
            webhook_deliveries.clone(),
        );

        let revalidations = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "frontend_revalidations_total",
            "Frontend revalidation requests by outcome",
            revalidations.clone(),
        );

        let tenant_clones = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "tenant_clones_total",
            "Tenant content clone runs by outcome",
            tenant_clones.clone(),
        );

        let deploys = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "deploys_total",
            "Deployment runs by outcome",
            deploys.clone(),
        );

        Self {
            registry,
            http_requests,
            http_duration_seconds,
            cache_hits,
            cache_misses,
            file_uploads,
            file_upload_bytes,
            webhook_deliveries,
            revalidations,
            tenant_clones,
            deploys,
        }
    }

    /// Record an HTTP request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests.get_or_create(&labels).inc();
        self.http_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    pub fn record_upload(&self, bytes: u64) {
        self.file_uploads.inc();
        self.file_upload_bytes.inc_by(bytes);
    }

    pub fn record_webhook(&self, success: bool) {
        self.webhook_deliveries
            .get_or_create(&OutcomeLabels::of(success))
            .inc();
    }

    pub fn record_revalidation(&self, success: bool) {
        self.revalidations
            .get_or_create(&OutcomeLabels::of(success))
            .inc();
    }

    pub fn record_clone(&self, success: bool) {
        self.tenant_clones
            .get_or_create(&OutcomeLabels::of(success))
            .inc();
    }

    pub fn record_deploy(&self, success: bool) {
        self.deploys.get_or_create(&OutcomeLabels::of(success)).inc();
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Encoding into a String cannot fail
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

/// Collapse numeric path segments into `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|s| {
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_are_collapsed() {
        assert_eq!(normalize_path("/api/pages/123"), "/api/pages/{id}");
        assert_eq!(
            normalize_path("/api/pages/12/sections/7/blocks"),
            "/api/pages/{id}/sections/{id}/blocks"
        );
        assert_eq!(normalize_path("/api/section-types"), "/api/section-types");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn outcomes_are_encoded() {
        let metrics = Metrics::new();
        metrics.record_webhook(true);
        metrics.record_clone(false);
        metrics.record_deploy(true);

        let output = metrics.encode();
        assert!(output.contains("webhook_deliveries_total"));
        assert!(output.contains("outcome=\"failure\""));
        assert!(output.contains("deploys_total"));
    }

    #[test]
    fn requests_are_recorded() {
        let metrics = Metrics::new();
        metrics.record_request("GET", "/api/pages/5", 200, 0.01);
        let output = metrics.encode();
        assert!(output.contains("path=\"/api/pages/{id}\""));
    }
}
