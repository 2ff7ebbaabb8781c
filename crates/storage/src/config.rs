//! Storage configuration.

use std::time::Duration;

/// Bucket names and endpoints.
///
/// Self-hosted deployments commonly reach the store via an internal network
/// name while browsers reach it via a public hostname; presigned URLs must
/// use the public endpoint or they are useless outside the cluster.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Endpoint the service itself talks to.
    pub internal_endpoint: String,
    /// Endpoint baked into presigned URLs. Falls back to the internal one.
    pub public_endpoint: Option<String>,
    pub datasets_bucket: String,
    pub results_bucket: String,
    /// Default TTL for presigned URLs.
    pub presign_ttl: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            internal_endpoint: "http://localhost:9000".to_string(),
            public_endpoint: None,
            datasets_bucket: "benchrun-datasets".to_string(),
            results_bucket: "benchrun-results".to_string(),
            presign_ttl: Duration::from_secs(3600),
        }
    }
}

impl StorageConfig {
    /// Load from `BENCHRUN_S3_*` environment variables, with dev defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            internal_endpoint: std::env::var("BENCHRUN_S3_ENDPOINT")
                .unwrap_or(defaults.internal_endpoint),
            public_endpoint: std::env::var("BENCHRUN_S3_PUBLIC_ENDPOINT").ok(),
            datasets_bucket: std::env::var("BENCHRUN_S3_DATASETS_BUCKET")
                .unwrap_or(defaults.datasets_bucket),
            results_bucket: std::env::var("BENCHRUN_S3_RESULTS_BUCKET")
                .unwrap_or(defaults.results_bucket),
            presign_ttl: std::env::var("BENCHRUN_S3_PRESIGN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.presign_ttl),
        }
    }

    /// Endpoint presigned URLs should be derived from.
    pub fn presign_endpoint(&self) -> &str {
        self.public_endpoint
            .as_deref()
            .unwrap_or(&self.internal_endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presign_endpoint_prefers_public() {
        let mut config = StorageConfig::default();
        assert_eq!(config.presign_endpoint(), "http://localhost:9000");

        config.public_endpoint = Some("https://files.example.org".to_string());
        assert_eq!(config.presign_endpoint(), "https://files.example.org");
    }
}
