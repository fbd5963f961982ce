//! Gateway configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default address the HTTP server binds to.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// HTTP surface and route persistence settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    /// JSON file holding the persisted route table
    pub routes_file: PathBuf,
    /// Path prefix under which dynamic routes are mounted (`/api`)
    pub mount_prefix: String,
    /// Maximum accepted request body for dynamic routes, in bytes
    pub body_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            routes_file: PathBuf::from("routes.json"),
            mount_prefix: "/api".to_string(),
            body_limit: 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_routes_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.routes_file = path.into();
        self
    }

    pub fn with_mount_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mount_prefix = prefix.into();
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Mount prefix without a trailing slash; empty when routes are mounted at the root.
    pub fn normalized_prefix(&self) -> &str {
        self.mount_prefix.trim_end_matches('/')
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The mount prefix does not start with `/` (an empty prefix is allowed)
    /// - The mount prefix collides with the administrative surface
    /// - The body limit is zero
    pub fn validate(&self) -> Result<(), String> {
        let prefix = self.normalized_prefix();
        if !self.mount_prefix.is_empty() && !self.mount_prefix.starts_with('/') {
            return Err(format!("mount prefix must start with '/' (got '{}')", self.mount_prefix));
        }
        if ["/lambda", "/gateway", "/__health"].contains(&prefix) {
            return Err(format!("mount prefix '{}' is reserved", prefix));
        }
        if self.body_limit == 0 {
            return Err("body limit must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(config.routes_file, PathBuf::from("routes.json"));
        assert_eq!(config.normalized_prefix(), "/api");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(GatewayConfig::new().with_mount_prefix("/fn/").normalized_prefix(), "/fn");
        assert_eq!(GatewayConfig::new().with_mount_prefix("/").normalized_prefix(), "");
        assert!(GatewayConfig::new().with_mount_prefix("").validate().is_ok());
    }

    #[test]
    fn test_invalid_prefixes() {
        assert!(GatewayConfig::new().with_mount_prefix("api").validate().is_err());
        assert!(GatewayConfig::new().with_mount_prefix("/gateway").validate().is_err());
        assert!(GatewayConfig::new().with_mount_prefix("/lambda/").validate().is_err());
    }

    #[test]
    fn test_zero_body_limit() {
        assert!(GatewayConfig::new().with_body_limit(0).validate().is_err());
    }
}
