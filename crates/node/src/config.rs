//! Node configuration loaded from environment variables.

use registry::DEFAULT_NAMESPACE;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Node configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `SERVICE_NAME`: name registered in the registry (default: `"node"`)
/// - `SERVICE_URL`: base URL other services use to reach this node
///   (default: `http://127.0.0.1:<PORT>`)
/// - `ETCD_ENDPOINTS`: comma-separated etcd endpoints; empty runs with an
///   in-process store that only this node can see
/// - `ETCD_USER` / `ETCD_PASSWORD`: etcd credentials, used when both are set
/// - `REGISTRY_NAMESPACE`: key prefix in the store (default: `"services"`)
/// - `SHARED_SECRET`: credential inbound calls must present; required
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for human output
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub service_url: String,
    pub etcd_endpoints: Vec<String>,
    pub etcd_user: Option<String>,
    pub etcd_password: Option<String>,
    pub registry_namespace: String,
    pub shared_secret: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = non_empty("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port,
            service_name: non_empty("SERVICE_NAME").unwrap_or(defaults.service_name),
            service_url: non_empty("SERVICE_URL")
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}")),
            etcd_endpoints: non_empty("ETCD_ENDPOINTS")
                .map(|endpoints| {
                    endpoints
                        .split(',')
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            etcd_user: non_empty("ETCD_USER"),
            etcd_password: non_empty("ETCD_PASSWORD"),
            registry_namespace: non_empty("REGISTRY_NAMESPACE")
                .unwrap_or(defaults.registry_namespace),
            shared_secret: non_empty("SHARED_SECRET"),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// etcd credentials, if both user and password are set.
    pub fn etcd_credentials(&self) -> Option<(String, String)> {
        self.etcd_user.clone().zip(self.etcd_password.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            service_name: "node".to_string(),
            service_url: "http://127.0.0.1:3000".to_string(),
            etcd_endpoints: Vec::new(),
            etcd_user: None,
            etcd_password: None,
            registry_namespace: DEFAULT_NAMESPACE.to_string(),
            shared_secret: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
