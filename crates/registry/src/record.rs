use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{RegistryError, Result};

/// What a service publishes about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// How other services refer to this one; the first segment of its tokens.
    pub name: String,
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Endpoint token suffix → URL path.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl ServiceRecord {
    /// Creates a record with no endpoints.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            endpoints: BTreeMap::new(),
        }
    }

    /// Adds an endpoint, e.g. `.endpoint("charge.post", "/v1/charge")`.
    pub fn endpoint(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.endpoints.insert(key.into(), path.into());
        self
    }

    /// Checks the record can be stored and later resolved by token.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RegistryError::Configuration(
                "service name must not be empty".to_string(),
            ));
        }
        // The name is the first token segment and a key path component.
        if self.name.contains('.') || self.name.contains('/') {
            return Err(RegistryError::Configuration(format!(
                "service name '{}' must not contain '.' or '/'",
                self.name
            )));
        }
        if self.base_url.is_empty() {
            return Err(RegistryError::Configuration(format!(
                "service '{}' has an empty base URL",
                self.name
            )));
        }
        Ok(())
    }
}
