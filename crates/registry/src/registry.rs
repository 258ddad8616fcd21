//! The service registry.

use std::collections::BTreeMap;

use common::EndpointToken;

use crate::record::ServiceRecord;
use crate::store::CoordinationStore;
use crate::{RegistryError, Result};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "services";

const NAME_KEY: &str = "name";
const ENDPOINTS_KEY: &str = "endpoints";

/// Publishes this service's record and resolves other services' records.
///
/// Owns the coordination-store handle. The optional record is the one this
/// process registers on [`init`](ServiceRegistry::init); no other writer is
/// expected to touch that record's sub-namespace.
#[derive(Clone)]
pub struct ServiceRegistry<S: CoordinationStore> {
    store: S,
    namespace: String,
    record: Option<ServiceRecord>,
}

impl<S: CoordinationStore> ServiceRegistry<S> {
    /// Creates a registry in the default namespace with no own record.
    pub fn new(store: S) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            record: None,
        }
    }

    /// Uses a custom namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the record this process publishes on [`init`](Self::init).
    pub fn with_record(mut self, record: ServiceRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// The namespace all keys are written under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// This process's own record, if one was configured.
    pub fn record(&self) -> Option<&ServiceRecord> {
        self.record.as_ref()
    }

    /// Access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(&self, service: &str, field: &str) -> String {
        format!("{}/{}/{}", self.namespace, service, field)
    }

    /// Publishes the configured record.
    ///
    /// Fails with [`RegistryError::Configuration`] when the registry was
    /// built without a record.
    pub async fn init(&self) -> Result<()> {
        let record = self.record.as_ref().ok_or_else(|| {
            RegistryError::Configuration("trying to init but no record specified".to_string())
        })?;
        self.register(record).await
    }

    /// Writes `record` under `<namespace>/<record.name>/`.
    ///
    /// Overwrites any previous registration; there is no versioning.
    #[tracing::instrument(skip(self, record), fields(namespace = %self.namespace, service = %record.name))]
    pub async fn register(&self, record: &ServiceRecord) -> Result<()> {
        record.validate()?;

        let endpoints = serde_json::to_string(&record.endpoints)?;
        self.store
            .put(&self.key(&record.name, NAME_KEY), &record.base_url)
            .await?;
        self.store
            .put(&self.key(&record.name, ENDPOINTS_KEY), &endpoints)
            .await?;

        metrics::counter!("registry_registrations_total").increment(1);
        tracing::info!(
            base_url = %record.base_url,
            endpoints = record.endpoints.len(),
            "service registered"
        );
        Ok(())
    }

    /// Returns the base URL registered for `name`.
    ///
    /// This is the DNS-style lookup used by the sidecar transport.
    #[tracing::instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn resolve_service(&self, name: &str) -> Result<String> {
        metrics::counter!("registry_lookups_total", "kind" => "service").increment(1);
        self.store
            .get(&self.key(name, NAME_KEY))
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("service '{name}'")))
    }

    /// Resolves an endpoint token string to a full URL.
    pub async fn resolve_endpoint(&self, token: &str) -> Result<String> {
        let token = EndpointToken::parse(token)?;
        self.resolve_token(&token).await
    }

    /// Resolves a parsed endpoint token to `base_url + path`.
    ///
    /// Fails with [`RegistryError::NotFound`] if the service's base URL, its
    /// endpoint map, or the specific key is missing.
    #[tracing::instrument(skip(self), fields(namespace = %self.namespace, token = %token))]
    pub async fn resolve_token(&self, token: &EndpointToken) -> Result<String> {
        metrics::counter!("registry_lookups_total", "kind" => "endpoint").increment(1);
        let service = token.service();

        let base_url = self.store.get(&self.key(service, NAME_KEY)).await?;
        let endpoints = self.store.get(&self.key(service, ENDPOINTS_KEY)).await?;

        let (Some(base_url), Some(endpoints)) = (base_url, endpoints) else {
            return Err(RegistryError::NotFound(format!(
                "no endpoint registered for token '{token}'"
            )));
        };

        let endpoints: BTreeMap<String, String> = serde_json::from_str(&endpoints)?;
        let path = endpoints.get(token.endpoint()).ok_or_else(|| {
            RegistryError::NotFound(format!("no endpoint registered for token '{token}'"))
        })?;

        Ok(format!("{base_url}{path}"))
    }
}
