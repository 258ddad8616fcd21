//! Service discovery over a namespaced coordination store.
//!
//! A service publishes its base URL and a token-to-path endpoint map under
//! `<namespace>/<service>/{name,endpoints}`. Other services resolve either the
//! base URL by service name or a full endpoint URL by [`EndpointToken`].
//!
//! Lookups are never cached: every call is a round trip to the store.

pub mod error;
pub mod etcd;
pub mod memory;
pub mod record;
pub mod registry;
pub mod store;

pub use common::EndpointToken;
pub use error::{RegistryError, Result};
pub use etcd::EtcdCoordinationStore;
pub use memory::InMemoryCoordinationStore;
pub use record::ServiceRecord;
pub use registry::{DEFAULT_NAMESPACE, ServiceRegistry};
pub use store::CoordinationStore;
