//! Integration tests for service registration and lookup.

use registry::{
    InMemoryCoordinationStore, RegistryError, ServiceRecord, ServiceRegistry,
};

fn records() -> Vec<ServiceRecord> {
    vec![
        ServiceRecord::new("billing", "http://billing:8080")
            .endpoint("charge.post", "/v1/charge")
            .endpoint("refund.post", "/v1/refund"),
        ServiceRecord::new("orders", "http://10.0.0.12:3000")
            .endpoint("list.get", "/orders")
            .endpoint("item.delete", "/orders/item"),
        ServiceRecord::new("inventory", "https://inventory.internal"),
    ]
}

#[tokio::test]
async fn test_every_registered_endpoint_resolves_to_base_plus_path() {
    let store = InMemoryCoordinationStore::new();
    let registry = ServiceRegistry::new(store);

    for record in records() {
        registry.register(&record).await.unwrap();
    }

    for record in records() {
        assert_eq!(
            registry.resolve_service(&record.name).await.unwrap(),
            record.base_url
        );
        for (key, path) in &record.endpoints {
            let token = format!("{}.{}", record.name, key);
            assert_eq!(
                registry.resolve_endpoint(&token).await.unwrap(),
                format!("{}{}", record.base_url, path)
            );
        }
    }
}

#[tokio::test]
async fn test_unregistered_service_is_not_found() {
    let registry = ServiceRegistry::new(InMemoryCoordinationStore::new());

    assert!(matches!(
        registry.resolve_service("ghost").await,
        Err(RegistryError::NotFound(_))
    ));
    assert!(matches!(
        registry.resolve_endpoint("ghost.list.get").await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_services_sharing_a_store_see_each_other() {
    let store = InMemoryCoordinationStore::new();

    let billing = ServiceRegistry::new(store.clone()).with_record(
        ServiceRecord::new("billing", "http://billing:8080").endpoint("charge.post", "/v1/charge"),
    );
    let orders = ServiceRegistry::new(store.clone())
        .with_record(ServiceRecord::new("orders", "http://orders:3000"));

    billing.init().await.unwrap();
    orders.init().await.unwrap();

    assert_eq!(
        orders.resolve_endpoint("billing.charge.post").await.unwrap(),
        "http://billing:8080/v1/charge"
    );
    assert_eq!(
        billing.resolve_service("orders").await.unwrap(),
        "http://orders:3000"
    );
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let store = InMemoryCoordinationStore::new();
    let prod = ServiceRegistry::new(store.clone());
    let staging = ServiceRegistry::new(store.clone()).with_namespace("staging");

    prod.register(&ServiceRecord::new("billing", "http://prod-billing"))
        .await
        .unwrap();

    assert!(prod.resolve_service("billing").await.is_ok());
    assert!(matches!(
        staging.resolve_service("billing").await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_reregistration_replaces_endpoints() {
    let registry = ServiceRegistry::new(InMemoryCoordinationStore::new());

    registry
        .register(
            &ServiceRecord::new("billing", "http://billing:8080")
                .endpoint("charge.post", "/v1/charge"),
        )
        .await
        .unwrap();
    registry
        .register(
            &ServiceRecord::new("billing", "http://billing:8080")
                .endpoint("charge.post", "/v2/charge"),
        )
        .await
        .unwrap();

    assert_eq!(
        registry.resolve_endpoint("billing.charge.post").await.unwrap(),
        "http://billing:8080/v2/charge"
    );
}
