use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions};

use crate::{Result, store::CoordinationStore};

/// etcd-backed coordination store.
#[derive(Clone)]
pub struct EtcdCoordinationStore {
    client: Client,
}

impl EtcdCoordinationStore {
    /// Connects to an etcd cluster.
    ///
    /// `credentials` is an optional `(user, password)` pair for etcd auth.
    #[tracing::instrument(skip(credentials))]
    pub async fn connect(
        endpoints: &[String],
        credentials: Option<(String, String)>,
    ) -> Result<Self> {
        let options =
            credentials.map(|(user, password)| ConnectOptions::new().with_user(user, password));
        let client = Client::connect(endpoints, options).await?;
        tracing::info!("connected to etcd");
        Ok(Self { client })
    }

    /// Wraps an existing etcd client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoordinationStore for EtcdCoordinationStore {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut client = self.client.clone();
        client.put(key, value, None).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut client = self.client.clone();
        let response = client.get(key, None).await?;
        match response.kvs().first() {
            Some(kv) => Ok(Some(kv.value_str()?.to_string())),
            None => Ok(None),
        }
    }
}
