use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use super::{Transport, TransportError};
use crate::protocol::{OperationKind, QueryKey, Request, RequestPolicy, Response};

/// Document cache in front of another transport.
///
/// Error-free query responses are stored by [`QueryKey`]. `CacheFirst`
/// queries are answered from the cache when an entry exists; `NetworkOnly`
/// queries always reach the inner transport and replace the entry. Any
/// successful mutation clears the whole cache, since this layer does not
/// track which documents a mutation affects.
pub struct CachedTransport<T> {
    inner: T,
    entries: Mutex<HashMap<QueryKey, Response>>,
}

impl<T: Transport> CachedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl<T: Transport> Transport for CachedTransport<T> {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let key = request.key();

        if request.kind() == OperationKind::Query && request.policy() == RequestPolicy::CacheFirst
        {
            if let Some(hit) = self.entries.lock().await.get(&key) {
                debug!(event = "core.transport.cache_hit", key = %key);
                return Ok(hit.clone());
            }
        }

        let response = self.inner.execute(request).await?;

        match request.kind() {
            OperationKind::Query if !response.has_errors() => {
                self.entries.lock().await.insert(key, response.clone());
            }
            OperationKind::Mutation if !response.has_errors() => {
                let mut entries = self.entries.lock().await;
                debug!(
                    event = "core.transport.cache_cleared",
                    operation = request.operation_name(),
                    entries = entries.len(),
                );
                entries.clear();
            }
            _ => {}
        }

        Ok(response)
    }
}
