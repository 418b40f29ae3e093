//! Process-wide `token → ConnectionRecord` map (component B).
//!
//! All operations acquire the single write lock for their full duration,
//! which is what makes `remove` atomic with respect to concurrent `get`s
//! from an in-flight send (§4.B: "removing... must never race with reads
//! performed by a send in flight without surfacing as a write failure").

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::record::ConnectionRecord;
use crate::token::Token;

#[derive(Default)]
pub struct Registry {
    inner: RwLock<HashMap<Token, Arc<ConnectionRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Associate a token with its record. UUID uniqueness means a
    /// collision can't happen in practice; this is an assertion, not a
    /// recoverable error path.
    pub async fn add(&self, token: Token, record: Arc<ConnectionRecord>) {
        let mut map = self.inner.write().await;
        let previous = map.insert(token, record);
        debug_assert!(previous.is_none(), "token collision in registry");
    }

    /// Atomic remove; `true` iff the token was present. Idempotent — a
    /// second call for the same token returns `false`, which callers use
    /// as the dedup barrier for I4.
    pub async fn remove(&self, token: Token) -> bool {
        self.inner.write().await.remove(&token).is_some()
    }

    /// Same atomic removal as [`Registry::remove`], but returns the
    /// record itself so the caller (the disconnect unifier) can cancel
    /// its heartbeat and close its writer without a separate `get`.
    pub async fn take(&self, token: Token) -> Option<Arc<ConnectionRecord>> {
        self.inner.write().await.remove(&token)
    }

    pub async fn get(&self, token: Token) -> Option<Arc<ConnectionRecord>> {
        self.inner.read().await.get(&token).cloned()
    }

    pub async fn has(&self, token: Token) -> bool {
        self.inner.read().await.contains_key(&token)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::mpsc;

    use super::*;
    use crate::record::RequestSnapshot;

    fn record(token: Token) -> Arc<ConnectionRecord> {
        let (tx, _rx) = mpsc::channel(8);
        Arc::new(ConnectionRecord::new(
            token,
            RequestSnapshot {
                url: "/sse/room".into(),
                headers: HashMap::new(),
            },
            tx,
        ))
    }

    #[tokio::test]
    async fn add_then_get_then_remove() {
        let registry = Registry::new();
        let token = Token::generate();
        registry.add(token, record(token)).await;
        assert!(registry.has(token).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(token).await);
        assert!(!registry.has(token).await);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = Registry::new();
        let token = Token::generate();
        registry.add(token, record(token)).await;
        assert!(registry.remove(token).await);
        assert!(!registry.remove(token).await);
    }

    #[tokio::test]
    async fn take_removes_and_returns_the_record() {
        let registry = Registry::new();
        let token = Token::generate();
        registry.add(token, record(token)).await;
        let taken = registry.take(token).await;
        assert!(taken.is_some());
        assert!(registry.take(token).await.is_none());
    }

    #[tokio::test]
    async fn get_on_missing_token_is_none() {
        let registry = Registry::new();
        assert!(registry.get(Token::generate()).await.is_none());
    }
}
