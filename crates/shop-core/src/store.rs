//! # Cart Store
//!
//! Holds every `CartContext` behind its own mutex, plus an index from
//! outcome references (order refs and gateway intent ids) to carts.

use crate::cart::CartId;
use crate::context::CartContext;
use crate::error::{CheckoutError, CheckoutResult};
use crate::money::Currency;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A cart context behind its single-writer lock
pub type SharedContext = Arc<Mutex<CartContext>>;

/// In-process cart storage
#[derive(Clone, Default)]
pub struct CartStore {
    contexts: Arc<RwLock<HashMap<CartId, SharedContext>>>,
    references: Arc<RwLock<HashMap<String, CartId>>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cart and return its id
    pub async fn create(&self, currency: Currency) -> CartId {
        let context = CartContext::new(currency);
        let id = context.id();
        self.contexts
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(context)));
        id
    }

    pub async fn get(&self, cart_id: CartId) -> CheckoutResult<SharedContext> {
        self.contexts
            .read()
            .await
            .get(&cart_id)
            .cloned()
            .ok_or_else(|| CheckoutError::CartNotFound {
                cart_id: cart_id.to_string(),
            })
    }

    /// Remember which cart a reference belongs to.
    ///
    /// Entries are never evicted: a late outcome for a superseded attempt
    /// must still reach its cart to be dropped there, and carts themselves
    /// live as long as the store. The index is bounded by the number of
    /// attempts made, at most two references each.
    pub async fn register_references(&self, cart_id: CartId, references: Vec<String>) {
        let mut index = self.references.write().await;
        for reference in references {
            index.insert(reference, cart_id);
        }
    }

    pub async fn resolve(&self, reference: &str) -> Option<CartId> {
        self.references.read().await.get(reference).copied()
    }

    pub async fn cart_ids(&self) -> Vec<CartId> {
        self.contexts.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_resolve() {
        let store = CartStore::new();
        let id = store.create(Currency::USD).await;

        assert_eq!(store.get(id).await.unwrap().lock().await.id(), id);
        assert!(matches!(
            store.get(CartId::new()).await,
            Err(CheckoutError::CartNotFound { .. })
        ));

        store
            .register_references(id, vec!["order_1".into(), "intent_1".into()])
            .await;
        assert_eq!(store.resolve("intent_1").await, Some(id));
        assert_eq!(store.resolve("intent_2").await, None);
    }

    #[tokio::test]
    async fn test_references_from_earlier_attempts_are_kept() {
        let store = CartStore::new();
        let id = store.create(Currency::USD).await;

        store.register_references(id, vec!["order_a_1".into()]).await;
        store
            .register_references(id, vec!["order_a_2".into(), "intent_2".into()])
            .await;

        assert_eq!(store.resolve("order_a_1").await, Some(id));
        assert_eq!(store.resolve("order_a_2").await, Some(id));
    }
}
