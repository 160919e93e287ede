//! Email suppression flags.
//!
//! At most one escalation email goes out per (user, carpool) until the user
//! marks the carpool's notifications read, which resets the flag.

use async_trait::async_trait;
use carpool_common::{AppError, AppResult};
use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::SetOptions;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-(user, carpool) "email already sent" flag store.
#[async_trait]
pub trait EmailSuppression: Send + Sync {
    async fn has_sent(&self, user_id: &str, carpool_id: &str) -> AppResult<bool>;

    /// Set the flag unless it is already set. Returns `true` for the caller
    /// that set it, so concurrent fan-outs claim one email between them.
    async fn try_mark(&self, user_id: &str, carpool_id: &str) -> AppResult<bool>;

    async fn reset(&self, user_id: &str, carpool_id: &str) -> AppResult<()>;
}

/// Process-local flags for single instance deployments.
#[derive(Clone, Default)]
pub struct InMemoryEmailSuppression {
    sent: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl InMemoryEmailSuppression {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmailSuppression for InMemoryEmailSuppression {
    async fn has_sent(&self, user_id: &str, carpool_id: &str) -> AppResult<bool> {
        Ok(self
            .sent
            .read()
            .await
            .get(user_id)
            .is_some_and(|carpools| carpools.contains(carpool_id)))
    }

    async fn try_mark(&self, user_id: &str, carpool_id: &str) -> AppResult<bool> {
        Ok(self
            .sent
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .insert(carpool_id.to_string()))
    }

    async fn reset(&self, user_id: &str, carpool_id: &str) -> AppResult<()> {
        let mut sent = self.sent.write().await;
        if let Some(carpools) = sent.get_mut(user_id) {
            carpools.remove(carpool_id);
            if carpools.is_empty() {
                sent.remove(user_id);
            }
        }
        Ok(())
    }
}

/// Redis-backed flags shared by every instance.
#[derive(Clone)]
pub struct RedisEmailSuppression {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisEmailSuppression {
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    fn key(&self, user_id: &str, carpool_id: &str) -> String {
        format!("{}:email_sent:{user_id}:{carpool_id}", self.prefix)
    }
}

#[async_trait]
impl EmailSuppression for RedisEmailSuppression {
    async fn has_sent(&self, user_id: &str, carpool_id: &str) -> AppResult<bool> {
        let exists: i64 = self
            .redis
            .exists(self.key(user_id, carpool_id))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        Ok(exists > 0)
    }

    async fn try_mark(&self, user_id: &str, carpool_id: &str) -> AppResult<bool> {
        // NX replies nil when the key already exists
        let result: Option<String> = self
            .redis
            .set(
                self.key(user_id, carpool_id),
                "1",
                None,
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        Ok(result.is_some())
    }

    async fn reset(&self, user_id: &str, carpool_id: &str) -> AppResult<()> {
        self.redis
            .del::<(), _>(self.key(user_id, carpool_id))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

/// Shared handle to a suppression store.
pub type EmailSuppressionService = Arc<dyn EmailSuppression>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_and_reset() {
        let store = InMemoryEmailSuppression::new();
        assert!(!store.has_sent("u1", "c1").await.unwrap());

        assert!(store.try_mark("u1", "c1").await.unwrap());
        assert!(store.has_sent("u1", "c1").await.unwrap());
        assert!(!store.has_sent("u1", "c2").await.unwrap());
        assert!(!store.has_sent("u2", "c1").await.unwrap());

        store.reset("u1", "c1").await.unwrap();
        assert!(!store.has_sent("u1", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_claim_loses_until_reset() {
        let store = InMemoryEmailSuppression::new();
        assert!(store.try_mark("u1", "c1").await.unwrap());
        assert!(!store.try_mark("u1", "c1").await.unwrap());

        store.reset("u1", "c1").await.unwrap();
        assert!(store.try_mark("u1", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let store = InMemoryEmailSuppression::new();
        let (a, b) = tokio::join!(store.try_mark("u1", "c1"), store.try_mark("u1", "c1"));
        assert!(a.unwrap() ^ b.unwrap());
    }

    #[tokio::test]
    async fn test_reset_unknown_is_noop() {
        let store = InMemoryEmailSuppression::new();
        store.reset("u1", "c1").await.unwrap();
        assert!(!store.has_sent("u1", "c1").await.unwrap());
    }
}
