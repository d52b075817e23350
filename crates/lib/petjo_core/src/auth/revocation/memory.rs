//! In-process revocation store.
//!
//! Only coherent within one process. Useful for tests, local development and
//! single-instance deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{RevocationError, RevocationStore, revocation_key};

/// Denylist and subject index held in concurrent maps.
///
/// Values are absolute expiry times (unix seconds).
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    denied: DashMap<String, i64>,
    subjects: DashMap<Uuid, HashMap<String, i64>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-if-absent on the shard lock; an expired leftover counts as absent.
    fn deny_key(&self, key: String, expires_at: i64, now: i64) -> bool {
        match self.denied.entry(key) {
            Entry::Occupied(mut e) => {
                if *e.get() <= now {
                    e.insert(expires_at);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(e) => {
                e.insert(expires_at);
                true
            }
        }
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn deny(&self, token: &str, ttl_secs: i64) -> Result<bool, RevocationError> {
        if ttl_secs <= 0 {
            return Ok(false);
        }
        let now = Utc::now().timestamp();
        Ok(self.deny_key(revocation_key(token), now + ttl_secs, now))
    }

    async fn is_denied(&self, token: &str) -> Result<bool, RevocationError> {
        let now = Utc::now().timestamp();
        Ok(self
            .denied
            .get(&revocation_key(token))
            .is_some_and(|exp| *exp > now))
    }

    async fn track_for_subject(
        &self,
        subject_id: Uuid,
        token: &str,
        ttl_secs: i64,
    ) -> Result<(), RevocationError> {
        if ttl_secs <= 0 {
            return Ok(());
        }
        let expires_at = Utc::now().timestamp() + ttl_secs;
        let mut tokens = self.subjects.entry(subject_id).or_default();
        let slot = tokens.entry(revocation_key(token)).or_insert(expires_at);
        *slot = (*slot).max(expires_at);
        Ok(())
    }

    async fn deny_all_for_subject(&self, subject_id: Uuid) -> Result<u64, RevocationError> {
        let Some((_, tokens)) = self.subjects.remove(&subject_id) else {
            return Ok(0);
        };
        let now = Utc::now().timestamp();
        let mut denied = 0;
        for (key, expires_at) in tokens {
            if expires_at > now && self.deny_key(key, expires_at, now) {
                denied += 1;
            }
        }
        Ok(denied)
    }

    async fn purge_expired(&self) -> Result<u64, RevocationError> {
        let now = Utc::now().timestamp();
        let before = self.denied.len();
        self.denied.retain(|_, exp| *exp > now);
        let mut removed = (before - self.denied.len()) as u64;

        self.subjects.retain(|_, tokens| {
            let before = tokens.len();
            tokens.retain(|_, exp| *exp > now);
            removed += (before - tokens.len()) as u64;
            !tokens.is_empty()
        });
        Ok(removed)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn deny_then_is_denied() {
        let store = MemoryRevocationStore::new();
        assert!(!store.is_denied("t1").await.unwrap());
        assert!(store.deny("t1", 60).await.unwrap());
        assert!(store.is_denied("t1").await.unwrap());
        assert!(!store.is_denied("t2").await.unwrap());
    }

    #[tokio::test]
    async fn second_deny_reports_existing() {
        let store = MemoryRevocationStore::new();
        assert!(store.deny("t1", 60).await.unwrap());
        assert!(!store.deny("t1", 60).await.unwrap());
    }

    #[tokio::test]
    async fn non_positive_ttl_writes_nothing() {
        let store = MemoryRevocationStore::new();
        assert!(!store.deny("t1", 0).await.unwrap());
        assert!(!store.is_denied("t1").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_denies_have_one_winner() {
        let store = Arc::new(MemoryRevocationStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.deny("shared", 60).await }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn deny_all_for_subject_only_touches_that_subject() {
        let store = MemoryRevocationStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.track_for_subject(alice, "a1", 60).await.unwrap();
        store.track_for_subject(alice, "a2", 60).await.unwrap();
        store.track_for_subject(bob, "b1", 60).await.unwrap();

        store.deny("a2", 60).await.unwrap();

        // a2 was already denied, so only a1 is newly denied.
        assert_eq!(store.deny_all_for_subject(alice).await.unwrap(), 1);
        assert!(store.is_denied("a1").await.unwrap());
        assert!(store.is_denied("a2").await.unwrap());
        assert!(!store.is_denied("b1").await.unwrap());

        // Index was cleared.
        assert_eq!(store.deny_all_for_subject(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tracking_same_token_keeps_longest_ttl() {
        let store = MemoryRevocationStore::new();
        let subject = Uuid::new_v4();
        store.track_for_subject(subject, "t", 600).await.unwrap();
        store.track_for_subject(subject, "t", 5).await.unwrap();
        let exp = *store
            .subjects
            .get(&subject)
            .unwrap()
            .get(&revocation_key("t"))
            .unwrap();
        assert!(exp >= Utc::now().timestamp() + 590);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_records() {
        let store = MemoryRevocationStore::new();
        let now = Utc::now().timestamp();
        store.denied.insert(revocation_key("old"), now - 1);
        store.deny("fresh", 60).await.unwrap();
        let subject = Uuid::new_v4();
        store
            .subjects
            .entry(subject)
            .or_default()
            .insert(revocation_key("old"), now - 1);

        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert_eq!(store.denied.len(), 1);
        assert!(store.subjects.get(&subject).is_none());
    }

    #[tokio::test]
    async fn expired_record_can_be_denied_again() {
        let store = MemoryRevocationStore::new();
        store
            .denied
            .insert(revocation_key("t"), Utc::now().timestamp() - 1);
        assert!(!store.is_denied("t").await.unwrap());
        assert!(store.deny("t", 60).await.unwrap());
    }
}
