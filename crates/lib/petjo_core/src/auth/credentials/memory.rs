//! In-process credential store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, StoreError};
use crate::models::auth::{Identity, NewIdentity};

/// Identities held in a concurrent map keyed by id.
///
/// Uniqueness of email and external id is enforced under a create lock so two
/// racing registrations cannot both succeed.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    identities: DashMap<Uuid, Identity>,
    create_lock: Mutex<()>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, pred: impl Fn(&Identity) -> bool) -> Option<Identity> {
        self.identities
            .iter()
            .find(|e| pred(e.value()))
            .map(|e| e.value().clone())
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut Identity)) -> Option<Identity> {
        self.identities.get_mut(&id).map(|mut e| {
            f(e.value_mut());
            e.value().clone()
        })
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.find(|i| i.email == email))
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.find(|i| i.external_id.as_deref() == Some(external_id)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.get(&id).map(|e| e.value().clone()))
    }

    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("credential store lock poisoned".into()))?;

        if self.find(|i| i.email == new.email).is_some() {
            return Err(StoreError::Conflict(format!("email {} already exists", new.email)));
        }
        if let Some(ext) = new.external_id.as_deref()
            && self.find(|i| i.external_id.as_deref() == Some(ext)).is_some()
        {
            return Err(StoreError::Conflict("external id already linked".into()));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            external_id: new.external_id,
            full_name: new.full_name,
            is_active: true,
            is_superuser: new.is_superuser,
            created_at: Utc::now(),
        };
        self.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        self.update(id, |i| i.password_hash = Some(password_hash.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn link_external_id(&self, id: Uuid, external_id: &str) -> Result<Identity, StoreError> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("credential store lock poisoned".into()))?;
        if self
            .find(|i| i.id != id && i.external_id.as_deref() == Some(external_id))
            .is_some()
        {
            return Err(StoreError::Conflict("external id already linked".into()));
        }
        self.update(id, |i| i.external_id = Some(external_id.to_string()))
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Identity>, StoreError> {
        Ok(self.update(id, |i| i.is_active = active))
    }

    async fn set_superuser(&self, id: Uuid, superuser: bool) -> Result<Option<Identity>, StoreError> {
        Ok(self.update(id, |i| i.is_superuser = superuser))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.find(|i| i.email == email).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_identity(email: &str) -> NewIdentity {
        NewIdentity {
            email: email.into(),
            password_hash: Some("$2b$10$hash".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = MemoryCredentialStore::new();
        let created = store.create(new_identity("a@b.co")).await.unwrap();
        assert!(created.is_active);
        assert!(!created.is_superuser);

        let by_email = store.find_by_email("a@b.co").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@b.co");
        assert!(store.email_exists("a@b.co").await.unwrap());
        assert!(!store.email_exists("x@b.co").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryCredentialStore::new();
        store.create(new_identity("a@b.co")).await.unwrap();
        let err = store.create(new_identity("a@b.co")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn external_id_is_unique() {
        let store = MemoryCredentialStore::new();
        let a = store
            .create(NewIdentity {
                email: "a@b.co".into(),
                external_id: Some("g-1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let b = store.create(new_identity("b@b.co")).await.unwrap();

        assert_eq!(
            store.find_by_external_id("g-1").await.unwrap().unwrap().id,
            a.id
        );
        let err = store.link_external_id(b.id, "g-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn updates_flags_and_hash() {
        let store = MemoryCredentialStore::new();
        let a = store.create(new_identity("a@b.co")).await.unwrap();

        let updated = store.set_active(a.id, false).await.unwrap().unwrap();
        assert!(!updated.is_active);
        let updated = store.set_superuser(a.id, true).await.unwrap().unwrap();
        assert!(updated.is_superuser);

        store.update_password_hash(a.id, "new-hash").await.unwrap();
        let reloaded = store.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash.as_deref(), Some("new-hash"));

        assert!(store.set_active(Uuid::new_v4(), true).await.unwrap().is_none());
        assert!(matches!(
            store.update_password_hash(Uuid::new_v4(), "h").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
