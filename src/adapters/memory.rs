use crate::adapters::{AuthUpdate, Document, IdentityProvider, RemoteStore};
use crate::errors::{AppError, AppResult, AuthError};
use crate::validators::{is_valid_email, is_valid_password};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

/// In-process stand-in for the remote document store. Ids and
/// timestamps are assigned here, never by callers, mirroring the
/// server-assigned semantics the repository expects.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn query(&self, collection: &str, owner_id: &str) -> AppResult<Vec<Document>> {
        let collections = self.collections.lock().expect("store mutex");
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, fields)| fields.get("ownerId").and_then(Value::as_str) == Some(owner_id))
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect())
    }

    async fn insert(&self, collection: &str, fields: Value) -> AppResult<String> {
        let mut object = as_object(fields)?;
        let now = Value::String(Utc::now().to_rfc3339());
        object.insert("createdAt".to_string(), now.clone());
        object.insert("updatedAt".to_string(), now);

        let id = Uuid::new_v4().to_string();
        let mut collections = self.collections.lock().expect("store mutex");
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), Value::Object(object));
        Ok(id)
    }

    async fn patch(&self, collection: &str, id: &str, fields: Value) -> AppResult<bool> {
        let patch = as_object(fields)?;
        let mut collections = self.collections.lock().expect("store mutex");
        let Some(existing) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Ok(false);
        };

        let target = existing
            .as_object_mut()
            .ok_or_else(|| AppError::Remote(format!("document '{}' is not an object", id)))?;
        for (key, value) in patch {
            target.insert(key, value);
        }
        target.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        Ok(true)
    }

    async fn remove(&self, collection: &str, id: &str) -> AppResult<bool> {
        let mut collections = self.collections.lock().expect("store mutex");
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }
}

fn as_object(fields: Value) -> AppResult<Map<String, Value>> {
    match fields {
        Value::Object(object) => Ok(object),
        other => Err(AppError::Remote(format!(
            "document fields must be an object, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    password: String,
}

/// In-process identity provider. Reports a signed-out state as soon as
/// it is constructed, so subscribers never wait for a first report.
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    state: watch::Sender<AuthUpdate>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthUpdate::SignedOut);
        Self {
            accounts: Mutex::new(HashMap::new()),
            state,
        }
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<String> {
        let email = email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail.into());
        }
        if !is_valid_password(password) {
            return Err(AuthError::WeakPassword.into());
        }

        let user_id = {
            let mut accounts = self.accounts.lock().expect("accounts mutex");
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse.into());
            }
            let user_id = Uuid::new_v4().to_string();
            accounts.insert(
                email,
                Account {
                    user_id: user_id.clone(),
                    password: password.to_string(),
                },
            );
            user_id
        };

        self.state.send_replace(AuthUpdate::SignedIn(user_id.clone()));
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<String> {
        let email = email.trim().to_ascii_lowercase();
        let user_id = {
            let accounts = self.accounts.lock().expect("accounts mutex");
            let Some(account) = accounts.get(&email) else {
                return Err(AuthError::UserNotFound.into());
            };
            if account.password != password {
                return Err(AuthError::WrongCredential.into());
            }
            account.user_id.clone()
        };

        self.state.send_replace(AuthUpdate::SignedIn(user_id.clone()));
        Ok(user_id)
    }

    async fn sign_out(&self) -> AppResult<()> {
        self.state.send_replace(AuthUpdate::SignedOut);
        Ok(())
    }

    fn updates(&self) -> watch::Receiver<AuthUpdate> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let id = store
            .insert("schedules", json!({"title": "Gym", "ownerId": "u1"}))
            .await
            .unwrap();
        assert!(!id.is_empty());

        let docs = store.query("schedules", "u1").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert!(docs[0].fields.get("createdAt").is_some());
        assert!(docs[0].fields.get("updatedAt").is_some());
    }

    #[tokio::test]
    async fn query_only_returns_the_owners_documents() {
        let store = MemoryStore::new();
        store
            .insert("schedules", json!({"title": "Mine", "ownerId": "u1"}))
            .await
            .unwrap();
        store
            .insert("schedules", json!({"title": "Theirs", "ownerId": "u2"}))
            .await
            .unwrap();

        let docs = store.query("schedules", "u1").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields["title"], "Mine");
    }

    #[tokio::test]
    async fn patch_merges_and_reports_missing_targets() {
        let store = MemoryStore::new();
        let id = store
            .insert("schedules", json!({"title": "Gym", "ownerId": "u1"}))
            .await
            .unwrap();

        let applied = store
            .patch("schedules", &id, json!({"status": "completed"}))
            .await
            .unwrap();
        assert!(applied);

        let docs = store.query("schedules", "u1").await.unwrap();
        assert_eq!(docs[0].fields["status"], "completed");
        assert_eq!(docs[0].fields["title"], "Gym");

        let missing = store
            .patch("schedules", "nope", json!({"status": "completed"}))
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn remove_is_idempotent_at_the_store_level() {
        let store = MemoryStore::new();
        let id = store
            .insert("schedules", json!({"title": "Gym", "ownerId": "u1"}))
            .await
            .unwrap();

        assert!(store.remove("schedules", &id).await.unwrap());
        assert!(!store.remove("schedules", &id).await.unwrap());
        assert!(store.query("schedules", "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_up_rejects_bad_input_and_duplicates() {
        let identity = MemoryIdentity::new();

        let err = identity.sign_up("not-an-email", "secret1").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidEmail.into());

        let err = identity.sign_up("ana@example.com", "short").await.unwrap_err();
        assert_eq!(err, AuthError::WeakPassword.into());

        identity.sign_up("ana@example.com", "secret1").await.unwrap();
        let err = identity.sign_up("ana@example.com", "secret2").await.unwrap_err();
        assert_eq!(err, AuthError::EmailInUse.into());
    }

    #[tokio::test]
    async fn sign_in_reports_the_provider_reason() {
        let identity = MemoryIdentity::new();
        identity.sign_up("ana@example.com", "secret1").await.unwrap();
        identity.sign_out().await.unwrap();

        let err = identity.sign_in("bob@example.com", "secret1").await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound.into());

        let err = identity.sign_in("ana@example.com", "wrong!").await.unwrap_err();
        assert_eq!(err, AuthError::WrongCredential.into());

        let user_id = identity.sign_in("ana@example.com", "secret1").await.unwrap();
        assert_eq!(*identity.updates().borrow(), AuthUpdate::SignedIn(user_id));
    }
}
