pub mod memory;

use crate::errors::AppResult;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

/// A raw record as the remote store hands it back: the opaque id the
/// store assigned plus whatever fields the document carries. Decoding
/// into the strict internal model happens in the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

/// What the identity provider currently reports. `Unknown` is the value
/// before the provider has delivered its first state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUpdate {
    Unknown,
    SignedOut,
    SignedIn(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the account and signs it in. Returns the new user id.
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<String>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<String>;

    async fn sign_out(&self) -> AppResult<()>;

    /// Current-user change notifications. A new receiver immediately
    /// observes the provider's last report.
    fn updates(&self) -> watch::Receiver<AuthUpdate>;
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All documents in `collection` whose `ownerId` field equals
    /// `owner_id`, in no particular order.
    async fn query(&self, collection: &str, owner_id: &str) -> AppResult<Vec<Document>>;

    /// Stores a new document, assigning its id and the `createdAt` /
    /// `updatedAt` timestamps. Returns the id.
    async fn insert(&self, collection: &str, fields: Value) -> AppResult<String>;

    /// Merges `fields` into an existing document and refreshes
    /// `updatedAt`. `Ok(false)` when no document has this id.
    async fn patch(&self, collection: &str, id: &str, fields: Value) -> AppResult<bool>;

    /// `Ok(false)` when no document had this id.
    async fn remove(&self, collection: &str, id: &str) -> AppResult<bool>;
}
