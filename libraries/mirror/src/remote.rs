use std::future::Future;

use crate::data_model::{Snapshot, StorePath};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied at {path}")]
    PermissionDenied { path: StorePath },
    #[error("network error: {0}")]
    Network(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("nothing stored at {path}")]
    NotFound { path: StorePath },
    #[error("could not (de)serialize value: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SubscriptionKey(pub(crate) slotmap::DefaultKey);

/// Handle to a hosted JSON-tree database.
///
/// Subscriptions are push-based: `on_snapshot` receives the full value at `path` once right after subscribing
/// and then after every write that touches `path`, an ancestor of it, or anything below it.
/// If the subscription cannot be served (for example, reads are not permitted) `on_error` is called once
/// and the subscription receives nothing further. The subscription stays registered until `unsubscribe`.
///
/// Writes return as soon as the store acknowledges them. They say nothing about when subscribers will see them.
pub trait RemoteStore: Send + Sync + 'static {
    fn subscribe(
        &self,
        path: &StorePath,
        on_snapshot: impl Fn(Snapshot) + Send + Sync + 'static,
        on_error: impl Fn(StoreError) + Send + Sync + 'static,
    ) -> SubscriptionKey;

    /// Returns false if there was no such subscription.
    fn unsubscribe(&self, key: SubscriptionKey) -> bool;

    /// One-shot read.
    fn get(&self, path: &StorePath) -> impl Future<Output = Result<Snapshot, StoreError>> + Send;

    /// Appends `value` as a new child of `path` under a store-assigned id, and returns the id.
    fn push(
        &self,
        path: &StorePath,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Replaces the whole value at `path`. Writing `null` removes it.
    fn set(
        &self,
        path: &StorePath,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes `path` and everything below it in one operation.
    fn remove(&self, path: &StorePath) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Handle to a write-once blob store that hands out durable public URLs.
pub trait BlobStore: Send + Sync + 'static {
    fn upload(
        &self,
        path: &StorePath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn download_url(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    fn read(&self, path: &StorePath) -> impl Future<Output = Result<BlobObject, StoreError>> + Send;
}
