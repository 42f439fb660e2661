//! An in-process store with the same contract as the hosted one.
//! The whole database is a single JSON tree; blobs live in a separate map keyed by path.
//!
//! Delivery of snapshots is either immediate (subscribers are called before the write returns)
//! or deferred (snapshots queue up until [`MemoryStore::flush`]), the latter modelling a store whose
//! push notifications arrive some time after the write was acknowledged.
//!
//! Snapshots are queued in the order writes are applied and delivered strictly in that order, one at a time.
//! With several writers on different threads, whichever is already delivering also delivers the others'
//! snapshots, so under contention an immediate write can return before its snapshot has been seen.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::data_model::{Notification, Snapshot, StorePath};
use crate::remote::{BlobObject, BlobStore, RemoteStore, StoreError, SubscriptionKey};

type SnapshotCallback = Arc<dyn Fn(Snapshot) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Delivery {
    #[default]
    Immediate,
    Deferred,
}

struct Subscription {
    path: StorePath,
    on_snapshot: SnapshotCallback,
    on_error: ErrorCallback,
    /// Value in the most recently queued snapshot. Used to skip writes that don't change what this subscriber sees.
    last_seen: Option<Value>,
    /// Set when the subscription failed; it stays registered but gets no snapshots.
    cancelled: bool,
}

enum Pending {
    Snapshot(SubscriptionKey, Snapshot),
    Error(SubscriptionKey, StoreError),
}

struct Inner {
    root: Value,
    blobs: BTreeMap<StorePath, BlobObject>,
    subscriptions: slotmap::SlotMap<slotmap::DefaultKey, Subscription>,
    pending: VecDeque<Pending>,
    /// Set while some caller of `flush` is draining `pending`.
    delivering: bool,
    delivery: Delivery,
    denied_reads: Vec<StorePath>,
    denied_writes: Vec<StorePath>,
    max_blob_bytes: Option<usize>,
}

pub struct MemoryStore {
    // never call a subscriber while this is locked
    inner: Mutex<Inner>,
    asset_base_url: String,
}

impl MemoryStore {
    pub fn new(asset_base_url: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: Value::Object(Map::new()),
                blobs: BTreeMap::new(),
                subscriptions: Default::default(),
                pending: VecDeque::new(),
                delivering: false,
                delivery: Delivery::Immediate,
                denied_reads: Vec::new(),
                denied_writes: Vec::new(),
                max_blob_bytes: None,
            }),
            asset_base_url: asset_base_url.into(),
        }
    }

    pub fn with_delivery(self, delivery: Delivery) -> Self {
        self.lock().delivery = delivery;
        self
    }

    /// Switching back to immediate delivery flushes anything still queued.
    pub fn set_delivery(&self, delivery: Delivery) {
        self.lock().delivery = delivery;
        if delivery == Delivery::Immediate {
            self.flush();
        }
    }

    pub fn deny_reads_under(&self, path: impl Into<StorePath>) {
        self.lock().denied_reads.push(path.into());
    }

    pub fn deny_writes_under(&self, path: impl Into<StorePath>) {
        self.lock().denied_writes.push(path.into());
    }

    pub fn allow_all(&self) {
        let mut inner = self.lock();
        inner.denied_reads.clear();
        inner.denied_writes.clear();
    }

    pub fn set_max_blob_bytes(&self, max: Option<usize>) {
        self.lock().max_blob_bytes = max;
    }

    pub fn pending_deliveries(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Delivers every queued snapshot and error, in the order they were queued. Returns how many this call delivered.
    ///
    /// Only one caller drains the queue at a time. If another thread (or a subscriber called from this one)
    /// is already delivering, this returns 0 and the active drainer delivers whatever is queued, still in order.
    pub fn flush(&self) -> usize {
        {
            let mut inner = self.lock();
            if inner.delivering {
                return 0;
            }
            inner.delivering = true;
        }
        let _unwind = ReleaseOnPanic(self);

        let mut delivered = 0;
        loop {
            let next = {
                let mut inner = self.lock();
                match inner.next_delivery() {
                    Some(notification) => notification,
                    None => {
                        inner.delivering = false;
                        break;
                    }
                }
            };
            next();
            delivered += 1;
        }
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn url_for(&self, path: &StorePath) -> String {
        format!(
            "{}/{}",
            self.asset_base_url.trim_end_matches('/'),
            path.as_str()
        )
    }

    fn read_now(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        let inner = self.lock();
        inner.check_read(path)?;
        Ok(Snapshot::new(path.clone(), inner.value_at(path)))
    }

    fn write_now(&self, path: &StorePath, value: Option<Value>) -> Result<(), StoreError> {
        let immediate = {
            let mut inner = self.lock();
            inner.check_write(path)?;
            let segments: Vec<&str> = path.segments().collect();
            write_at(&mut inner.root, &segments, value.and_then(normalize));
            inner.queue_changes(path);
            inner.delivery == Delivery::Immediate
        };
        log::debug!("wrote {path}");
        if immediate {
            self.flush();
        }
        Ok(())
    }

    fn upload_now(
        &self,
        path: &StorePath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write(path)?;
        if let Some(max) = inner.max_blob_bytes
            && bytes.len() > max
        {
            return Err(StoreError::QuotaExceeded(format!(
                "{} bytes exceeds the {max} byte limit",
                bytes.len()
            )));
        }
        if inner.blobs.contains_key(path) {
            // blobs are write-once
            return Err(StoreError::PermissionDenied { path: path.clone() });
        }
        log::debug!("stored {} bytes of {content_type} at {path}", bytes.len());
        inner.blobs.insert(
            path.clone(),
            BlobObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn blob_now(&self, path: &StorePath) -> Result<BlobObject, StoreError> {
        let inner = self.lock();
        inner.check_read(path)?;
        inner
            .blobs
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { path: path.clone() })
    }
}

/// A subscriber that panics mid-delivery must not leave the queue claimed forever.
struct ReleaseOnPanic<'a>(&'a MemoryStore);

impl Drop for ReleaseOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().delivering = false;
        }
    }
}

impl Inner {
    /// Pops queued deliveries until one whose subscription still exists.
    fn next_delivery(&mut self) -> Option<Notification> {
        while let Some(pending) = self.pending.pop_front() {
            let notification: Option<Notification> = match pending {
                Pending::Snapshot(key, snapshot) => self.subscriptions.get(key.0).map(|subscription| {
                    let callback = subscription.on_snapshot.clone();
                    Box::new(move || callback(snapshot)) as Notification
                }),
                Pending::Error(key, error) => self.subscriptions.get(key.0).map(|subscription| {
                    let callback = subscription.on_error.clone();
                    Box::new(move || callback(error)) as Notification
                }),
            };
            if notification.is_some() {
                return notification;
            }
        }
        None
    }

    fn check_read(&self, path: &StorePath) -> Result<(), StoreError> {
        if is_denied(&self.denied_reads, path) {
            return Err(StoreError::PermissionDenied { path: path.clone() });
        }
        Ok(())
    }

    fn check_write(&self, path: &StorePath) -> Result<(), StoreError> {
        if is_denied(&self.denied_writes, path) {
            return Err(StoreError::PermissionDenied { path: path.clone() });
        }
        Ok(())
    }

    fn value_at(&self, path: &StorePath) -> Option<Value> {
        value_at(&self.root, path).cloned()
    }

    fn queue_changes(&mut self, written: &StorePath) {
        let Inner {
            root,
            subscriptions,
            pending,
            ..
        } = self;
        for (key, subscription) in subscriptions.iter_mut() {
            if subscription.cancelled || !subscription.path.overlaps(written) {
                continue;
            }
            let current = value_at(root, &subscription.path).cloned();
            if current == subscription.last_seen {
                continue;
            }
            subscription.last_seen = current.clone();
            pending.push_back(Pending::Snapshot(
                SubscriptionKey(key),
                Snapshot::new(subscription.path.clone(), current),
            ));
        }
    }
}

fn is_denied(rules: &[StorePath], path: &StorePath) -> bool {
    rules.iter().any(|rule| rule.contains(path))
}

fn value_at<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    Some(node).filter(|node| !node.is_null())
}

/// Drops nulls and empty objects, which the store treats as "nothing here".
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| normalize(value).map(|value| (key, value)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        other => Some(other),
    }
}

fn write_at(node: &mut Value, segments: &[&str], value: Option<Value>) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        match value {
            Some(value) => {
                map.insert(first.to_string(), value);
            }
            None => {
                map.remove(*first);
            }
        }
        return;
    }

    if value.is_none() && !map.contains_key(*first) {
        return;
    }
    let child = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    write_at(child, rest, value);
    if child.as_object().is_some_and(Map::is_empty) {
        map.remove(*first);
    }
}

impl RemoteStore for MemoryStore {
    fn subscribe(
        &self,
        path: &StorePath,
        on_snapshot: impl Fn(Snapshot) + Send + Sync + 'static,
        on_error: impl Fn(StoreError) + Send + Sync + 'static,
    ) -> SubscriptionKey {
        let (key, immediate) = {
            let mut inner = self.lock();
            let denied = inner.check_read(path).err();
            let current = if denied.is_some() {
                None
            } else {
                inner.value_at(path)
            };
            let key = SubscriptionKey(inner.subscriptions.insert(Subscription {
                path: path.clone(),
                on_snapshot: Arc::new(on_snapshot),
                on_error: Arc::new(on_error),
                last_seen: current.clone(),
                cancelled: denied.is_some(),
            }));
            let first = match denied {
                Some(error) => Pending::Error(key, error),
                None => Pending::Snapshot(key, Snapshot::new(path.clone(), current)),
            };
            inner.pending.push_back(first);
            (key, inner.delivery == Delivery::Immediate)
        };
        log::debug!("subscribed to {path}");
        if immediate {
            self.flush();
        }
        key
    }

    fn unsubscribe(&self, key: SubscriptionKey) -> bool {
        let removed = self.lock().subscriptions.remove(key.0);
        if let Some(subscription) = &removed {
            log::debug!("unsubscribed from {}", subscription.path);
        }
        removed.is_some()
    }

    async fn get(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        self.read_now(path)
    }

    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError> {
        let id = eyedee::push_id();
        self.write_now(&path.child(&id), Some(value))?;
        Ok(id)
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.write_now(path, Some(value))
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.write_now(path, None)
    }
}

impl BlobStore for MemoryStore {
    async fn upload(
        &self,
        path: &StorePath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.upload_now(path, bytes, content_type)
    }

    async fn download_url(&self, path: &StorePath) -> Result<String, StoreError> {
        self.blob_now(path).map(|_| self.url_for(path))
    }

    async fn read(&self, path: &StorePath) -> Result<BlobObject, StoreError> {
        self.blob_now(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn recorder(store: &MemoryStore, path: &str) -> (SubscriptionKey, Arc<Mutex<Vec<Snapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let key = store.subscribe(
            &StorePath::new(path),
            {
                let seen = seen.clone();
                move |snapshot| seen.lock().unwrap().push(snapshot)
            },
            |error| panic!("unexpected subscription error: {error}"),
        );
        (key, seen)
    }

    #[test]
    fn test_push_assigns_distinct_ids() {
        let store = MemoryStore::new("http://assets.test");
        let rsvps = StorePath::new("rsvps");
        let a = block_on(store.push(&rsvps, json!({ "name": "A" }))).unwrap();
        let b = block_on(store.push(&rsvps, json!({ "name": "B" }))).unwrap();
        assert_ne!(a, b);

        let snapshot = block_on(store.get(&rsvps)).unwrap();
        assert_eq!(snapshot.children().count(), 2);
        let one = block_on(store.get(&rsvps.child(&a))).unwrap();
        assert_eq!(one.value, Some(json!({ "name": "A" })));
    }

    #[test]
    fn test_subscribe_delivers_current_value_first() {
        let store = MemoryStore::new("http://assets.test");
        block_on(store.set(&StorePath::new("settings/landingPage"), json!({ "title": "Hi" })))
            .unwrap();

        let (_, seen) = recorder(&store, "settings/landingPage");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value, Some(json!({ "title": "Hi" })));
    }

    #[test]
    fn test_absent_path_delivers_empty_snapshot() {
        let store = MemoryStore::new("http://assets.test");
        let (_, seen) = recorder(&store, "rsvps");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].exists());
    }

    #[test]
    fn test_child_writes_reach_collection_subscriber() {
        let store = MemoryStore::new("http://assets.test");
        let (_, seen) = recorder(&store, "rsvps");
        let rsvps = StorePath::new("rsvps");

        let id = block_on(store.push(&rsvps, json!({ "name": "A" }))).unwrap();
        block_on(store.remove(&rsvps.child(&id))).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].children().count(), 1);
        // the last child going away leaves nothing behind
        assert!(!seen[2].exists());
    }

    #[test]
    fn test_removing_parent_reaches_child_subscriber() {
        let store = MemoryStore::new("http://assets.test");
        let rsvps = StorePath::new("rsvps");
        let id = block_on(store.push(&rsvps, json!({ "name": "A" }))).unwrap();
        let (_, seen) = recorder(&store, &format!("rsvps/{id}"));

        block_on(store.remove(&rsvps)).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].exists());
        assert!(!seen[1].exists());
    }

    #[test]
    fn test_unrelated_and_unchanged_writes_are_silent() {
        let store = MemoryStore::new("http://assets.test");
        let settings = StorePath::new("settings/landingPage");
        block_on(store.set(&settings, json!({ "title": "Hi" }))).unwrap();
        let (_, seen) = recorder(&store, "settings/landingPage");

        block_on(store.push(&StorePath::new("rsvps"), json!({ "name": "A" }))).unwrap();
        block_on(store.set(&settings, json!({ "title": "Hi" }))).unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_deferred_delivery_waits_for_flush() {
        let store = MemoryStore::new("http://assets.test").with_delivery(Delivery::Deferred);
        let (_, seen) = recorder(&store, "rsvps");
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.pending_deliveries(), 1);

        block_on(store.push(&StorePath::new("rsvps"), json!({ "name": "A" }))).unwrap();
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(store.flush(), 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].children().count(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let store = MemoryStore::new("http://assets.test");
        let (key, seen) = recorder(&store, "rsvps");
        assert!(store.unsubscribe(key));
        assert!(!store.unsubscribe(key));
        assert_eq!(store.subscription_count(), 0);

        block_on(store.push(&StorePath::new("rsvps"), json!({ "name": "A" }))).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_denied_writes_fail_without_changes() {
        let store = MemoryStore::new("http://assets.test");
        store.deny_writes_under("rsvps");
        let result = block_on(store.push(&StorePath::new("rsvps"), json!({ "name": "A" })));
        assert!(matches!(result, Err(StoreError::PermissionDenied { .. })));
        assert!(!block_on(store.get(&StorePath::new("rsvps"))).unwrap().exists());
    }

    #[test]
    fn test_denied_reads_fail_subscription() {
        let store = MemoryStore::new("http://assets.test");
        store.deny_reads_under("settings");
        let errors = Arc::new(Mutex::new(Vec::new()));
        store.subscribe(
            &StorePath::new("settings/landingPage"),
            |_| panic!("no snapshot expected"),
            {
                let errors = errors.clone();
                move |error| errors.lock().unwrap().push(error)
            },
        );
        store.allow_all();
        block_on(store.set(&StorePath::new("settings/landingPage"), json!({ "title": "x" })))
            .unwrap();

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], StoreError::PermissionDenied { .. }));
    }

    #[test]
    fn test_blobs_are_write_once_with_urls() {
        let store = MemoryStore::new("http://assets.test/");
        let path = StorePath::new("backgrounds/1_sky.png");
        block_on(store.upload(&path, vec![1, 2, 3], "image/png")).unwrap();

        let url = block_on(store.download_url(&path)).unwrap();
        assert_eq!(url, "http://assets.test/backgrounds/1_sky.png");
        let blob = block_on(store.read(&path)).unwrap();
        assert_eq!(blob.content_type, "image/png");

        let again = block_on(store.upload(&path, vec![4], "image/png"));
        assert!(matches!(again, Err(StoreError::PermissionDenied { .. })));

        let missing = block_on(store.download_url(&StorePath::new("backgrounds/nope")));
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_blob_quota() {
        let store = MemoryStore::new("http://assets.test");
        store.set_max_blob_bytes(Some(2));
        let result = block_on(store.upload(&StorePath::new("backgrounds/a"), vec![0; 3], "video/mp4"));
        assert!(matches!(result, Err(StoreError::QuotaExceeded(_))));
    }

    #[test]
    fn test_concurrent_writers_deliver_in_write_order() {
        let store = MemoryStore::new("http://assets.test");
        let counts = Arc::new(Mutex::new(Vec::new()));
        store.subscribe(
            &StorePath::new("rsvps"),
            {
                let counts = counts.clone();
                move |snapshot: Snapshot| counts.lock().unwrap().push(snapshot.children().count())
            },
            |error| panic!("unexpected subscription error: {error}"),
        );

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..100 {
                        block_on(store.push(
                            &StorePath::new("rsvps"),
                            json!({ "writer": writer, "i": i }),
                        ))
                        .unwrap();
                    }
                });
            }
        });

        let counts = counts.lock().unwrap();
        assert_eq!(counts.len(), 801);
        assert!(
            counts.windows(2).all(|pair| pair[0] < pair[1]),
            "snapshots arrived out of order: {counts:?}"
        );
        assert_eq!(store.pending_deliveries(), 0);
    }

    #[test]
    fn test_writes_from_a_subscriber_are_delivered_after_it() {
        let store = Arc::new(MemoryStore::new("http://assets.test").with_delivery(Delivery::Deferred));
        let order = Arc::new(Mutex::new(Vec::new()));
        store.subscribe(
            &StorePath::new("a"),
            {
                let order = order.clone();
                let store = Arc::downgrade(&store);
                move |snapshot: Snapshot| {
                    order.lock().unwrap().push(format!("a:{}", snapshot.exists()));
                    if snapshot.exists()
                        && let Some(store) = store.upgrade()
                    {
                        block_on(store.set(&StorePath::new("b"), json!(1))).unwrap();
                    }
                }
            },
            |error| panic!("unexpected subscription error: {error}"),
        );
        store.subscribe(
            &StorePath::new("b"),
            {
                let order = order.clone();
                move |snapshot: Snapshot| order.lock().unwrap().push(format!("b:{}", snapshot.exists()))
            },
            |error| panic!("unexpected subscription error: {error}"),
        );
        block_on(store.set(&StorePath::new("a"), json!(1))).unwrap();
        assert!(order.lock().unwrap().is_empty());

        // switching to immediate delivery flushes the queue; the nested write must not deadlock
        store.set_delivery(Delivery::Immediate);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["a:false", "b:false", "a:true", "b:true"]
        );
        assert_eq!(store.pending_deliveries(), 0);
    }

    #[test]
    fn test_null_and_empty_objects_are_pruned() {
        let store = MemoryStore::new("http://assets.test");
        let path = StorePath::new("settings/landingPage");
        block_on(store.set(&path, json!({ "title": "x", "extra": null, "nested": {} }))).unwrap();
        let snapshot = block_on(store.get(&path)).unwrap();
        assert_eq!(snapshot.value, Some(json!({ "title": "x" })));

        block_on(store.set(&path, Value::Null)).unwrap();
        assert!(!block_on(store.get(&StorePath::new("settings"))).unwrap().exists());
    }
}
