//! This is a library for keeping live client-side mirrors of a hosted JSON-tree database.
//! It was created for an event RSVP tool, so it doesn't include much that was not needed for that project.
//!
//! Mirroring strategy:
//! 1. Every piece of remote state lives at a slash-separated path (`rsvps`, `settings/landingPage`, ...).
//! 2. A client subscribes to a path and receives a full snapshot of the value at that path, first immediately and then every time anything at, above or below that path changes.
//! 3. Writes never touch the local mirror. They go to the store, and the store pushes the new snapshot back to every subscriber.
//! 4. So a caller that just wrote something has to wait for the next snapshot before it can observe its own write.
//!
//! The store itself is abstracted behind [`RemoteStore`] and [`BlobStore`]; [`MemoryStore`] is an in-process implementation.

pub mod data_model;
pub mod memory;
pub mod remote;

pub use data_model::{
    DirtyOnDerefMut, DirtyTracker, ListenerKey, Listeners, Notification, Snapshot, StorePath,
};
pub use memory::{Delivery, MemoryStore};
pub use remote::{BlobObject, BlobStore, RemoteStore, StoreError, SubscriptionKey};
