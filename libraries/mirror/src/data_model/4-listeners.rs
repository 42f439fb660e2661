//! # Listeners
//! Presentation code registers listeners to hear about changes to a mirror. Listeners are never called while
//! the owner of the mirror holds a lock: `notifications` only builds the calls, and the caller runs them
//! once it has released whatever it was holding.

use std::sync::Arc;

use crate::data_model::ListenerKey;

pub type Notification = Box<dyn FnOnce() + Send>;

type Listener<Topic> = Arc<dyn Fn(ListenerKey, Topic) + Send + Sync>;

pub struct Listeners<Topic> {
    listeners: slotmap::SlotMap<slotmap::DefaultKey, Listener<Topic>>,
}

impl<Topic> Default for Listeners<Topic> {
    fn default() -> Self {
        Self {
            listeners: Default::default(),
        }
    }
}

impl<Topic: Clone + Send + 'static> Listeners<Topic> {
    pub fn register(
        &mut self,
        listener: impl Fn(ListenerKey, Topic) + Send + Sync + 'static,
    ) -> ListenerKey {
        ListenerKey(self.listeners.insert(Arc::new(listener)))
    }

    /// Returns false if the key was not registered (or was already removed).
    pub fn unregister(&mut self, key: ListenerKey) -> bool {
        self.listeners.remove(key.0).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notifications(&self, topics: &[Topic]) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = Vec::new();
        for topic in topics {
            for (key, listener) in self.listeners.iter() {
                let listener = listener.clone();
                let topic = topic.clone();
                notifications.push(Box::new(move || listener(ListenerKey(key), topic)));
            }
        }
        notifications
    }
}
