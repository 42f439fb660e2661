#[path = "1-store-path.rs"]
mod store_path;

#[path = "2-snapshot.rs"]
mod snapshot;

#[path = "3-dirty-tracker.rs"]
mod dirty_tracker;

#[path = "4-listeners.rs"]
mod listeners;

pub use dirty_tracker::*;
pub use listeners::*;
pub use snapshot::*;
pub use store_path::*;

#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ListenerKey(pub(crate) slotmap::DefaultKey);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_paths_are_normalized() {
        assert_eq!(StorePath::new("/rsvps/").as_str(), "rsvps");
        assert_eq!(StorePath::new("settings//landingPage").as_str(), "settings/landingPage");
        assert!(StorePath::new("/").is_root());
        assert_eq!(StorePath::new("rsvps").child("abc").as_str(), "rsvps/abc");
    }

    #[test]
    fn test_path_containment() {
        let rsvps = StorePath::new("rsvps");
        let one = StorePath::new("rsvps/abc");
        let lookalike = StorePath::new("rsvpsx");

        assert!(rsvps.contains(&one));
        assert!(rsvps.contains(&rsvps));
        assert!(!one.contains(&rsvps));
        assert!(!rsvps.contains(&lookalike));
        assert!(StorePath::root().contains(&one));
        assert!(one.overlaps(&rsvps));
        assert!(!one.overlaps(&StorePath::new("settings")));
    }

    #[test]
    fn test_snapshot_null_is_absent() {
        let snapshot = Snapshot::new(StorePath::new("a"), Some(serde_json::Value::Null));
        assert!(!snapshot.exists());
        assert_eq!(snapshot.children().count(), 0);
    }

    #[test]
    fn test_snapshot_children() {
        let snapshot = Snapshot::new(
            StorePath::new("rsvps"),
            Some(serde_json::json!({ "a": { "name": "x" }, "b": { "name": "y" } })),
        );
        let keys: Vec<&str> = snapshot.children().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_dirty_on_mutable_access_only() {
        let mut tracker = DirtyTracker::new(vec![1, 2, 3]);
        assert!(tracker.take_dirty());
        assert!(!tracker.take_dirty());

        let len = tracker.store_mut().len();
        assert_eq!(len, 3);
        assert!(!tracker.take_dirty());

        tracker.store_mut().push(4);
        assert!(tracker.take_dirty());
        assert_eq!(tracker.store(), &vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_mark_loaded_once() {
        let mut tracker = DirtyTracker::new(());
        tracker.take_dirty();
        assert!(!tracker.loaded_at_least_once());
        assert!(tracker.mark_loaded());
        assert!(tracker.take_dirty());
        assert!(!tracker.mark_loaded());
        assert!(!tracker.take_dirty());
        assert!(tracker.loaded_at_least_once());
    }

    #[test]
    fn test_listeners_receive_every_topic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners: Listeners<&'static str> = Listeners::default();
        let key = listeners.register({
            let seen = seen.clone();
            move |_, topic| seen.lock().unwrap().push(topic)
        });

        for notification in listeners.notifications(&["rsvps", "settings"]) {
            notification();
        }
        assert_eq!(*seen.lock().unwrap(), vec!["rsvps", "settings"]);

        assert!(listeners.unregister(key));
        assert!(listeners.notifications(&["rsvps"]).is_empty());
        assert!(!listeners.unregister(key));
    }
}
