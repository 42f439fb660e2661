//! # RsvpSync
//! The synchronization layer. It owns two live mirrors, the RSVP list and the landing page settings,
//! and keeps them current through two persistent subscriptions on the store.
//!
//! Mutations write through to the store and return as soon as the write is acknowledged.
//! They never touch the mirrors: the store pushes a new snapshot, and that is what updates the mirror.
//! So a caller that wants to see its own write has to wait for the next snapshot.
//!
//! Locking: the state lock is never held across an `.await`, and listeners (and the store's subscribers)
//! are never invoked while it is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use mirror::{
    BlobStore, DirtyTracker, ListenerKey, Listeners, Notification, RemoteStore, Snapshot,
    StoreError, StorePath, SubscriptionKey,
};

use crate::model::{BackgroundType, LandingPageSettings, NewRsvp, RsvpRecord, ValidationError};

pub const RSVPS_PATH: &str = "rsvps";
pub const LANDING_PAGE_PATH: &str = "settings/landingPage";
pub const BACKGROUNDS_PATH: &str = "backgrounds";

const ADD_FAILED: &str = "Failed to add RSVP";
const DELETE_FAILED: &str = "Failed to delete RSVP";
const DELETE_ALL_FAILED: &str = "Failed to delete all RSVPs";
const UPDATE_FAILED: &str = "Failed to update landing page";
const UPLOAD_FAILED: &str = "Failed to upload background";
const FETCH_RSVPS_FAILED: &str = "Failed to fetch RSVPs";
const FETCH_SETTINGS_FAILED: &str = "Failed to fetch landing page settings";

/// Which part of the layer's state a listener is being told about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Change {
    Rsvps,
    Settings,
    Status,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// True until both mirrors have received a snapshot (or an error).
    pub initial_loading: bool,
    /// True while at least one mutation is outstanding.
    pub busy: bool,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl SyncError {
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            SyncError::Store { source, .. } => Some(source),
            SyncError::Validation(_) => None,
        }
    }
}

#[derive(Default)]
struct OperationSlot {
    in_flight: usize,
    error: Option<String>,
}

#[derive(Default)]
struct MirrorState {
    rsvps: DirtyTracker<Vec<RsvpRecord>>,
    settings: DirtyTracker<Option<LandingPageSettings>>,
    operations: DirtyTracker<OperationSlot>,
    listeners: Listeners<Change>,
}

impl MirrorState {
    fn status(&self) -> SyncStatus {
        SyncStatus {
            initial_loading: !(self.rsvps.loaded_at_least_once()
                && self.settings.loaded_at_least_once()),
            busy: self.operations.store().in_flight > 0,
            error: self.operations.store().error.clone(),
        }
    }

    fn drain_due_notifications(&mut self) -> Vec<Notification> {
        let mut changes = Vec::new();
        if self.rsvps.take_dirty() {
            changes.push(Change::Rsvps);
        }
        if self.settings.take_dirty() {
            changes.push(Change::Settings);
        }
        if self.operations.take_dirty() {
            changes.push(Change::Status);
        }
        self.listeners.notifications(&changes)
    }

    fn set_error(&mut self, message: &str) {
        self.operations.store_mut().error = Some(message.to_string());
    }

    fn mark_rsvps_loaded(&mut self) {
        if self.rsvps.mark_loaded() {
            // the initial-loading flag is derived from this
            self.operations.mark_dirty();
        }
    }

    fn mark_settings_loaded(&mut self) {
        if self.settings.mark_loaded() {
            self.operations.mark_dirty();
        }
    }
}

fn lock(state: &Mutex<MirrorState>) -> MutexGuard<'_, MirrorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f` under the state lock, then notifies listeners about whatever `f` dirtied, after unlocking.
fn update<R>(state: &Mutex<MirrorState>, f: impl FnOnce(&mut MirrorState) -> R) -> R {
    let (result, notifications) = {
        let mut state = lock(state);
        let result = f(&mut state);
        (result, state.drain_due_notifications())
    };
    for notification in notifications {
        notification();
    }
    result
}

fn rsvps_from_snapshot(snapshot: &Snapshot) -> Vec<RsvpRecord> {
    snapshot
        .children()
        .filter_map(|(id, value)| {
            RsvpRecord::from_stored(id, value)
                .inspect_err(|e| log::warn!("Skipping malformed RSVP {id}: {e}"))
                .ok()
        })
        .collect()
}

/// Marks an operation as in flight for as long as it lives. Dropping it is the `finally`.
struct OperationGuard<'a> {
    state: &'a Mutex<MirrorState>,
}

impl<'a> OperationGuard<'a> {
    fn begin(state: &'a Mutex<MirrorState>) -> Self {
        update(state, |state| {
            let mut operations = state.operations.store_mut();
            operations.in_flight += 1;
            operations.error = None;
        });
        Self { state }
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        update(self.state, |state| {
            let mut operations = state.operations.store_mut();
            operations.in_flight = operations.in_flight.saturating_sub(1);
        });
    }
}

pub struct RsvpSync<S> {
    store: Arc<S>,
    state: Arc<Mutex<MirrorState>>,
    subscriptions: Mutex<Vec<SubscriptionKey>>,
}

impl<S: RemoteStore + BlobStore> RsvpSync<S> {
    /// Opens the two subscriptions. Depending on the store, the first snapshots may already have arrived
    /// by the time this returns, or may arrive later.
    pub fn activate(store: Arc<S>) -> Self {
        let state = Arc::new(Mutex::new(MirrorState::default()));

        let rsvps = store.subscribe(
            &StorePath::new(RSVPS_PATH),
            {
                let state = state.clone();
                move |snapshot: Snapshot| {
                    let records = rsvps_from_snapshot(&snapshot);
                    log::debug!("RSVP snapshot with {} records", records.len());
                    update(&state, |state| {
                        *state.rsvps.store_mut() = records;
                        state.mark_rsvps_loaded();
                    });
                }
            },
            {
                let state = state.clone();
                move |error: StoreError| {
                    log::error!("Error fetching RSVPs: {error}");
                    update(&state, |state| {
                        state.set_error(FETCH_RSVPS_FAILED);
                        state.mark_rsvps_loaded();
                    });
                }
            },
        );

        let settings = store.subscribe(
            &StorePath::new(LANDING_PAGE_PATH),
            {
                let state = state.clone();
                move |snapshot: Snapshot| {
                    let settings = snapshot
                        .decode::<LandingPageSettings>()
                        .inspect_err(|e| log::warn!("Ignoring malformed landing page settings: {e}"))
                        .unwrap_or_default();
                    update(&state, |state| {
                        *state.settings.store_mut() = settings;
                        state.mark_settings_loaded();
                    });
                }
            },
            {
                let state = state.clone();
                move |error: StoreError| {
                    log::error!("Error fetching landing page settings: {error}");
                    update(&state, |state| {
                        state.set_error(FETCH_SETTINGS_FAILED);
                        state.mark_settings_loaded();
                    });
                }
            },
        );

        log::info!("Synchronization layer activated");
        Self {
            store,
            state,
            subscriptions: Mutex::new(vec![rsvps, settings]),
        }
    }

    /// Closes both subscriptions. The mirrors keep their last values but will no longer change.
    pub fn deactivate(&self) {
        let keys: Vec<SubscriptionKey> = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if keys.is_empty() {
            return;
        }
        for key in keys {
            self.store.unsubscribe(key);
        }
        log::info!("Synchronization layer deactivated");
    }

    pub fn is_active(&self) -> bool {
        !self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn rsvps(&self) -> Vec<RsvpRecord> {
        lock(&self.state).rsvps.store().clone()
    }

    /// Borrow the RSVP mirror without cloning it. Don't call back into the layer from `f`.
    pub fn with_rsvps<R>(&self, f: impl FnOnce(&[RsvpRecord]) -> R) -> R {
        f(lock(&self.state).rsvps.store())
    }

    pub fn landing_page_settings(&self) -> Option<LandingPageSettings> {
        lock(&self.state).settings.store().clone()
    }

    pub fn settings_or_default(&self) -> LandingPageSettings {
        self.landing_page_settings().unwrap_or_default()
    }

    pub fn status(&self) -> SyncStatus {
        lock(&self.state).status()
    }

    /// The listener is invoked whenever a mirror or the status changes.
    pub fn register_listener(
        &self,
        listener: impl Fn(ListenerKey, Change) + Send + Sync + 'static,
    ) -> ListenerKey {
        lock(&self.state).listeners.register(listener)
    }

    pub fn unregister_listener(&self, key: ListenerKey) -> bool {
        lock(&self.state).listeners.unregister(key)
    }

    /// Returns the id the store assigned. The new record shows up in the mirror with the next snapshot.
    pub async fn add_record(&self, rsvp: NewRsvp) -> Result<String, SyncError> {
        let _guard = OperationGuard::begin(&self.state);
        let rsvp = match rsvp.submission_time() {
            Some(_) => rsvp,
            None => rsvp.submitted_at(Utc::now()),
        };
        let value = serde_json::to_value(&rsvp).map_err(|e| self.fail(ADD_FAILED, e.into()))?;
        let id = self
            .store
            .push(&StorePath::new(RSVPS_PATH), value)
            .await
            .map_err(|e| self.fail(ADD_FAILED, e))?;
        log::info!("Added RSVP {id}");
        Ok(id)
    }

    pub async fn delete_record(&self, id: &str) -> Result<(), SyncError> {
        if id.is_empty() || id.contains('/') {
            return Err(ValidationError::InvalidId(id.to_string()).into());
        }
        let _guard = OperationGuard::begin(&self.state);
        self.store
            .remove(&StorePath::new(RSVPS_PATH).child(id))
            .await
            .map_err(|e| self.fail(DELETE_FAILED, e))?;
        log::info!("Deleted RSVP {id}");
        Ok(())
    }

    /// Removes the whole collection in a single remote operation.
    pub async fn delete_all_records(&self) -> Result<(), SyncError> {
        let _guard = OperationGuard::begin(&self.state);
        self.store
            .remove(&StorePath::new(RSVPS_PATH))
            .await
            .map_err(|e| self.fail(DELETE_ALL_FAILED, e))?;
        log::info!("Deleted all RSVPs");
        Ok(())
    }

    /// Overwrites the settings wholesale; there is no partial merge.
    pub async fn update_settings(&self, settings: LandingPageSettings) -> Result<(), SyncError> {
        let _guard = OperationGuard::begin(&self.state);
        self.write_settings(&settings)
            .await
            .map_err(|e| self.fail(UPDATE_FAILED, e))
    }

    /// Stores the file as the landing page background and points the settings at it.
    ///
    /// The new background type and URL are merged into the settings *currently in the mirror*, not into
    /// whatever the caller may be editing, so unsaved edits to other fields are lost.
    pub async fn upload_asset(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        media_type: &str,
    ) -> Result<String, SyncError> {
        let background_type = BackgroundType::from_media_type(media_type)
            .ok_or_else(|| ValidationError::UnsupportedMediaType(media_type.to_string()))?;
        if bytes.is_empty() {
            return Err(ValidationError::EmptyUpload.into());
        }

        let _guard = OperationGuard::begin(&self.state);
        let path =
            StorePath::new(BACKGROUNDS_PATH).child(&eyedee::disambiguated_filename(file_name));
        self.store
            .upload(&path, bytes, media_type)
            .await
            .map_err(|e| self.fail(UPLOAD_FAILED, e))?;
        let url = self
            .store
            .download_url(&path)
            .await
            .map_err(|e| self.fail(UPLOAD_FAILED, e))?;

        let settings = LandingPageSettings {
            background_type,
            background_url: url.clone(),
            ..self.settings_or_default()
        };
        self.write_settings(&settings)
            .await
            .map_err(|e| self.fail(UPDATE_FAILED, e))?;
        log::info!("Uploaded background {path} as {background_type:?}");
        Ok(url)
    }

    /// One-shot read that bypasses the mirror.
    pub async fn fetch_settings(&self) -> Result<Option<LandingPageSettings>, SyncError> {
        let _guard = OperationGuard::begin(&self.state);
        let snapshot = self
            .store
            .get(&StorePath::new(LANDING_PAGE_PATH))
            .await
            .map_err(|e| self.fail(FETCH_SETTINGS_FAILED, e))?;
        snapshot
            .decode::<LandingPageSettings>()
            .map_err(|e| self.fail(FETCH_SETTINGS_FAILED, e.into()))
    }

    async fn write_settings(&self, settings: &LandingPageSettings) -> Result<(), StoreError> {
        let value = serde_json::to_value(settings)?;
        self.store
            .set(&StorePath::new(LANDING_PAGE_PATH), value)
            .await?;
        log::info!("Landing page settings updated");
        Ok(())
    }

    fn fail(&self, context: &'static str, source: StoreError) -> SyncError {
        log::error!("{context}: {source}");
        update(&self.state, |state| state.set_error(context));
        SyncError::Store { context, source }
    }
}

impl<S> Drop for RsvpSync<S> {
    fn drop(&mut self) {
        let still_subscribed = self
            .subscriptions
            .get_mut()
            .map(|keys| !keys.is_empty())
            .unwrap_or(false);
        if still_subscribed {
            log::warn!("RsvpSync dropped without deactivate(); its subscriptions are still open");
        }
    }
}
