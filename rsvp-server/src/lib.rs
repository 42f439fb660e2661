//! JSON API for the RSVP tool: the public submission form, the admin screens, and the uploaded backgrounds.
//! Every handler reads from or writes through one shared [`RsvpSync`] over an in-process [`MemoryStore`].

use std::sync::Arc;

use mirror::MemoryStore;
use rsvp_core::RsvpSync;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

pub use config::{Config, ConfigError};
pub use routes::router;

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<RsvpSync<MemoryStore>>,
    pub config: Arc<Config>,
    pub keys: Arc<auth::SessionKeys>,
}

impl AppState {
    pub fn new(sync: Arc<RsvpSync<MemoryStore>>, config: Config) -> Self {
        let keys = auth::SessionKeys::new(config.jwt_secret.as_bytes());
        Self {
            sync,
            config: Arc::new(config),
            keys: Arc::new(keys),
        }
    }
}
