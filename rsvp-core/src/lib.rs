//! Everything an event RSVP tool needs apart from its screens:
//! - [`model`]: the record types and the validation done at the input boundary
//! - [`sync`]: [`RsvpSync`], which keeps live mirrors of the RSVP list and the landing page settings and writes through to the store
//! - [`query`]: search, pagination and totals over a mirror snapshot
//! - [`export`]: PDF and spreadsheet renderings of the full list

pub mod export;
pub mod model;
pub mod query;
pub mod sync;

pub use export::{ExportError, ExportFormat};
pub use model::{BackgroundType, LandingPageSettings, NewRsvp, RsvpRecord, ValidationError};
pub use query::{AdminListView, ListPage, ListQuery, Pagination};
pub use sync::{Change, RsvpSync, SyncError, SyncStatus};
