use chrono::{DateTime, Utc};

pub const MIN_GUESTS: u32 = 1;
pub const MAX_GUESTS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name is required")]
    MissingName,
    #[error("affiliation is required")]
    MissingAffiliation,
    #[error("`{0}` is not a valid record id")]
    InvalidId(String),
    #[error("unsupported media type `{0}`, expected an image or a video")]
    UnsupportedMediaType(String),
    #[error("uploaded file is empty")]
    EmptyUpload,
}

/// A submission as it lives in the mirror. Records are never updated in place.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub struct RsvpRecord {
    pub id: String,
    pub name: String,
    pub affiliation: String,
    pub guests: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl RsvpRecord {
    /// Decodes one child of the `rsvps` collection. The id is the child's key, not part of the stored value.
    pub fn from_stored(id: &str, value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let stored: NewRsvp = serde_json::from_value(value.clone())?;
        Ok(Self {
            id: id.to_string(),
            name: stored.name,
            affiliation: stored.affiliation,
            guests: stored.guests,
            submitted_at: stored.submitted_at,
        })
    }
}

/// Record fields excluding the id. Only constructible through [`NewRsvp::new`], which is the input boundary.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRsvp {
    name: String,
    affiliation: String,
    guests: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submitted_at: Option<DateTime<Utc>>,
}

impl NewRsvp {
    pub fn new(name: &str, affiliation: &str, guests: i64) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        let affiliation = affiliation.trim();
        if affiliation.is_empty() {
            return Err(ValidationError::MissingAffiliation);
        }
        Ok(Self {
            name: name.to_string(),
            affiliation: affiliation.to_string(),
            guests: clamp_guests(guests),
            submitted_at: None,
        })
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(at);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn affiliation(&self) -> &str {
        &self.affiliation
    }

    pub fn guests(&self) -> u32 {
        self.guests
    }

    pub fn submission_time(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }
}

pub fn clamp_guests(requested: i64) -> u32 {
    requested.clamp(MIN_GUESTS as i64, MAX_GUESTS as i64) as u32
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    #[default]
    Image,
    Video,
}

impl BackgroundType {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence.starts_with("image/") {
            Some(BackgroundType::Image)
        } else if essence.starts_with("video/") {
            Some(BackgroundType::Video)
        } else {
            None
        }
    }
}

/// The singleton presentation record. Absence is valid; `Default` is what the landing page shows then.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub struct LandingPageSettings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub background_type: BackgroundType,
    #[serde(default)]
    pub background_url: String,
}
