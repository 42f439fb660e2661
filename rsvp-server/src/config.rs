use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rsvp_core::query::DEFAULT_PAGE_SIZE;

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);
const DEFAULT_ASSET_BASE_URL: &str = "http://localhost:8080/assets";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_SESSION_HOURS: i64 = 12;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub admin_email: String,
    pub admin_password: String,
    /// Public prefix for uploaded backgrounds. Blobs are served under `/assets` by this server.
    pub asset_base_url: String,
    pub page_size: usize,
    pub max_upload_bytes: usize,
    pub session_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            bind_addr: parsed(&lookup, "RSVP_BIND_ADDR")?.unwrap_or(DEFAULT_BIND_ADDR),
            jwt_secret: required("RSVP_JWT_SECRET")?,
            admin_email: required("RSVP_ADMIN_EMAIL")?,
            admin_password: required("RSVP_ADMIN_PASSWORD")?,
            asset_base_url: lookup("RSVP_ASSET_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ASSET_BASE_URL.to_string()),
            page_size: parsed(&lookup, "RSVP_PAGE_SIZE")?.unwrap_or(DEFAULT_PAGE_SIZE),
            max_upload_bytes: parsed(&lookup, "RSVP_MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            session_hours: parsed(&lookup, "RSVP_SESSION_HOURS")?.unwrap_or(DEFAULT_SESSION_HOURS),
        })
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
