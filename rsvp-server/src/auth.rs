//! Admin sessions. Logging in trades the configured email and password for a signed, expiring bearer token;
//! admin handlers take an [`AdminSession`] argument, which only extracts from a request carrying a valid one.

use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn check_credentials(state: &AppState, form: &LoginForm) -> Result<(), ApiError> {
    let email_matches = form
        .email
        .trim()
        .eq_ignore_ascii_case(state.config.admin_email.trim());
    if email_matches && form.password == state.config.admin_password {
        Ok(())
    } else {
        log::warn!("Rejected admin login for {}", form.email.trim());
        Err(ApiError::InvalidCredentials)
    }
}

pub fn issue_token(
    keys: &SessionKeys,
    subject: &str,
    now: DateTime<Utc>,
    valid_hours: i64,
) -> Result<LoginResponse, ApiError> {
    let expires_at = TimeDelta::try_hours(valid_hours)
        .and_then(|valid_for| now.checked_add_signed(valid_for))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };
    let token = encode(&Header::default(), &claims, &keys.encoding)?;
    Ok(LoginResponse { token, expires_at })
}

pub fn verify_token(keys: &SessionKeys, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            log::debug!("Rejected session token: {e}");
            ApiError::Unauthorized
        })
}

/// Proof that the request was made by the signed-in admin.
#[derive(Debug)]
pub struct AdminSession {
    pub email: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized)?;
        let claims = verify_token(&state.keys, bearer.token())?;
        if !claims.sub.eq_ignore_ascii_case(&state.config.admin_email) {
            return Err(ApiError::Unauthorized);
        }
        Ok(AdminSession { email: claims.sub })
    }
}
