#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
use uuid::Uuid;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["self", "crypto"])]
    fn randomUUID() -> String;

    #[wasm_bindgen(js_namespace = Date, js_name = now)]
    fn date_now() -> f64;
}

const TIME_DIGITS: usize = 9;
const RANDOM_DIGITS: usize = 11;
const FILENAME_RANDOM_DIGITS: usize = 8;

pub fn get_uuid() -> String {
    #[cfg(target_arch = "wasm32")]
    {
        randomUUID()
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Uuid::new_v4().to_string()
    }
}

pub fn now_millis() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        date_now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Id for a new child of a collection. Ids start with the creation time in fixed-width base 36,
/// so sorting them as strings sorts them by creation time (to the millisecond).
pub fn push_id() -> String {
    push_id_at(now_millis())
}

pub fn push_id_at(millis: u64) -> String {
    format!("{}{}", base36(millis, TIME_DIGITS), random_hex(RANDOM_DIGITS))
}

/// Blob filename that won't collide with other uploads of a file with the same name,
/// including ones made in the same millisecond: `{millis}_{random hex}_{sanitized name}`.
/// Anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn disambiguated_filename(original: &str) -> String {
    disambiguated_filename_at(original, now_millis())
}

pub fn disambiguated_filename_at(original: &str, millis: u64) -> String {
    let name = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.trim_matches(['.', '_']).is_empty() {
        sanitized = "upload".to_string();
    }
    format!("{millis}_{}_{sanitized}", random_hex(FILENAME_RANDOM_DIGITS))
}

fn random_hex(len: usize) -> String {
    get_uuid()
        .chars()
        .filter(char::is_ascii_hexdigit)
        .take(len)
        .collect()
}

fn base36(mut value: u64, width: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut digits = vec![b'0'; width];
    for slot in digits.iter_mut().rev() {
        *slot = DIGITS[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8(digits).unwrap_or_default()
}
