//! Value-shape heuristics classifying cipher query parameters into
//! url/signature/cipher roles.
//!
//! The parameter names change with the player version, but their value
//! shapes do not: the cipher is a long opaque token, the signature-key name
//! is a short one, and the base URL is the only absolute URL in the bundle.

use url::Url;
use vireo_core::{CipherRoleMap, Error, Result};

/// Boundary between cipher-length and signature-length values. A value of
/// exactly this length matches neither role and is skipped by both searches.
const ROLE_LENGTH_BOUNDARY: usize = 32;

/// Classify the parameters of one sample cipher query into roles.
///
/// The derived map is valid only for the player version that produced the
/// sample, so callers recompute it once per resolution.
pub fn detect_cipher_roles(sample: &str) -> Result<CipherRoleMap> {
    let params: Vec<(String, String)> = url::form_urlencoded::parse(sample.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    // A long value that is not a URL.
    let cipher_key = params
        .iter()
        .find(|(_, value)| value.len() > ROLE_LENGTH_BOUNDARY && !is_absolute_url(value))
        .map(|(key, _)| key.clone())
        .ok_or(Error::CipherRoleDetection("cipher"))?;

    // A short value that is not a URL.
    let sig_key = params
        .iter()
        .find(|(_, value)| value.len() < ROLE_LENGTH_BOUNDARY && !is_absolute_url(value))
        .map(|(key, _)| key.clone())
        .ok_or(Error::CipherRoleDetection("signature"))?;

    let url_key = params
        .iter()
        .find(|(_, value)| is_absolute_url(value))
        .map(|(key, _)| key.clone())
        .ok_or(Error::CipherRoleDetection("URL"))?;

    Ok(CipherRoleMap {
        url_key,
        sig_key,
        cipher_key,
    })
}

/// Decoded value of `key` within a form-encoded query string.
pub(crate) fn query_value(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, value)| value.into_owned())
}

fn is_absolute_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}
