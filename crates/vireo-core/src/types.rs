//! Data model for the resolution pipeline.

use serde::{Deserialize, Serialize};

/// The provider's structured description of a video, decoded from the
/// `player_response` field of the metadata endpoint body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_details: Option<VideoDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_data: Option<StreamingData>,
}

impl VideoInfo {
    /// The video id this info describes, if the provider reported one.
    pub fn video_id(&self) -> Option<&str> {
        self.video_details.as_ref().map(|d| d.video_id.as_str())
    }

    /// Whether the provider reports this video as currently playable.
    pub fn is_playable(&self) -> bool {
        self.playability_status
            .as_ref()
            .is_some_and(|status| status.status == "OK")
    }
}

/// Provider-reported details about the video itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub video_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Provider-reported playability flag and optional human-readable reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Container for the combined and adaptive stream descriptors.
///
/// Both lists deserialize to empty when absent from the raw response, so the
/// rest of the pipeline never has to re-check for missing arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
    #[serde(default)]
    pub adaptive_formats: Vec<StreamFormat>,
}

/// One stream descriptor. Before deciphering, exactly one of `url` or a
/// cipher field is expected to be populated; after deciphering, `url` is
/// populated on every format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itag: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_cipher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
}

impl StreamFormat {
    /// The cipher bundle, regardless of which field name the player version
    /// used for it.
    pub fn cipher_query(&self) -> Option<&str> {
        self.signature_cipher.as_deref().or(self.cipher.as_deref())
    }
}

/// Names of the query parameters carrying the url/signature/cipher roles in
/// a cipher bundle. Valid only for the player version that produced the
/// sample they were derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherRoleMap {
    pub url_key: String,
    pub sig_key: String,
    pub cipher_key: String,
}

/// Identifier of a player-script version, derived from the hex-looking
/// segment of the script path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the player id from a player-script path, e.g.
    /// `/s/player/23dbe12b/player_ias.vflset/en_US/base.js` -> `23dbe12b`.
    pub fn from_script_path(path: &str) -> Option<Self> {
        path.split('/')
            .find(|segment| is_hex(segment))
            .map(|segment| Self(segment.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_hex(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_hexdigit())
}

/// The ordered operation sequence that reverses URL obfuscation for one
/// player version. Opaque to the resolver; produced and consumed by the
/// cipher engine and persisted verbatim to the action cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformProgram(String);

impl TransformProgram {
    pub fn new(serialized: impl Into<String>) -> Self {
        Self(serialized.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
