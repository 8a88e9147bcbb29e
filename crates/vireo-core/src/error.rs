//! Error types for vireo.

use thiserror::Error;

/// Result type alias using vireo's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vireo.
///
/// Variants carry owned string payloads only, so a terminal outcome can be
/// cloned to every waiter coalesced on an in-flight resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A fetch failed in a way worth retrying while attempt budget remains.
    #[error("transient fetch failure: {0}")]
    TransientFetch(String),

    /// The provider signaled rate-limiting or the transport failed
    /// internally. The resolution stops without further attempts.
    #[error("download aborted")]
    Aborted,

    #[error("video is not playable: {0}")]
    NotPlayable(String),

    /// The first stream entry carries neither a direct URL nor a cipher
    /// bundle, so there is no known way to produce a fetchable URL.
    #[error("stream entry has neither url nor cipher")]
    UnrecognizedStreamShape,

    #[error("malformed player script URI: {0}")]
    MalformedPlayerUri(String),

    #[error("could not extract decipher actions from player script")]
    CipherExtractionFailed,

    /// One of the url/signature/cipher roles could not be matched to any
    /// query parameter of the sampled cipher bundle.
    #[error("no stream {0} key name in cipher query")]
    CipherRoleDetection(&'static str),

    #[error("stream could not be deciphered: {0}")]
    DecipherFailed(String),

    /// The attempt budget was consumed by transient failures.
    #[error("could not obtain video info")]
    Exhausted,

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Returns true if the resolution attempt loop may retry after this
    /// error. An unparseable metadata response counts as an empty result and
    /// consumes an attempt, the same as a transient fetch failure.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetch(_) | Self::Parse(_))
    }

    /// Returns true if this error ends the resolution immediately.
    pub const fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }
}
