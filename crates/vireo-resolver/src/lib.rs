//! # vireo-resolver
//!
//! Resolution pipeline turning a video id into directly fetchable stream
//! URLs, handling provider retries, request coalescing and preemption, and
//! per-player-version URL deobfuscation.

pub mod detect;
pub mod download;
pub mod engine;
pub mod resolver;
pub mod uri;

pub use detect::detect_cipher_roles;
pub use download::{Downloader, FetchResult, Fetcher};
pub use engine::CipherEngine;
pub use resolver::{best_combined_uri, InfoResolver};
pub use uri::parse_uri;
