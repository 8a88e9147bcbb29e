//! End-to-end resolution of a video id into fetchable stream URLs.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;
use vireo_cache::ActionCache;
use vireo_core::{
    CipherRoleMap, Error, PlayerId, Result, StreamFormat, StreamingData, TransformProgram,
    VideoInfo,
};

use crate::detect::{detect_cipher_roles, query_value};
use crate::download::Fetcher;
use crate::engine::CipherEngine;

const BASE_URL: &str = "https://www.youtube.com";

/// Total fetch attempts per resolution before giving up.
const ATTEMPT_BUDGET: u32 = 2;

/// Marker for the player-script path inside the embed page body.
#[allow(clippy::unwrap_used)] // the pattern is a valid constant
static JS_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"jsUrl":"(.*?)""#).unwrap());

struct InFlight {
    video_id: String,
    /// Distinguishes this resolution from a preempting one for the same id.
    epoch: u64,
    outcome: broadcast::Sender<Result<VideoInfo>>,
}

#[derive(Default)]
struct ResolverState {
    in_flight: Option<InFlight>,
    last_info: Option<VideoInfo>,
    /// Single-slot memory cache, replaced wholesale on player change.
    cached_transform: Option<(PlayerId, TransformProgram)>,
    next_epoch: u64,
}

enum Entry {
    Wait(broadcast::Receiver<Result<VideoInfo>>),
    Hit(VideoInfo),
    Run {
        rx: broadcast::Receiver<Result<VideoInfo>>,
        tx: broadcast::Sender<Result<VideoInfo>>,
        epoch: u64,
        preempted: bool,
    },
}

/// Resolves a video id into a [`VideoInfo`] whose every stream format
/// carries a directly fetchable URL.
///
/// At most one resolution pipeline is active per instance. Calls for the
/// in-flight video id coalesce onto the pending outcome; a call for a
/// different id cancels the in-flight network operation and takes over.
#[derive(Clone)]
pub struct InfoResolver {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<ActionCache>,
    engine: Arc<dyn CipherEngine>,
    state: Arc<Mutex<ResolverState>>,
}

impl InfoResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: ActionCache, engine: Arc<dyn CipherEngine>) -> Self {
        Self {
            fetcher,
            cache: Arc::new(cache),
            engine,
            state: Arc::new(Mutex::new(ResolverState::default())),
        }
    }

    /// Resolve `video_id`, reusing the in-flight resolution or the last
    /// resolved info where possible.
    pub async fn resolve(&self, video_id: &str) -> Result<VideoInfo> {
        let entry = {
            let mut state = self.state.lock();

            match &state.in_flight {
                Some(in_flight) if in_flight.video_id == video_id => {
                    debug!("resolving after current download finishes");
                    Entry::Wait(in_flight.outcome.subscribe())
                }
                _ => Self::begin(&mut state, video_id),
            }
        };

        let mut rx = match entry {
            Entry::Hit(info) => return Ok(info),
            Entry::Wait(rx) => rx,
            Entry::Run {
                rx,
                tx,
                epoch,
                preempted,
            } => {
                if preempted {
                    // Cancel the previous video's pending network operation
                    // before starting new work.
                    self.fetcher.abort();
                }

                let resolver = self.clone();
                let id = video_id.to_string();
                tokio::spawn(async move { resolver.drive(&id, epoch, &tx).await });

                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            // The driving task never drops its sender before the terminal
            // send, so this only fires on runtime shutdown.
            Err(_) => Err(Error::Aborted),
        }
    }

    /// Reuse the last resolved info when it matches, otherwise install a
    /// fresh in-flight entry, preempting any current one.
    fn begin(state: &mut ResolverState, video_id: &str) -> Entry {
        // Do not redownload info for the same video.
        if let Some(info) = state
            .last_info
            .as_ref()
            .filter(|info| info.video_id() == Some(video_id))
        {
            return Entry::Hit(info.clone());
        }

        let preempted = state.in_flight.take().is_some();
        let epoch = state.next_epoch;
        state.next_epoch += 1;

        let (tx, rx) = broadcast::channel(1);
        state.in_flight = Some(InFlight {
            video_id: video_id.to_string(),
            epoch,
            outcome: tx.clone(),
        });

        Entry::Run {
            rx,
            tx,
            epoch,
            preempted,
        }
    }

    /// Run the attempt loop to a terminal outcome, record it in the
    /// resolver state, and notify every coalesced waiter.
    async fn drive(&self, video_id: &str, epoch: u64, tx: &broadcast::Sender<Result<VideoInfo>>) {
        let result = self.run(video_id).await;

        {
            let mut state = self.state.lock();
            match &result {
                Ok(info) => state.last_info = Some(info.clone()),
                // Keep info from the previous video on other failures, as it
                // may still be valid and reusable.
                Err(Error::NotPlayable(_)) => state.last_info = None,
                Err(_) => {}
            }

            // A preempting resolution may own the slot by now.
            if state
                .in_flight
                .as_ref()
                .is_some_and(|in_flight| in_flight.epoch == epoch)
            {
                state.in_flight = None;
            }
        }

        debug!(video_id, success = result.is_ok(), "info resolved");
        let _ = tx.send(result);
    }

    async fn run(&self, video_id: &str) -> Result<VideoInfo> {
        let mut tries = ATTEMPT_BUDGET;
        while tries > 0 {
            tries -= 1;
            debug!("obtaining video info: {video_id}");

            match self.attempt(video_id).await {
                Ok(info) => return Ok(info),
                Err(err) if err.is_retryable() => {
                    debug!("failed, remaining tries: {tries} ({err})");
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::Exhausted)
    }

    async fn attempt(&self, video_id: &str) -> Result<VideoInfo> {
        let mut info = self.fetch_info(video_id).await?;

        if !info.is_playable() {
            let reason = info
                .playability_status
                .as_ref()
                .and_then(|status| status.reason.clone())
                .unwrap_or_else(|| "video is not playable".to_string());
            debug!("{reason}");
            return Err(Error::NotPlayable(reason));
        }

        let Some(mut streaming) = info.streaming_data.take() else {
            return Err(Error::NotPlayable(
                "video response data is missing streaming data".to_string(),
            ));
        };

        if needs_cipher(&streaming)? {
            debug!("video requires deciphering");
            let program = self.obtain_program(video_id).await?;
            decipher_streaming_data(&mut streaming, self.engine.as_ref(), &program)?;
        }

        info.streaming_data = Some(streaming);
        Ok(info)
    }

    /// Fetch and decode the metadata endpoint body: a form-encoded query
    /// whose `player_response` field is URL-encoded JSON.
    async fn fetch_info(&self, video_id: &str) -> Result<VideoInfo> {
        let eurl: String = url::form_urlencoded::byte_serialize(
            format!("https://youtube.googleapis.com/v/{video_id}").as_bytes(),
        )
        .collect();
        let url = format!("{BASE_URL}/get_video_info?video_id={video_id}&el=embedded&eurl={eurl}");

        let result = self.fetcher.fetch(&url).await?;
        if result.aborted {
            return Err(Error::Aborted);
        }
        if result.body.is_empty() {
            return Err(Error::TransientFetch("empty video info response".to_string()));
        }

        let player_response = query_value(&result.body, "player_response")
            .ok_or_else(|| Error::Parse("no player response in query".to_string()))?;

        debug!("parsing video info JSON");
        serde_json::from_str(&player_response)
            .map_err(|err| Error::Parse(format!("could not parse video info JSON: {err}")))
    }

    /// Obtain the transform program for the current player version: memory
    /// slot, then durable cache, then fresh extraction from the script body.
    async fn obtain_program(&self, video_id: &str) -> Result<TransformProgram> {
        // Decipher actions do not change too often, so reuse aggressively
        // to stay below the provider's request limits.
        if let Some((_, program)) = self.state.lock().cached_transform.clone() {
            debug!("using remembered decipher actions");
            return Ok(program);
        }

        let embed = self.fetcher.fetch(&format!("{BASE_URL}/embed/{video_id}")).await?;
        if embed.aborted {
            return Err(Error::Aborted);
        }
        if embed.body.is_empty() {
            return Err(Error::TransientFetch("could not download embed body".to_string()));
        }

        let path = JS_URL_RE
            .captures(&embed.body)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                Error::MalformedPlayerUri("could not find player script path".to_string())
            })?;

        let player_url = format!("{BASE_URL}{path}");
        if !path.starts_with('/') || !is_provider_url(&player_url) {
            return Err(Error::MalformedPlayerUri(player_url));
        }
        debug!("found player URI: {player_url}");

        let player_id = PlayerId::from_script_path(&path)
            .ok_or_else(|| Error::MalformedPlayerUri(format!("no player id in path: {path}")))?;

        let program = match self.cache.get(&player_id) {
            Some(program) => program,
            None => self.extract_program(&player_url, &player_id).await?,
        };

        let mut state = self.state.lock();
        if state.cached_transform.as_ref().map(|(id, _)| id) != Some(&player_id) {
            state.cached_transform = Some((player_id, program.clone()));
        }

        Ok(program)
    }

    /// Download the player script and extract a fresh transform program,
    /// persisting it in the background.
    async fn extract_program(
        &self,
        player_url: &str,
        player_id: &PlayerId,
    ) -> Result<TransformProgram> {
        let script = self.fetcher.fetch(player_url).await?;
        if script.aborted {
            return Err(Error::Aborted);
        }
        if script.body.is_empty() {
            return Err(Error::TransientFetch("could not download player body".to_string()));
        }

        let program = self
            .engine
            .extract_actions(&script.body)
            .filter(|program| !program.is_empty())
            .ok_or(Error::CipherExtractionFailed)?;
        debug!("extracted decipher actions for player {player_id}");

        // Fire-and-forget persistence; a lost entry only costs one
        // re-extraction on a later run.
        let cache = Arc::clone(&self.cache);
        let id = player_id.clone();
        let to_save = program.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || cache.put(&id, &to_save)).await {
                Ok(Ok(())) => debug!("saved cipher actions to cache file"),
                Ok(Err(err)) => warn!("could not save cipher actions: {err}"),
                Err(err) => warn!("cache write task failed: {err}"),
            }
        });

        Ok(program)
    }
}

/// The best combined (audio+video) stream URL the provider offered: the
/// last `formats` entry, and only if it carries a non-empty URL.
pub fn best_combined_uri(info: &VideoInfo) -> Option<&str> {
    let url = info.streaming_data.as_ref()?.formats.last()?.url.as_deref()?;
    (!url.is_empty()).then_some(url)
}

/// Probe the first combined stream (falling back to the first adaptive one)
/// to decide whether URLs are obfuscated. A stream with neither a URL nor a
/// cipher bundle has no known path to a fetchable URL.
fn needs_cipher(data: &StreamingData) -> Result<bool> {
    let Some(first) = data.formats.first().or_else(|| data.adaptive_formats.first()) else {
        return Ok(false);
    };

    if first.url.is_some() {
        return Ok(false);
    }
    if first.cipher_query().is_some() {
        return Ok(true);
    }

    Err(Error::UnrecognizedStreamShape)
}

fn decipher_streaming_data(
    data: &mut StreamingData,
    engine: &dyn CipherEngine,
    program: &TransformProgram,
) -> Result<()> {
    debug!("checking cipher query keys");

    // Cipher query keys are the same across the streams of one response,
    // so any cipher-bearing stream works as the sample.
    let roles = {
        let sample = data
            .formats
            .first()
            .or_else(|| data.adaptive_formats.first())
            .and_then(StreamFormat::cipher_query)
            .ok_or_else(|| Error::DecipherFailed("no cipher query to sample".to_string()))?;
        detect_cipher_roles(sample)?
    };

    debug!("deciphering streams");
    for stream in data
        .formats
        .iter_mut()
        .chain(data.adaptive_formats.iter_mut())
    {
        stream.url = Some(deciphered_url(stream, &roles, engine, program)?);
    }
    debug!("all streams deciphered");

    Ok(())
}

/// Rebuild one stream URL: extract the base URL and cipher value through the
/// role map, decipher the signature key, and append it under the name the
/// bundle's signature parameter carries as its value.
fn deciphered_url(
    stream: &StreamFormat,
    roles: &CipherRoleMap,
    engine: &dyn CipherEngine,
    program: &TransformProgram,
) -> Result<String> {
    let itag = stream.itag.unwrap_or_default();
    debug!("deciphering stream id: {itag}");

    let query = stream
        .cipher_query()
        .ok_or_else(|| Error::DecipherFailed(format!("stream {itag} has no cipher query")))?;

    let base_url = query_value(query, &roles.url_key)
        .ok_or_else(|| Error::DecipherFailed(format!("stream {itag} has no base URL")))?;
    let cipher = query_value(query, &roles.cipher_key)
        .ok_or_else(|| Error::DecipherFailed(format!("stream {itag} has no cipher value")))?;
    let sig_name = query_value(query, &roles.sig_key)
        .ok_or_else(|| Error::DecipherFailed(format!("stream {itag} has no signature key")))?;

    let key = engine
        .decipher(&cipher, program)
        .ok_or_else(|| Error::DecipherFailed(format!("stream {itag} could not be deciphered")))?;

    Ok(format!("{base_url}&{sig_name}={key}"))
}

fn is_provider_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .is_ok_and(|url| url.scheme() == "https" && url.host_str() == Some("www.youtube.com"))
}
