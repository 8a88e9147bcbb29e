//! Video-id extraction from user-supplied URIs.

use url::Url;

/// Extract a video id from a URI across the known host and scheme shapes.
///
/// Returns `(found, video_id)`:
/// - `youtube.com` / `www.youtube.com`: the `v` query parameter, falling
///   back to the last path segment for embed-style URLs;
/// - `youtu.be`: the first path segment;
/// - `yt:` / `youtube:` schemes: the host portion of the original URI,
///   case preserved (ids are case sensitive);
/// - anything else: `(false, None)`.
pub fn parse_uri(uri: &str) -> (bool, Option<String>) {
    let Ok(parsed) = Url::parse(uri) else {
        return (false, None);
    };

    let video_id = match parsed.host_str() {
        Some("youtube.com" | "www.youtube.com") => parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .or_else(|| last_path_segment(&parsed)),
        Some("youtu.be") => first_path_segment(&parsed),
        _ => match parsed.scheme() {
            "yt" | "youtube" => raw_host(uri),
            _ => None,
        },
    };

    (video_id.is_some(), video_id)
}

fn first_path_segment(parsed: &Url) -> Option<String> {
    parsed
        .path_segments()?
        .find(|segment| !segment.is_empty())
        .map(ToString::to_string)
}

fn last_path_segment(parsed: &Url) -> Option<String> {
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(ToString::to_string)
}

/// Slice the host out of the raw input rather than the parsed URL, since
/// normalization may fold the case that the id depends on.
fn raw_host(uri: &str) -> Option<String> {
    let (_, rest) = uri.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let host = &rest[..end];
    (!host.is_empty()).then(|| host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_link() {
        assert_eq!(
            parse_uri("https://youtu.be/dQw4w9WgXcQ"),
            (true, Some("dQw4w9WgXcQ".to_string()))
        );
    }

    #[test]
    fn test_watch_query() {
        assert_eq!(
            parse_uri("https://www.youtube.com/watch?v=abc123"),
            (true, Some("abc123".to_string()))
        );
        assert_eq!(
            parse_uri("https://youtube.com/watch?v=abc123&t=42"),
            (true, Some("abc123".to_string()))
        );
    }

    #[test]
    fn test_embed_path() {
        assert_eq!(
            parse_uri("https://www.youtube.com/embed/xyz789"),
            (true, Some("xyz789".to_string()))
        );
    }

    #[test]
    fn test_custom_scheme_preserves_case() {
        assert_eq!(parse_uri("yt://My_Id"), (true, Some("My_Id".to_string())));
        assert_eq!(
            parse_uri("youtube://CaSeD"),
            (true, Some("CaSeD".to_string()))
        );
    }

    #[test]
    fn test_unrelated_host() {
        assert_eq!(parse_uri("https://example.com/x"), (false, None));
    }

    #[test]
    fn test_garbage_input() {
        assert_eq!(parse_uri("not a uri"), (false, None));
    }
}
