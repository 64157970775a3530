//! Channel/video URL parsing and ISO 8601 duration parsing.
//!
//! Everything in here is pure: no network calls, no database access.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The four channel URL shapes YouTube has used over the years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelUrlKind {
    /// `youtube.com/@name`
    Handle,
    /// `youtube.com/channel/UC...`
    ChannelId,
    /// `youtube.com/c/name`
    Custom,
    /// `youtube.com/user/name`
    User,
}

impl ChannelUrlKind {
    fn path_prefix(self) -> &'static str {
        match self {
            ChannelUrlKind::Handle => "@",
            ChannelUrlKind::ChannelId => "channel/",
            ChannelUrlKind::Custom => "c/",
            ChannelUrlKind::User => "user/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUrl {
    pub kind: ChannelUrlKind,
    pub identifier: String,
    pub normalized_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported YouTube channel URL format: {url}")]
pub struct InvalidChannelUrl {
    pub url: String,
}

static CHANNEL_PATTERNS: Lazy<Vec<(ChannelUrlKind, Regex)>> = Lazy::new(|| {
    [
        (ChannelUrlKind::Handle, r"^https?://(?:www\.)?youtube\.com/@([A-Za-z0-9_-]+)/?$"),
        (ChannelUrlKind::ChannelId, r"^https?://(?:www\.)?youtube\.com/channel/([A-Za-z0-9_-]+)/?$"),
        (ChannelUrlKind::Custom, r"^https?://(?:www\.)?youtube\.com/c/([A-Za-z0-9_-]+)/?$"),
        (ChannelUrlKind::User, r"^https?://(?:www\.)?youtube\.com/user/([A-Za-z0-9_-]+)/?$"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("static channel pattern")))
    .collect()
});

static VIDEO_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?:https?://)?(?:www\.|m\.)?
        (?:
            youtube\.com/watch\?(?:[^\#]*&)?v=
          | youtu\.be/
          | youtube\.com/embed/
          | youtube\.com/shorts/
        )
        ([A-Za-z0-9_-]{11})
        (?:[?&\#/].*)?$
        ",
    )
    .expect("static video pattern")
});

static BARE_VIDEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static bare id pattern"));

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("static duration pattern")
});

pub fn validate_channel_url(url: &str) -> Result<ChannelUrl, InvalidChannelUrl> {
    let trimmed = url.trim();

    CHANNEL_PATTERNS
        .iter()
        .find_map(|(kind, pattern)| {
            pattern.captures(trimmed).map(|caps| {
                let identifier = caps[1].to_string();
                ChannelUrl {
                    kind: *kind,
                    normalized_url: format!(
                        "https://www.youtube.com/{}{}",
                        kind.path_prefix(),
                        identifier
                    ),
                    identifier,
                }
            })
        })
        .ok_or_else(|| InvalidChannelUrl {
            url: trimmed.to_string(),
        })
}

/// Pulls the 11-character video id out of a watch/short/embed URL or a bare id.
pub fn extract_video_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if BARE_VIDEO_ID.is_match(trimmed) {
        return Some(trimmed.to_string());
    }
    VIDEO_ID_PATTERN
        .captures(trimmed)
        .map(|caps| caps[1].to_string())
}

/// Parses a `PT#H#M#S` duration into whole seconds. Every field is optional
/// (`"PT"` is zero); anything else is unparseable.
pub fn parse_duration(duration: &str) -> Option<i64> {
    let caps = DURATION_PATTERN.captures(duration.trim())?;

    let field = |idx: usize, unit: i64| -> Option<i64> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse::<i64>().ok()?.checked_mul(unit),
            None => Some(0),
        }
    };

    field(1, 3600)?
        .checked_add(field(2, 60)?)?
        .checked_add(field(3, 1)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_url_with_trailing_slash() {
        let parsed = validate_channel_url("https://www.youtube.com/@exampleChan/").unwrap();
        assert_eq!(parsed.kind, ChannelUrlKind::Handle);
        assert_eq!(parsed.identifier, "exampleChan");
        assert_eq!(parsed.normalized_url, "https://www.youtube.com/@exampleChan");
    }

    #[test]
    fn test_all_shapes_extract_identifier() {
        let cases = [
            ("https://www.youtube.com/@some_handle", ChannelUrlKind::Handle, "some_handle"),
            (
                "https://youtube.com/channel/UC_x5XG1OV2P6uZZ5FSM9Ttw",
                ChannelUrlKind::ChannelId,
                "UC_x5XG1OV2P6uZZ5FSM9Ttw",
            ),
            ("http://www.youtube.com/c/LegacyName/", ChannelUrlKind::Custom, "LegacyName"),
            ("https://www.youtube.com/user/old-user", ChannelUrlKind::User, "old-user"),
        ];

        for (url, kind, identifier) in cases {
            let parsed = validate_channel_url(url).unwrap();
            assert_eq!(parsed.kind, kind, "{url}");
            assert_eq!(parsed.identifier, identifier, "{url}");
        }
    }

    #[test]
    fn test_equivalent_inputs_normalize_identically() {
        let variants = [
            "https://www.youtube.com/user/old-user",
            "https://www.youtube.com/user/old-user/",
            "http://youtube.com/user/old-user",
            "  https://youtube.com/user/old-user/  ",
        ];
        for url in variants {
            assert_eq!(
                validate_channel_url(url).unwrap().normalized_url,
                "https://www.youtube.com/user/old-user"
            );
        }
    }

    #[test]
    fn test_rejects_unsupported_urls() {
        for url in [
            "",
            "https://vimeo.com/@someone",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/@bad handle",
            "https://www.youtube.com/@name/videos",
            "youtube.com/@missing-scheme",
        ] {
            let err = validate_channel_url(url).unwrap_err();
            assert!(err.to_string().contains("Unsupported"), "{url}");
        }
    }

    #[test]
    fn test_extract_video_id() {
        for input in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=10s",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(input).as_deref(), Some("dQw4w9WgXcQ"), "{input}");
        }

        assert_eq!(extract_video_id("https://www.youtube.com/@channel"), None);
        assert_eq!(extract_video_id("not-a-video-id"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_parse_duration_field_combinations() {
        let cases = [
            ("PT1H30M5S", Some(5405)),
            ("PT1H", Some(3600)),
            ("PT45M", Some(2700)),
            ("PT59S", Some(59)),
            ("PT2H5S", Some(7205)),
            ("PT1H1M", Some(3660)),
            ("PT4M13S", Some(253)),
            ("PT", Some(0)),
            ("PT0S", Some(0)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_duration(input), expected, "{input}");
        }
    }

    #[test]
    fn test_parse_duration_rejects_malformed() {
        for input in ["", "garbage", "P1D", "PT5S1M", "PT1H30M5Sjunk", "1H30M", "PT-5S"] {
            assert_eq!(parse_duration(input), None, "{input}");
        }
    }
}
