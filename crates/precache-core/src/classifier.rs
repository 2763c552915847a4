//! Admission decision for playback events

use crate::types::PlaybackEvent;
use std::fmt;

/// Library section kind that holds TV series
pub const SHOW_SECTION: &str = "show";

/// Why an event was not admitted for pre-caching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not a play or resume event
    NotPlaybackStart,
    /// Item does not live in a TV show library
    NotShow,
    /// Episode 1 of a season, or any episode of season 1
    FirstEpisodeOrSeason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotPlaybackStart => write!(f, "event is not play/resume"),
            Rejection::NotShow => write!(f, "library section is not a show"),
            Rejection::FirstEpisodeOrSeason => write!(f, "first episode or first season"),
        }
    }
}

/// First rule the event fails, or `None` when it should be pre-cached.
///
/// The ordinal rule is applied literally: any episode numbered 1 and every
/// episode of season 1 is rejected, so a viewer has to get past the start of
/// a show before anything is fetched ahead.
pub fn rejection(event: &PlaybackEvent) -> Option<Rejection> {
    let metadata = &event.metadata;

    if !event.event.is_playback_start() {
        return Some(Rejection::NotPlaybackStart);
    }
    if metadata.library_section_type != SHOW_SECTION {
        return Some(Rejection::NotShow);
    }
    if metadata.index == 1 || metadata.parent_index == 1 {
        return Some(Rejection::FirstEpisodeOrSeason);
    }
    None
}

/// Whether a playback event warrants pre-caching
pub fn admit(event: &PlaybackEvent) -> bool {
    rejection(event).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, EventMetadata};

    fn event(kind: EventKind, section: &str, index: u32, parent_index: u32) -> PlaybackEvent {
        PlaybackEvent {
            event: kind,
            account: None,
            player: None,
            metadata: EventMetadata {
                library_section_type: section.to_string(),
                rating_key: "1005".to_string(),
                parent_rating_key: "1000".to_string(),
                grandparent_rating_key: "900".to_string(),
                index,
                parent_index,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_admits_play_and_resume() {
        assert!(admit(&event(EventKind::Play, "show", 5, 2)));
        assert!(admit(&event(EventKind::Resume, "show", 5, 2)));
    }

    #[test]
    fn test_rejects_other_event_kinds() {
        for kind in [
            EventKind::Pause,
            EventKind::Stop,
            EventKind::Scrobble,
            EventKind::Rate,
            EventKind::Other,
        ] {
            let e = event(kind, "show", 5, 2);
            assert!(!admit(&e));
            assert_eq!(rejection(&e), Some(Rejection::NotPlaybackStart));
        }
    }

    #[test]
    fn test_rejects_non_show_sections() {
        for section in ["movie", "artist", "photo", ""] {
            let e = event(EventKind::Play, section, 5, 2);
            assert_eq!(rejection(&e), Some(Rejection::NotShow));
        }
    }

    #[test]
    fn test_rejects_first_episode_of_any_season() {
        let e = event(EventKind::Play, "show", 1, 3);
        assert_eq!(rejection(&e), Some(Rejection::FirstEpisodeOrSeason));
    }

    #[test]
    fn test_rejects_every_episode_of_first_season() {
        for index in [2, 5, 12] {
            assert!(!admit(&event(EventKind::Play, "show", index, 1)));
        }
    }

    #[test]
    fn test_stop_rejected_regardless_of_other_fields() {
        let e = event(EventKind::Stop, "movie", 1, 1);
        assert_eq!(rejection(&e), Some(Rejection::NotPlaybackStart));
    }
}
