/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Derives the tile grid from the current streams.

use serde::Serialize;

use crate::media::MediaStream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TileContent {
    Video { stream_id: String },
    Placeholder { initials: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tile {
    /// `None` for the local tile.
    pub peer_id: Option<String>,
    pub name: String,
    pub content: TileContent,
}

impl Tile {
    pub fn is_local(&self) -> bool {
        self.peer_id.is_none()
    }

    pub fn shows_video(&self) -> bool {
        matches!(self.content, TileContent::Video { .. })
    }
}

/// One remote participant to lay out.
#[derive(Debug, Clone, Copy)]
pub struct RemoteTile<'a> {
    pub peer_id: &'a str,
    pub name: &'a str,
    pub stream: Option<&'a MediaStream>,
}

/// Local tile first, then remote tiles ordered by peer id.
pub fn compute_tiles(
    local_name: &str,
    local_stream: Option<&MediaStream>,
    remotes: &[RemoteTile<'_>],
) -> Vec<Tile> {
    let mut remotes = remotes.to_vec();
    remotes.sort_by(|a, b| a.peer_id.cmp(b.peer_id));

    std::iter::once(tile(None, local_name, local_stream))
        .chain(
            remotes
                .iter()
                .map(|r| tile(Some(r.peer_id.to_string()), r.name, r.stream)),
        )
        .collect()
}

fn tile(peer_id: Option<String>, name: &str, stream: Option<&MediaStream>) -> Tile {
    let content = match stream {
        Some(stream) if stream.has_enabled_video() => TileContent::Video {
            stream_id: stream.id().to_string(),
        },
        _ => TileContent::Placeholder {
            initials: initials(name),
        },
    };
    Tile {
        peer_id,
        name: name.to_string(),
        content,
    }
}

/// First letter of up to two words, uppercased. `?` for an empty name.
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "?".to_string()
    } else {
        letters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaTrack, TrackKind, TrackSource};

    fn video_stream(id: &str) -> (MediaStream, MediaTrack) {
        let track = MediaTrack::new(format!("{id}-v"), TrackKind::Video, TrackSource::Remote);
        (MediaStream::with_tracks(id, vec![track.clone()]), track)
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("Ada Lovelace"), "AL");
        assert_eq!(initials("grace"), "G");
        assert_eq!(initials("  john   ronald reuel tolkien "), "JR");
        assert_eq!(initials(""), "?");
        assert_eq!(initials("   "), "?");
        assert_eq!(initials("\u{e9}mile zola"), "\u{c9}Z");
    }

    #[test]
    fn test_local_first_then_sorted_remotes() {
        let (b, _) = video_stream("sb");
        let tiles = compute_tiles(
            "Me",
            None,
            &[
                RemoteTile {
                    peer_id: "c3",
                    name: "Carol",
                    stream: None,
                },
                RemoteTile {
                    peer_id: "b2",
                    name: "Bob",
                    stream: Some(&b),
                },
            ],
        );
        let ids: Vec<_> = tiles.iter().map(|t| t.peer_id.as_deref()).collect();
        assert_eq!(ids, vec![None, Some("b2"), Some("c3")]);
        assert!(tiles[0].is_local());
        assert_eq!(
            tiles[0].content,
            TileContent::Placeholder {
                initials: "M".into()
            }
        );
        assert_eq!(
            tiles[1].content,
            TileContent::Video {
                stream_id: "sb".into()
            }
        );
        assert!(!tiles[2].shows_video());
    }

    #[test]
    fn test_disabled_or_ended_video_is_placeholder() {
        let (stream, track) = video_stream("s");
        let remote = [RemoteTile {
            peer_id: "b2",
            name: "Bob Smith",
            stream: Some(&stream),
        }];
        assert!(compute_tiles("Me", None, &remote)[1].shows_video());

        track.set_enabled(false);
        assert_eq!(
            compute_tiles("Me", None, &remote)[1].content,
            TileContent::Placeholder {
                initials: "BS".into()
            }
        );

        track.set_enabled(true);
        track.stop();
        assert!(!compute_tiles("Me", None, &remote)[1].shows_video());
    }

    #[test]
    fn test_audio_only_stream_is_placeholder() {
        let mic = MediaTrack::new("a", TrackKind::Audio, TrackSource::Microphone);
        let stream = MediaStream::with_tracks("local", vec![mic]);
        let tiles = compute_tiles("Me", Some(&stream), &[]);
        assert_eq!(tiles.len(), 1);
        assert!(!tiles[0].shows_video());
    }
}
