use std::{collections::HashMap, path::PathBuf};

use serde::Serialize;

/// Value of the `file` key when the streaming source holds the player.
const CONNECTED_SENTINEL: &str = "Spotify Active";
/// Value of the `outrate` key while connected but not streaming audio.
const IDLE_SENTINEL: &str = "Not playing";

/// Which kind of source currently owns the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceKind {
    OtherSource,
    SpotifyLike,
}

/// Normalised view of the player status for a single tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackStatus {
    pub source_kind: SourceKind,
    pub is_connected: bool,
    pub is_playing: bool,
    pub title: String,
}

impl PlaybackStatus {
    /// Status reported when the channel cannot be read.
    pub fn error() -> Self {
        Self {
            source_kind: SourceKind::OtherSource,
            is_connected: false,
            is_playing: false,
            title: "Error".to_string(),
        }
    }

    /// The streaming source is connected, whether or not it plays.
    pub fn is_spotify_connected(&self) -> bool {
        self.source_kind == SourceKind::SpotifyLike && self.is_connected
    }

    /// Connected and actively streaming.
    pub fn is_active(&self) -> bool {
        self.is_spotify_connected() && self.is_playing
    }

    /// Builds a status record out of raw `key=value` text.
    pub fn parse(raw: &str) -> Self {
        let fields: HashMap<&str, &str> = raw
            .lines()
            .filter_map(|line| line.split_once('='))
            .collect();

        if fields.get("file").copied() == Some(CONNECTED_SENTINEL) {
            let outrate = fields.get("outrate").copied();
            let is_playing = outrate != Some(IDLE_SENTINEL);
            let title = if is_playing {
                format!("Spotify - {}", outrate.unwrap_or("Unknown"))
            } else {
                "Spotify Inactive".to_string()
            };

            return Self {
                source_kind: SourceKind::SpotifyLike,
                is_connected: true,
                is_playing,
                title,
            };
        }

        let title = fields
            .get("title")
            .or_else(|| fields.get("file"))
            .copied()
            .unwrap_or("Unknown")
            .to_string();

        Self {
            source_kind: SourceKind::OtherSource,
            is_connected: false,
            is_playing: fields.get("state").copied() == Some("play"),
            title,
        }
    }
}

/// Anything that can report the current playback status.
///
/// Implementations never fail: unreadable or malformed input yields
/// [`PlaybackStatus::error`] or a defaulted record.
pub trait StatusSource {
    fn read(&mut self) -> PlaybackStatus;
}

/// Reads the player's `currentsong`-style key/value file.
#[derive(Debug, Clone)]
pub struct FileStatusSource {
    path: PathBuf,
}

impl FileStatusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatusSource for FileStatusSource {
    fn read(&mut self) -> PlaybackStatus {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => PlaybackStatus::parse(&raw),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "failed to read status file");
                PlaybackStatus::error()
            }
        }
    }
}
