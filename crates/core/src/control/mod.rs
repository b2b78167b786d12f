use std::path::PathBuf;

use serde::Serialize;

/// Manual command that forces the backlight regardless of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OverrideCommand {
    ForceOn,
    ForceOff,
    #[default]
    None,
}

impl OverrideCommand {
    /// Interprets the channel contents; anything but `ON`/`OFF` is `None`.
    pub fn parse(raw: &str) -> Self {
        let token = raw.trim();
        if token.eq_ignore_ascii_case("on") {
            Self::ForceOn
        } else if token.eq_ignore_ascii_case("off") {
            Self::ForceOff
        } else {
            Self::None
        }
    }
}

/// Anything that can report the manual override. Never fails.
pub trait OverrideSource {
    fn read(&mut self) -> OverrideCommand;
}

/// Control file holding a single `ON` or `OFF` token.
#[derive(Debug, Clone)]
pub struct FileOverrideSource {
    path: PathBuf,
}

impl FileOverrideSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OverrideSource for FileOverrideSource {
    fn read(&mut self) -> OverrideCommand {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return OverrideCommand::None;
            }
            Err(err) => {
                tracing::debug!(path = %self.path.display(), %err, "override channel unreadable");
                return OverrideCommand::None;
            }
        };

        let command = OverrideCommand::parse(&raw);
        if command != OverrideCommand::None {
            tracing::info!(?command, "manual override detected");
        }
        command
    }
}
