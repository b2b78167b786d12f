//! Recording fakes for the capability traits.

use std::{cell::Cell, collections::VecDeque, rc::Rc};

use crate::{
    DisplayController, OverrideCommand, OverrideSource, PlaybackStatus, Result, ShutdownSignal,
    SourceKind, StatusSource, VisualizerSupervisor,
};

pub fn spotify(playing: bool, title: &str) -> PlaybackStatus {
    PlaybackStatus {
        source_kind: SourceKind::SpotifyLike,
        is_connected: true,
        is_playing: playing,
        title: title.to_string(),
    }
}

pub fn disconnected() -> PlaybackStatus {
    PlaybackStatus {
        source_kind: SourceKind::OtherSource,
        is_connected: false,
        is_playing: false,
        title: "Unknown".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct FakeDisplay {
    pub calls: Vec<bool>,
    pub fail: bool,
    /// Panics on the given (1-based) call.
    pub panic_on_call: Option<usize>,
}

impl DisplayController for FakeDisplay {
    fn set_backlight(&mut self, on: bool) -> Result<()> {
        self.calls.push(on);
        if self.panic_on_call == Some(self.calls.len()) {
            panic!("backlight driver exploded");
        }
        if self.fail {
            Err("backlight write failed".into())
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct FakeVisualizer {
    pub starts: usize,
    pub stops: Vec<Option<u32>>,
    pub liveness_checks: usize,
    pub alive: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
    next_id: u32,
}

impl Default for FakeVisualizer {
    fn default() -> Self {
        Self {
            starts: 0,
            stops: Vec::new(),
            liveness_checks: 0,
            alive: true,
            fail_start: false,
            fail_stop: false,
            next_id: 1,
        }
    }
}

impl VisualizerSupervisor for FakeVisualizer {
    type Handle = u32;

    fn start(&mut self) -> Result<u32> {
        self.starts += 1;
        if self.fail_start {
            return Err("spawn failed".into());
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn stop(&mut self, handle: Option<&mut u32>) -> Result<()> {
        self.stops.push(handle.map(|id| *id));
        if self.fail_stop {
            Err("kill failed".into())
        } else {
            Ok(())
        }
    }

    fn is_alive(&mut self, _handle: &mut u32) -> bool {
        self.liveness_checks += 1;
        self.alive
    }
}

/// Replays scripted statuses, repeating the last one, and triggers shutdown
/// after `limit` reads.
pub struct ScriptedStatus {
    script: VecDeque<PlaybackStatus>,
    last: PlaybackStatus,
    reads: Rc<Cell<usize>>,
    limit: usize,
    shutdown: ShutdownSignal,
    panic_on: Option<usize>,
}

impl ScriptedStatus {
    pub fn new(script: Vec<PlaybackStatus>, limit: usize, shutdown: ShutdownSignal) -> Self {
        Self {
            script: script.into(),
            last: disconnected(),
            reads: Rc::new(Cell::new(0)),
            limit,
            shutdown,
            panic_on: None,
        }
    }

    /// Panics on the given (1-based) read.
    pub fn panicking_on(mut self, read: usize) -> Self {
        self.panic_on = Some(read);
        self
    }

    pub fn reads(&self) -> Rc<Cell<usize>> {
        self.reads.clone()
    }
}

impl StatusSource for ScriptedStatus {
    fn read(&mut self) -> PlaybackStatus {
        let count = self.reads.get() + 1;
        self.reads.set(count);
        if count >= self.limit {
            self.shutdown.trigger();
        }
        if self.panic_on == Some(count) {
            panic!("status source exploded");
        }
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last.clone()
    }
}

pub struct FixedOverride(pub OverrideCommand);

impl OverrideSource for FixedOverride {
    fn read(&mut self) -> OverrideCommand {
        self.0
    }
}
