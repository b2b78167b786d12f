use std::time::{Duration, Instant};

use crate::{
    config::EngineConfig, DisplayController, OverrideCommand, PlaybackStatus,
    VisualizerSupervisor,
};

/// Everything the engine remembers between ticks.
#[derive(Debug)]
pub struct EngineState<H> {
    /// Whether the visualizer is believed to be alive.
    pub visualizer_running: bool,
    /// Title observed when the visualizer was last (re)started.
    pub last_known_title: String,
    /// Last backlight state that was successfully commanded.
    pub screen_on: bool,
    /// Last instant playback was seen actively playing. Never moves back.
    pub last_active: Instant,
    /// Owned visualizer process; present only while it is believed alive.
    pub child: Option<H>,
}

impl<H> EngineState<H> {
    /// Screen off, visualizer stopped.
    pub fn new(started_at: Instant) -> Self {
        Self {
            visualizer_running: false,
            last_known_title: String::new(),
            screen_on: false,
            last_active: started_at,
            child: None,
        }
    }
}

/// Merges playback status, the manual override and visualizer liveness into
/// visualizer lifecycle and backlight actions.
///
/// Ticks must be issued serially; the engine has no internal locking. State
/// only advances after the matching capability call succeeds, so a failed
/// call is simply retried on the next tick.
pub struct ReconciliationEngine<D, V: VisualizerSupervisor> {
    display: D,
    visualizer: V,
    state: EngineState<V::Handle>,
    inactivity_timeout: Duration,
}

impl<D, V> ReconciliationEngine<D, V>
where
    D: DisplayController,
    V: VisualizerSupervisor,
{
    pub fn new(display: D, visualizer: V, config: &EngineConfig) -> Self {
        Self::with_state(
            display,
            visualizer,
            config.inactivity_timeout(),
            EngineState::new(Instant::now()),
        )
    }

    /// Builds an engine around an explicit state, e.g. one restored for a
    /// test scenario.
    pub fn with_state(
        display: D,
        visualizer: V,
        inactivity_timeout: Duration,
        state: EngineState<V::Handle>,
    ) -> Self {
        Self {
            display,
            visualizer,
            state,
            inactivity_timeout,
        }
    }

    pub fn state(&self) -> &EngineState<V::Handle> {
        &self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn visualizer(&self) -> &V {
        &self.visualizer
    }

    pub fn visualizer_mut(&mut self) -> &mut V {
        &mut self.visualizer
    }

    /// Forces the screen off so the daemon starts from a known condition.
    pub fn initialize(&mut self) {
        tracing::info!("blanking screen on startup");
        self.apply_backlight(false, "startup");
    }

    pub fn tick(&mut self, status: &PlaybackStatus, command: OverrideCommand) {
        self.tick_at(status, command, Instant::now());
    }

    /// Runs one reconciliation pass as if the current time were `now`.
    pub fn tick_at(&mut self, status: &PlaybackStatus, command: OverrideCommand, now: Instant) {
        tracing::debug!(
            source = ?status.source_kind,
            connected = status.is_connected,
            playing = status.is_playing,
            title = %status.title,
            visualizer_running = self.state.visualizer_running,
            screen_on = self.state.screen_on,
            "tick"
        );

        self.reconcile_visualizer(status);
        self.reconcile_backlight(status, command, now);
    }

    /// Best-effort cleanup: screen on, owned visualizer stopped, then any
    /// stray process matching the visualizer's role.
    pub fn shutdown(&mut self) {
        self.apply_backlight(true, "shutdown");

        if let Some(mut child) = self.state.child.take() {
            if let Err(err) = self.visualizer.stop(Some(&mut child)) {
                tracing::warn!(%err, "failed to stop visualizer during shutdown");
            }
        }
        self.state.visualizer_running = false;

        if let Err(err) = self.visualizer.stop(None) {
            tracing::warn!(%err, "failed to sweep visualizer processes during shutdown");
        }
    }

    fn reconcile_visualizer(&mut self, status: &PlaybackStatus) {
        let connected = status.is_spotify_connected();
        let state = &mut self.state;

        if connected && !state.visualizer_running {
            tracing::info!(title = %status.title, "source connected, starting visualizer");
            match self.visualizer.start() {
                Ok(handle) => {
                    state.visualizer_running = true;
                    state.last_known_title = status.title.clone();
                    state.child = Some(handle);
                }
                Err(err) => tracing::warn!(%err, "failed to start visualizer"),
            }
        } else if !connected && state.visualizer_running {
            tracing::info!("source disconnected, stopping visualizer");
            match self.visualizer.stop(state.child.as_mut()) {
                Ok(()) => {
                    state.visualizer_running = false;
                    state.child = None;
                }
                Err(err) => tracing::warn!(%err, "failed to stop visualizer"),
            }
        } else if connected && status.title != state.last_known_title {
            // A title change is the only cue to look at the process; an alive
            // but wedged visualizer is not detected.
            let alive = match state.child.as_mut() {
                Some(handle) => self.visualizer.is_alive(handle),
                None => false,
            };
            if !alive {
                tracing::info!(title = %status.title, "visualizer died, restarting on next tick");
                state.visualizer_running = false;
                state.child = None;
                state.last_known_title = status.title.clone();
            }
        }
    }

    fn reconcile_backlight(
        &mut self,
        status: &PlaybackStatus,
        command: OverrideCommand,
        now: Instant,
    ) {
        match command {
            OverrideCommand::ForceOff if self.state.screen_on => {
                self.apply_backlight(false, "manual override");
                return;
            }
            OverrideCommand::ForceOn if !self.state.screen_on => {
                self.apply_backlight(true, "manual override");
                return;
            }
            _ => {}
        }

        if status.is_active() {
            self.state.last_active = self.state.last_active.max(now);
            if !self.state.screen_on {
                self.apply_automatic(true, "playing", command);
            }
        } else if status.is_spotify_connected() {
            let inactivity = now.saturating_duration_since(self.state.last_active);
            if inactivity > self.inactivity_timeout && self.state.screen_on {
                tracing::info!(idle_secs = inactivity.as_secs(), "playback idle past timeout");
                self.apply_automatic(false, "idle", command);
            }
        } else if self.state.screen_on {
            self.apply_automatic(false, "disconnected", command);
        }
    }

    /// Automatic rules never move the screen away from an active override.
    fn apply_automatic(&mut self, on: bool, reason: &'static str, command: OverrideCommand) {
        let held = match command {
            OverrideCommand::ForceOn => !on,
            OverrideCommand::ForceOff => on,
            OverrideCommand::None => false,
        };
        if held {
            tracing::debug!(reason, ?command, "automatic backlight change held by override");
            return;
        }
        self.apply_backlight(on, reason);
    }

    fn apply_backlight(&mut self, on: bool, reason: &'static str) {
        match self.display.set_backlight(on) {
            Ok(()) => {
                self.state.screen_on = on;
                tracing::info!(reason, "screen {}", if on { "on" } else { "off" });
            }
            Err(err) => tracing::warn!(%err, on, reason, "failed to switch backlight"),
        }
    }
}
