use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    config::PollConfig, DisplayController, OverrideSource, ReconciliationEngine, Result,
    SentinelError, StatusSource, VisualizerSupervisor,
};

const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Cloneable stop flag shared between the poll loop and a signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps for up to `timeout`, waking early once triggered. Returns
    /// whether shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_triggered() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}

/// Drives the engine at a fixed cadence until shutdown is requested.
///
/// Each tick runs behind its own error boundary; a failed tick is logged and
/// followed by the longer backoff delay instead of the regular interval.
pub struct PollLoop<S, O, D, V: VisualizerSupervisor> {
    status: S,
    overrides: O,
    engine: ReconciliationEngine<D, V>,
    config: PollConfig,
    shutdown: ShutdownSignal,
    consecutive_failures: u32,
}

impl<S, O, D, V> PollLoop<S, O, D, V>
where
    S: StatusSource,
    O: OverrideSource,
    D: DisplayController,
    V: VisualizerSupervisor,
{
    pub fn new(
        status: S,
        overrides: O,
        engine: ReconciliationEngine<D, V>,
        config: PollConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            status,
            overrides,
            engine,
            config,
            shutdown,
            consecutive_failures: 0,
        }
    }

    pub fn engine(&self) -> &ReconciliationEngine<D, V> {
        &self.engine
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Blanks the screen, ticks until shutdown, then runs cleanup.
    pub fn run(&mut self) {
        tracing::info!(
            interval_ms = self.config.interval_ms,
            backoff_ms = self.config.backoff_ms,
            "poll loop starting"
        );
        let engine = &mut self.engine;
        if let Err(err) = guarded(|| engine.initialize()) {
            tracing::error!(%err, "startup blank failed, continuing");
        }

        while !self.shutdown.is_triggered() {
            let delay = self.next_delay();
            if self.shutdown.wait(delay) {
                break;
            }
        }

        tracing::info!("poll loop stopping, restoring screen and stopping visualizer");
        let engine = &mut self.engine;
        if let Err(err) = guarded(|| engine.shutdown()) {
            tracing::error!(%err, "cleanup aborted");
        }
    }

    /// Runs one guarded tick and returns how long to wait before the next.
    pub fn next_delay(&mut self) -> Duration {
        match self.run_once() {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(failures = self.consecutive_failures, "tick recovered");
                }
                self.consecutive_failures = 0;
                self.config.interval()
            }
            Err(err) => {
                self.consecutive_failures += 1;
                tracing::error!(%err, failures = self.consecutive_failures, "tick failed, backing off");
                self.config.backoff()
            }
        }
    }

    /// Reads both channels and ticks the engine once.
    pub fn run_once(&mut self) -> Result<()> {
        let Self {
            status,
            overrides,
            engine,
            ..
        } = self;

        guarded(|| {
            let current = status.read();
            let command = overrides.read();
            engine.tick(&current, command);
        })
    }
}

/// Runs `f`, turning a panic into an error.
fn guarded(f: impl FnOnce()) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| SentinelError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::EngineState,
        testing::{spotify, FakeDisplay, FakeVisualizer, FixedOverride, ScriptedStatus},
        OverrideCommand,
    };

    fn fast_config() -> PollConfig {
        PollConfig {
            interval_ms: 1,
            backoff_ms: 5,
        }
    }

    fn engine() -> ReconciliationEngine<FakeDisplay, FakeVisualizer> {
        ReconciliationEngine::with_state(
            FakeDisplay::default(),
            FakeVisualizer::default(),
            Duration::from_secs(300),
            EngineState::new(Instant::now()),
        )
    }

    #[test]
    fn wait_returns_early_when_triggered() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait(Duration::from_millis(5)));

        signal.clone().trigger();
        let started = Instant::now();
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn runs_ticks_until_shutdown_then_cleans_up() {
        let shutdown = ShutdownSignal::new();
        let status = ScriptedStatus::new(vec![spotify(true, "A")], 3, shutdown.clone());
        let reads = status.reads();
        let mut poll = PollLoop::new(
            status,
            FixedOverride(OverrideCommand::None),
            engine(),
            fast_config(),
            shutdown,
        );

        poll.run();

        assert_eq!(reads.get(), 3);
        let engine = poll.engine();
        // startup blank, playing unblank, shutdown unblank
        assert_eq!(engine.display().calls, [false, true, true]);
        assert_eq!(engine.visualizer().starts, 1);
        assert_eq!(engine.visualizer().stops, [Some(1), None]);
        assert!(engine.state().screen_on);
        assert!(!engine.state().visualizer_running);
    }

    #[test]
    fn panicking_startup_blank_still_reaches_cleanup() {
        let shutdown = ShutdownSignal::new();
        let status = ScriptedStatus::new(vec![spotify(true, "A")], 2, shutdown.clone());
        let reads = status.reads();
        let mut engine = engine();
        engine.display_mut().panic_on_call = Some(1);
        let mut poll = PollLoop::new(
            status,
            FixedOverride(OverrideCommand::None),
            engine,
            fast_config(),
            shutdown,
        );

        poll.run();

        assert_eq!(reads.get(), 2);
        let engine = poll.engine();
        // startup blank panicked, playing unblank, shutdown unblank
        assert_eq!(engine.display().calls, [false, true, true]);
        assert_eq!(engine.visualizer().stops, [Some(1), None]);
        assert!(engine.state().screen_on);
    }

    #[test]
    fn panicking_tick_backs_off_and_loop_continues() {
        let shutdown = ShutdownSignal::new();
        let status = ScriptedStatus::new(vec![spotify(true, "A")], 10, shutdown.clone())
            .panicking_on(1);
        let mut poll = PollLoop::new(
            status,
            FixedOverride(OverrideCommand::None),
            engine(),
            fast_config(),
            shutdown,
        );

        assert!(matches!(poll.run_once(), Err(SentinelError::Panicked(_))));

        let delay = poll.next_delay();
        assert_eq!(delay, Duration::from_millis(1));
        assert_eq!(poll.consecutive_failures(), 0);
        assert!(poll.engine().state().screen_on);
    }

    #[test]
    fn failures_use_backoff_delay() {
        let shutdown = ShutdownSignal::new();
        let status =
            ScriptedStatus::new(vec![spotify(true, "A")], 10, shutdown.clone()).panicking_on(1);
        let mut poll = PollLoop::new(
            status,
            FixedOverride(OverrideCommand::None),
            engine(),
            fast_config(),
            shutdown,
        );

        assert_eq!(poll.next_delay(), Duration::from_millis(5));
        assert_eq!(poll.consecutive_failures(), 1);
    }

    #[test]
    fn extracts_panic_messages() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");

        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
