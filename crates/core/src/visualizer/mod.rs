use std::{
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::{config::VisualizerConfig, Result, SentinelError};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Start/stop/liveness capability for the companion visualizer process.
pub trait VisualizerSupervisor {
    /// Opaque ownership token for a launched process.
    type Handle;

    /// Launches the visualizer. May sleep for a short, bounded settle delay
    /// first.
    fn start(&mut self) -> Result<Self::Handle>;

    /// Terminates the process behind `handle`, or every process matching the
    /// visualizer's role when no handle is available.
    fn stop(&mut self, handle: Option<&mut Self::Handle>) -> Result<()>;

    fn is_alive(&mut self, handle: &mut Self::Handle) -> bool;
}

/// Supervises the visualizer as a real OS process.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    config: VisualizerConfig,
}

impl ProcessSupervisor {
    pub fn new(config: VisualizerConfig) -> Self {
        Self { config }
    }

    fn spawn_command(&self) -> Command {
        let mut cmd = Command::new("sh");
        // exec so the recorded pid is the visualizer itself, not the shell
        cmd.arg("-c")
            .arg(format!("exec {}", self.config.command))
            .stdin(Stdio::null());
        if let Some(display) = &self.config.display_env {
            cmd.env("DISPLAY", display);
        }
        cmd
    }

    fn pkill_command(&self) -> Command {
        let mut cmd = if self.config.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("pkill");
            cmd
        } else {
            Command::new("pkill")
        };
        cmd.arg("-f")
            .arg(&self.config.match_pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    fn sigterm_command(&self, pid: u32) -> Command {
        let mut cmd = Command::new("kill");
        cmd.arg("-TERM")
            .arg(pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    fn terminate(&self, child: &mut Child) -> Result<()> {
        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!(pid = child.id(), ?status, "visualizer already exited");
            return Ok(());
        }

        let pid = child.id();
        tracing::debug!(pid, "sending SIGTERM to visualizer");
        match self.sigterm_command(pid).status() {
            Ok(status) if !status.success() => {
                tracing::warn!(pid, ?status, "kill -TERM reported failure");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(pid, %err, "failed to send SIGTERM"),
        }

        let deadline = Instant::now() + self.config.stop_grace();
        while Instant::now() < deadline {
            thread::sleep(STOP_POLL_INTERVAL);
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(pid, ?status, "visualizer exited after SIGTERM");
                    return Ok(());
                }
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(pid, %err, "error checking visualizer status");
                    break;
                }
            }
        }

        tracing::warn!(pid, "visualizer ignored SIGTERM, killing");
        child.kill()?;
        child.wait()?;
        Ok(())
    }

    fn kill_by_role(&self) -> Result<()> {
        let mut cmd = self.pkill_command();
        let status = cmd.status()?;
        // pkill exits 1 when nothing matched
        match status.code() {
            Some(0) | Some(1) => Ok(()),
            _ => Err(SentinelError::CommandFailed {
                command: format!("pkill -f {}", self.config.match_pattern),
                status,
            }),
        }
    }
}

impl VisualizerSupervisor for ProcessSupervisor {
    type Handle = Child;

    fn start(&mut self) -> Result<Child> {
        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let child = self
            .spawn_command()
            .spawn()
            .map_err(|source| SentinelError::Spawn {
                command: self.config.command.clone(),
                source,
            })?;
        tracing::debug!(pid = child.id(), "visualizer spawned");
        Ok(child)
    }

    fn stop(&mut self, handle: Option<&mut Child>) -> Result<()> {
        match handle {
            Some(child) => self.terminate(child),
            None => self.kill_by_role(),
        }
    }

    fn is_alive(&mut self, handle: &mut Child) -> bool {
        match handle.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(err) => {
                tracing::warn!(pid = handle.id(), %err, "error checking visualizer status");
                false
            }
        }
    }
}
