use std::process::{Command, Stdio};

use crate::{config::DisplayConfig, Result, SentinelError};

/// Capability to switch the screen backlight.
///
/// Calls are idempotent: the requested state is always written, even when the
/// hardware is believed to already be there.
pub trait DisplayController {
    fn set_backlight(&mut self, on: bool) -> Result<()>;
}

/// Writes to the sysfs `bl_power` node through a shell pipeline, optionally
/// elevated with `sudo`.
#[derive(Debug, Clone)]
pub struct SysfsBacklight {
    config: DisplayConfig,
}

impl SysfsBacklight {
    pub fn new(config: DisplayConfig) -> Self {
        Self { config }
    }

    fn pipeline(&self, on: bool) -> String {
        // bl_power: 0 = unblanked, 1 = powered down
        let value = if on { 0 } else { 1 };
        let sudo = if self.config.use_sudo { "sudo " } else { "" };
        format!("echo {value} | {sudo}tee {}", self.config.power_path)
    }
}

impl DisplayController for SysfsBacklight {
    fn set_backlight(&mut self, on: bool) -> Result<()> {
        let pipeline = self.pipeline(on);
        let status = Command::new("sh")
            .arg("-c")
            .arg(&pipeline)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if !status.success() {
            return Err(SentinelError::CommandFailed {
                command: pipeline,
                status,
            });
        }

        tracing::debug!(on, "backlight updated");
        Ok(())
    }
}
