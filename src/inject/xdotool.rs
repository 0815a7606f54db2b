//! X11 keystroke backend shelling out to the external `xdotool` binary.
//!
//! `xdotool` handles the per-keystroke pacing itself via `--delay`, so this
//! backend forwards the configured delay instead of sleeping in-process.
//! Newlines cannot be passed to `xdotool type`; [`XdotoolInjector::emit`]
//! splits on `'\n'` and sends a Return key event between lines.

use std::process::Command;
use std::time::Duration;

use super::{InjectError, KeystrokeInjector};

// ---------------------------------------------------------------------------
// XdotoolInjector
// ---------------------------------------------------------------------------

/// Keystroke backend for Linux / X11 using the external `xdotool` binary.
///
/// Every operation spawns a short-lived `xdotool` process.  A missing
/// binary or a nonzero exit is logged once per call and otherwise ignored.
pub struct XdotoolInjector {
    /// Inter-keystroke delay in milliseconds, forwarded as `--delay`.
    delay_ms: u64,
}

impl XdotoolInjector {
    /// Create a backend with the given per-keystroke delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay_ms: delay.as_millis().max(1) as u64,
        }
    }

    fn run(&self, args: &[&str]) -> Result<(), InjectError> {
        let output = Command::new("xdotool")
            .args(args)
            .output()
            .map_err(|e| InjectError::Xdotool(e.to_string()))?;

        if !output.status.success() {
            return Err(InjectError::Xdotool(format!(
                "exit {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl KeystrokeInjector for XdotoolInjector {
    fn backspace(&mut self, count: usize) {
        if count == 0 {
            return;
        }

        let delay = self.delay_ms.to_string();
        let repeat = count.to_string();
        if let Err(e) = self.run(&[
            "key",
            "--delay",
            &delay,
            "--repeat",
            &repeat,
            "BackSpace",
        ]) {
            log::warn!("inject: backspace({count}) failed: {e}");
        }
    }

    fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let delay = self.delay_ms.to_string();
        let lines: Vec<&str> = text.split('\n').collect();
        let last = lines.len() - 1;

        for (i, line) in lines.iter().enumerate() {
            if !line.is_empty() {
                if let Err(e) = self.run(&["type", "--delay", &delay, line]) {
                    log::warn!("inject: emit line failed: {e}");
                }
            }
            // Interior newline → Return keystroke.
            if i < last {
                if let Err(e) = self.run(&["key", "Return"]) {
                    log::warn!("inject: Return failed: {e}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
