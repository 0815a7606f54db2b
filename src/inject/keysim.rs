//! In-process key simulation backend backed by the `enigo` crate.
//!
//! `enigo` maps to CGEvent on macOS and `SendInput` (Unicode scan codes) on
//! Windows.  On macOS the process must hold the accessibility permission;
//! without it event construction fails and this backend prints a one-shot
//! instruction block, then disables itself so later calls are silent no-ops.

use std::thread;
use std::time::Duration;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::{InjectError, KeystrokeInjector};

// ---------------------------------------------------------------------------
// KeySimInjector
// ---------------------------------------------------------------------------

/// Keystroke backend for macOS and Windows.
///
/// A new [`Enigo`] instance is created for each operation because `Enigo`
/// is not `Send` and the handle is cheap to construct.
pub struct KeySimInjector {
    /// Sleep inserted after each keystroke.
    delay: Duration,
    /// Set after a permission failure; all further calls become no-ops.
    disabled: bool,
}

impl KeySimInjector {
    /// Create a backend with the given per-keystroke delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            disabled: false,
        }
    }

    fn connect(&mut self) -> Option<Enigo> {
        match Enigo::new(&Settings::default()) {
            Ok(enigo) => Some(enigo),
            Err(e) => {
                // On macOS a refused connection means the accessibility
                // permission is missing.
                let err = if cfg!(target_os = "macos") {
                    InjectError::PermissionDenied
                } else {
                    InjectError::KeySimulation(e.to_string())
                };
                self.fail(err);
                None
            }
        }
    }

    /// Record a failure.  On macOS the first failure is assumed to be the
    /// missing accessibility permission and prints the grant instructions;
    /// the backend then disables itself.
    fn fail(&mut self, err: InjectError) {
        if self.disabled {
            return;
        }
        log::warn!("inject: {err}");

        if cfg!(target_os = "macos") {
            log::error!("keystroke injection requires the accessibility permission");
            log::error!("grant it under: System Settings → Privacy & Security → Accessibility");
            log::error!("enable the app that launched scribekey (Terminal, your IDE, …)");
            log::error!("then restart scribekey; injection stays disabled for this run");
        }
        self.disabled = true;
    }

    fn press(&mut self, enigo: &mut Enigo, key: Key) -> bool {
        if let Err(e) = enigo.key(key, Direction::Click) {
            self.fail(InjectError::KeySimulation(e.to_string()));
            return false;
        }
        thread::sleep(self.delay);
        true
    }
}

impl KeystrokeInjector for KeySimInjector {
    fn backspace(&mut self, count: usize) {
        if count == 0 || self.disabled {
            return;
        }
        let Some(mut enigo) = self.connect() else {
            return;
        };

        for _ in 0..count {
            if !self.press(&mut enigo, Key::Backspace) {
                return;
            }
        }
    }

    fn emit(&mut self, text: &str) {
        if text.is_empty() || self.disabled {
            return;
        }
        let Some(mut enigo) = self.connect() else {
            return;
        };

        let lines: Vec<&str> = text.split('\n').collect();
        let last = lines.len() - 1;

        for (i, line) in lines.iter().enumerate() {
            for ch in line.chars() {
                if !self.press(&mut enigo, Key::Unicode(ch)) {
                    return;
                }
            }
            if i < last && !self.press(&mut enigo, Key::Return) {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
