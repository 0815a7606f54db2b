//! Keystroke injection — platform-abstracted backspace/emit primitives.
//!
//! # Overview
//!
//! The stream processor mutates the user's visible text exclusively through
//! two operations:
//!
//! 1. **backspace(n)** — erase the last `n` characters.
//! 2. **emit(text)** — type `text` at the cursor, pressing Return for each
//!    interior newline.
//!
//! Both operations pace their keystrokes with a delay derived from the
//! configured rate (keystrokes/second).  Backends:
//!
//! | Backend | Platform | Mechanism |
//! |---------|----------|-----------|
//! | [`XdotoolInjector`] | Linux / X11 | external `xdotool` process |
//! | [`KeySimInjector`]  | macOS / Windows | `enigo` (CGEvent / SendInput) |
//! | [`NoopInjector`]    | test harness / unsupported | logs, delivers nothing |
//!
//! Injection failures are logged and swallowed — the injector never
//! propagates an error to its caller.  A partial failure during `emit`
//! leaves the screen potentially out of sync with the segment store; the
//! coordinator treats delivery as best-effort.

pub mod keysim;
pub mod noop;
pub mod xdotool;

pub use keysim::KeySimInjector;
pub use noop::NoopInjector;
pub use xdotool::XdotoolInjector;

#[cfg(test)]
pub use noop::{InjectorOp, MockInjector};

use std::time::Duration;

use thiserror::Error;

use crate::config::{InjectBackend, InjectConfig};

// ---------------------------------------------------------------------------
// InjectError
// ---------------------------------------------------------------------------

/// Errors that can surface inside a keystroke backend.
///
/// These never escape the injector — each backend logs and continues — but
/// backends share the taxonomy so log lines stay uniform.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The external `xdotool` binary could not be spawned or exited nonzero.
    #[error("xdotool invocation failed: {0}")]
    Xdotool(String),

    /// The in-process key simulation backend rejected an event.
    #[error("key simulation failed: {0}")]
    KeySimulation(String),

    /// The OS denied the keystroke-injection capability (macOS accessibility).
    #[error("keystroke injection permission denied")]
    PermissionDenied,
}

// ---------------------------------------------------------------------------
// KeystrokeInjector trait
// ---------------------------------------------------------------------------

/// Capability set shared by all keystroke backends.
///
/// Implementations must be `Send` so the coordinator (which owns the
/// injector) can move to the output-worker thread.
///
/// # Contract
///
/// - `backspace(0)` is a no-op.
/// - `emit` splits on `'\n'` and presses Return for each interior newline.
/// - Neither operation returns an error; failures are logged internally.
pub trait KeystrokeInjector: Send {
    /// Erase the last `count` characters with BackSpace keystrokes.
    fn backspace(&mut self, count: usize);

    /// Type `text` at the current cursor position.
    fn emit(&mut self, text: &str);
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Convert a keystroke rate in Hz to the per-keystroke delay.
///
/// Rates at or below zero fall back to the 5 ms default.
pub(crate) fn delay_from_rate(rate_hz: f64) -> Duration {
    if rate_hz > 0.0 {
        Duration::from_secs_f64(1.0 / rate_hz)
    } else {
        Duration::from_millis(5)
    }
}

/// Returns `true` when keystrokes must not reach the real keyboard.
///
/// Covers `cargo test` builds of this crate and the explicit
/// `SCRIBEKEY_TEST_MODE=1` escape hatch used by out-of-process harnesses.
fn test_harness_active() -> bool {
    cfg!(test) || std::env::var("SCRIBEKEY_TEST_MODE").as_deref() == Ok("1")
}

/// One-time startup selection of the keystroke backend.
///
/// `InjectBackend::Auto` probes the environment: a detected test harness
/// gets [`NoopInjector`]; Linux gets [`XdotoolInjector`]; macOS and Windows
/// get [`KeySimInjector`]; anything else degrades to [`NoopInjector`] with
/// a warning.
pub fn select_injector(config: &InjectConfig) -> Box<dyn KeystrokeInjector> {
    let delay = delay_from_rate(config.keystroke_rate_hz);

    match config.backend {
        InjectBackend::Xdotool => Box::new(XdotoolInjector::new(delay)),
        InjectBackend::KeySim => Box::new(KeySimInjector::new(delay)),
        InjectBackend::Noop => Box::new(NoopInjector::new()),
        InjectBackend::Auto => {
            if test_harness_active() {
                log::info!("inject: test harness detected, using no-op backend");
                return Box::new(NoopInjector::new());
            }
            if cfg!(target_os = "linux") {
                Box::new(XdotoolInjector::new(delay))
            } else if cfg!(any(target_os = "macos", target_os = "windows")) {
                Box::new(KeySimInjector::new(delay))
            } else {
                log::warn!("inject: no keystroke backend for this platform, using no-op");
                Box::new(NoopInjector::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
