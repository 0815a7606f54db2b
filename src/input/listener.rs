//! Dedicated OS-thread key listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`KeyListener`] owns that thread and a stop flag; dropping it sets the
//! flag so the callback silently ignores further events.
//!
//! Unlike a plain push-to-talk listener, *every* key press is forwarded:
//! the trigger key drives start/stop, and any other press becomes
//! [`InputEvent::OtherKeyPressed`] so the router can abort keyboard-origin
//! recordings.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  Setting the stop flag
//! prevents events from being forwarded, but the OS thread itself will
//! remain blocked in the rdev event loop until the process exits.  This is
//! safe and expected — rdev holds no resources that need explicit cleanup.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};

use super::InputEvent;

// ---------------------------------------------------------------------------
// KeyListener
// ---------------------------------------------------------------------------

/// Handle to a running key listener thread.
///
/// Construct one with [`KeyListener::start`].  Drop it to stop forwarding
/// events.
pub struct KeyListener {
    /// Shared stop flag — set `true` on [`Drop`].
    stop: Arc<AtomicBool>,
    /// The thread handle.  Kept alive so the thread is not detached
    /// prematurely; we never `join` it because `rdev::listen` never returns.
    _thread: std::thread::JoinHandle<()>,
}

impl KeyListener {
    /// Spawn a dedicated OS thread that watches global key events and
    /// forwards them on `tx`: trigger press/release for `trigger`, and
    /// `OtherKeyPressed` for everything else going down.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn start(trigger: rdev::Key, tx: mpsc::Sender<InputEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("key-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    // Bail out if the listener has been stopped.
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }

                    match event.event_type {
                        rdev::EventType::KeyPress(k) if k == trigger => {
                            let _ = tx.send(InputEvent::TriggerPressed);
                        }
                        rdev::EventType::KeyPress(_) => {
                            let _ = tx.send(InputEvent::OtherKeyPressed);
                        }
                        rdev::EventType::KeyRelease(k) if k == trigger => {
                            let _ = tx.send(InputEvent::TriggerReleased);
                        }
                        _ => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("key-listener: rdev::listen exited with error: {e:?}");
                }
            })
            .expect("failed to spawn key-listener thread");

        Self {
            stop,
            _thread: thread,
        }
    }
}

impl Drop for KeyListener {
    /// Set the stop flag so the rdev callback stops forwarding events.
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // The OS thread continues to exist blocked inside rdev::listen until
        // the process exits — this is safe and requires no further cleanup.
    }
}
