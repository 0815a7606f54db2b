//! Input routing — keyboard trigger, POSIX signals and tray actions.
//!
//! All input paths converge on one typed [`InputEvent`] channel consumed
//! by the [`InputRouter`], which runs the recording state machine:
//!
//! ```text
//! IDLE ──trigger down / signal / tray start──▶ RECORDING
//! RECORDING ──trigger up / SIGHUP / tray stop──▶ dispatch to scheduler
//! RECORDING ──any other key (keyboard origin)──▶ IDLE (abort, audio discarded)
//! ```
//!
//! The router owns the audio source and the scheduler; processing after a
//! stop is asynchronous, so the router is immediately ready for the next
//! trigger press.

pub mod listener;
pub mod signals;

pub use listener::KeyListener;

use std::sync::mpsc;
use std::time::Duration;

use crate::audio::AudioSource;
use crate::config::SharedConfig;
use crate::session::{RecordingOrigin, RecordingSession, SessionScheduler};
use crate::transcribe::ContextTracker;

// ---------------------------------------------------------------------------
// InputEvent
// ---------------------------------------------------------------------------

/// Events consumed by the router, from any input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The push-to-talk trigger key went down.
    TriggerPressed,
    /// The push-to-talk trigger key was released.
    TriggerReleased,
    /// Some other key went down (aborts keyboard-origin recordings).
    OtherKeyPressed,
    /// SIGUSR1: switch to the first bound mode and start recording.
    SignalMode1,
    /// SIGUSR2: switch to the second bound mode and start recording.
    SignalMode2,
    /// SIGHUP: stop the current recording, if any.
    SignalStop,
    /// Tray action: start recording.
    TrayStart,
    /// Tray action: stop recording.
    TrayStop,
    /// Terminate the router loop.
    Shutdown,
}

// ---------------------------------------------------------------------------
// InputRouter
// ---------------------------------------------------------------------------

/// Runs the recording state machine on its own thread (or the main
/// thread), reacting to [`InputEvent`]s until the channel closes or a
/// [`InputEvent::Shutdown`] arrives.
pub struct InputRouter {
    audio: Box<dyn AudioSource>,
    scheduler: SessionScheduler,
    tracker: ContextTracker,
    config: SharedConfig,
    current: Option<RecordingSession>,
}

impl InputRouter {
    pub fn new(
        audio: Box<dyn AudioSource>,
        scheduler: SessionScheduler,
        tracker: ContextTracker,
        config: SharedConfig,
    ) -> Self {
        Self {
            audio,
            scheduler,
            tracker,
            config,
            current: None,
        }
    }

    /// Consume events until shutdown, then drain the scheduler.
    pub fn run(mut self, rx: mpsc::Receiver<InputEvent>) {
        while let Ok(event) = rx.recv() {
            if !self.handle_event(event) {
                break;
            }
        }

        log::info!("input router shutting down");
        self.scheduler.shutdown();
    }

    /// Apply one event; returns `false` to end the loop.
    fn handle_event(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::TriggerPressed => self.start_recording(RecordingOrigin::Keyboard),
            InputEvent::TriggerReleased => self.stop_recording(),
            InputEvent::OtherKeyPressed => {
                if self
                    .current
                    .as_ref()
                    .is_some_and(RecordingSession::should_abort_on_keystroke)
                {
                    log::debug!("router: non-trigger key during recording, aborting");
                    self.abort_recording();
                }
            }
            InputEvent::SignalMode1 => {
                let mode = self.config.lock().unwrap().hotkey.sigusr1_mode.clone();
                self.start_signal_recording(mode);
            }
            InputEvent::SignalMode2 => {
                let mode = self.config.lock().unwrap().hotkey.sigusr2_mode.clone();
                self.start_signal_recording(mode);
            }
            InputEvent::SignalStop | InputEvent::TrayStop => self.stop_recording(),
            InputEvent::TrayStart => self.start_recording(RecordingOrigin::Tray),
            InputEvent::Shutdown => return false,
        }
        true
    }

    // -----------------------------------------------------------------------
    // State machine transitions
    // -----------------------------------------------------------------------

    fn start_recording(&mut self, origin: RecordingOrigin) {
        if self.current.is_some() {
            log::debug!("router: already recording, ignoring start");
            return;
        }

        let sample_rate = self.config.lock().unwrap().audio.sample_rate;
        let context = self.tracker.snapshot(sample_rate);

        self.current = Some(RecordingSession::new(origin, context));
        self.audio.start_recording();
        log::debug!("router: recording started ({origin:?})");
    }

    fn start_signal_recording(&mut self, mode: String) {
        self.scheduler.request_mode_change(mode);
        self.start_recording(RecordingOrigin::Signal);
    }

    fn stop_recording(&mut self) {
        let Some(session) = self.current.take() else {
            return;
        };

        // Let the microphone catch the tail of the utterance.
        let release_delay = self.config.lock().unwrap().audio.mic_release_delay_ms;
        if release_delay > 0 {
            std::thread::sleep(Duration::from_millis(release_delay));
        }

        match self.audio.stop_recording() {
            Ok(result) => self.scheduler.dispatch(session, result),
            Err(e) => log::warn!("router: stopping capture failed: {e}"),
        }
    }

    fn abort_recording(&mut self) {
        if self.current.take().is_some() {
            self.audio.abort_recording();
            log::info!("recording aborted");
        }
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a trigger-key name from config into an [`rdev::Key`].
///
/// Supports function keys, the modifier and navigation keys useful as
/// push-to-talk triggers, and single ASCII letters.  Returns `None` for
/// unrecognised names so callers can fall back to a default.
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;

    if let [ch] = name.chars().collect::<Vec<_>>()[..] {
        return letter_key(ch.to_ascii_lowercase());
    }

    let key = match name {
        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,
        "AltGr" | "AltRight" | "alt_r" => Key::AltGr,
        "Alt" | "AltLeft" | "alt_l" => Key::Alt,
        "ControlLeft" | "ctrl_l" => Key::ControlLeft,
        "ControlRight" | "ctrl_r" => Key::ControlRight,
        "ShiftLeft" => Key::ShiftLeft,
        "ShiftRight" => Key::ShiftRight,
        "CapsLock" => Key::CapsLock,
        "Escape" | "Esc" => Key::Escape,
        "Space" => Key::Space,
        "Tab" => Key::Tab,
        "Home" => Key::Home,
        "End" => Key::End,
        "Insert" => Key::Insert,
        "Pause" => Key::Pause,
        "ScrollLock" => Key::ScrollLock,
        _ => return None,
    };
    Some(key)
}

fn letter_key(ch: char) -> Option<rdev::Key> {
    use rdev::Key;
    let key = match ch {
        'a' => Key::KeyA,
        'b' => Key::KeyB,
        'c' => Key::KeyC,
        'd' => Key::KeyD,
        'e' => Key::KeyE,
        'f' => Key::KeyF,
        'g' => Key::KeyG,
        'h' => Key::KeyH,
        'i' => Key::KeyI,
        'j' => Key::KeyJ,
        'k' => Key::KeyK,
        'l' => Key::KeyL,
        'm' => Key::KeyM,
        'n' => Key::KeyN,
        'o' => Key::KeyO,
        'p' => Key::KeyP,
        'q' => Key::KeyQ,
        'r' => Key::KeyR,
        's' => Key::KeyS,
        't' => Key::KeyT,
        'u' => Key::KeyU,
        'v' => Key::KeyV,
        'w' => Key::KeyW,
        'x' => Key::KeyX,
        'y' => Key::KeyY,
        'z' => Key::KeyZ,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioSource;
    use crate::config::{new_shared_config, AppConfig, SharedConfig};
    use crate::inject::MockInjector;
    use crate::instructions::InstructionComposer;
    use crate::model::MockModelClient;
    use crate::transcribe::TranscriptionCoordinator;

    use std::sync::Arc;
    use std::time::Instant;

    struct Fixture {
        events: mpsc::Sender<InputEvent>,
        router: std::thread::JoinHandle<()>,
        mock: MockInjector,
        tracker: ContextTracker,
        audio_state: Arc<crate::audio::MockAudioState>,
        config: SharedConfig,
        _runtime: tokio::runtime::Runtime,
    }

    /// Full pipeline behind the router: mock audio → scheduler → mock
    /// model → coordinator → mock injector.
    fn fixture(model: MockModelClient) -> Fixture {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");

        let mut app_config = AppConfig::default();
        // The tests press and release instantly; disable the wall-clock
        // duration gate and the release delay.
        app_config.audio.min_recording_secs = 0.0;
        app_config.audio.mic_release_delay_ms = 0;
        let config = new_shared_config(app_config);

        let mock = MockInjector::new();
        let tracker = ContextTracker::new();
        let coordinator = TranscriptionCoordinator::new(
            Box::new(mock.clone()),
            Arc::clone(&config),
            Arc::new(InstructionComposer::new()),
            tracker.clone(),
        );
        let scheduler = SessionScheduler::start(
            coordinator,
            Arc::new(model),
            runtime.handle().clone(),
            Arc::clone(&config),
        );

        let samples: Vec<f32> = (0..16_000).map(|i| 0.3 * (i as f32 * 0.2).sin()).collect();
        let audio = MockAudioSource::with_samples(samples, 16_000);
        let audio_state = audio.state();

        let router = InputRouter::new(
            Box::new(audio),
            scheduler,
            tracker.clone(),
            Arc::clone(&config),
        );

        let (events, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || router.run(rx));

        Fixture {
            events,
            router: handle,
            mock,
            tracker,
            audio_state,
            config,
            _runtime: runtime,
        }
    }

    fn wait_for(check: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("condition not reached within 5s");
    }

    // ---- end-to-end keyboard flow ---

    #[test]
    fn press_release_types_the_transcription() {
        let fx = fixture(MockModelClient::with_chunks(&[
            "<update><10>voice </10>",
            "<20>typed</20></update>",
        ]));

        fx.events.send(InputEvent::TriggerPressed).unwrap();
        fx.events.send(InputEvent::TriggerReleased).unwrap();

        let mock = fx.mock.clone();
        wait_for(|| mock.screen() == "voice typed");

        fx.events.send(InputEvent::Shutdown).unwrap();
        fx.router.join().unwrap();
    }

    #[test]
    fn double_press_is_ignored_while_recording() {
        let fx = fixture(MockModelClient::with_chunks(&["<update><10>once</10></update>"]));

        fx.events.send(InputEvent::TriggerPressed).unwrap();
        fx.events.send(InputEvent::TriggerPressed).unwrap();
        fx.events.send(InputEvent::TriggerReleased).unwrap();

        let mock = fx.mock.clone();
        wait_for(|| mock.screen() == "once");

        // Only one stop happened — the second press never started a session.
        assert_eq!(
            fx.audio_state.stops.load(std::sync::atomic::Ordering::SeqCst),
            1
        );

        fx.events.send(InputEvent::Shutdown).unwrap();
        fx.router.join().unwrap();
    }

    // ---- abort ---

    #[test]
    fn other_key_aborts_keyboard_recording() {
        let fx = fixture(MockModelClient::with_chunks(&["<update><10>never</10></update>"]));

        fx.events.send(InputEvent::TriggerPressed).unwrap();
        fx.events.send(InputEvent::OtherKeyPressed).unwrap();
        // Release after abort: no session, nothing dispatched.
        fx.events.send(InputEvent::TriggerReleased).unwrap();
        fx.events.send(InputEvent::Shutdown).unwrap();
        fx.router.join().unwrap();

        assert!(fx
            .audio_state
            .aborted
            .load(std::sync::atomic::Ordering::SeqCst));
        assert!(fx.mock.ops().is_empty());
    }

    #[test]
    fn other_key_does_not_abort_tray_recording() {
        let fx = fixture(MockModelClient::with_chunks(&["<update><10>tray</10></update>"]));

        fx.events.send(InputEvent::TrayStart).unwrap();
        fx.events.send(InputEvent::OtherKeyPressed).unwrap();
        fx.events.send(InputEvent::TrayStop).unwrap();

        let mock = fx.mock.clone();
        wait_for(|| mock.screen() == "tray");

        assert!(!fx
            .audio_state
            .aborted
            .load(std::sync::atomic::Ordering::SeqCst));

        fx.events.send(InputEvent::Shutdown).unwrap();
        fx.router.join().unwrap();
    }

    // ---- signals ---

    #[test]
    fn signal_recording_switches_mode_first() {
        let fx = fixture(MockModelClient::with_chunks(&["<update><10>ls</10></update>"]));

        fx.events.send(InputEvent::SignalMode2).unwrap();
        fx.events.send(InputEvent::SignalStop).unwrap();

        let config = Arc::clone(&fx.config);
        wait_for(|| config.lock().unwrap().mode == "shell");
        let mock = fx.mock.clone();
        wait_for(|| mock.screen() == "ls");

        fx.events.send(InputEvent::Shutdown).unwrap();
        fx.router.join().unwrap();
    }

    #[test]
    fn stop_without_recording_is_a_noop() {
        let fx = fixture(MockModelClient::with_chunks(&["<update><10>x</10></update>"]));

        fx.events.send(InputEvent::SignalStop).unwrap();
        fx.events.send(InputEvent::TrayStop).unwrap();
        fx.events.send(InputEvent::Shutdown).unwrap();
        fx.router.join().unwrap();

        assert_eq!(
            fx.audio_state.stops.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    // ---- snapshots ---

    #[test]
    fn snapshot_is_frozen_at_recording_start() {
        let fx = fixture(MockModelClient::with_chunks(&["<update><10>hi</10></update>"]));

        // Pretend an earlier conversation was published...
        fx.tracker.publish("<10>old</10>".into(), "old".into());
        fx.events.send(InputEvent::TriggerPressed).unwrap();
        // ...and mutated after the recording started.
        fx.tracker.publish("<10>new</10>".into(), "new".into());
        fx.events.send(InputEvent::TriggerReleased).unwrap();

        let mock = fx.mock.clone();
        wait_for(|| mock.screen() == "hi");

        fx.events.send(InputEvent::Shutdown).unwrap();
        fx.router.join().unwrap();
    }

    // ---- parse_key ---

    #[test]
    fn parse_function_and_modifier_keys() {
        assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
        assert_eq!(parse_key("AltGr"), Some(rdev::Key::AltGr));
        assert_eq!(parse_key("alt_r"), Some(rdev::Key::AltGr));
        assert_eq!(parse_key("ControlLeft"), Some(rdev::Key::ControlLeft));
    }

    #[test]
    fn parse_letter_keys_case_insensitive() {
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("Z"), Some(rdev::Key::KeyZ));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("Ctrl+V"), None);
    }
}
