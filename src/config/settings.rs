//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Settings for the streaming dictation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible API endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key — `None` for local providers that require no authentication.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"gpt-4o-audio-preview"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for the streaming response before timing out.
    pub timeout_secs: u64,
    /// Drop the stream as soon as the accumulated response contains `</xml>`.
    pub early_terminate_on_xml_close: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "gpt-4o-audio-preview".into(),
            temperature: 0.2,
            timeout_secs: 60,
            early_terminate_on_xml_close: true,
        }
    }
}

// ---------------------------------------------------------------------------
// InjectBackend / InjectConfig
// ---------------------------------------------------------------------------

/// Which keystroke backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InjectBackend {
    /// Probe the platform at startup: xdotool on X11, key simulation on
    /// macOS / Windows, no-op under a test harness.
    Auto,
    /// Force the external-`xdotool` backend.
    Xdotool,
    /// Force the in-process key simulation backend.
    KeySim,
    /// Force the no-op backend (keystrokes are logged, never delivered).
    Noop,
}

impl Default for InjectBackend {
    fn default() -> Self {
        Self::Auto
    }
}

/// Settings for the keystroke injector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectConfig {
    /// Keystroke delivery rate in keystrokes per second.
    ///
    /// The per-keystroke delay is `1000 / rate` milliseconds; the default of
    /// 200 Hz gives a 5 ms delay.
    pub keystroke_rate_hz: f64,
    /// Backend selection — `Auto` probes the platform at startup.
    pub backend: InjectBackend,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            keystroke_rate_hz: 200.0,
            backend: InjectBackend::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture and recording validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz reported in the conversation snapshot and used to
    /// encode the model request payload.
    pub sample_rate: u32,
    /// Minimum recording length in seconds; shorter recordings are discarded.
    pub min_recording_secs: f32,
    /// Maximum recording length in seconds.
    pub max_recording_secs: f32,
    /// Peak-amplitude floor as a fraction of full scale (0.0 – 1.0);
    /// recordings that never exceed it are discarded as silence.
    pub amplitude_threshold: f32,
    /// Length in seconds of the sliding window used for the RMS-peak gate.
    pub rms_window_secs: f32,
    /// RMS floor over the sliding window as a fraction of full scale;
    /// recordings whose loudest window stays below it are discarded.
    pub rms_amplitude_threshold: f32,
    /// Milliseconds to keep capturing after a stop request so the tail of
    /// the utterance is not clipped.
    pub mic_release_delay_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            min_recording_secs: 0.5,
            max_recording_secs: 60.0,
            amplitude_threshold: 0.01,
            rms_window_secs: 0.2,
            rms_amplitude_threshold: 0.02,
            mic_release_delay_ms: 150,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Trigger key and signal-to-mode bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Push-to-talk key name (e.g. `"AltGr"`, `"F9"`).
    pub trigger_key: String,
    /// Mode activated by SIGUSR1 before starting a signal recording.
    pub sigusr1_mode: String,
    /// Mode activated by SIGUSR2 before starting a signal recording.
    pub sigusr2_mode: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            trigger_key: "AltGr".into(),
            sigusr1_mode: "dictate".into(),
            sigusr2_mode: "shell".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use scribekey::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Currently active instruction mode.
    ///
    /// Read-only after startup for every component except the coordinator,
    /// which rewrites it when the model emits a `<mode>` tag or a signal
    /// recording requests a different mode.
    pub mode: String,
    /// Re-baseline the segment store after every completed response, so the
    /// next recording starts from an empty conversation.
    pub reset_state_each_response: bool,
    /// Dictation model settings.
    pub model: ModelConfig,
    /// Keystroke injection settings.
    pub inject: InjectConfig,
    /// Audio capture / validation settings.
    pub audio: AudioConfig,
    /// Trigger key and signal bindings.
    pub hotkey: HotkeyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: "dictate".into(),
            reset_state_each_response: false,
            model: ModelConfig::default(),
            inject: InjectConfig::default(),
            audio: AudioConfig::default(),
            hotkey: HotkeyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SharedConfig
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppConfig`].
///
/// Read-only after startup except for `mode` (see [`AppConfig::mode`]).
/// Lock with `.lock().unwrap()` for a short critical section; do **not**
/// hold the lock across blocking calls.
pub type SharedConfig = Arc<Mutex<AppConfig>>;

/// Construct a new [`SharedConfig`] wrapping `config`.
pub fn new_shared_config(config: AppConfig) -> SharedConfig {
    Arc::new(Mutex::new(config))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.mode, loaded.mode);
        assert_eq!(
            original.reset_state_each_response,
            loaded.reset_state_each_response
        );

        // ModelConfig
        assert_eq!(original.model.base_url, loaded.model.base_url);
        assert_eq!(original.model.api_key, loaded.model.api_key);
        assert_eq!(original.model.model, loaded.model.model);
        assert_eq!(original.model.timeout_secs, loaded.model.timeout_secs);
        assert_eq!(
            original.model.early_terminate_on_xml_close,
            loaded.model.early_terminate_on_xml_close
        );

        // InjectConfig
        assert_eq!(
            original.inject.keystroke_rate_hz,
            loaded.inject.keystroke_rate_hz
        );
        assert_eq!(original.inject.backend, loaded.inject.backend);

        // AudioConfig
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(
            original.audio.min_recording_secs,
            loaded.audio.min_recording_secs
        );
        assert_eq!(
            original.audio.mic_release_delay_ms,
            loaded.audio.mic_release_delay_ms
        );

        // HotkeyConfig
        assert_eq!(original.hotkey.trigger_key, loaded.hotkey.trigger_key);
        assert_eq!(original.hotkey.sigusr1_mode, loaded.hotkey.sigusr1_mode);
        assert_eq!(original.hotkey.sigusr2_mode, loaded.hotkey.sigusr2_mode);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.mode, default.mode);
        assert_eq!(config.model.model, default.model.model);
        assert_eq!(config.hotkey.trigger_key, default.hotkey.trigger_key);
    }

    /// Verify default values match the documented config surface.
    #[test]
    fn default_values_match_config_surface() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.mode, "dictate");
        assert!(!cfg.reset_state_each_response);
        assert!(cfg.model.early_terminate_on_xml_close);
        assert!(cfg.model.api_key.is_none());
        assert_eq!(cfg.inject.keystroke_rate_hz, 200.0);
        assert_eq!(cfg.inject.backend, InjectBackend::Auto);
        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert_eq!(cfg.audio.min_recording_secs, 0.5);
        assert_eq!(cfg.hotkey.trigger_key, "AltGr");
        assert_eq!(cfg.hotkey.sigusr1_mode, "dictate");
        assert_eq!(cfg.hotkey.sigusr2_mode, "shell");
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.mode = "shell".into();
        cfg.reset_state_each_response = true;
        cfg.model.base_url = "https://api.openai.com".into();
        cfg.model.api_key = Some("sk-test".into());
        cfg.model.timeout_secs = 30;
        cfg.inject.keystroke_rate_hz = 120.0;
        cfg.inject.backend = InjectBackend::Xdotool;
        cfg.hotkey.trigger_key = "F10".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.mode, "shell");
        assert!(loaded.reset_state_each_response);
        assert_eq!(loaded.model.base_url, "https://api.openai.com");
        assert_eq!(loaded.model.api_key, Some("sk-test".into()));
        assert_eq!(loaded.model.timeout_secs, 30);
        assert_eq!(loaded.inject.keystroke_rate_hz, 120.0);
        assert_eq!(loaded.inject.backend, InjectBackend::Xdotool);
        assert_eq!(loaded.hotkey.trigger_key, "F10");
    }

    /// Shared config must be cloneable and mutable from another handle.
    #[test]
    fn shared_config_mode_updates_are_visible() {
        let shared = new_shared_config(AppConfig::default());
        let shared2 = Arc::clone(&shared);

        shared.lock().unwrap().mode = "shell".into();
        assert_eq!(shared2.lock().unwrap().mode, "shell");
    }
}
