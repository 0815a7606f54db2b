//! Application entry point — scribekey.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the tokio runtime (multi-thread) for model invocations and
//!    the signal bridge.
//! 4. Discover instruction modes and select the keystroke backend.
//! 5. Build the transcription coordinator and start the session scheduler
//!    (output-worker thread).
//! 6. Open the microphone (degrade to a null source when absent).
//! 7. Spawn the key listener thread and the signal bridge.
//! 8. Run the input router on the main thread — blocks until SIGINT.

use std::sync::{mpsc, Arc};

use anyhow::Context;

use scribekey::{
    audio::{AudioSource, CpalAudioSource, NullAudioSource},
    config::{new_shared_config, AppConfig, AppPaths},
    inject::select_injector,
    input::{parse_key, signals::spawn_signal_bridge, InputEvent, InputRouter, KeyListener},
    instructions::InstructionComposer,
    model::{ApiModelClient, ModelClient},
    session::SessionScheduler,
    transcribe::{ContextTracker, TranscriptionCoordinator},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("scribekey starting up");

    // 2. Configuration
    let app_config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();
    let config = new_shared_config(app_config);

    // 3. Tokio runtime — model invocations + signal bridge
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Instruction modes + keystroke backend
    let composer = Arc::new(InstructionComposer::with_modes_dir(&paths.modes_dir));
    {
        let mut cfg = config.lock().unwrap();
        if !composer.has_mode(&cfg.mode) {
            log::warn!("configured mode '{}' not found; using 'dictate'", cfg.mode);
            cfg.mode = "dictate".into();
        }
        log::info!(
            "modes available: {:?} (active: {})",
            composer.available_modes(),
            cfg.mode
        );
    }

    let injector = select_injector(&config.lock().unwrap().inject);

    // 5. Coordinator + scheduler
    let tracker = ContextTracker::new();
    let coordinator = TranscriptionCoordinator::new(
        injector,
        Arc::clone(&config),
        Arc::clone(&composer),
        tracker.clone(),
    );

    let model: Arc<dyn ModelClient> = Arc::new(ApiModelClient::from_config(
        Arc::clone(&config),
        Arc::clone(&composer),
    ));

    let scheduler = SessionScheduler::start(
        coordinator,
        model,
        runtime.handle().clone(),
        Arc::clone(&config),
    );

    // 6. Microphone (graceful degradation when absent)
    let audio: Box<dyn AudioSource> = match CpalAudioSource::new() {
        Ok(source) => Box::new(source),
        Err(e) => {
            log::warn!("audio capture unavailable ({e}); recordings will be empty");
            Box::new(NullAudioSource::new(config.lock().unwrap().audio.sample_rate))
        }
    };

    // 7. Input surfaces
    let (event_tx, event_rx) = mpsc::channel::<InputEvent>();

    let trigger_name = config.lock().unwrap().hotkey.trigger_key.clone();
    let trigger = parse_key(&trigger_name).unwrap_or_else(|| {
        log::warn!("unknown trigger key '{trigger_name}', falling back to AltGr");
        rdev::Key::AltGr
    });
    let _listener = KeyListener::start(trigger, event_tx.clone());
    spawn_signal_bridge(runtime.handle(), event_tx.clone());

    log::info!("ready — hold '{trigger_name}' to dictate");

    // 8. Router loop (blocks until Shutdown)
    let router = InputRouter::new(audio, scheduler, tracker, config);
    router.run(event_rx);

    log::info!("scribekey exited");
    Ok(())
}
