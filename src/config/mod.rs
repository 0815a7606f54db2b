//! Configuration module for scribekey.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    new_shared_config, AppConfig, AudioConfig, HotkeyConfig, InjectBackend, InjectConfig,
    ModelConfig, SharedConfig,
};
