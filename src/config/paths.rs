//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + mode templates):
//!   Windows: %APPDATA%\scribekey\
//!   macOS:   ~/Library/Application Support/scribekey/
//!   Linux:   ~/.config/scribekey/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and the `modes/` template directory.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding user-provided `<mode>.md` instruction templates.
    pub modes_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "scribekey";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let modes_dir = config_dir.join("modes");

        Self {
            config_dir,
            settings_file,
            modes_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
