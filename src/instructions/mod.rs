//! Instruction template loading and composition.
//!
//! The system message sent with every model request is composed from a
//! base protocol description plus the template of the active mode.  The
//! `dictate` and `shell` modes ship embedded in the binary; users can add
//! or override modes by dropping `<name>.md` files into the `modes/`
//! directory under the config dir (scanned once at startup).

use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const BASE_INSTRUCTIONS: &str = include_str!("base.md");
const MODE_DICTATE: &str = include_str!("dictate.md");
const MODE_SHELL: &str = include_str!("shell.md");

// ---------------------------------------------------------------------------
// InstructionComposer
// ---------------------------------------------------------------------------

/// Composes system instructions from the base template plus a mode template.
///
/// Immutable after construction, so it can be shared behind an `Arc` by the
/// coordinator (mode validation) and the model client (request building).
pub struct InstructionComposer {
    modes: BTreeMap<String, String>,
}

impl InstructionComposer {
    /// Build a composer with only the embedded modes.
    pub fn new() -> Self {
        let mut modes = BTreeMap::new();
        modes.insert("dictate".to_string(), MODE_DICTATE.to_string());
        modes.insert("shell".to_string(), MODE_SHELL.to_string());
        Self { modes }
    }

    /// Build a composer with the embedded modes plus any `<name>.md` files
    /// found in `modes_dir`.  User files override embedded modes with the
    /// same name.  A missing directory is not an error.
    pub fn with_modes_dir(modes_dir: &Path) -> Self {
        let mut composer = Self::new();

        let entries = match std::fs::read_dir(modes_dir) {
            Ok(entries) => entries,
            Err(_) => return composer,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(template) => {
                    log::debug!("instructions: loaded mode '{name}' from {}", path.display());
                    composer.modes.insert(name.to_string(), template);
                }
                Err(e) => {
                    log::warn!("instructions: cannot read {}: {e}", path.display());
                }
            }
        }

        composer
    }

    /// Names of all known modes, sorted.
    pub fn available_modes(&self) -> Vec<String> {
        self.modes.keys().cloned().collect()
    }

    pub fn has_mode(&self, name: &str) -> bool {
        self.modes.contains_key(name)
    }

    /// Compose the full system instruction text for `mode`.
    ///
    /// An unknown mode falls back to `dictate` with a warning, so a stale
    /// config value cannot make requests unbuildable.
    pub fn compose(&self, mode: &str) -> String {
        let template = match self.modes.get(mode) {
            Some(template) => template.as_str(),
            None => {
                log::warn!("instructions: unknown mode '{mode}', composing 'dictate'");
                self.modes
                    .get("dictate")
                    .map(String::as_str)
                    .unwrap_or(MODE_DICTATE)
            }
        };

        format!("{}\n\n{}", BASE_INSTRUCTIONS.trim_end(), template.trim_end())
    }
}

impl Default for InstructionComposer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_modes_are_available() {
        let composer = InstructionComposer::new();
        assert_eq!(composer.available_modes(), vec!["dictate", "shell"]);
        assert!(composer.has_mode("dictate"));
        assert!(!composer.has_mode("missing"));
    }

    #[test]
    fn compose_includes_base_and_mode_template() {
        let composer = InstructionComposer::new();
        let text = composer.compose("shell");

        assert!(text.contains("Transcription protocol"));
        assert!(text.contains("Mode: shell"));
    }

    #[test]
    fn unknown_mode_falls_back_to_dictate() {
        let composer = InstructionComposer::new();
        let text = composer.compose("nonsense");
        assert!(text.contains("Mode: dictate"));
    }

    #[test]
    fn user_modes_extend_and_override() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("email.md"), "# Mode: email\n").unwrap();
        std::fs::write(dir.path().join("dictate.md"), "# custom dictate\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored\n").unwrap();

        let composer = InstructionComposer::with_modes_dir(dir.path());

        assert_eq!(
            composer.available_modes(),
            vec!["dictate", "email", "shell"]
        );
        assert!(composer.compose("dictate").contains("custom dictate"));
        assert!(composer.compose("email").contains("Mode: email"));
    }

    #[test]
    fn missing_modes_dir_is_fine() {
        let composer =
            InstructionComposer::with_modes_dir(Path::new("/definitely/not/a/real/dir"));
        assert!(composer.has_mode("dictate"));
    }
}
