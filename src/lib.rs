//! scribekey — real-time voice dictation via streaming LLM transcription.
//!
//! Hold a trigger key, speak, release: the audio goes to a streaming
//! language model whose XML-tagged reply is parsed incrementally and typed
//! into the focused window with OS-level keystrokes.  Because the model
//! addresses the conversation as numbered segments, it can *revise* text it
//! produced earlier — the engine backspaces to the right boundary and
//! re-types, keeping the visible text equal to the latest transcript at
//! every chunk.
//!
//! # Crate layout
//!
//! | Module | Responsibility |
//! |--------|---------------|
//! | [`config`] | settings tree, TOML persistence, shared handle |
//! | [`inject`] | platform keystroke backends (`backspace` / `emit`) |
//! | [`stream`] | segment store + chunk-tolerant XML update processor |
//! | [`transcribe`] | response-level protocol: modes, resets, `<update>` |
//! | [`model`] | streaming chat-completions client |
//! | [`instructions`] | system-instruction templates and mode discovery |
//! | [`session`] | recording/processing sessions + the two-stage scheduler |
//! | [`input`] | trigger key, POSIX signals, tray entry points |
//! | [`audio`] | microphone capture and recording validation gates |

pub mod audio;
pub mod config;
pub mod inject;
pub mod input;
pub mod instructions;
pub mod model;
pub mod session;
pub mod stream;
pub mod transcribe;
