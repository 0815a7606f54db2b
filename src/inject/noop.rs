//! No-op and test keystroke backends.
//!
//! [`NoopInjector`] is selected when a test harness is detected or no real
//! backend exists for the platform — operations are logged at `debug` and
//! dropped.
//!
//! [`MockInjector`] (test builds only) records every operation and keeps a
//! simulated screen string, so tests can assert on the exact keystroke
//! sequence a scenario produces.

use super::KeystrokeInjector;

// ---------------------------------------------------------------------------
// NoopInjector
// ---------------------------------------------------------------------------

/// Backend that delivers nothing.
#[derive(Debug, Default)]
pub struct NoopInjector;

impl NoopInjector {
    pub fn new() -> Self {
        Self
    }
}

impl KeystrokeInjector for NoopInjector {
    fn backspace(&mut self, count: usize) {
        log::debug!("inject(noop): backspace({count})");
    }

    fn emit(&mut self, text: &str) {
        log::debug!("inject(noop): emit({text:?})");
    }
}

// ---------------------------------------------------------------------------
// MockInjector  (test builds only)
// ---------------------------------------------------------------------------

/// A single recorded injector operation.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectorOp {
    Backspace(usize),
    Emit(String),
}

/// Recording injector for tests.
///
/// Clones share the same operation log and simulated screen, so a test can
/// keep one handle while the processor owns the boxed other.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MockInjector {
    ops: std::sync::Arc<std::sync::Mutex<Vec<InjectorOp>>>,
    screen: std::sync::Arc<std::sync::Mutex<String>>,
}

#[cfg(test)]
impl MockInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load the simulated screen, as if `text` had been typed earlier.
    pub fn with_screen(text: &str) -> Self {
        let mock = Self::new();
        *mock.screen.lock().unwrap() = text.to_string();
        mock
    }

    /// All operations recorded so far, in order.
    pub fn ops(&self) -> Vec<InjectorOp> {
        self.ops.lock().unwrap().clone()
    }

    /// The simulated screen contents.
    pub fn screen(&self) -> String {
        self.screen.lock().unwrap().clone()
    }

    /// Net character delta: emitted chars minus backspaced chars.
    pub fn net_chars(&self) -> i64 {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .map(|op| match op {
                InjectorOp::Backspace(n) => -(*n as i64),
                InjectorOp::Emit(text) => text.chars().count() as i64,
            })
            .sum()
    }
}

#[cfg(test)]
impl KeystrokeInjector for MockInjector {
    fn backspace(&mut self, count: usize) {
        self.ops.lock().unwrap().push(InjectorOp::Backspace(count));

        let mut screen = self.screen.lock().unwrap();
        let keep = screen.chars().count().saturating_sub(count);
        *screen = screen.chars().take(keep).collect();
    }

    fn emit(&mut self, text: &str) {
        self.ops
            .lock()
            .unwrap()
            .push(InjectorOp::Emit(text.to_string()));
        self.screen.lock().unwrap().push_str(text);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_ops_in_order() {
        let mock = MockInjector::new();
        let mut boxed: Box<dyn KeystrokeInjector> = Box::new(mock.clone());

        boxed.emit("hello ");
        boxed.backspace(2);
        boxed.emit("p!");

        assert_eq!(
            mock.ops(),
            vec![
                InjectorOp::Emit("hello ".into()),
                InjectorOp::Backspace(2),
                InjectorOp::Emit("p!".into()),
            ]
        );
        assert_eq!(mock.screen(), "hellp!");
    }

    #[test]
    fn mock_screen_counts_chars_not_bytes() {
        let mock = MockInjector::new();
        let mut boxed: Box<dyn KeystrokeInjector> = Box::new(mock.clone());

        boxed.emit("héllo");
        boxed.backspace(4);

        assert_eq!(mock.screen(), "h");
        assert_eq!(mock.net_chars(), 1);
    }

    #[test]
    fn noop_accepts_everything() {
        let mut injector = NoopInjector::new();
        injector.backspace(100);
        injector.emit("dropped\non\nthe\nfloor");
    }
}
