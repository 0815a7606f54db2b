//! POSIX signal bridging onto the router's event channel.
//!
//! | Signal | Event |
//! |--------|-------|
//! | SIGUSR1 | [`InputEvent::SignalMode1`] — mode switch + signal recording |
//! | SIGUSR2 | [`InputEvent::SignalMode2`] — mode switch + signal recording |
//! | SIGHUP  | [`InputEvent::SignalStop`] — stop the current recording |
//! | SIGINT  | [`InputEvent::Shutdown`] |
//!
//! Signals are consumed as tokio streams on the shared runtime and
//! forwarded over the router's std channel (the send is non-blocking).

use std::sync::mpsc;

use super::InputEvent;

/// Spawn the signal-forwarding task on `runtime`.
#[cfg(unix)]
pub fn spawn_signal_bridge(runtime: &tokio::runtime::Handle, tx: mpsc::Sender<InputEvent>) {
    use tokio::signal::unix::{signal, SignalKind};

    runtime.spawn(async move {
        let mut usr1 = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("signals: cannot install SIGUSR1 handler: {e}");
                return;
            }
        };
        let mut usr2 = match signal(SignalKind::user_defined2()) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("signals: cannot install SIGUSR2 handler: {e}");
                return;
            }
        };
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("signals: cannot install SIGHUP handler: {e}");
                return;
            }
        };

        log::info!("signal bridge installed (USR1/USR2/HUP/INT)");

        loop {
            tokio::select! {
                _ = usr1.recv() => {
                    let _ = tx.send(InputEvent::SignalMode1);
                }
                _ = usr2.recv() => {
                    let _ = tx.send(InputEvent::SignalMode2);
                }
                _ = hup.recv() => {
                    let _ = tx.send(InputEvent::SignalStop);
                }
                _ = tokio::signal::ctrl_c() => {
                    let _ = tx.send(InputEvent::Shutdown);
                    return;
                }
            }
        }
    });
}

/// Non-unix fallback: only Ctrl-C is wired up.
#[cfg(not(unix))]
pub fn spawn_signal_bridge(runtime: &tokio::runtime::Handle, tx: mpsc::Sender<InputEvent>) {
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(InputEvent::Shutdown);
        }
    });
}
