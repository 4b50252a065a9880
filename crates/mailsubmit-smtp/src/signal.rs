//! Signal guard for a submission.
//!
//! While a [`SignalGuard`] is alive, a termination or broken-pipe signal
//! raises the session's [`Interrupt`]. The session checks the flag before
//! every transport operation and races it against the operation itself, so
//! a signal aborts the session at the next I/O boundary and the driver goes
//! straight to teardown.

use crate::error::{Error, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cancellation flag shared between a session and whatever may abort it.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

/// Raises the [`Interrupt`] it was created with.
#[derive(Debug)]
pub struct Trigger {
    tx: watch::Sender<bool>,
}

impl Interrupt {
    /// Creates a lowered flag and the trigger that raises it.
    #[must_use]
    pub fn pair() -> (Trigger, Self) {
        let (tx, rx) = watch::channel(false);
        (Trigger { tx }, Self { rx })
    }

    /// Creates a flag that can never be raised.
    #[must_use]
    pub fn never() -> Self {
        Self::pair().1
    }

    /// Returns true once the flag has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when the flag is raised.
    pub async fn raised(&mut self) {
        if self.rx.wait_for(|raised| *raised).await.is_err() {
            // Trigger dropped without raising.
            std::future::pending::<()>().await;
        }
    }
}

impl Trigger {
    /// Raises the flag.
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }
}

/// Converts termination and broken-pipe signals into an [`Interrupt`] for
/// the lifetime of one submission.
///
/// Dropping the guard stops the listener, whatever way the session ended.
/// Once no guard is alive, SIGTERM performs its default action again and
/// SIGPIPE stays ignored, as it is for any Rust program.
#[derive(Debug)]
pub struct SignalGuard {
    listener: JoinHandle<()>,
    interrupt: Interrupt,
}

impl SignalGuard {
    /// Starts listening. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signal`] if a handler cannot be registered.
    pub fn install() -> Result<Self> {
        let (trigger, interrupt) = Interrupt::pair();
        let listener = listen(trigger)?;
        if let Err(e) = dispositions::acquire() {
            listener.abort();
            return Err(e);
        }
        tracing::trace!("Signal guard installed");
        Ok(Self {
            listener,
            interrupt,
        })
    }

    /// Returns the flag raised by this guard.
    #[must_use]
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.listener.abort();
        dispositions::release();
        tracing::trace!("Signal guard removed");
    }
}

#[cfg(unix)]
fn listen(trigger: Trigger) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).map_err(Error::Signal)?;
    let mut pipe = signal(SignalKind::pipe()).map_err(Error::Signal)?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = pipe.recv() => "SIGPIPE",
        };
        tracing::warn!(signal = name, "Signal received, aborting session");
        trigger.raise();
    }))
}

#[cfg(not(unix))]
fn listen(trigger: Trigger) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, aborting session");
            trigger.raise();
        }
    }))
}

/// Process-wide count of live guards.
///
/// tokio never unregisters its signal handlers, so a SIGTERM arriving while
/// no guard is alive is handed to a conditional default action instead.
#[cfg(unix)]
mod dispositions {
    use crate::error::{Error, Result};
    use signal_hook::consts::SIGTERM;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    struct State {
        live: usize,
        idle: Option<Arc<AtomicBool>>,
    }

    static STATE: Mutex<State> = Mutex::new(State {
        live: 0,
        idle: None,
    });

    fn state() -> MutexGuard<'static, State> {
        STATE.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn acquire() -> Result<()> {
        let mut state = state();
        let idle = match state.idle.clone() {
            Some(idle) => idle,
            None => {
                let idle = Arc::new(AtomicBool::new(true));
                signal_hook::flag::register_conditional_default(SIGTERM, Arc::clone(&idle))
                    .map_err(Error::Signal)?;
                state.idle = Some(Arc::clone(&idle));
                idle
            }
        };
        state.live += 1;
        idle.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub(super) fn release() {
        let mut state = state();
        state.live = state.live.saturating_sub(1);
        if state.live == 0
            && let Some(idle) = &state.idle
        {
            idle.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(not(unix))]
mod dispositions {
    use crate::error::Result;

    #[allow(clippy::unnecessary_wraps)]
    pub(super) const fn acquire() -> Result<()> {
        Ok(())
    }

    pub(super) const fn release() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_raises_flag() {
        let (trigger, mut interrupt) = Interrupt::pair();
        assert!(!interrupt.is_raised());

        trigger.raise();
        assert!(interrupt.is_raised());
        interrupt.raised().await;
    }

    #[tokio::test]
    async fn test_clones_share_flag() {
        let (trigger, interrupt) = Interrupt::pair();
        let copy = interrupt.clone();
        trigger.raise();
        assert!(copy.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_stays_pending() {
        let mut interrupt = Interrupt::never();
        assert!(!interrupt.is_raised());
        let waited = tokio::time::timeout(Duration::from_secs(5), interrupt.raised()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_guard_starts_lowered() {
        let guard = SignalGuard::install();
        assert!(guard.is_ok());
        if let Ok(guard) = guard {
            assert!(!guard.interrupt().is_raised());
        }
    }
}
