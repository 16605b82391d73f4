//! Cancellation for long-running scans.
//!
//! A single process-wide abort request is modelled as a [`CancelToken`]: a
//! cloneable handle around an `AtomicBool`. Every long-running call (directory
//! traversal, the hashing read loop, the linker) receives a token and checks
//! it at its own suspension points, returning [`Interrupted`] when it trips.
//!
//! ```rust,no_run
//! use dupelink::signal::install_handler;
//!
//! let token = install_handler().expect("Failed to install signal handler");
//!
//! // ...inside a loop
//! if token.check().is_err() {
//!     return;
//! }
//! ```
//!
//! When Ctrl+C is pressed the token trips, "Interrupted. Cleaning up..." is
//! printed to stderr and the application exits with code 130 once the
//! current operation has unwound.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (Ctrl+C) interruption (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Error returned by any operation that observed a tripped [`CancelToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation interrupted")]
pub struct Interrupted;

/// Shared abort flag passed into every long-running call.
///
/// Clones share the same flag, so tripping any clone is observed by all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation request.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Check-and-return point.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<CancelToken> = OnceLock::new();

/// Install a Ctrl+C handler that trips the returned token.
///
/// The hook can only be registered once per process. Later calls (or calls
/// after another component registered its own hook) reuse the existing
/// token, reset to the non-cancelled state, so repeated `run_app` calls in
/// one process keep working.
///
/// # Errors
///
/// Currently always succeeds; a hook that cannot be registered degrades to
/// an unhooked token that can still be cancelled manually.
pub fn install_handler() -> Result<CancelToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        token.reset();
        return Ok(token.clone());
    }

    let token = CancelToken::new();
    let hooked = token.clone();

    match ctrlc::set_handler(move || {
        hooked.cancel();

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(e) => {
            if let Some(existing) = GLOBAL_TOKEN.get() {
                existing.reset();
                return Ok(existing.clone());
            }
            log::debug!("Ctrl+C handler unavailable ({}), using unhooked token", e);
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
    }
}
