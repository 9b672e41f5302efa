//! Output-file completion detection by lock polling.
//!
//! The engine's print call returns once the print *job* is dispatched, not
//! once the output file has been fully written — there is no write-complete
//! callback to subscribe to. Completion is therefore detected the only way
//! available: repeatedly testing whether the file is still exclusively held
//! by the writer, bounded by an attempt budget.
//!
//! The loop terminates on exactly two conditions: the file unlocks
//! (success) or the attempt budget is exhausted
//! ([`ConvertError::OutputLocked`]). There is deliberately no combined
//! early-exit condition — mixing "still locked" and "attempts exceeded"
//! into one OR'd continue-predicate either spins forever or exits before
//! the file is complete.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use std::time::Duration;
//! use webprint::waiter::{wait_until_unlocked, LockProbe};
//!
//! // A probe that reports unlocked after two observations.
//! struct Ticks(u32);
//! impl LockProbe for Ticks {
//!     fn is_locked(&mut self, _path: &Path) -> bool {
//!         self.0 += 1;
//!         self.0 <= 2
//!     }
//! }
//!
//! let result = wait_until_unlocked(
//!     &mut Ticks(0),
//!     Path::new("/tmp/out.pdf"),
//!     Duration::from_millis(1),
//!     10,
//! );
//! assert!(result.is_ok());
//! ```

use std::fs::OpenOptions;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::error::{ConvertError, Result};

/// Seam for testing the poll loop against a simulated writer.
///
/// The production implementation is [`FsLockProbe`]; tests substitute a
/// scripted probe that releases after a controlled number of ticks.
pub trait LockProbe {
    /// True while the file at `path` is still held by its writer.
    fn is_locked(&mut self, path: &Path) -> bool;
}

/// Filesystem-backed lock probe.
///
/// A file counts as locked while it does not exist, is still empty, or
/// cannot be opened for writing. The empty case matters because the output
/// path may be pre-created before the print is dispatched: a zero-length
/// file means the writer has not flushed anything yet, and no engine emits
/// an empty PDF. On platforms without mandatory file locking the open test
/// degrades to an existence/permission check, which the emptiness rule
/// backstops.
#[derive(Debug, Default)]
pub struct FsLockProbe;

impl LockProbe for FsLockProbe {
    fn is_locked(&mut self, path: &Path) -> bool {
        let len = match path.metadata() {
            Ok(meta) => meta.len(),
            Err(_) => return true,
        };
        if len == 0 {
            return true;
        }
        OpenOptions::new().write(true).open(path).is_err()
    }
}

/// Poll `path` until its writer releases it, bounded by `max_attempts`.
///
/// Sleeps `delay` and increments the attempt counter for every iteration
/// that still observes the file as locked.
///
/// # Errors
///
/// Returns [`ConvertError::OutputLocked`] if the file is still locked after
/// `max_attempts` checks. The loop never runs beyond that bound.
///
/// # Example
///
/// ```rust,ignore
/// wait_until_unlocked(
///     &mut FsLockProbe,
///     &output_path,
///     config.locking_check_delay,
///     config.max_locking_check_attempts,
/// )?;
/// let bytes = std::fs::read(&output_path)?;
/// ```
pub fn wait_until_unlocked<P: LockProbe>(
    probe: &mut P,
    path: &Path,
    delay: Duration,
    max_attempts: u32,
) -> Result<()> {
    let mut attempts: u32 = 0;

    while attempts < max_attempts && probe.is_locked(path) {
        attempts += 1;
        log::trace!(
            "Output file {} still locked (check {}/{})",
            path.display(),
            attempts,
            max_attempts
        );
        thread::sleep(delay);
    }

    // The loop exits either because the file unlocked or because the
    // budget ran out; re-probe only in the exhausted case.
    if attempts >= max_attempts && probe.is_locked(path) {
        log::warn!(
            "Output file {} locked after {} checks, giving up",
            path.display(),
            attempts
        );
        return Err(ConvertError::OutputLocked { attempts });
    }

    log::debug!(
        "Output file {} unlocked after {} checks",
        path.display(),
        attempts
    );
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
