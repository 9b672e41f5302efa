//! Host statistics for monitoring and logging.
//!
//! This module provides [`HostStats`], a point-in-time snapshot of the
//! engine host. Values may be stale by the time they are read; use them
//! for monitoring, not for control flow.

use crate::host::EngineState;

/// Snapshot of the engine host's current state.
///
/// # Example
///
/// ```rust,ignore
/// let stats = host.stats();
/// log::info!(
///     "engine: {:?}, in-flight: {}, sessions: {}",
///     stats.state,
///     stats.in_flight,
///     stats.sessions_created
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStats {
    /// Lifecycle state at snapshot time.
    pub state: EngineState,

    /// Conversions currently running.
    pub in_flight: usize,

    /// Sessions created since the host came up.
    pub sessions_created: u64,
}

// ============================================================================
// Unit Tests
// ============================================================================
