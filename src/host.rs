//! Process-wide engine host with a dedicated owner thread.
//!
//! The rendering engine exposes a single-threaded API surface: every engine
//! call must execute on the thread that booted it. This module enforces
//! that affinity with an owner-thread actor — one dedicated thread consumes
//! a queue of marshaled closures, and the engine backend plus every page it
//! creates live inside that thread and never leave it.
//!
//! ```text
//! ┌──────────────┐  EngineJob (boxed closure)   ┌──────────────────────┐
//! │  Callers     │ ───────────────────────────▶ │  Engine thread       │
//! │ (any thread) │ ◀─────────────────────────── │  ┌────────────────┐  │
//! └──────────────┘   capacity-one result chan   │  │ EngineRuntime  │  │
//!                                               │  │  backend       │  │
//!                                               │  │  pages {id→pg} │  │
//!                                               │  └────────────────┘  │
//!                                               └──────────────────────┘
//! ```
//!
//! # State Machine
//!
//! ```text
//! Uninitialized → Initializing → Ready → ShuttingDown → Unloaded
//!                      │
//!                      └── (boot failure) → Uninitialized
//! ```
//!
//! Transitions are monotonic except the boot-failure edge, which allows a
//! later `initialize` to retry with a corrected engine path. `Ready` and
//! `Unloaded` are stored from the engine thread itself; `Initializing` and
//! `ShuttingDown` mark the caller-driven entry points into the actor.
//!
//! # Process Singleton
//!
//! [`EngineHost::global()`] returns the process-wide instance used by
//! [`Converter`](crate::Converter). Standalone hosts can still be
//! constructed for tests — nothing in the machinery is tied to the global.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::{EngineBackend, EngineFactory, EnginePage};
use crate::error::{ConvertError, Result};
use crate::session::BrowserSession;
use crate::stats::HostStats;

/// How long `unload` waits for in-flight conversions to finish.
const UNLOAD_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// EngineState
// ============================================================================

/// Lifecycle state of the engine host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    /// No initialization has been requested yet.
    Uninitialized = 0,
    /// The engine thread is booting the backend.
    Initializing = 1,
    /// The engine accepts sessions.
    Ready = 2,
    /// Unload has begun; new work is refused.
    ShuttingDown = 3,
    /// The engine thread has exited. Terminal for this process.
    Unloaded = 4,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::ShuttingDown,
            _ => Self::Unloaded,
        }
    }
}

// ============================================================================
// Engine thread internals
// ============================================================================

/// State owned exclusively by the engine thread.
///
/// Not `Send`, and never needs to be: it is constructed on the engine
/// thread and dropped there.
pub(crate) struct EngineRuntime {
    backend: Box<dyn EngineBackend>,
    pages: HashMap<u64, Box<dyn EnginePage>>,
}

impl EngineRuntime {
    /// Look up a live page by session id.
    pub(crate) fn page_mut(&mut self, id: u64) -> Option<&mut (dyn EnginePage + 'static)> {
        self.pages.get_mut(&id).map(move |page| &mut **page)
    }

    /// Create a page for a new session.
    pub(crate) fn create_page(&mut self, id: u64) -> Result<()> {
        let page = self.backend.create_page()?;
        self.pages.insert(id, page);
        Ok(())
    }

    /// Dispose and forget a page. Safe to call for unknown ids.
    pub(crate) fn dispose_page(&mut self, id: u64) {
        if let Some(mut page) = self.pages.remove(&id) {
            page.dispose();
        }
    }
}

/// A unit of work marshaled onto the engine thread.
pub(crate) enum EngineJob {
    /// Run the closure against the engine runtime.
    Call(Box<dyn FnOnce(&mut EngineRuntime) + Send>),
    /// Exit the message loop.
    Shutdown,
}

// ============================================================================
// Shared host state
// ============================================================================

/// State shared between callers and the engine thread.
struct HostShared {
    state: AtomicU8,

    /// Job channel into the engine thread; `None` before initialization
    /// and after shutdown.
    sender: Mutex<Option<Sender<EngineJob>>>,

    /// One-shot readiness broadcast: `None` while booting, then the boot
    /// outcome. Paired condvar wakes every waiter at once.
    ready: (Mutex<Option<std::result::Result<(), String>>>, Condvar),

    /// Conversions currently running, gating unload.
    in_flight: Mutex<usize>,
    idle: Condvar,

    sessions_created: AtomicU64,
}

impl HostShared {
    fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn store_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn broadcast_ready(&self, outcome: std::result::Result<(), String>) {
        let (lock, cvar) = &self.ready;
        let mut slot = lock.lock().unwrap();
        *slot = Some(outcome);
        cvar.notify_all();
    }
}

// ============================================================================
// InFlightGuard
// ============================================================================

/// Marks one conversion as in flight for the lifetime of the guard.
///
/// Dropping the guard decrements the counter and, at zero, wakes an unload
/// waiting for the host to drain.
pub(crate) struct InFlightGuard {
    shared: Arc<HostShared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.shared.in_flight.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.shared.idle.notify_all();
        }
    }
}

// ============================================================================
// EngineHost
// ============================================================================

/// Owner of the process-wide engine instance and its dedicated thread.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use webprint::{EngineHost, engine::ChromeEngineFactory};
///
/// let host = EngineHost::global();
/// host.initialize_blocking(
///     Arc::new(ChromeEngineFactory::with_defaults()),
///     Duration::from_secs(60),
/// )?;
///
/// let session = host.create_session()?;
/// // ... navigate, print ...
/// ```
pub struct EngineHost {
    shared: Arc<HostShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    next_session_id: AtomicU64,
}

static GLOBAL_HOST: OnceLock<Arc<EngineHost>> = OnceLock::new();

impl EngineHost {
    /// Create a standalone host.
    ///
    /// Most callers want [`global()`](Self::global) instead; standalone
    /// hosts exist so tests can run isolated engines side by side.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(HostShared {
                state: AtomicU8::new(EngineState::Uninitialized as u8),
                sender: Mutex::new(None),
                ready: (Mutex::new(None), Condvar::new()),
                in_flight: Mutex::new(0),
                idle: Condvar::new(),
                sessions_created: AtomicU64::new(0),
            }),
            thread: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// The process-wide host instance.
    pub fn global() -> Arc<EngineHost> {
        Arc::clone(GLOBAL_HOST.get_or_init(|| Arc::new(EngineHost::new())))
    }

    /// The global host, only if something has already touched it.
    ///
    /// Used by [`unload_engine`](crate::unload_engine) so that unloading a
    /// never-used engine does not create one just to tear it down.
    pub(crate) fn global_if_exists() -> Option<Arc<EngineHost>> {
        GLOBAL_HOST.get().cloned()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// True once the engine accepts sessions.
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Point-in-time host statistics.
    pub fn stats(&self) -> HostStats {
        HostStats {
            state: self.state(),
            in_flight: *self.shared.in_flight.lock().unwrap(),
            sessions_created: self.shared.sessions_created.load(Ordering::Relaxed),
        }
    }

    /// Start the engine thread and boot the backend.
    ///
    /// Idempotent: a no-op when initialization is already in flight or has
    /// completed. Concurrent callers collapse onto the single boot; use
    /// [`initialize_blocking`](Self::initialize_blocking) to also wait for
    /// the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::EngineInit`] if the host has already been
    /// unloaded — engine shutdown is irreversible for the process.
    pub fn initialize(&self, factory: Arc<dyn EngineFactory>) -> Result<()> {
        match self.state() {
            EngineState::Initializing | EngineState::Ready => {
                log::debug!("Engine already initializing or ready, skipping");
                return Ok(());
            }
            EngineState::ShuttingDown | EngineState::Unloaded => {
                return Err(ConvertError::EngineInit(
                    "engine has been unloaded; restart the process to use it again".to_string(),
                ));
            }
            EngineState::Uninitialized => {}
        }

        if !self
            .shared
            .transition(EngineState::Uninitialized, EngineState::Initializing)
        {
            // Lost the race to another initializer; their boot covers us.
            log::debug!("Initialization raced, deferring to the winner");
            return Ok(());
        }

        log::info!("Starting engine thread...");

        // Fresh readiness slot for this boot attempt.
        {
            let (lock, _) = &self.shared.ready;
            *lock.lock().unwrap() = None;
        }

        let (tx, rx) = mpsc::channel::<EngineJob>();
        *self.shared.sender.lock().unwrap() = Some(tx);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("pdf-engine".to_string())
            .spawn(move || engine_thread_main(factory, rx, shared));

        match spawned {
            Ok(handle) => {
                *self.thread.lock().unwrap() = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.shared.sender.lock().unwrap() = None;
                self.shared
                    .transition(EngineState::Initializing, EngineState::Uninitialized);
                Err(ConvertError::EngineInit(format!(
                    "failed to spawn engine thread: {e}"
                )))
            }
        }
    }

    /// Initialize and block until the engine is ready or boot fails.
    ///
    /// Concurrent calls collapse into the single in-flight initialization;
    /// every caller observes the same outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::EngineInit`] on boot failure or when
    /// `timeout` elapses first.
    pub fn initialize_blocking(
        &self,
        factory: Arc<dyn EngineFactory>,
        timeout: Duration,
    ) -> Result<()> {
        self.initialize(factory)?;
        self.wait_ready(timeout)
    }

    /// Async variant of [`initialize_blocking`](Self::initialize_blocking).
    ///
    /// The blocking wait runs on the blocking thread pool so the async
    /// runtime is never stalled.
    pub async fn initialize_async(
        self: Arc<Self>,
        factory: Arc<dyn EngineFactory>,
        timeout: Duration,
    ) -> Result<()> {
        tokio::task::spawn_blocking(move || self.initialize_blocking(factory, timeout))
            .await
            .map_err(|e| ConvertError::EngineInit(format!("init task panicked: {e}")))?
    }

    /// Block until the current boot attempt resolves.
    fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &self.shared.ready;
        let mut slot = lock.lock().unwrap();

        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone().map_err(ConvertError::EngineInit);
            }

            let now = Instant::now();
            if now >= deadline {
                log::error!("Engine startup timed out after {:?}", timeout);
                return Err(ConvertError::EngineInit(format!(
                    "startup timed out after {timeout:?}"
                )));
            }

            let (guard, _) = cvar.wait_timeout(slot, deadline - now).unwrap();
            slot = guard;
        }
    }

    /// Create a session backed by a fresh engine page.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::EngineNotReady`] before the engine is ready
    /// or once shutdown has begun.
    pub fn create_session(&self) -> Result<BrowserSession> {
        if !self.is_ready() {
            return Err(ConvertError::EngineNotReady);
        }

        let sender = self
            .shared
            .sender
            .lock()
            .unwrap()
            .clone()
            .ok_or(ConvertError::EngineNotReady)?;

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::sync_channel::<Result<()>>(1);
        sender
            .send(EngineJob::Call(Box::new(move |rt: &mut EngineRuntime| {
                let _ = tx.send(rt.create_page(id));
            })))
            .map_err(|_| ConvertError::EngineNotReady)?;

        rx.recv().map_err(|_| ConvertError::EngineNotReady)??;

        self.shared.sessions_created.fetch_add(1, Ordering::Relaxed);
        log::debug!("Created session {}", id);
        Ok(BrowserSession::new(id, sender))
    }

    /// Register one conversion as in flight.
    ///
    /// Refused once shutdown has begun so `unload` can actually drain.
    pub(crate) fn begin_conversion(&self) -> Result<InFlightGuard> {
        match self.state() {
            EngineState::ShuttingDown | EngineState::Unloaded => {
                Err(ConvertError::EngineNotReady)
            }
            _ => {
                *self.shared.in_flight.lock().unwrap() += 1;
                Ok(InFlightGuard {
                    shared: Arc::clone(&self.shared),
                })
            }
        }
    }

    /// Terminate the engine thread. Irreversible for this process.
    ///
    /// Waits up to 30 seconds for in-flight conversions to finish before
    /// stopping the message loop. Calling this on a host that was never
    /// initialized is a safe no-op: no error, no state change.
    pub fn unload(&self) {
        match self.state() {
            EngineState::Uninitialized => {
                log::debug!("Unload requested but engine was never initialized, nothing to do");
                return;
            }
            EngineState::ShuttingDown | EngineState::Unloaded => {
                log::debug!("Unload already in progress or done");
                return;
            }
            EngineState::Initializing | EngineState::Ready => {}
        }

        log::info!("Unloading engine...");
        self.shared.store_state(EngineState::ShuttingDown);

        // Let in-flight conversions finish; they were admitted before the
        // state flipped.
        let deadline = Instant::now() + UNLOAD_DRAIN_TIMEOUT;
        {
            let mut count = self.shared.in_flight.lock().unwrap();
            while *count > 0 {
                let now = Instant::now();
                if now >= deadline {
                    log::warn!(
                        "Unloading with {} conversions still in flight after {:?}",
                        *count,
                        UNLOAD_DRAIN_TIMEOUT
                    );
                    break;
                }
                let (guard, _) = self
                    .shared
                    .idle
                    .wait_timeout(count, deadline - now)
                    .unwrap();
                count = guard;
            }
        }

        if let Some(sender) = self.shared.sender.lock().unwrap().take() {
            let _ = sender.send(EngineJob::Shutdown);
        }

        if let Some(handle) = self.thread.lock().unwrap().take() {
            match handle.join() {
                Ok(_) => log::info!("Engine thread stopped cleanly"),
                Err(_) => log::error!("Engine thread panicked during shutdown"),
            }
        }

        self.shared.store_state(EngineState::Unloaded);
        log::info!("Engine unloaded");
    }
}

impl Default for EngineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHost")
            .field("state", &self.state())
            .field("in_flight", &*self.shared.in_flight.lock().unwrap())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Engine thread main
// ============================================================================

/// Body of the dedicated engine thread.
///
/// Boots the backend, broadcasts the outcome, then serves marshaled jobs
/// until the shutdown sentinel arrives. Pages left behind by sessions that
/// never disposed are cleaned up on the way out.
fn engine_thread_main(
    factory: Arc<dyn EngineFactory>,
    rx: mpsc::Receiver<EngineJob>,
    shared: Arc<HostShared>,
) {
    log::debug!("Engine thread started, booting backend...");

    let backend = match factory.boot() {
        Ok(backend) => backend,
        Err(e) => {
            log::error!("Engine boot failed: {}", e);
            shared.broadcast_ready(Err(e.to_string()));
            *shared.sender.lock().unwrap() = None;
            // Reopening the retry gate comes last so no new initializer
            // can race this cleanup; the CAS leaves an unload that raced
            // in untouched.
            shared.transition(EngineState::Initializing, EngineState::Uninitialized);
            return;
        }
    };

    shared.transition(EngineState::Initializing, EngineState::Ready);
    shared.broadcast_ready(Ok(()));
    log::info!("Engine ready");

    let mut runtime = EngineRuntime {
        backend,
        pages: HashMap::new(),
    };

    while let Ok(job) = rx.recv() {
        match job {
            EngineJob::Call(call) => call(&mut runtime),
            EngineJob::Shutdown => {
                log::debug!("Engine thread received shutdown");
                break;
            }
        }
    }

    let leftover = runtime.pages.len();
    if leftover > 0 {
        log::warn!("Disposing {} pages left behind at shutdown", leftover);
        for (_, mut page) in runtime.pages.drain() {
            page.dispose();
        }
    }

    log::debug!("Engine thread exiting");
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngineFactory;

    #[test]
    fn test_new_host_is_uninitialized() {
        let host = EngineHost::new();
        assert_eq!(host.state(), EngineState::Uninitialized);
        assert!(!host.is_ready());
    }

    /// Unload on a never-initialized host: no error, no state change.
    #[test]
    fn test_unload_never_initialized_is_noop() {
        let host = EngineHost::new();
        host.unload();
        assert_eq!(host.state(), EngineState::Uninitialized);

        // Still initializable afterwards.
        let factory = Arc::new(MockEngineFactory::new());
        host.initialize_blocking(factory, Duration::from_secs(5))
            .unwrap();
        assert!(host.is_ready());
        host.unload();
    }

    #[test]
    fn test_initialize_blocking_reaches_ready() {
        let host = EngineHost::new();
        let factory = Arc::new(MockEngineFactory::new());

        host.initialize_blocking(Arc::clone(&factory) as Arc<dyn EngineFactory>, Duration::from_secs(5))
            .unwrap();

        assert_eq!(host.state(), EngineState::Ready);
        assert_eq!(factory.boot_count(), 1);
        host.unload();
        assert_eq!(host.state(), EngineState::Unloaded);
    }

    /// Repeat initialization is a no-op and boots exactly once.
    #[test]
    fn test_initialize_idempotent() {
        let host = EngineHost::new();
        let factory = Arc::new(MockEngineFactory::new());

        for _ in 0..3 {
            host.initialize_blocking(
                Arc::clone(&factory) as Arc<dyn EngineFactory>,
                Duration::from_secs(5),
            )
            .unwrap();
        }

        assert_eq!(factory.boot_count(), 1);
        host.unload();
    }

    /// Boot failure surfaces as EngineInit and allows a retry.
    #[test]
    fn test_boot_failure_then_retry() {
        let host = EngineHost::new();

        let bad = Arc::new(MockEngineFactory::failing_boot("no binary"));
        let err = host
            .initialize_blocking(bad, Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, ConvertError::EngineInit(_)));
        assert_eq!(host.state(), EngineState::Uninitialized);

        let good = Arc::new(MockEngineFactory::new());
        host.initialize_blocking(good, Duration::from_secs(5))
            .unwrap();
        assert!(host.is_ready());
        host.unload();
    }

    /// Sessions are refused before the engine is ready.
    #[test]
    fn test_create_session_before_ready() {
        let host = EngineHost::new();
        match host.create_session() {
            Err(ConvertError::EngineNotReady) => {}
            other => panic!("Expected EngineNotReady, got {:?}", other.map(|_| ())),
        }
    }

    /// Concurrent initializers collapse onto one boot and all observe it.
    #[test]
    fn test_concurrent_initialize_collapses() {
        let host = Arc::new(EngineHost::new());
        let factory = Arc::new(MockEngineFactory::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let host = Arc::clone(&host);
            let factory = Arc::clone(&factory) as Arc<dyn EngineFactory>;
            handles.push(thread::spawn(move || {
                host.initialize_blocking(factory, Duration::from_secs(5))
            }));
        }

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(factory.boot_count(), 1);
        host.unload();
    }

    #[test]
    fn test_stats_snapshot() {
        let host = EngineHost::new();
        let factory = Arc::new(MockEngineFactory::new());
        host.initialize_blocking(factory, Duration::from_secs(5))
            .unwrap();

        let _session = host.create_session().unwrap();
        let stats = host.stats();
        assert_eq!(stats.state, EngineState::Ready);
        assert_eq!(stats.sessions_created, 1);
        assert_eq!(stats.in_flight, 0);

        host.unload();
    }
}
