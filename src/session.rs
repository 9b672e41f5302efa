//! Per-request session facade over one engine page.
//!
//! A [`BrowserSession`] is created by
//! [`EngineHost::create_session`](crate::EngineHost::create_session),
//! belongs to exactly one conversion, and is never shared or reused. Every
//! method marshals a closure onto the dedicated engine thread and blocks on
//! a capacity-one result channel — synchronous from the caller's
//! perspective, though a returned call does not imply engine-internal
//! asynchronous work (notably file flushing after print) has finished.
//!
//! Sessions release their engine-side page on [`dispose`] or, failing
//! that, on drop.
//!
//! [`dispose`]: BrowserSession::dispose

use std::path::Path;
use std::sync::mpsc::{self, Sender};

use crate::engine::ReadyCallback;
use crate::error::{ConvertError, Result};
use crate::host::{EngineJob, EngineRuntime};
use crate::request::{Cookie, HeaderEntry};
use crate::settings::PrintSettings;

/// Facade over one engine browser instance.
///
/// All methods execute on the engine thread via cross-thread dispatch.
/// Because every session in the process shares that one thread,
/// navigation and print dispatches from concurrent conversions serialize
/// in submission order.
pub struct BrowserSession {
    id: u64,
    engine: Sender<EngineJob>,
    disposed: bool,
}

impl BrowserSession {
    pub(crate) fn new(id: u64, engine: Sender<EngineJob>) -> Self {
        Self {
            id,
            engine,
            disposed: false,
        }
    }

    /// Session id, for log correlation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Marshal `f` onto the engine thread and wait for its result.
    ///
    /// The closure runs against this session's page. A closed channel on
    /// either side means the engine has gone away mid-call.
    fn with_page<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut (dyn crate::engine::EnginePage + 'static)) -> R + Send + 'static,
    {
        let id = self.id;
        let (tx, rx) = mpsc::sync_channel::<Option<R>>(1);

        self.engine
            .send(EngineJob::Call(Box::new(move |rt: &mut EngineRuntime| {
                let out = rt.page_mut(id).map(f);
                let _ = tx.send(out);
            })))
            .map_err(|_| ConvertError::EngineNotReady)?;

        match rx.recv() {
            Ok(Some(result)) => Ok(result),
            Ok(None) => {
                log::error!("Session {} called after its page was released", id);
                Err(ConvertError::EngineNotReady)
            }
            Err(_) => Err(ConvertError::EngineNotReady),
        }
    }

    /// Register the one-shot document-ready callback.
    ///
    /// Must be installed before navigation; the engine fires it at most
    /// once, asynchronously, when it reports load completion.
    pub fn on_document_ready(&self, notify: ReadyCallback) -> Result<()> {
        self.with_page(move |page| page.on_document_ready(notify))
    }

    /// Enable or disable script execution for this session's page.
    pub fn set_javascript_enabled(&self, enabled: bool) -> Result<()> {
        self.with_page(move |page| page.set_javascript_enabled(enabled))?
    }

    /// Register a cookie into the per-host jar before navigation.
    pub fn set_cookie(&self, host: &str, cookie: &Cookie) -> Result<()> {
        let host = host.to_string();
        let cookie = cookie.clone();
        self.with_page(move |page| page.set_cookie(&host, &cookie))?
    }

    /// Navigate to `url`, sending the given request headers.
    pub fn load_url(&self, url: &str, headers: &[HeaderEntry]) -> Result<()> {
        let url = url.to_string();
        let headers = headers.to_vec();
        self.with_page(move |page| page.load_url(&url, &headers))?
    }

    /// Load raw markup, resolving relative resources against `base_url`.
    pub fn load_markup(&self, html: &str, base_url: &str) -> Result<()> {
        let html = html.to_string();
        let base_url = base_url.to_string();
        self.with_page(move |page| page.load_markup(&html, &base_url))?
    }

    /// Dispatch printing of the loaded document to `output`.
    ///
    /// Returning does not guarantee the file is complete — completion is
    /// detected by lock polling on the output path.
    pub fn print_to_file(&self, settings: &PrintSettings, output: &Path) -> Result<()> {
        let settings = settings.clone();
        let output = output.to_path_buf();
        self.with_page(move |page| page.print_to_file(&settings, &output))?
    }

    /// Release the engine-side page. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let id = self.id;
        let (tx, rx) = mpsc::sync_channel::<()>(1);
        let sent = self
            .engine
            .send(EngineJob::Call(Box::new(move |rt: &mut EngineRuntime| {
                rt.dispose_page(id);
                let _ = tx.send(());
            })))
            .is_ok();

        if sent {
            // Wait so the page is really gone before the session reports
            // disposed; ignore a vanished engine.
            let _ = rx.recv();
            log::debug!("Session {} disposed", id);
        }
    }
}

impl Drop for BrowserSession {
    /// Release the page even when the owning conversion unwinds early.
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.id)
            .field("disposed", &self.disposed)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
