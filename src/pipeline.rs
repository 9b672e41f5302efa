//! The end-to-end conversion pipeline.
//!
//! [`Converter`] is the public entry point: it carries a
//! [`ConvertConfig`], an engine factory, and a host reference, and runs the
//! whole conversion for each request:
//!
//! ```text
//! ensure engine ready ─▶ create session ─▶ register cookies
//!        │                                       │
//!        ▼                                       ▼
//! install one-shot ready listener ─▶ dispatch navigation (engine thread)
//!        │
//!        ▼ (document complete + settle delay)
//! wait for ready signal (bounded) ─▶ resolve output path
//!        │
//!        ▼
//! dispatch print (engine thread) ─▶ poll output until unlocked (bounded)
//!        │
//!        ▼
//! read bytes ─▶ delete output ─▶ dispose session ─▶ return bytes
//! ```
//!
//! Each conversion is fully synchronous relative to its own caller; the
//! `*_async` variants run the identical pipeline on the blocking thread
//! pool. Concurrent conversions each own an independent session, but every
//! engine dispatch funnels through the single engine thread and serializes
//! in submission order — true parallelism exists only at the I/O-wait
//! layer.
//!
//! # Blocking Behavior
//!
//! **The synchronous methods block the calling thread**, potentially for
//! the full navigation timeout plus the polling budget. In an async
//! context use the `*_async` variants, which wrap the pipeline in
//! `tokio::task::spawn_blocking`.
//!
//! # Example
//!
//! ```rust,ignore
//! use webprint::{Converter, ConvertConfig};
//!
//! let converter = Converter::new(ConvertConfig::default());
//!
//! // URL to PDF
//! let pdf = converter.convert("https://example.com/invoice/42")?;
//! assert!(pdf.starts_with(b"%PDF-"));
//!
//! // Pre-rendered view to PDF, resolving relative assets
//! let pdf = converter.convert_html(
//!     "https://example.com/invoice/42",
//!     "<html>...</html>",
//!     &[],
//!     &[],
//!     None,
//! )?;
//!
//! // Process shutdown
//! webprint::unload_engine();
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use url::Url;

use crate::config::ConvertConfig;
use crate::engine::{ChromeEngineFactory, EngineFactory};
use crate::error::{ConvertError, Result};
use crate::host::EngineHost;
use crate::request::{CancelToken, ConvertRequest, Cookie, HeaderEntry, PageSource, default_headers};
use crate::session::BrowserSession;
use crate::settings::{build_print_settings, lock_poll_settings};
use crate::waiter::{FsLockProbe, LockProbe, wait_until_unlocked};

/// Granularity of the ready wait, so cancellation is observed promptly.
const READY_POLL_SLICE: Duration = Duration::from_millis(25);

// ============================================================================
// Converter
// ============================================================================

/// Converts web content to PDF through the shared engine.
///
/// Cheap to clone; clones share the same engine host and factory. One
/// converter may serve many concurrent conversions — each gets its own
/// session.
#[derive(Clone)]
pub struct Converter {
    config: ConvertConfig,
    factory: Arc<dyn EngineFactory>,
    host: Arc<EngineHost>,
}

impl Converter {
    /// Create a converter using the process-wide engine host and the
    /// default browser backend.
    ///
    /// With the `env-config` feature enabled, `PDF_ENGINE_PATH` selects the
    /// engine binary; otherwise common installation paths are searched.
    pub fn new(config: ConvertConfig) -> Self {
        #[cfg(feature = "env-config")]
        let factory: Arc<dyn EngineFactory> =
            match crate::config::env::engine_path_from_env() {
                Some(path) => {
                    log::info!("Using engine binary from environment: {}", path);
                    Arc::new(ChromeEngineFactory::with_path(path))
                }
                None => Arc::new(ChromeEngineFactory::with_defaults()),
            };

        #[cfg(not(feature = "env-config"))]
        let factory: Arc<dyn EngineFactory> = Arc::new(ChromeEngineFactory::with_defaults());

        Self {
            config,
            factory,
            host: EngineHost::global(),
        }
    }

    /// Start building a converter with explicit parts.
    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::new()
    }

    /// The configuration this converter applies to every request.
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Public conversion operations
    // ------------------------------------------------------------------------

    /// Convert the page at `url` to PDF.
    ///
    /// # Errors
    ///
    /// Any [`ConvertError`] variant from the pipeline stages; see the
    /// module docs for the stage order.
    pub fn convert(&self, url: &str) -> Result<Vec<u8>> {
        self.convert_request(&ConvertRequest::url(url))
    }

    /// Convert the page at `url`, sending headers and cookies with the
    /// navigation.
    ///
    /// Cookies are registered into the session's jar for the URL's host
    /// before navigation; when no headers are supplied a fixed default set
    /// is sent instead.
    pub fn convert_with(
        &self,
        url: &str,
        headers: &[HeaderEntry],
        cookies: &[Cookie],
    ) -> Result<Vec<u8>> {
        self.convert_request(
            &ConvertRequest::url(url)
                .with_headers(headers.to_vec())
                .with_cookies(cookies.to_vec()),
        )
    }

    /// Convert pre-rendered markup to PDF.
    ///
    /// `base_url` resolves relative resource references inside the markup
    /// and scopes the cookies. When `output_path` is given the PDF is
    /// written there (missing parents created) instead of a temp file —
    /// but it is still deleted after its bytes are read.
    pub fn convert_html(
        &self,
        base_url: &str,
        html: &str,
        headers: &[HeaderEntry],
        cookies: &[Cookie],
        output_path: Option<&Path>,
    ) -> Result<Vec<u8>> {
        let mut request = ConvertRequest::markup(html, base_url)
            .with_headers(headers.to_vec())
            .with_cookies(cookies.to_vec());
        if let Some(path) = output_path {
            request = request.with_output_path(path);
        }
        self.convert_request(&request)
    }

    /// Convert a fully assembled request.
    pub fn convert_request(&self, request: &ConvertRequest) -> Result<Vec<u8>> {
        log::debug!("Converting {}", request.navigation_url());
        let started = Instant::now();

        let bytes = self.run(request)?;

        log::info!(
            "Converted {} to {} bytes in {:?}",
            request.navigation_url(),
            bytes.len(),
            started.elapsed()
        );
        Ok(bytes)
    }

    /// Async variant of [`convert`](Self::convert).
    pub async fn convert_async(&self, url: impl Into<String>) -> Result<Vec<u8>> {
        let this = self.clone();
        let url = url.into();
        run_blocking(move || this.convert(&url)).await
    }

    /// Async variant of [`convert_with`](Self::convert_with).
    pub async fn convert_with_async(
        &self,
        url: impl Into<String>,
        headers: Vec<HeaderEntry>,
        cookies: Vec<Cookie>,
    ) -> Result<Vec<u8>> {
        let this = self.clone();
        let url = url.into();
        run_blocking(move || this.convert_with(&url, &headers, &cookies)).await
    }

    /// Async variant of [`convert_html`](Self::convert_html).
    pub async fn convert_html_async(
        &self,
        base_url: impl Into<String>,
        html: impl Into<String>,
        headers: Vec<HeaderEntry>,
        cookies: Vec<Cookie>,
        output_path: Option<PathBuf>,
    ) -> Result<Vec<u8>> {
        let this = self.clone();
        let base_url = base_url.into();
        let html = html.into();
        run_blocking(move || {
            this.convert_html(&base_url, &html, &headers, &cookies, output_path.as_deref())
        })
        .await
    }

    /// Async variant of [`convert_request`](Self::convert_request).
    pub async fn convert_request_async(&self, request: ConvertRequest) -> Result<Vec<u8>> {
        let this = self.clone();
        run_blocking(move || this.convert_request(&request)).await
    }

    // ------------------------------------------------------------------------
    // Pipeline internals
    // ------------------------------------------------------------------------

    /// Run the pipeline for one request.
    fn run(&self, request: &ConvertRequest) -> Result<Vec<u8>> {
        self.ensure_engine_ready()?;

        let _guard = self.host.begin_conversion()?;
        let mut session = self.host.create_session()?;

        let result = self.drive(&session, request);

        // Released on every path; Drop would also cover a panic.
        session.dispose();
        result
    }

    /// Bring the shared engine up if this is the first conversion.
    fn ensure_engine_ready(&self) -> Result<()> {
        if self.host.is_ready() {
            return Ok(());
        }
        log::info!("Engine not ready, initializing...");
        self.host
            .initialize_blocking(Arc::clone(&self.factory), self.config.init_timeout)
    }

    /// Steps 3-11: everything that happens inside one session.
    fn drive(&self, session: &BrowserSession, request: &ConvertRequest) -> Result<Vec<u8>> {
        if !self.config.javascript_enabled {
            session.set_javascript_enabled(false)?;
        }

        self.register_cookies(session, request)?;

        // One-shot ready signal. The engine's complete event fires before
        // asynchronous painting has finished, so the listener releases the
        // signal only after the settle delay — and off the callback thread,
        // which belongs to the engine.
        let (ready_tx, ready_rx) = mpsc::sync_channel::<()>(1);
        let settle = self.config.settle_delay;
        session.on_document_ready(Box::new(move || {
            thread::spawn(move || {
                thread::sleep(settle);
                let _ = ready_tx.send(());
            });
        }))?;

        match &request.source {
            PageSource::Url(url) => {
                let fallback;
                let headers: &[HeaderEntry] = if request.headers.is_empty() {
                    fallback = default_headers();
                    &fallback
                } else {
                    &request.headers
                };
                session.load_url(url, headers)?;
            }
            PageSource::Markup { html, base_url } => {
                session.load_markup(html, base_url)?;
            }
        }

        self.wait_for_ready(&ready_rx, request.cancel.as_ref())?;

        let output = self.resolve_output(request)?;

        let settings = build_print_settings(&self.config);
        session.print_to_file(&settings, output.path())?;

        let poll = lock_poll_settings(&self.config);
        let mut probe = CancellableProbe::new(request.cancel.as_ref());
        wait_until_unlocked(&mut probe, output.path(), poll.delay, poll.max_attempts)?;
        if probe.observed_cancel {
            return Err(ConvertError::Cancelled);
        }

        let bytes = fs::read(output.path())?;
        Ok(bytes)
        // `output` drops here and deletes the file on every path.
    }

    /// Step 3: host-scoped cookie registration.
    ///
    /// An unparsable navigation URL means there is no host to scope the
    /// cookies to; they are skipped without failing the conversion.
    fn register_cookies(&self, session: &BrowserSession, request: &ConvertRequest) -> Result<()> {
        if request.cookies.is_empty() {
            return Ok(());
        }

        let host = Url::parse(request.navigation_url())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        let Some(host) = host else {
            log::debug!(
                "No parsable host in '{}', skipping {} cookies",
                request.navigation_url(),
                request.cookies.len()
            );
            return Ok(());
        };

        for cookie in &request.cookies {
            session.set_cookie(&host, cookie)?;
        }
        log::debug!("Registered {} cookies for {}", request.cookies.len(), host);
        Ok(())
    }

    /// Step 6: suspend until the ready signal, bounded by the navigation
    /// timeout, observing cancellation between slices.
    fn wait_for_ready(&self, ready: &Receiver<()>, cancel: Option<&CancelToken>) -> Result<()> {
        let timeout = self.config.navigation_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    log::info!("Conversion cancelled while waiting for document ready");
                    return Err(ConvertError::Cancelled);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!("Document not ready after {:?}", timeout);
                return Err(ConvertError::NavigationTimeout(timeout));
            }

            let slice = READY_POLL_SLICE.min(deadline - now);
            match ready.recv_timeout(slice) {
                Ok(()) => return Ok(()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // The listener was dropped unfired (failed navigation).
                    // Keep honoring the bounded wait so cancellation stays
                    // observable, then report the timeout.
                    thread::sleep(slice);
                }
            }
        }
    }

    /// Step 7: bind exactly one output path to this conversion.
    ///
    /// Caller-supplied paths get their parents and the file created; a
    /// generated path lands in the system temp directory under a unique
    /// name. Either way the returned guard deletes the file when dropped.
    fn resolve_output(&self, request: &ConvertRequest) -> Result<OutputFile> {
        let path = match &request.output_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                fs::File::create(path)?;
                path.clone()
            }
            None => std::env::temp_dir().join(format!("webprint-{}.pdf", uuid::Uuid::new_v4())),
        };

        log::trace!("Output path: {}", path.display());
        Ok(OutputFile { path })
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run a blocking pipeline closure on the blocking pool.
async fn run_blocking<F>(f: F) -> Result<Vec<u8>>
where
    F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConvertError::Io(std::io::Error::other(format!("conversion task failed: {e}"))))?
}

// ============================================================================
// ConverterBuilder
// ============================================================================

/// Builder for [`Converter`] with explicit configuration, factory, and
/// host.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use webprint::{Converter, ConvertConfigBuilder};
/// use webprint::engine::ChromeEngineFactory;
///
/// let converter = Converter::builder()
///     .config(ConvertConfigBuilder::new().print_background_images(true).build()?)
///     .factory(Arc::new(ChromeEngineFactory::with_path("/opt/chromium/chrome".into())))
///     .build();
/// ```
pub struct ConverterBuilder {
    config: Option<ConvertConfig>,
    factory: Option<Arc<dyn EngineFactory>>,
    host: Option<Arc<EngineHost>>,
}

impl ConverterBuilder {
    /// Create a builder with defaults.
    pub fn new() -> Self {
        Self {
            config: None,
            factory: None,
            host: None,
        }
    }

    /// Set the conversion configuration (defaults to
    /// [`ConvertConfig::default()`]).
    pub fn config(mut self, config: ConvertConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the engine factory (defaults to the auto-detected browser
    /// backend).
    pub fn factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use a specific host instead of the process-wide one.
    ///
    /// Intended for tests that need isolated engines.
    pub fn host(mut self, host: Arc<EngineHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Build the converter.
    pub fn build(self) -> Converter {
        let config = self.config.unwrap_or_default();
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(ChromeEngineFactory::with_defaults()));
        let host = self.host.unwrap_or_else(EngineHost::global);

        Converter {
            config,
            factory,
            host,
        }
    }
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Deletes the bound output file when dropped, on success and failure
/// paths alike.
///
/// A delete failure after a successful read must not fail the conversion,
/// so it is logged and swallowed here.
struct OutputFile {
    path: PathBuf,
}

impl OutputFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!(
                "Failed to delete output file {} (conversion unaffected): {}",
                self.path.display(),
                e
            );
        } else {
            log::trace!("Deleted output file {}", self.path.display());
        }
    }
}

/// Lock probe that reports "unlocked" as soon as cancellation is observed,
/// so the poll loop exits at its next check instead of running out the
/// budget. The pipeline turns the early exit into
/// [`ConvertError::Cancelled`].
struct CancellableProbe<'a> {
    inner: FsLockProbe,
    cancel: Option<&'a CancelToken>,
    observed_cancel: bool,
}

impl<'a> CancellableProbe<'a> {
    fn new(cancel: Option<&'a CancelToken>) -> Self {
        Self {
            inner: FsLockProbe,
            cancel,
            observed_cancel: false,
        }
    }
}

impl LockProbe for CancellableProbe<'_> {
    fn is_locked(&mut self, path: &Path) -> bool {
        if let Some(token) = self.cancel {
            if token.is_cancelled() {
                log::info!("Conversion cancelled while waiting for output file");
                self.observed_cancel = true;
                return false;
            }
        }
        self.inner.is_locked(path)
    }
}

// ============================================================================
// Process-wide shutdown
// ============================================================================

/// Unload the process-wide engine. Call once at application shutdown.
///
/// Blocks until in-flight conversions drain (bounded) and the engine
/// thread exits. Safe to call when the engine was never initialized — a
/// no-op with no error and no state change. Irreversible: after unloading,
/// conversions fail until the process restarts.
///
/// # Example
///
/// ```rust
/// // At shutdown, even if no conversion ever ran:
/// webprint::unload_engine();
/// ```
pub fn unload_engine() {
    match EngineHost::global_if_exists() {
        Some(host) => host.unload(),
        None => log::debug!("Engine was never used; nothing to unload"),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
