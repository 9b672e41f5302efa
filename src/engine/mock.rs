//! Scripted engine backend for testing without a real browser.
//!
//! This module provides a mock implementation of the engine traits that can
//! be configured to fail at boot, delay or withhold the document-ready
//! signal, and delay the output-file write — which is exactly what the
//! lock-polling completion detection needs exercised against.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use webprint::engine::mock::MockEngineFactory;
//!
//! // Engine that never comes up
//! let factory = MockEngineFactory::failing_boot("binary not found");
//!
//! // Engine whose file writes lag behind the print dispatch
//! let factory = MockEngineFactory::new().with_write_delay(Duration::from_millis(200));
//! ```

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{EngineBackend, EngineFactory, EnginePage, ReadyCallback};
use crate::error::{ConvertError, Result};
use crate::request::{Cookie, HeaderEntry};
use crate::settings::PrintSettings;

/// What a mock page was asked to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedContent {
    /// A URL navigation with the headers that accompanied it.
    Url {
        /// The navigated URL.
        url: String,
        /// Headers passed with the navigation.
        headers: Vec<HeaderEntry>,
    },
    /// A raw markup load.
    Markup {
        /// The loaded HTML.
        html: String,
        /// The base URL supplied for resource resolution.
        base_url: String,
    },
}

/// Observable record of one mock page's life, shared with tests.
#[derive(Debug, Default)]
pub struct PageRecord {
    /// The load dispatched to this page, if any.
    pub loaded: Option<LoadedContent>,
    /// Cookies registered on this page, with the host each was scoped to.
    pub cookies: Vec<(String, Cookie)>,
    /// Script-execution toggle values applied, in order.
    pub javascript: Vec<bool>,
    /// Number of print dispatches.
    pub prints: usize,
    /// Whether the page has been disposed.
    pub disposed: bool,
}

/// Per-page observation handle.
#[derive(Debug, Default)]
pub struct PageState {
    record: Mutex<PageRecord>,
}

impl PageState {
    /// Snapshot the current record.
    pub fn snapshot(&self) -> PageRecord {
        let r = self.record.lock().unwrap();
        PageRecord {
            loaded: r.loaded.clone(),
            cookies: r.cookies.clone(),
            javascript: r.javascript.clone(),
            prints: r.prints,
            disposed: r.disposed,
        }
    }

    /// Hosts this page has cookies registered for.
    pub fn cookie_hosts(&self) -> Vec<String> {
        self.record
            .lock()
            .unwrap()
            .cookies
            .iter()
            .map(|(h, _)| h.clone())
            .collect()
    }
}

/// Shared state of a mock engine, inspectable from tests.
#[derive(Debug, Default)]
pub struct MockEngineState {
    pages: Mutex<Vec<Arc<PageState>>>,
}

impl MockEngineState {
    /// All pages created so far, in creation order.
    pub fn pages(&self) -> Vec<Arc<PageState>> {
        self.pages.lock().unwrap().clone()
    }

    /// Number of pages created.
    pub fn page_count(&self) -> usize {
        self.pages.lock().unwrap().len()
    }
}

/// Scripted engine factory for tests.
///
/// By default it boots successfully, signals document-ready immediately,
/// and writes a deterministic pseudo-PDF derived from the loaded content as
/// soon as print is dispatched.
pub struct MockEngineFactory {
    boot_failure: Option<String>,
    ready_delay: Duration,
    never_ready: bool,
    write_delay: Duration,
    print_failure: Option<String>,
    boot_count: Arc<AtomicUsize>,
    state: Arc<MockEngineState>,
}

impl MockEngineFactory {
    /// A factory that boots successfully with immediate behavior.
    pub fn new() -> Self {
        Self {
            boot_failure: None,
            ready_delay: Duration::ZERO,
            never_ready: false,
            write_delay: Duration::ZERO,
            print_failure: None,
            boot_count: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(MockEngineState::default()),
        }
    }

    /// A factory whose boot always fails with the given message.
    pub fn failing_boot<S: Into<String>>(message: S) -> Self {
        let mut factory = Self::new();
        factory.boot_failure = Some(message.into());
        factory
    }

    /// Delay the document-ready signal by `delay` after each load.
    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Never fire the document-ready signal (pages hang loading).
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// Delay the output-file write by `delay` after each print dispatch.
    ///
    /// Exercises the completion poll: the file does not exist until the
    /// delay elapses.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Fail every print dispatch with the given message.
    pub fn failing_print<S: Into<String>>(mut self, message: S) -> Self {
        self.print_failure = Some(message.into());
        self
    }

    /// Observation handle shared with every backend this factory boots.
    pub fn state(&self) -> Arc<MockEngineState> {
        Arc::clone(&self.state)
    }

    /// Number of successful boot attempts.
    pub fn boot_count(&self) -> usize {
        self.boot_count.load(Ordering::SeqCst)
    }
}

impl Default for MockEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for MockEngineFactory {
    fn boot(&self) -> Result<Box<dyn EngineBackend>> {
        if let Some(message) = &self.boot_failure {
            log::debug!("Mock engine boot failing on request: {}", message);
            return Err(ConvertError::EngineInit(message.clone()));
        }

        self.boot_count.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockEngine {
            ready_delay: self.ready_delay,
            never_ready: self.never_ready,
            write_delay: self.write_delay,
            print_failure: self.print_failure.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockEngine {
    ready_delay: Duration,
    never_ready: bool,
    write_delay: Duration,
    print_failure: Option<String>,
    state: Arc<MockEngineState>,
}

impl EngineBackend for MockEngine {
    fn create_page(&mut self) -> Result<Box<dyn EnginePage>> {
        let page_state = Arc::new(PageState::default());
        self.state.pages.lock().unwrap().push(Arc::clone(&page_state));

        Ok(Box::new(MockPage {
            state: page_state,
            ready: None,
            ready_delay: self.ready_delay,
            never_ready: self.never_ready,
            write_delay: self.write_delay,
            print_failure: self.print_failure.clone(),
        }))
    }
}

struct MockPage {
    state: Arc<PageState>,
    ready: Option<ReadyCallback>,
    ready_delay: Duration,
    never_ready: bool,
    write_delay: Duration,
    print_failure: Option<String>,
}

impl MockPage {
    fn fire_ready(&mut self) {
        let Some(notify) = self.ready.take() else {
            return;
        };
        if self.never_ready {
            // Withhold the signal; the caller's bounded wait must expire.
            drop(notify);
            return;
        }
        let delay = self.ready_delay;
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            notify();
        });
    }

    /// Deterministic pseudo-PDF derived from the loaded content.
    ///
    /// Identical loads produce identical bytes, and the content marker
    /// makes cross-session contamination detectable in tests.
    fn render(&self) -> Vec<u8> {
        let marker = match &self.state.record.lock().unwrap().loaded {
            Some(LoadedContent::Url { url, .. }) => format!("source:{}", url),
            Some(LoadedContent::Markup { html, base_url }) => {
                format!("base:{};markup:{}", base_url, html)
            }
            None => "blank".to_string(),
        };
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend_from_slice(marker.as_bytes());
        bytes.extend_from_slice(b"\n%%EOF\n");
        bytes
    }
}

impl EnginePage for MockPage {
    fn on_document_ready(&mut self, notify: ReadyCallback) {
        self.ready = Some(notify);
    }

    fn set_javascript_enabled(&mut self, enabled: bool) -> Result<()> {
        self.state.record.lock().unwrap().javascript.push(enabled);
        Ok(())
    }

    fn set_cookie(&mut self, host: &str, cookie: &Cookie) -> Result<()> {
        self.state
            .record
            .lock()
            .unwrap()
            .cookies
            .push((host.to_string(), cookie.clone()));
        Ok(())
    }

    fn load_url(&mut self, url: &str, headers: &[HeaderEntry]) -> Result<()> {
        self.state.record.lock().unwrap().loaded = Some(LoadedContent::Url {
            url: url.to_string(),
            headers: headers.to_vec(),
        });
        self.fire_ready();
        Ok(())
    }

    fn load_markup(&mut self, html: &str, base_url: &str) -> Result<()> {
        self.state.record.lock().unwrap().loaded = Some(LoadedContent::Markup {
            html: html.to_string(),
            base_url: base_url.to_string(),
        });
        self.fire_ready();
        Ok(())
    }

    fn print_to_file(&mut self, _settings: &PrintSettings, output: &Path) -> Result<()> {
        if let Some(message) = &self.print_failure {
            return Err(ConvertError::Print(message.clone()));
        }

        self.state.record.lock().unwrap().prints += 1;

        let bytes = self.render();
        let output = output.to_path_buf();
        let part = output.with_extension("part");
        let delay = self.write_delay;

        // Same contract as a real engine: the dispatch returns before the
        // file exists; the part-then-rename keeps the appearance atomic.
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            if let Err(e) = fs::write(&part, &bytes).and_then(|_| fs::rename(&part, &output)) {
                log::error!("Mock print write failed for {}: {}", output.display(), e);
            }
        });

        Ok(())
    }

    fn dispose(&mut self) {
        self.state.record.lock().unwrap().disposed = true;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Boot failure is reported as an engine init error.
    #[test]
    fn test_failing_boot() {
        let factory = MockEngineFactory::failing_boot("no binary");
        match factory.boot() {
            Err(ConvertError::EngineInit(msg)) => assert_eq!(msg, "no binary"),
            other => panic!("Expected EngineInit, got {:?}", other.map(|_| ())),
        }
        assert_eq!(factory.boot_count(), 0);
    }

    /// Pages record their loads and cookies for inspection.
    #[test]
    fn test_page_records_activity() {
        let factory = MockEngineFactory::new();
        let state = factory.state();

        let mut backend = factory.boot().unwrap();
        let mut page = backend.create_page().unwrap();

        page.set_cookie("example.com", &Cookie::session("sid", "1"))
            .unwrap();
        page.load_url("https://example.com/", &[]).unwrap();
        page.dispose();

        let record = state.pages()[0].snapshot();
        assert_eq!(record.cookies.len(), 1);
        assert_eq!(record.cookies[0].0, "example.com");
        assert!(matches!(record.loaded, Some(LoadedContent::Url { .. })));
        assert!(record.disposed);
    }

    /// Identical loads render identical bytes.
    #[test]
    fn test_render_deterministic() {
        let factory = MockEngineFactory::new();
        let mut backend = factory.boot().unwrap();

        let mut render_of = |html: &str| {
            let mut page = backend.create_page().unwrap();
            page.load_markup(html, "https://example.com/").unwrap();
            let out = std::env::temp_dir().join(format!(
                "webprint-mock-{}.pdf",
                uuid::Uuid::new_v4()
            ));
            page.print_to_file(
                &crate::settings::build_print_settings(&crate::ConvertConfig::default()),
                &out,
            )
            .unwrap();
            // The write is asynchronous; poll briefly.
            for _ in 0..100 {
                if out.exists() {
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
            let bytes = fs::read(&out).unwrap();
            let _ = fs::remove_file(&out);
            bytes
        };

        let a = render_of("<p>same</p>");
        let b = render_of("<p>same</p>");
        assert_eq!(a, b);
        assert!(a.starts_with(b"%PDF-"));
    }
}
