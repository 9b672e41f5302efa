//! Rendering engine abstraction.
//!
//! This module defines the seam between the conversion machinery and the
//! external page-rendering engine. The engine's API surface is
//! single-threaded: everything created by [`EngineFactory::boot`] lives on
//! the dedicated engine thread and never crosses it, which is why neither
//! [`EngineBackend`] nor [`EnginePage`] requires `Send` — the type system
//! enforces the affinity contract instead of a runtime assertion.
//!
//! # Available Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`ChromeEngineFactory`] | Drives headless Chrome/Chromium |
//! | [`mock::MockEngineFactory`] | Scripted backend for tests (feature-gated) |
//!
//! # Custom Backend
//!
//! You can implement the traits for a different engine:
//!
//! ```rust,ignore
//! use webprint::engine::{EngineFactory, EngineBackend, EnginePage};
//!
//! struct MyEngineFactory;
//!
//! impl EngineFactory for MyEngineFactory {
//!     fn boot(&self) -> webprint::Result<Box<dyn EngineBackend>> {
//!         // Runs on the dedicated engine thread.
//!         todo!()
//!     }
//! }
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeEngineFactory, create_engine_launch_options};

use std::path::Path;

use crate::error::Result;
use crate::request::{Cookie, HeaderEntry};
use crate::settings::PrintSettings;

/// One-shot callback invoked when a page reports its document complete.
///
/// Backends may invoke it from any thread; the registered closure is
/// expected to do its own hand-off (the pipeline's closure releases a
/// capacity-one channel after a settle delay).
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Boots an engine backend on the dedicated engine thread.
///
/// The factory itself crosses threads (it is handed to the engine thread at
/// initialization), so it must be `Send + Sync`; what it *produces* stays
/// put.
///
/// # Implementors
///
/// - [`ChromeEngineFactory`] — drives headless Chrome/Chromium
/// - [`mock::MockEngineFactory`] — scripted, for tests
pub trait EngineFactory: Send + Sync {
    /// Start the engine and return its backend.
    ///
    /// Called exactly once, on the engine thread, during host
    /// initialization.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::EngineInit`](crate::ConvertError::EngineInit)
    /// if the engine cannot be started (binary missing, launch failure).
    fn boot(&self) -> Result<Box<dyn EngineBackend>>;
}

/// A booted engine instance, owned by the engine thread.
pub trait EngineBackend {
    /// Create a fresh browser page for one conversion.
    fn create_page(&mut self) -> Result<Box<dyn EnginePage>>;
}

/// One engine browser instance, owned by the engine thread.
///
/// Every method runs inside a marshaled call on the engine thread. A
/// method returning does **not** imply engine-internal asynchronous work
/// has finished — most notably, [`print_to_file`](Self::print_to_file)
/// returns once the print job is dispatched, while the output file may
/// still be flushing.
pub trait EnginePage {
    /// Register the one-shot document-complete callback.
    ///
    /// Must be called before navigation; fires at most once per page.
    fn on_document_ready(&mut self, notify: ReadyCallback);

    /// Enable or disable script execution for this page.
    fn set_javascript_enabled(&mut self, enabled: bool) -> Result<()>;

    /// Register a cookie into the jar for `host` before navigation.
    fn set_cookie(&mut self, host: &str, cookie: &Cookie) -> Result<()>;

    /// Navigate to `url` with the given request headers.
    fn load_url(&mut self, url: &str, headers: &[HeaderEntry]) -> Result<()>;

    /// Load raw markup; `base_url` resolves relative resource references.
    fn load_markup(&mut self, html: &str, base_url: &str) -> Result<()>;

    /// Dispatch printing of the current document to `output`.
    ///
    /// Completion of the file write is detected separately by lock
    /// polling.
    fn print_to_file(&mut self, settings: &PrintSettings, output: &Path) -> Result<()>;

    /// Release engine-side resources. Idempotent.
    fn dispose(&mut self);
}
