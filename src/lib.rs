//! # webprint
//!
//! Server-side URL/HTML to PDF conversion driving a single-threaded
//! headless rendering engine on a dedicated owner thread.
//!
//! This crate produces downloadable PDF renditions of web content inside a
//! request/response cycle: hand it a URL (or a pre-rendered HTML string
//! plus a base URL), get back the raw PDF bytes. Layout, scripting, and
//! rendering are delegated entirely to the external engine; this crate's
//! job is everything around that — engine lifecycle, cross-thread
//! dispatch, readiness signaling, print orchestration, and completion
//! detection for an engine that never says "file written".
//!
//! ## Features
//!
//! - **Owner-thread engine host**: the engine's single-threaded API lives
//!   on one dedicated thread; every call is marshaled to it as a message
//! - **One-shot readiness signaling**: document-complete plus a settle
//!   delay releases a capacity-one signal, bounded by a timeout
//! - **Lock-poll completion detection**: print output is observed by
//!   polling the file with a bounded attempt budget
//! - **Per-request sessions**: one browser instance per conversion,
//!   disposed on every exit path (RAII)
//! - **Scoped cleanup**: output files are deleted after their bytes are
//!   read, on success and failure alike
//! - **Cancellation**: cooperative tokens observed at both suspension
//!   points
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           Your Web Application              │
//! │   (renders views, extracts headers/cookies) │
//! └─────────────────┬───────────────────────────┘
//!                   │ convert(url) / convert_html(..)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │                 Converter                   │
//! │  cookies → navigate → ready wait → print    │
//! │         → lock poll → read → cleanup        │
//! └─────────────────┬───────────────────────────┘
//!                   │ marshaled closures
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │          EngineHost (singleton)             │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │  Dedicated engine thread                │ │
//! │ │  backend + pages (strict call affinity) │ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────┬───────────────────────────┘
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │        Headless rendering engine            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use webprint::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let converter = Converter::new(ConvertConfig::default());
//!
//!     // The engine boots lazily on the first conversion.
//!     let pdf = converter.convert("https://example.com")?;
//!     assert!(pdf.starts_with(b"%PDF-"));
//!     std::fs::write("example.pdf", &pdf)?;
//!
//!     // Required once at application shutdown.
//!     unload_engine();
//!     Ok(())
//! }
//! ```
//!
//! From a web handler, convert the already-rendered view instead:
//!
//! ```rust,ignore
//! // headers/cookies lifted off the inbound request by your framework
//! let pdf = converter
//!     .convert_html_async(request_url, rendered_html, headers, cookies, None)
//!     .await?;
//! // respond with content-type: application/pdf and the bytes
//! ```
//!
//! ## Concurrency Model
//!
//! Exactly one engine thread exists per process, and it holds exclusive
//! call affinity over the engine. Concurrent conversions are fine — each
//! owns an independent session — but their engine dispatches serialize
//! through the one thread in submission order. True parallelism exists
//! only at the I/O-wait layer (file polling, ready waits). Each
//! synchronous `convert*` call blocks its caller end to end; the `*_async`
//! variants run the identical pipeline on the blocking pool.
//!
//! `unload_engine()` waits for in-flight conversions to drain (bounded)
//! and is irreversible for the process.
//!
//! ## Environment Configuration
//!
//! When the `env-config` feature is enabled (default), configuration can
//! be loaded from an `app.env` file or the process environment:
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `PDF_LOCK_CHECK_ATTEMPTS` | u32 | 100 | Output-file poll budget |
//! | `PDF_LOCK_CHECK_DELAY_MS` | u64 | 100 | Delay between polls |
//! | `PDF_SETTLE_DELAY_MS` | u64 | 1000 | Paint-settle delay |
//! | `PDF_NAVIGATION_TIMEOUT_SECS` | u64 | 30 | Document-ready bound |
//! | `PDF_INIT_TIMEOUT_SECS` | u64 | 60 | Engine startup bound |
//! | `PDF_ENGINE_PATH` | String | auto | Custom engine binary path |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Enable environment-based configuration (default) |
//! | `test-utils` | Expose the scripted mock engine for testing |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, ConvertError>`](Result). A
//! failure aborts only its own conversion: the shared engine is never torn
//! down as a side effect, and nothing is retried automatically. If the
//! engine itself ends up in a corrupted state, the recovery unit is a
//! process restart.
//!
//! ## Testing
//!
//! Enable the `test-utils` feature and use
//! [`MockEngineFactory`](engine::mock::MockEngineFactory) to run the whole
//! pipeline without a real browser:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use webprint::prelude::*;
//! use webprint::engine::mock::MockEngineFactory;
//!
//! let converter = Converter::builder()
//!     .factory(Arc::new(MockEngineFactory::new()))
//!     .host(Arc::new(EngineHost::new()))
//!     .build();
//! ```

#![doc(html_root_url = "https://docs.rs/webprint/0.3.1")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod request;
pub mod session;
pub mod settings;
pub mod stats;
pub mod waiter;

mod host;
mod pipeline;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

// Core types
pub use config::{ConvertConfig, ConvertConfigBuilder, EdgeLabels, Margins};
pub use engine::{ChromeEngineFactory, EngineFactory, create_engine_launch_options};
pub use error::{ConvertError, Result};
pub use host::{EngineHost, EngineState};
pub use pipeline::{Converter, ConverterBuilder, unload_engine};
pub use request::{CancelToken, ConvertRequest, Cookie, HeaderEntry, PageSource, default_headers};
pub use session::BrowserSession;
pub use settings::{LockPollSettings, OutputFormat, PrintSettings, build_print_settings};
pub use stats::HostStats;
pub use waiter::{FsLockProbe, LockProbe, wait_until_unlocked};

// Feature-gated re-exports
#[cfg(feature = "env-config")]
pub use config::env::{engine_path_from_env, from_env};
