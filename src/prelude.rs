//! Convenient imports for common usage patterns.
//!
//! This module re-exports the most commonly used types from `webprint`,
//! allowing you to quickly get started with a single import.
//!
//! # Usage
//!
//! ```rust,ignore
//! use webprint::prelude::*;
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use webprint::prelude::*;
//!
//! let converter = Converter::new(ConvertConfig::default());
//! let pdf = converter.convert("https://example.com")?;
//!
//! // At application shutdown:
//! unload_engine();
//! ```

// Core types
pub use crate::config::{ConvertConfig, ConvertConfigBuilder, EdgeLabels, Margins};
pub use crate::engine::{ChromeEngineFactory, EngineFactory};
pub use crate::error::{ConvertError, Result};
pub use crate::host::{EngineHost, EngineState};
pub use crate::pipeline::{Converter, ConverterBuilder, unload_engine};
pub use crate::request::{CancelToken, ConvertRequest, Cookie, HeaderEntry, PageSource};
pub use crate::session::BrowserSession;
pub use crate::settings::{PrintSettings, build_print_settings};
pub use crate::stats::HostStats;

// Feature-gated exports
#[cfg(feature = "env-config")]
pub use crate::config::env::{engine_path_from_env, from_env};

// Re-export Arc for convenience (commonly needed with custom factories)
pub use std::sync::Arc;
