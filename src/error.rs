//! Error types for the conversion pipeline.
//!
//! This module provides [`ConvertError`], a unified error type for all
//! conversion and engine operations, and a convenient [`Result`] type alias.
//!
//! # Example
//!
//! ```rust
//! use webprint::{ConvertError, Result};
//!
//! fn produce_pdf() -> Result<Vec<u8>> {
//!     // Your logic here...
//!     Err(ConvertError::EngineNotReady)
//! }
//!
//! match produce_pdf() {
//!     Ok(pdf) => println!("Generated {} bytes", pdf.len()),
//!     Err(ConvertError::EngineNotReady) => println!("Engine not initialized yet"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::time::Duration;

/// Errors that can occur while converting a page to PDF.
///
/// Each variant corresponds to one stage of the pipeline, so callers can
/// distinguish "the engine never came up" from "the page never finished
/// loading" from "the output file never finished flushing".
///
/// A failure in one conversion aborts only that request. The shared engine
/// is never torn down as a side effect of a request failure, and no failed
/// conversion is retried automatically — callers may simply convert again.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The rendering engine failed to start, or startup timed out.
    ///
    /// # Common Causes
    ///
    /// - Engine binary not found at the configured directory
    /// - Engine process crashed during bootstrap
    /// - Startup exceeded the configured init timeout
    #[error("engine failed to start: {0}")]
    EngineInit(String),

    /// A session was requested before the engine reached the ready state,
    /// or after it began shutting down.
    #[error("engine is not ready")]
    EngineNotReady,

    /// Navigation was dispatched but the engine reported a load failure.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The document never signaled ready within the navigation timeout.
    ///
    /// # Common Causes
    ///
    /// - Target server slow or unreachable
    /// - Page load stalled inside the engine
    /// - Navigation timeout configured too low for the target page
    #[error("document was not ready after {0:?}")]
    NavigationTimeout(Duration),

    /// The engine rejected or failed the print dispatch itself.
    ///
    /// Distinct from [`OutputLocked`](Self::OutputLocked): here the print
    /// call never succeeded, there the call succeeded but the file write
    /// never finished.
    #[error("print failed: {0}")]
    Print(String),

    /// The generated file was still locked after the poll budget ran out.
    ///
    /// The engine gives no write-complete callback, so completion is
    /// detected by polling the output path. This error means every polling
    /// attempt still observed the file as held by the writer.
    #[error("generated pdf file locked too long ({attempts} checks)")]
    OutputLocked {
        /// Number of polling attempts performed before giving up.
        attempts: u32,
    },

    /// Reading, creating, or writing the output file failed.
    ///
    /// Note that a *delete* failure after the bytes were already read is
    /// logged and swallowed rather than surfaced here — the conversion has
    /// already succeeded at that point.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration, caught at build time.
    ///
    /// # Common Causes
    ///
    /// - `start_page` of zero, or greater than `end_page`
    /// - Non-positive `document_scale`
    /// - Zero lock-check attempts
    #[error("configuration error: {0}")]
    Config(String),

    /// The conversion was cancelled through its [`CancelToken`].
    ///
    /// Any partially written output file is deleted and the session is
    /// released before this is returned.
    ///
    /// [`CancelToken`]: crate::CancelToken
    #[error("conversion cancelled")]
    Cancelled,
}

/// Convenience conversion from [`String`] to [`ConvertError::Config`].
///
/// Allows using the `?` operator with functions that return `String` errors
/// in contexts expecting [`ConvertError`].
impl From<String> for ConvertError {
    fn from(msg: String) -> Self {
        ConvertError::Config(msg)
    }
}

/// Convenience conversion from `&str` to [`ConvertError::Config`].
impl From<&str> for ConvertError {
    fn from(msg: &str) -> Self {
        ConvertError::Config(msg.to_string())
    }
}

/// Result type alias using [`ConvertError`].
///
/// This is the standard result type returned by conversion operations.
///
/// # Example
///
/// ```rust
/// use webprint::Result;
///
/// fn my_function() -> Result<String> {
///     Ok("success".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ConvertError>;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies error type conversions from String and &str.
    #[test]
    fn test_error_conversion() {
        let error: ConvertError = "test error".into();
        match error {
            ConvertError::Config(msg) => {
                assert_eq!(msg, "test error", "Error message should be preserved");
            }
            _ => panic!("Expected Config error variant"),
        }

        let error: ConvertError = "another error".to_string().into();
        match error {
            ConvertError::Config(msg) => {
                assert_eq!(msg, "another error", "Error message should be preserved");
            }
            _ => panic!("Expected Config error variant"),
        }
    }

    /// Verifies that error Display formatting works correctly.
    #[test]
    fn test_error_display() {
        let error = ConvertError::EngineInit("binary missing".to_string());
        assert_eq!(error.to_string(), "engine failed to start: binary missing");

        let error = ConvertError::EngineNotReady;
        assert_eq!(error.to_string(), "engine is not ready");

        let error = ConvertError::OutputLocked { attempts: 100 };
        assert_eq!(
            error.to_string(),
            "generated pdf file locked too long (100 checks)"
        );

        let error = ConvertError::NavigationTimeout(Duration::from_secs(30));
        assert!(error.to_string().contains("30s"));
    }

    /// Verifies that ConvertError implements std::error::Error.
    #[test]
    fn test_error_is_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<ConvertError>();
    }

    /// Verifies that ConvertError is Send + Sync for thread safety.
    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConvertError>();
    }

    /// Verifies io::Error converts via From.
    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: ConvertError = io_err.into();
        assert!(matches!(error, ConvertError::Io(_)));
    }
}
