//! Error types and handling for seomap-core operations.
//!
//! This module provides one error type that covers every failure in the
//! sitemap pipeline. Errors are categorized for structured logging and carry
//! a recoverability hint for callers that schedule retries.
//!
//! ## Error Categories
//!
//! - **Infrastructure**: I/O, network, storage, configuration, serialization
//! - **Pattern errors**: malformed URL parameter definitions on a page
//! - **Render errors**: a synthetic page render failed or returned non-200
//! - **Store integrity**: a duplicate `loc` was found within one site
//! - **Hook errors**: an extension hook refused to continue
//!
//! ## Propagation
//!
//! Regeneration isolates per-page failures (they are logged and the run
//! continues), scans isolate per-`loc` failures, and everything else is
//! returned to the caller:
//!
//! ```rust
//! use seomap_core::Error;
//!
//! fn describe(err: &Error) -> String {
//!     format!("[{}] {} (retry: {})", err.category(), err, err.is_recoverable())
//! }
//!
//! let err = Error::MalformedParamDefinition("slug".to_string());
//! assert!(describe(&err).starts_with("[malformed_param]"));
//! ```

use thiserror::Error;

/// The main error type for seomap-core operations.
///
/// All public functions in seomap-core return `Result<T, Error>`. The error
/// keeps its source chain for `std::io::Error` and `reqwest::Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers reading and writing the on-disk item store, the key-value
    /// cache directory and configuration files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Raised by the HTTP page renderer. Connection and timeout failures are
    /// recoverable; everything else is permanent.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Parsing operation failed.
    ///
    /// Occurs when a changefreq, scope definition, date or catalog document
    /// cannot be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Storage operation failed.
    ///
    /// Covers the sitemap item store and the key-value cache beyond plain
    /// file I/O (corrupted documents, failed atomic commits).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource was not found.
    ///
    /// Used for unknown sites, unknown model classes and disabled sitemap
    /// variants that a caller asked for explicitly.
    #[error("Not found: {0}")]
    NotFound(String),

    /// URL is malformed or invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation timed out.
    ///
    /// Used when a media scan exceeds its execution timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    ///
    /// Occurs when converting between JSON, TOML and XML fails.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A page's URL parameter definition is malformed.
    ///
    /// Raised when a `urlParam:modelField` token lacks its `:` separator or
    /// a relation path does not have exactly two dotted segments. Fatal to
    /// the single page being processed; the regeneration run continues.
    #[error("Malformed URL parameter definition: {0}")]
    MalformedParamDefinition(String),

    /// Synthetic page render failed.
    ///
    /// Returned when the renderer errors or produces a non-200 status. The
    /// scan for that `loc` is abandoned without touching stored media.
    #[error("Page render failed for '{url}': {reason}")]
    PageRenderFailure {
        /// URL that was rendered.
        url: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Two sitemap items share a `loc` within one site.
    ///
    /// Find-or-create upserts never produce this; seeing it means the store
    /// was corrupted or written concurrently for the same site.
    #[error("Store integrity violation: duplicate loc '{loc}' in site '{site}'")]
    StoreIntegrityViolation {
        /// Site the duplicates belong to.
        site: String,
        /// Duplicated location.
        loc: String,
    },

    /// An extension hook refused to continue.
    #[error("Hook error: {0}")]
    Hook(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for network timeouts and connection failures, scan
    /// timeouts, render failures and interrupted I/O. Malformed definitions,
    /// integrity violations and configuration problems are permanent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use seomap_core::Error;
    ///
    /// assert!(Error::Timeout("scan".to_string()).is_recoverable());
    /// assert!(!Error::MalformedParamDefinition("slug".to_string()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) | Self::PageRenderFailure { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// The category is a stable snake_case label suitable for a structured
    /// log field:
    ///
    /// ```rust
    /// use seomap_core::Error;
    ///
    /// let err = Error::StoreIntegrityViolation {
    ///     site: "en".to_string(),
    ///     loc: "https://example.com/".to_string(),
    /// };
    /// tracing::error!(category = err.category(), error = %err, "store check failed");
    /// ```
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::MalformedParamDefinition(_) => "malformed_param",
            Self::PageRenderFailure { .. } => "render",
            Self::StoreIntegrityViolation { .. } => "store_integrity",
            Self::Hook(_) => "hook",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io;

    #[test]
    fn test_error_display_formatting() {
        let errors = vec![
            Error::Parse("invalid syntax".to_string()),
            Error::Storage("disk full".to_string()),
            Error::Config("missing field".to_string()),
            Error::NotFound("site".to_string()),
            Error::InvalidUrl("not a url".to_string()),
            Error::Timeout("operation timed out".to_string()),
            Error::MalformedParamDefinition("slug".to_string()),
            Error::Hook("refused".to_string()),
            Error::Other("unknown error".to_string()),
        ];

        for error in errors {
            let error_string = error.to_string();
            assert!(!error_string.is_empty());
            match error {
                Error::Parse(msg) => {
                    assert!(error_string.contains("Parse error"));
                    assert!(error_string.contains(&msg));
                },
                Error::Storage(msg) => {
                    assert!(error_string.contains("Storage error"));
                    assert!(error_string.contains(&msg));
                },
                Error::Config(msg) => {
                    assert!(error_string.contains("Configuration error"));
                    assert!(error_string.contains(&msg));
                },
                Error::NotFound(msg) => {
                    assert!(error_string.contains("Not found"));
                    assert!(error_string.contains(&msg));
                },
                Error::InvalidUrl(msg) => {
                    assert!(error_string.contains("Invalid URL"));
                    assert!(error_string.contains(&msg));
                },
                Error::Timeout(msg) => {
                    assert!(error_string.contains("Timeout"));
                    assert!(error_string.contains(&msg));
                },
                Error::MalformedParamDefinition(msg) => {
                    assert!(error_string.contains("Malformed URL parameter definition"));
                    assert!(error_string.contains(&msg));
                },
                Error::Hook(msg) => {
                    assert!(error_string.contains("Hook error"));
                    assert!(error_string.contains(&msg));
                },
                Error::Other(msg) => {
                    assert_eq!(error_string, msg);
                },
                _ => {},
            }
        }
    }

    #[test]
    fn test_structured_variant_display() {
        let render = Error::PageRenderFailure {
            url: "https://example.com/blog".to_string(),
            reason: "status 500".to_string(),
        };
        assert!(render.to_string().contains("https://example.com/blog"));
        assert!(render.to_string().contains("status 500"));

        let integrity = Error::StoreIntegrityViolation {
            site: "en".to_string(),
            loc: "https://example.com/".to_string(),
        };
        assert!(integrity.to_string().contains("duplicate loc"));
        assert!(integrity.to_string().contains("'en'"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_errors = vec![
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
            io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
            io::Error::new(io::ErrorKind::TimedOut, "operation timed out"),
        ];

        for io_err in io_errors {
            let error: Error = io_err.into();
            match error {
                Error::Io(inner) => assert!(!inner.to_string().is_empty()),
                _ => panic!("Expected IO error variant"),
            }
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: Error = err.into();
        assert_eq!(error.category(), "serialization");
    }

    #[test]
    fn test_error_categories() {
        let error_categories = vec![
            (Error::Io(io::Error::other("test")), "io"),
            (Error::Parse("test".to_string()), "parse"),
            (Error::Storage("test".to_string()), "storage"),
            (Error::Config("test".to_string()), "config"),
            (Error::NotFound("test".to_string()), "not_found"),
            (Error::InvalidUrl("test".to_string()), "invalid_url"),
            (Error::Timeout("test".to_string()), "timeout"),
            (Error::Serialization("test".to_string()), "serialization"),
            (
                Error::MalformedParamDefinition("test".to_string()),
                "malformed_param",
            ),
            (
                Error::PageRenderFailure {
                    url: "test".to_string(),
                    reason: "test".to_string(),
                },
                "render",
            ),
            (
                Error::StoreIntegrityViolation {
                    site: "test".to_string(),
                    loc: "test".to_string(),
                },
                "store_integrity",
            ),
            (Error::Hook("test".to_string()), "hook"),
            (Error::Other("test".to_string()), "other"),
        ];

        for (error, expected_category) in error_categories {
            assert_eq!(error.category(), expected_category);
        }
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable_errors = vec![
            Error::Io(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            Error::Io(io::Error::new(io::ErrorKind::Interrupted, "interrupted")),
            Error::Timeout("scan timeout".to_string()),
            Error::PageRenderFailure {
                url: "https://example.com".to_string(),
                reason: "status 503".to_string(),
            },
        ];

        let non_recoverable_errors = vec![
            Error::Io(io::Error::new(io::ErrorKind::NotFound, "not found")),
            Error::Parse("bad syntax".to_string()),
            Error::Storage("disk failure".to_string()),
            Error::Config("invalid config".to_string()),
            Error::NotFound("missing".to_string()),
            Error::MalformedParamDefinition("slug".to_string()),
            Error::StoreIntegrityViolation {
                site: "en".to_string(),
                loc: "https://example.com".to_string(),
            },
            Error::Hook("refused".to_string()),
            Error::Other("generic error".to_string()),
        ];

        for error in recoverable_errors {
            assert!(
                error.is_recoverable(),
                "Expected {error:?} to be recoverable"
            );
        }

        for error in non_recoverable_errors {
            assert!(
                !error.is_recoverable(),
                "Expected {error:?} to be non-recoverable"
            );
        }
    }

    #[test]
    fn test_error_chain_source() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: Error = io_error.into();

        let source = std::error::Error::source(&error);
        assert!(source.is_some());
        assert!(source.unwrap().to_string().contains("access denied"));
    }

    proptest! {
        #[test]
        fn test_malformed_param_with_arbitrary_messages(msg in r".{0,200}") {
            let error = Error::MalformedParamDefinition(msg.clone());
            let error_string = error.to_string();

            prop_assert!(error_string.contains(&msg));
            prop_assert_eq!(error.category(), "malformed_param");
            prop_assert!(!error.is_recoverable());
        }

        #[test]
        fn test_other_error_with_arbitrary_messages(msg in r".{0,200}") {
            let error = Error::Other(msg.clone());
            prop_assert_eq!(error.to_string(), msg);
            prop_assert_eq!(error.category(), "other");
        }
    }

    #[test]
    fn test_error_size() {
        let error_size = std::mem::size_of::<Error>();
        assert!(error_size <= 64, "Error type too large: {error_size} bytes");
    }
}
