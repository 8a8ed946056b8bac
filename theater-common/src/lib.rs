//! Common types and utilities shared across Theater crates.
//!
//! This crate defines the capability traits the harvesting engine consumes,
//! the cookie store model, observability helpers, and the shared error type.
//! It is intentionally lightweight so every crate in the workspace can depend
//! on it without pulling in a browser driver or an HTTP stack.
//!
//! # Overview
//!
//! - [`document::Document`]: the interactive document interface a browser page
//!   must provide (query, geometry, clicks, input, screenshots)
//! - [`fetch::ImageFetcher`]: byte transfer of one image to a destination path
//! - [`credentials`]: cookie records and the on-disk formats they load from
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`TheaterError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use theater_common::document::BoundingBox;
//!
//! let photo = BoundingBox::new(640.0, 480.0);
//! assert_eq!(photo.area(), 307_200.0);
//! assert!(photo.exceeds(70.0, 70.0));
//! ```
use std::path::PathBuf;

pub mod credentials;
pub mod document;
pub mod fetch;
pub mod observability;

/// Error types used across the Theater system.
#[derive(thiserror::Error, Debug)]
pub enum TheaterError {
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cookie store existed but could not be understood.
    #[error("Cookie store {path}: {reason}")]
    CookieStore { path: PathBuf, reason: String },

    /// Packaging a session directory failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Operation exceeded its bounded timeout.
    #[error("Timeout occurred")]
    Timeout,
}

/// Convenient alias for results that use [`TheaterError`].
pub type Result<T> = std::result::Result<T, TheaterError>;
