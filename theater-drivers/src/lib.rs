//! Driver layer for browser automation.
//!
//! This crate implements [`theater_common::document::Document`] on top of a
//! WebDriver session so the harvesting engine can drive a real browser.
//!
//! - [`theater_browser::driver::TheaterDriver`]: session setup, capabilities, cookie injection
//! - [`theater_browser::page::TheaterPage`]: the `Document` implementation
//! - [`theater_browser::fingerprint`]: desktop user-agent/viewport profiles
//! - [`theater_browser::stealth`]: stealth profiles, browser arguments and JS evasions
pub mod theater_browser;
