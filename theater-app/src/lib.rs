//! The `theater` application: command line, web front end and packaging
//! around the harvesting engine.

pub mod cli;
pub mod packager;
pub mod pipeline;
pub mod server;
