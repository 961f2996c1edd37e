//! Embeddable core library for retrofit.
//!
//! Provides a clap-free, I/O-abstracted entry point suitable for linking into
//! an editor integration, a build plugin or the `retrofit` binary.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`ModuleSource`](ports::ModuleSource): load parsed syntax trees
//! - [`WritePort`](ports::WritePort): write files and create directories
//!
//! The [`adapters`] module provides default filesystem-backed implementations
//! and the on-disk transpile cache.
//!
//! # Entry points
//!
//! - [`run`](pipeline::run): fix, check and render every loaded module
//! - [`transpile_module`](pipeline::transpile_module): the same for one tree

pub mod adapters;
pub mod pipeline;
pub mod ports;
pub mod settings;

// Re-exported so embedders need not depend on retrofit-domain directly.
pub use retrofit_domain::{ConfigError, ImportPolicy, InternalError};
