//! # dotconf
//!
//! A hierarchical configuration store for Rust applications.
//!
//! dotconf loads one or more named source files, merges their directives
//! into a single flat namespace of dotted names, resolves `$(name)`
//! interpolation against that namespace and the process environment, and
//! can watch the sources for changes on a polling schedule, re-merging,
//! diffing, and notifying subscribers.
//!
//! ## Configuration files
//!
//! ```text
//! # app.cfg
//! import "$(HOME)/common.cfg"
//!
//! log-level = "info"
//!
//! db {
//!   host = "localhost"
//!   port = 5432
//!   url  = "postgres://$(db.host):$(db.port)/app"
//! }
//!
//! features = ["search", "export"]
//! ```
//!
//! Groups prefix the dotted names of everything inside them, imports
//! splice another file in place (inheriting the enclosing prefix), and
//! binding the same dotted name twice keeps the last value.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use dotconf::{Config, SourceRef};
//!
//! let config = Config::load(vec![
//!     SourceRef::required("/etc/myapp/app.cfg"),
//!     SourceRef::optional("$(HOME)/.myapp.cfg"),
//! ])?;
//!
//! let host: String = config.require("db.host")?;
//! let port = config.lookup_default::<i64>("db.port", 5432);
//! # Ok::<(), dotconf::ConfigError>(())
//! ```
//!
//! ## Live reload
//!
//! ```rust,no_run
//! use dotconf::{auto_reload, AutoReloadOptions, Pattern, SourceRef};
//! use std::time::Duration;
//!
//! let options = AutoReloadOptions {
//!     interval: Duration::from_secs(10),
//!     on_error: Some(Box::new(|err| eprintln!("reload failed: {err}"))),
//! };
//! let (config, handle) =
//!     auto_reload(options, vec![SourceRef::required("app.cfg")])?;
//!
//! config.subscribe(Pattern::prefix("db."), |name, value| {
//!     println!("{name} is now {value:?}");
//! });
//!
//! // ... on shutdown:
//! handle.cancel();
//! # Ok::<(), dotconf::ConfigError>(())
//! ```
//!
//! The background loop polls file size and modification time for every
//! transitively-imported source and only re-reads when something
//! changed. Subscribers see added, changed, and removed names; a removed
//! name arrives as `None`. A subscriber that panics is isolated and
//! reported through [`Config::on_error`].
//!
//! ## Error handling
//!
//! All fallible operations return [`ConfigResult<T>`]. Missing Required
//! sources, parse errors (in any source that exists, Optional included),
//! and unresolved interpolations abort the whole load; a missing
//! Optional source simply contributes nothing.

pub mod ast;
pub mod config;
pub mod error;
pub mod flatten;
pub mod interp;
pub mod loader;
pub mod parser;
pub mod value;
pub mod watcher;

// Re-export main types for convenience
pub use ast::{Directive, SourceRef};
pub use config::{Config, Pattern};
pub use error::{ConfigError, ConfigResult};
pub use value::{FromValue, Value};
pub use watcher::{auto_reload, AutoReloadOptions, WatchHandle};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
