//! Periodic auto-reload of a configuration from its source files.
//!
//! Instead of filesystem event APIs, the scheduler polls cheap metadata
//! (file size and modification time) for every transitively-loaded
//! source and runs a full reload only when something changed.

use crate::ast::SourceRef;
use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};
use crate::interp::interpolate_env;
use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, SystemTime};

/// Callback receiving reload errors from the background loop.
pub type ReloadErrorCallback = Box<dyn Fn(&ConfigError) + Send + Sync>;

/// Options for [`auto_reload`].
pub struct AutoReloadOptions {
    /// Polling interval. Must be at least one second.
    pub interval: Duration,
    /// Receives reload failures; the loop continues either way. Failures
    /// go to stderr when unset.
    pub on_error: Option<ReloadErrorCallback>,
}

impl Default for AutoReloadOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            on_error: None,
        }
    }
}

/// Owner handle for the background polling thread.
///
/// The host keeps this and calls [`cancel`](WatchHandle::cancel) on
/// shutdown, which stops the loop and joins the thread. Dropping the
/// handle without cancelling also stops the loop on its next wakeup, but
/// does not wait for it.
#[derive(Debug)]
pub struct WatchHandle {
    stop: mpsc::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl WatchHandle {
    /// Signals the background loop to stop and waits for it to exit.
    pub fn cancel(self) {
        let _ = self.stop.send(());
        let _ = self.thread.join();
    }
}

/// Loads `roots` and starts a background thread that keeps the returned
/// [`Config`] in sync with its source files.
///
/// Validation (interval >= 1s, non-empty roots) happens before any I/O.
/// The initial load is fatal on failure, exactly like [`Config::load`].
/// Afterwards the loop sleeps for the interval, fingerprints the source
/// set used by the last successful load, and reloads only when the
/// fingerprint changed. Reload failures are routed to `on_error` and
/// leave the published mapping intact.
pub fn auto_reload(
    options: AutoReloadOptions,
    roots: Vec<SourceRef>,
) -> ConfigResult<(Config, WatchHandle)> {
    if options.interval < Duration::from_secs(1) {
        return Err(ConfigError::usage(
            "auto-reload interval must be at least one second",
        ));
    }
    if roots.is_empty() {
        return Err(ConfigError::usage("at least one source is required"));
    }

    let config = Config::load(roots)?;
    let (stop, stop_rx) = mpsc::channel::<()>();
    let worker = config.clone();
    let interval = options.interval;
    let on_error = options.on_error;

    // Baseline taken before the thread starts, so an edit landing after
    // the load is never absorbed into it.
    let mut previous = fingerprint(&config.sources());

    let thread = thread::spawn(move || {
        loop {
            // The stop channel doubles as the periodic sleep, so
            // cancellation interrupts the wait.
            match stop_rx.recv_timeout(interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }

            let current = fingerprint(&worker.sources());
            if current == previous {
                continue;
            }
            previous = current;

            match worker.reload() {
                // A successful reload may have changed the source set
                Ok(()) => previous = fingerprint(&worker.sources()),
                Err(err) => match &on_error {
                    Some(callback) => callback(&err),
                    None => eprintln!("dotconf: auto-reload failed: {err}"),
                },
            }
        }
    });

    Ok((config, WatchHandle { stop, thread }))
}

/// One metadata observation per source: expanded path plus size and
/// mtime, or `None` when the stat fails (absent counts as a state).
type Fingerprint = Vec<(String, Option<(u64, SystemTime)>)>;

fn fingerprint(sources: &[SourceRef]) -> Fingerprint {
    let mut entries: Fingerprint = sources
        .iter()
        .map(|source| {
            let path =
                interpolate_env(source.path()).unwrap_or_else(|_| source.path().to_string());
            let meta = fs::metadata(&path)
                .ok()
                .and_then(|m| m.modified().ok().map(|mtime| (m.len(), mtime)));
            (path, meta)
        })
        .collect();
    entries.sort();
    entries
}
