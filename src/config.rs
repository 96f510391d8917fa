//! The live configuration handle: load, lookup, reload, subscribe.

use crate::ast::SourceRef;
use crate::error::{ConfigError, ConfigResult};
use crate::flatten::flatten;
use crate::loader::load_all;
use crate::value::{FromValue, Value};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A subscription matcher: either one exact dotted name, or every name
/// under a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Matches exactly one dotted name.
    Exact(String),
    /// Matches every name starting with the given prefix.
    Prefix(String),
}

impl Pattern {
    /// Creates an exact-name pattern.
    pub fn exact(name: impl Into<String>) -> Self {
        Pattern::Exact(name.into())
    }

    /// Creates a prefix pattern. `Pattern::prefix("")` matches everything.
    pub fn prefix(name: impl Into<String>) -> Self {
        Pattern::Prefix(name.into())
    }

    /// Whether this pattern matches the given dotted name.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Exact(n) => n == name,
            Pattern::Prefix(p) => name.starts_with(p.as_str()),
        }
    }
}

/// Callback invoked with `(name, new_value)` when a subscribed name
/// changes. `None` means the name disappeared from the configuration.
pub type ChangeHandler = Box<dyn Fn(&str, Option<&Value>) + Send + Sync>;

/// Callback receiving handler failures caught during notification
/// dispatch.
pub type ErrorSink = Box<dyn Fn(&str) + Send + Sync>;

type Snapshot = Arc<HashMap<String, Value>>;

struct ConfigInner {
    /// Root sources, fixed at construction.
    roots: Vec<SourceRef>,
    /// The published flat mapping. Swapped whole on reload; readers clone
    /// the Arc and never observe partial mutation.
    map: RwLock<Snapshot>,
    /// Every source visited by the most recent successful load,
    /// transitively. The auto-reload fingerprint covers exactly this set.
    sources: Mutex<Vec<SourceRef>>,
    /// Pattern → handlers, insertion order preserved per pattern.
    /// Insert-only; there is no unsubscribe.
    subscriptions: Mutex<HashMap<Pattern, Vec<ChangeHandler>>>,
    /// Serializes the read-recompute-swap-diff sequence so two concurrent
    /// reloads cannot interleave their diffs.
    reload_lock: Mutex<()>,
    /// Host-controlled sink for handler failures; stderr when unset.
    error_sink: RwLock<Option<ErrorSink>>,
}

/// A live configuration namespace.
///
/// Cheap to clone; clones share the same underlying state, which is what
/// lets the auto-reload thread and the host observe the same mapping.
#[derive(Clone)]
pub struct Config {
    inner: Arc<ConfigInner>,
}

impl Config {
    /// Loads `roots` and their transitive imports into a fresh handle.
    ///
    /// Fails on an empty root list, on any Required source that cannot be
    /// read, on any parse error, and on any unresolved interpolation.
    pub fn load(roots: Vec<SourceRef>) -> ConfigResult<Self> {
        if roots.is_empty() {
            return Err(ConfigError::usage("at least one source is required"));
        }
        let loaded = load_all(&roots)?;
        let map = flatten(&roots, &loaded)?;
        Ok(Self::with_state(roots, loaded.into_keys().collect(), map))
    }

    /// Creates a fresh, independent empty configuration. Reloading it is
    /// a no-op; there is no process-wide shared instance.
    pub fn empty() -> Self {
        Self::with_state(Vec::new(), Vec::new(), HashMap::new())
    }

    fn with_state(
        roots: Vec<SourceRef>,
        sources: Vec<SourceRef>,
        map: HashMap<String, Value>,
    ) -> Self {
        Config {
            inner: Arc::new(ConfigInner {
                roots,
                map: RwLock::new(Arc::new(map)),
                sources: Mutex::new(sources),
                subscriptions: Mutex::new(HashMap::new()),
                reload_lock: Mutex::new(()),
                error_sink: RwLock::new(None),
            }),
        }
    }

    /// The root sources this handle was loaded from.
    pub fn roots(&self) -> &[SourceRef] {
        &self.inner.roots
    }

    /// Every source visited by the most recent successful load, including
    /// transitive imports.
    pub fn sources(&self) -> Vec<SourceRef> {
        self.inner
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Looks up `name` and converts it, returning `None` when the name is
    /// absent or the conversion fails.
    pub fn lookup<T: FromValue>(&self, name: &str) -> Option<T> {
        self.current().get(name).and_then(T::from_value)
    }

    /// Looks up `name`, returning `KeyNotFound` when the name is absent
    /// or the conversion fails. Never substitutes a default.
    pub fn require<T: FromValue>(&self, name: &str) -> ConfigResult<T> {
        self.lookup(name)
            .ok_or_else(|| ConfigError::key_not_found(name))
    }

    /// Looks up `name`, falling back to `default` when the name is absent
    /// or the conversion fails.
    pub fn lookup_default<T: FromValue>(&self, name: &str, default: T) -> T {
        self.lookup(name).unwrap_or(default)
    }

    /// A read-only copy of the published mapping, for display and
    /// debugging.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.current().as_ref().clone()
    }

    /// The published mapping rendered as pretty JSON with sorted keys.
    pub fn snapshot_json(&self) -> String {
        let snapshot = self.current();
        let sorted: BTreeMap<&String, &Value> = snapshot.iter().collect();
        serde_json::to_string_pretty(&sorted).unwrap_or_default()
    }

    /// Registers `handler` for names matching `pattern`. Handlers for the
    /// same pattern fire in registration order; every registration fires.
    pub fn subscribe<F>(&self, pattern: Pattern, handler: F)
    where
        F: Fn(&str, Option<&Value>) + Send + Sync + 'static,
    {
        self.inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(pattern)
            .or_default()
            .push(Box::new(handler));
    }

    /// Installs the sink that receives handler failures caught during
    /// notification dispatch. Without one, failures go to stderr.
    pub fn on_error<F>(&self, sink: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self
            .inner
            .error_sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(sink));
    }

    /// Re-runs the full load and flatten, atomically swaps the published
    /// mapping, and notifies subscribers of the differences.
    ///
    /// On failure the published mapping is left untouched and the error
    /// propagates; the next retry is the caller's (or the scheduler's
    /// next tick).
    pub fn reload(&self) -> ConfigResult<()> {
        let _guard = self
            .inner
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let loaded = load_all(&self.inner.roots)?;
        let new_map = flatten(&self.inner.roots, &loaded)?;
        *self
            .inner
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = loaded.into_keys().collect();
        self.publish_and_notify(new_map);
        Ok(())
    }

    fn current(&self) -> Snapshot {
        Arc::clone(
            &self
                .inner
                .map
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Swaps in `new_map` and dispatches the diff against the previously
    /// published mapping. Callers serialize through the reload lock.
    fn publish_and_notify(&self, new_map: HashMap<String, Value>) {
        let new_map = Arc::new(new_map);
        let old_map = {
            let mut published = self
                .inner
                .map
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *published, Arc::clone(&new_map))
        };
        let (added, changed_or_gone) = diff(&old_map, &new_map);
        self.dispatch(&added, &changed_or_gone);
    }

    fn dispatch(&self, added: &[(String, Value)], changed_or_gone: &[(String, Option<Value>)]) {
        let subscriptions = self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (pattern, handlers) in subscriptions.iter() {
            match pattern {
                Pattern::Exact(name) => {
                    let hit = added
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| Some(v))
                        .or_else(|| {
                            changed_or_gone
                                .iter()
                                .find(|(n, _)| n == name)
                                .map(|(_, v)| v.as_ref())
                        });
                    if let Some(value) = hit {
                        for handler in handlers {
                            self.invoke(handler, name, value);
                        }
                    }
                }
                Pattern::Prefix(_) => {
                    for (name, value) in added {
                        if pattern.matches(name) {
                            for handler in handlers {
                                self.invoke(handler, name, Some(value));
                            }
                        }
                    }
                    for (name, value) in changed_or_gone {
                        if pattern.matches(name) {
                            for handler in handlers {
                                self.invoke(handler, name, value.as_ref());
                            }
                        }
                    }
                }
            }
        }
    }

    /// Invokes one handler, isolating panics so a failing subscriber can
    /// neither abort the reload nor starve other subscribers.
    fn invoke(&self, handler: &ChangeHandler, name: &str, value: Option<&Value>) {
        let outcome = catch_unwind(AssertUnwindSafe(|| handler(name, value)));
        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            self.report_handler_failure(&format!(
                "change handler for '{name}' failed: {message}"
            ));
        }
    }

    fn report_handler_failure(&self, message: &str) {
        let sink = self
            .inner
            .error_sink
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match sink.as_ref() {
            Some(sink) => sink(message),
            None => eprintln!("dotconf: {message}"),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("roots", &self.inner.roots)
            .field("entries", &self.current().len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Computes the reload diff: names added by the new mapping, and names
/// whose value changed or disappeared (paired with the new value, `None`
/// when gone).
fn diff(
    old: &HashMap<String, Value>,
    new: &HashMap<String, Value>,
) -> (Vec<(String, Value)>, Vec<(String, Option<Value>)>) {
    let mut added = Vec::new();
    let mut changed_or_gone = Vec::new();

    for (name, value) in new {
        if !old.contains_key(name) {
            added.push((name.clone(), value.clone()));
        }
    }
    for (name, old_value) in old {
        match new.get(name) {
            Some(new_value) if new_value == old_value => {}
            Some(new_value) => changed_or_gone.push((name.clone(), Some(new_value.clone()))),
            None => changed_or_gone.push((name.clone(), None)),
        }
    }
    (added, changed_or_gone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn config_with(entries: &[(&str, Value)]) -> Config {
        let config = Config::empty();
        // Publish without notification: nothing is subscribed yet
        config.publish_and_notify(map(entries));
        config
    }

    #[test]
    fn test_pattern_matching() {
        assert!(Pattern::exact("a.b").matches("a.b"));
        assert!(!Pattern::exact("a.b").matches("a.b.c"));
        assert!(Pattern::prefix("a.").matches("a.b"));
        assert!(!Pattern::prefix("a.").matches("ab"));
        assert!(Pattern::prefix("").matches("anything"));
    }

    #[test]
    fn test_diff_correctness() {
        let old = map(&[("a", Value::Integer(1)), ("b", Value::Integer(2))]);
        let new = map(&[
            ("a", Value::Integer(1)),
            ("b", Value::Integer(3)),
            ("c", Value::Integer(4)),
        ]);

        let (added, changed_or_gone) = diff(&old, &new);
        assert_eq!(added, vec![("c".to_string(), Value::Integer(4))]);
        assert_eq!(
            changed_or_gone,
            vec![("b".to_string(), Some(Value::Integer(3)))]
        );
    }

    #[test]
    fn test_diff_removal() {
        let old = map(&[("a", Value::Integer(1))]);
        let new = map(&[]);

        let (added, changed_or_gone) = diff(&old, &new);
        assert!(added.is_empty());
        assert_eq!(changed_or_gone, vec![("a".to_string(), None)]);
    }

    #[test]
    fn test_empty_config_is_independent() {
        let a = Config::empty();
        let b = Config::empty();
        a.publish_and_notify(map(&[("x", Value::Integer(1))]));

        assert_eq!(a.lookup::<i64>("x"), Some(1));
        assert_eq!(b.lookup::<i64>("x"), None);
    }

    #[test]
    fn test_lookup_and_require() {
        let config = config_with(&[
            ("host", Value::String("localhost".into())),
            ("port", Value::Integer(5432)),
        ]);

        assert_eq!(config.lookup::<String>("host"), Some("localhost".into()));
        assert_eq!(config.require::<i64>("port").unwrap(), 5432);

        // Absent key
        let err = config.require::<i64>("nope").unwrap_err();
        assert!(err.is_key_not_found());
        assert!(err.to_string().contains("nope"));

        // Present key, wrong type: same error, never a default
        let err = config.require::<i64>("host").unwrap_err();
        assert!(err.is_key_not_found());
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_lookup_default() {
        let config = config_with(&[("port", Value::Integer(5432))]);
        assert_eq!(config.lookup_default::<i64>("port", 1), 5432);
        assert_eq!(config.lookup_default::<i64>("absent", 7), 7);
        assert_eq!(config.lookup_default::<bool>("port", true), true);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let config = config_with(&[("x", Value::Integer(1))]);
        let mut snap = config.snapshot();
        snap.insert("y".to_string(), Value::Integer(2));
        assert_eq!(config.lookup::<i64>("y"), None);
    }

    #[test]
    fn test_snapshot_json_sorted() {
        let config = config_with(&[("b", Value::Integer(2)), ("a", Value::Bool(true))]);
        let json = config.snapshot_json();
        let a = json.find("\"a\"").unwrap();
        let b = json.find("\"b\"").unwrap();
        assert!(a < b, "keys should be sorted: {json}");
    }

    #[test]
    fn test_exact_subscription_fires_once_per_handler() {
        let config = config_with(&[("b", Value::Integer(2))]);
        let hits = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&hits);
        config.subscribe(Pattern::exact("b"), move |name, value| {
            sink.lock().unwrap().push((name.to_string(), value.cloned()));
        });

        config.publish_and_notify(map(&[("b", Value::Integer(3))]));
        assert_eq!(
            *hits.lock().unwrap(),
            vec![("b".to_string(), Some(Value::Integer(3)))]
        );
    }

    #[test]
    fn test_exact_subscription_ignores_untouched_names() {
        let config = config_with(&[("a", Value::Integer(1)), ("b", Value::Integer(2))]);
        let fired = Arc::new(Mutex::new(0usize));

        let counter = Arc::clone(&fired);
        config.subscribe(Pattern::exact("a"), move |_, _| {
            *counter.lock().unwrap() += 1;
        });

        // a keeps its value, b changes
        config.publish_and_notify(map(&[("a", Value::Integer(1)), ("b", Value::Integer(9))]));
        assert_eq!(*fired.lock().unwrap(), 0);
    }

    #[test]
    fn test_prefix_subscription_sees_added_and_changed() {
        let config = config_with(&[("a", Value::Integer(1)), ("b", Value::Integer(2))]);
        let hits = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&hits);
        config.subscribe(Pattern::prefix(""), move |name, value| {
            sink.lock().unwrap().push((name.to_string(), value.cloned()));
        });

        config.publish_and_notify(map(&[
            ("a", Value::Integer(1)),
            ("b", Value::Integer(3)),
            ("c", Value::Integer(4)),
        ]));

        let mut got = hits.lock().unwrap().clone();
        got.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            got,
            vec![
                ("b".to_string(), Some(Value::Integer(3))),
                ("c".to_string(), Some(Value::Integer(4))),
            ]
        );
    }

    #[test]
    fn test_removal_notifies_with_none() {
        let config = config_with(&[("a", Value::Integer(1))]);
        let hits = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&hits);
        config.subscribe(Pattern::exact("a"), move |name, value| {
            sink.lock().unwrap().push((name.to_string(), value.cloned()));
        });

        config.publish_and_notify(HashMap::new());
        assert_eq!(*hits.lock().unwrap(), vec![("a".to_string(), None)]);
    }

    #[test]
    fn test_handlers_fire_in_registration_order() {
        let config = config_with(&[]);
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let sink = Arc::clone(&order);
            config.subscribe(Pattern::exact("x"), move |_, _| {
                sink.lock().unwrap().push(tag);
            });
        }

        config.publish_and_notify(map(&[("x", Value::Integer(1))]));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let config = config_with(&[]);
        let reached = Arc::new(Mutex::new(false));
        let reported = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&reported);
        config.on_error(move |message| {
            sink.lock().unwrap().push(message.to_string());
        });

        config.subscribe(Pattern::exact("x"), |_, _| {
            panic!("subscriber exploded");
        });
        let flag = Arc::clone(&reached);
        config.subscribe(Pattern::exact("x"), move |_, _| {
            *flag.lock().unwrap() = true;
        });

        config.publish_and_notify(map(&[("x", Value::Integer(1))]));

        // The later handler still fired and the failure was reported
        assert!(*reached.lock().unwrap());
        let reports = reported.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("subscriber exploded"));
    }

    #[test]
    fn test_load_rejects_empty_roots() {
        let err = Config::load(Vec::new()).unwrap_err();
        assert!(err.is_usage_error());
    }
}
