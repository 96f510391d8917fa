//! Source loading: reads and parses root files and everything they
//! transitively import.

use crate::ast::{Directive, SourceRef};
use crate::error::{ConfigError, ConfigResult};
use crate::interp::interpolate_env;
use crate::parser;
use std::collections::{HashMap, VecDeque};
use std::fs;

/// The parsed contents of every source visited during one load cycle,
/// keyed by reference as written (before environment expansion).
pub type LoadedSet = HashMap<SourceRef, Vec<Directive>>;

/// Loads `roots` and every transitively imported file, each at most once.
///
/// Import paths found anywhere in a tree (including inside groups) are
/// enqueued with the worth of the source that imports them, so a missing
/// import is fatal only when it is reached from a Required file. Prefixes
/// are not applied here, only at flatten time. Cycles terminate because a
/// reference already in the set is never re-read.
///
/// A Required source that cannot be read is fatal. An Optional source
/// that cannot be read contributes an empty directive list. A source that
/// reads but fails to parse is fatal either way.
pub fn load_all(roots: &[SourceRef]) -> ConfigResult<LoadedSet> {
    let mut loaded = LoadedSet::new();
    let mut queue: VecDeque<SourceRef> = roots.iter().cloned().collect();

    while let Some(source) = queue.pop_front() {
        if loaded.contains_key(&source) {
            continue;
        }
        let directives = load_one(&source)?;
        for path in import_paths(&directives) {
            let import = if source.is_required() {
                SourceRef::Required(path)
            } else {
                SourceRef::Optional(path)
            };
            if !loaded.contains_key(&import) {
                queue.push_back(import);
            }
        }
        loaded.insert(source, directives);
    }
    Ok(loaded)
}

/// Reads and parses a single source, applying env-only path expansion.
fn load_one(source: &SourceRef) -> ConfigResult<Vec<Directive>> {
    let path = interpolate_env(source.path())?;
    match fs::read_to_string(&path) {
        Ok(content) => parser::parse(&path, &content),
        Err(err) if source.is_required() => Err(ConfigError::io(path, err)),
        Err(_) => Ok(Vec::new()),
    }
}

/// Collects import paths from a directive tree, descending into groups.
/// No prefixing happens at this stage.
fn import_paths(directives: &[Directive]) -> Vec<String> {
    let mut paths = Vec::new();
    collect_imports(directives, &mut paths);
    paths
}

fn collect_imports(directives: &[Directive], out: &mut Vec<String>) {
    for directive in directives {
        match directive {
            Directive::Import(path) => out.push(path.clone()),
            Directive::Group(_, body) => collect_imports(body, out),
            Directive::Bind(..) => {}
        }
    }
}
