//! Flattening: turns loaded directive trees into one dotted-name map.

use crate::ast::{Directive, SourceRef};
use crate::error::ConfigResult;
use crate::interp::interpolate;
use crate::loader::LoadedSet;
use crate::value::Value;
use std::collections::HashMap;

/// Flattens the roots' directive trees into a single Name → Value map.
///
/// Roots are processed in the order given, directives top to bottom. One
/// accumulating map is threaded through the whole walk, so a binding made
/// inside a group is visible by its full dotted name to everything that
/// follows it, and the last write to a dotted name wins. String values
/// are interpolated against the map as accumulated so far; forward
/// references fail. Imports replay the imported file's directives under
/// the current prefix.
pub fn flatten(roots: &[SourceRef], loaded: &LoadedSet) -> ConfigResult<HashMap<String, Value>> {
    let mut map = HashMap::new();
    for root in roots {
        if let Some(directives) = loaded.get(root) {
            flatten_into(&mut map, "", directives, loaded)?;
        }
    }
    Ok(map)
}

fn flatten_into(
    map: &mut HashMap<String, Value>,
    prefix: &str,
    directives: &[Directive],
    loaded: &LoadedSet,
) -> ConfigResult<()> {
    for directive in directives {
        match directive {
            Directive::Bind(name, Value::String(s)) => {
                let resolved = interpolate(s, map)?;
                map.insert(format!("{prefix}{name}"), Value::String(resolved));
            }
            Directive::Bind(name, value) => {
                map.insert(format!("{prefix}{name}"), value.clone());
            }
            Directive::Group(name, body) => {
                let inner = format!("{prefix}{name}.");
                flatten_into(map, &inner, body, loaded)?;
            }
            Directive::Import(path) => {
                // The loaded-set is keyed by the path as written, so no
                // expansion is needed to find the body. Imports inherit
                // the worth of the file that made them, so the body may
                // sit under either key.
                let body = loaded
                    .get(&SourceRef::Required(path.clone()))
                    .or_else(|| loaded.get(&SourceRef::Optional(path.clone())));
                if let Some(body) = body {
                    flatten_into(map, prefix, body, loaded)?;
                }
                // Absent means the import was reached only through an
                // Optional file that was itself missing; nothing to replay.
            }
        }
    }
    Ok(())
}
