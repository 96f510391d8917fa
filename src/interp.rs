//! `$(name)` interpolation for string values and source paths.
//!
//! References resolve against the supplied mapping first, then the
//! process environment. A `$$` escapes to a literal `$`; a `$` not
//! followed by `(` or `$` stays literal.

use crate::error::{ConfigError, ConfigResult};
use crate::value::Value;
use std::collections::HashMap;
use std::env;

/// Rewrites `$(name)` references in `s`.
///
/// Resolution order per reference: `env` mapping first (String
/// substitutes its text, Integer its base-10 text, any other kind is a
/// type error), then the OS environment, otherwise an unresolved-
/// reference error. Strings without a `$` are returned unchanged without
/// being scanned.
pub fn interpolate(s: &str, env: &HashMap<String, Value>) -> ConfigResult<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('(') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(ConfigError::interpolation(format!(
                                "unterminated reference '$({name}' in \"{s}\""
                            )))
                        }
                    }
                }
                out.push_str(&resolve(&name, env)?);
            }
            // Lone '$' stays literal
            _ => out.push('$'),
        }
    }
    Ok(out)
}

/// Expands `$(VAR)` references in a source path against the process
/// environment only.
pub fn interpolate_env(path: &str) -> ConfigResult<String> {
    interpolate(path, &HashMap::new())
}

fn resolve(name: &str, env: &HashMap<String, Value>) -> ConfigResult<String> {
    match env.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Integer(i)) => Ok(i.to_string()),
        Some(other) => Err(ConfigError::interpolation(format!(
            "cannot substitute {} value bound to '{name}'",
            other.type_name()
        ))),
        None => match env::var(name) {
            Ok(v) => Ok(v),
            Err(_) => Err(ConfigError::interpolation(format!(
                "no such variable: {name}"
            ))),
        },
    }
}
