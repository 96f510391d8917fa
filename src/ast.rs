//! Source references and the parsed directive tree.

use crate::value::Value;

/// A reference to a configuration source file.
///
/// `Required` sources abort the whole load when they cannot be read;
/// `Optional` sources that are missing simply contribute nothing. The two
/// variants are distinct identities in the loaded-set: `Required("a.cfg")`
/// and `Optional("a.cfg")` are different keys.
///
/// The path may contain `$(VAR)` references, expanded against the process
/// environment (and nothing else) at read time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceRef {
    /// Source that must load successfully.
    Required(String),
    /// Source whose absence is tolerated.
    Optional(String),
}

impl SourceRef {
    /// Creates a required source reference.
    pub fn required(path: impl Into<String>) -> Self {
        SourceRef::Required(path.into())
    }

    /// Creates an optional source reference.
    pub fn optional(path: impl Into<String>) -> Self {
        SourceRef::Optional(path.into())
    }

    /// The path text as written, before environment expansion.
    pub fn path(&self) -> &str {
        match self {
            SourceRef::Required(p) | SourceRef::Optional(p) => p,
        }
    }

    /// Whether a failure to read this source is fatal.
    pub fn is_required(&self) -> bool {
        matches!(self, SourceRef::Required(_))
    }
}

/// One parsed unit of configuration syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `name = value`: binds a (possibly dotted) name to a value.
    Bind(String, Value),
    /// `name { ... }`: prefixes the dotted names of contained directives.
    Group(String, Vec<Directive>),
    /// `import "path"`: splices another file's directives in place.
    Import(String),
}

/// Returns true when `c` may start an identifier: any Unicode letter.
pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic()
}

/// Returns true when `c` may continue an identifier: Unicode letters,
/// digits, `-` or `_`.
pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Returns true when `name` is a valid identifier segment.
pub fn is_valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => {}
        _ => return false,
    }
    chars.all(is_ident_continue)
}

/// Returns true when `name` is a valid dotted name: one or more valid
/// identifier segments joined by `.`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_valid_ident)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_source_ref_accessors() {
        let req = SourceRef::required("app.cfg");
        let opt = SourceRef::optional("app.cfg");

        assert_eq!(req.path(), "app.cfg");
        assert_eq!(opt.path(), "app.cfg");
        assert!(req.is_required());
        assert!(!opt.is_required());
    }

    #[test]
    fn test_source_ref_identity_distinguishes_variants() {
        // Required and Optional of the same path are different keys
        let mut seen: HashMap<SourceRef, usize> = HashMap::new();
        seen.insert(SourceRef::required("a.cfg"), 1);
        seen.insert(SourceRef::optional("a.cfg"), 2);

        assert_eq!(seen.len(), 2);
        assert_eq!(seen.get(&SourceRef::required("a.cfg")), Some(&1));
        assert_eq!(seen.get(&SourceRef::optional("a.cfg")), Some(&2));
    }

    #[test]
    fn test_ident_validity() {
        assert!(is_valid_ident("host"));
        assert!(is_valid_ident("log-level"));
        assert!(is_valid_ident("max_conns"));
        assert!(is_valid_ident("café"));
        assert!(is_valid_ident("x9"));

        assert!(!is_valid_ident(""));
        assert!(!is_valid_ident("9x"));
        assert!(!is_valid_ident("-x"));
        assert!(!is_valid_ident("a b"));
        assert!(!is_valid_ident("a.b"));
    }

    #[test]
    fn test_dotted_name_validity() {
        assert!(is_valid_name("db.host"));
        assert!(is_valid_name("a.b-c.d_e"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(".a"));
        assert!(!is_valid_name("a."));
        assert!(!is_valid_name("a..b"));
    }
}
