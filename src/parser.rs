//! Parser for the directive grammar.
//!
//! The grammar is deliberately small:
//!
//! ```text
//! # comment to end of line
//! name = value            # binding; names may be dotted: db.host = ".."
//! name { directives }     # group: prefixes contained names with "name."
//! import "path"           # splice another file in place
//! ```
//!
//! Values are booleans (`true`/`false`/`on`/`off`), signed 64-bit
//! integers, double-quoted strings with `\n \t \r \\ \" \uXXXX` escapes,
//! and `[v, v, ...]` lists (heterogeneous allowed). Identifiers start
//! with a Unicode letter and continue with letters, digits, `-` or `_`.
//!
//! Errors carry the 1-based line and column of the offending character.

use crate::ast::{is_ident_continue, is_ident_start, Directive};
use crate::error::{ConfigError, ConfigResult};
use crate::value::Value;

/// Parses configuration content into an ordered directive list.
///
/// `source_name` is only used for error messages.
pub fn parse(source_name: &str, content: &str) -> ConfigResult<Vec<Directive>> {
    Parser::new(source_name, content).directives(None)
}

struct Parser<'a> {
    source_name: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Parser<'a> {
    fn new(source_name: &'a str, content: &str) -> Self {
        Self {
            source_name,
            chars: content.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::parse_error(self.source_name, self.line, self.column, message)
    }

    /// Skips whitespace and `#` comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Parses directives until end of input, or until `closer` is seen
    /// (and consumed) when parsing a group body.
    fn directives(&mut self, closer: Option<char>) -> ConfigResult<Vec<Directive>> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia();
            match (self.peek(), closer) {
                (None, None) => return Ok(out),
                (None, Some(c)) => {
                    return Err(self.error(format!("unexpected end of input, expected '{c}'")))
                }
                (Some(c), Some(close)) if c == close => {
                    self.bump();
                    return Ok(out);
                }
                (Some(c), _) if is_ident_start(c) => out.push(self.directive()?),
                (Some(c), _) => {
                    return Err(self.error(format!("expected a directive, found '{c}'")))
                }
            }
        }
    }

    fn directive(&mut self) -> ConfigResult<Directive> {
        let name = self.dotted_name()?;
        if name == "import" {
            self.skip_trivia();
            if self.peek() != Some('"') {
                return Err(self.error("expected a quoted path after 'import'"));
            }
            let path = self.string_literal()?;
            return Ok(Directive::Import(path));
        }
        self.skip_trivia();
        match self.peek() {
            Some('=') => {
                self.bump();
                self.skip_trivia();
                let value = self.value()?;
                Ok(Directive::Bind(name, value))
            }
            Some('{') => {
                self.bump();
                let body = self.directives(Some('}'))?;
                Ok(Directive::Group(name, body))
            }
            Some(c) => Err(self.error(format!("expected '=' or '{{' after '{name}', found '{c}'"))),
            None => Err(self.error(format!("expected '=' or '{{' after '{name}'"))),
        }
    }

    fn ident(&mut self) -> ConfigResult<String> {
        match self.peek() {
            Some(c) if is_ident_start(c) => {}
            Some(c) => return Err(self.error(format!("expected an identifier, found '{c}'"))),
            None => return Err(self.error("expected an identifier")),
        }
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(ident)
    }

    fn dotted_name(&mut self) -> ConfigResult<String> {
        let mut name = self.ident()?;
        while self.peek() == Some('.') {
            self.bump();
            name.push('.');
            name.push_str(&self.ident()?);
        }
        Ok(name)
    }

    fn value(&mut self) -> ConfigResult<Value> {
        match self.peek() {
            Some('"') => Ok(Value::String(self.string_literal()?)),
            Some('[') => self.list_literal(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.integer_literal(),
            Some(c) if is_ident_start(c) => {
                let word = self.ident()?;
                match word.as_str() {
                    "true" | "on" => Ok(Value::Bool(true)),
                    "false" | "off" => Ok(Value::Bool(false)),
                    _ => Err(self.error(format!("expected a value, found '{word}'"))),
                }
            }
            Some(c) => Err(self.error(format!("expected a value, found '{c}'"))),
            None => Err(self.error("expected a value")),
        }
    }

    fn integer_literal(&mut self) -> ConfigResult<Value> {
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            text.push(sign);
            self.bump();
        }
        let mut digits = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                digits += 1;
                self.bump();
            } else {
                break;
            }
        }
        if digits == 0 {
            return Err(self.error("expected digits in integer literal"));
        }
        text.parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| self.error(format!("integer literal '{text}' out of range")))
    }

    fn string_literal(&mut self) -> ConfigResult<String> {
        // Caller guarantees the opening quote is present.
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some('"') => return Ok(text),
                Some('\\') => text.push(self.escape()?),
                Some('\n') => return Err(self.error("newline in string literal")),
                Some(c) => text.push(c),
            }
        }
    }

    fn escape(&mut self) -> ConfigResult<char> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('u') => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = self
                        .bump()
                        .and_then(|c| c.to_digit(16))
                        .ok_or_else(|| self.error("expected 4 hex digits after '\\u'"))?;
                    code = code * 16 + digit;
                }
                char::from_u32(code)
                    .ok_or_else(|| self.error(format!("invalid unicode escape '\\u{code:04x}'")))
            }
            Some(c) => Err(self.error(format!("unknown escape '\\{c}'"))),
            None => Err(self.error("unterminated escape sequence")),
        }
    }

    fn list_literal(&mut self) -> ConfigResult<Value> {
        // Caller guarantees the opening bracket is present.
        self.bump();
        let mut items = Vec::new();
        self.skip_trivia();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(Value::List(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_trivia();
            match self.bump() {
                Some(']') => return Ok(Value::List(items)),
                Some(',') => self.skip_trivia(),
                Some(c) => {
                    return Err(self.error(format!("expected ',' or ']' in list, found '{c}'")))
                }
                None => return Err(self.error("unterminated list literal")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(content: &str) -> Vec<Directive> {
        parse("test.cfg", content).expect("content should parse")
    }

    fn bind(name: &str, value: impl Into<Value>) -> Directive {
        Directive::Bind(name.to_string(), value.into())
    }

    #[test]
    fn test_parse_bindings() {
        let directives = parse_ok(
            r#"
            host = "localhost"
            port = 5432
            debug = true
            verbose = off
            negative = -12
            "#,
        );
        assert_eq!(
            directives,
            vec![
                bind("host", "localhost"),
                bind("port", 5432i64),
                bind("debug", true),
                bind("verbose", false),
                bind("negative", -12i64),
            ]
        );
    }

    #[test]
    fn test_parse_dotted_names() {
        let directives = parse_ok("db.pool.size = 8");
        assert_eq!(directives, vec![bind("db.pool.size", 8i64)]);
    }

    #[test]
    fn test_parse_groups() {
        let directives = parse_ok(
            r#"
            db {
              host = "localhost"
              pool { size = 8 }
            }
            "#,
        );
        assert_eq!(
            directives,
            vec![Directive::Group(
                "db".to_string(),
                vec![
                    bind("host", "localhost"),
                    Directive::Group("pool".to_string(), vec![bind("size", 8i64)]),
                ]
            )]
        );
    }

    #[test]
    fn test_parse_import() {
        let directives = parse_ok("import \"common.cfg\"\nx = 1");
        assert_eq!(
            directives,
            vec![
                Directive::Import("common.cfg".to_string()),
                bind("x", 1i64),
            ]
        );
    }

    #[test]
    fn test_parse_lists() {
        let directives = parse_ok(r#"mixed = [1, "two", true, [3]]"#);
        assert_eq!(
            directives,
            vec![bind(
                "mixed",
                Value::List(vec![
                    Value::Integer(1),
                    Value::String("two".to_string()),
                    Value::Bool(true),
                    Value::List(vec![Value::Integer(3)]),
                ])
            )]
        );

        let directives = parse_ok("empty = []");
        assert_eq!(directives, vec![bind("empty", Value::List(vec![]))]);
    }

    #[test]
    fn test_parse_string_escapes() {
        let directives = parse_ok(r#"s = "a\tb\nc\"d\\eé""#);
        assert_eq!(directives, vec![bind("s", "a\tb\nc\"d\\eé")]);
    }

    #[test]
    fn test_parse_comments() {
        let directives = parse_ok(
            "# leading comment\nx = 1 # trailing comment\n# another\ny = 2",
        );
        assert_eq!(directives, vec![bind("x", 1i64), bind("y", 2i64)]);
    }

    #[test]
    fn test_parse_error_positions() {
        let err = parse("bad.cfg", "x = 1\ny ? 2").unwrap_err();
        match err {
            ConfigError::Parse {
                source_name,
                line,
                column,
                ..
            } => {
                assert_eq!(source_name, "bad.cfg");
                assert_eq!(line, 2);
                assert_eq!(column, 3);
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(parse("t", "x =").is_err());
        assert!(parse("t", "x = \"unterminated").is_err());
        assert!(parse("t", "g { x = 1").is_err());
        assert!(parse("t", "x = [1,]").is_err());
        assert!(parse("t", "x = maybe").is_err());
        assert!(parse("t", "9x = 1").is_err());
        assert!(parse("t", "import common.cfg").is_err());
        assert!(parse("t", "x = 99999999999999999999").is_err());
    }

    #[test]
    fn test_unicode_identifiers() {
        let directives = parse_ok("café.görög = 1");
        assert_eq!(directives, vec![bind("café.görög", 1i64)]);
    }

    #[test]
    fn test_parsed_names_satisfy_the_name_validators() {
        // The scanner and the standalone validators share one rule
        let directives = parse_ok("db.pool-size = 8\ngrp_1 { x9 = 1 }");
        for directive in directives {
            match directive {
                Directive::Bind(name, _) | Directive::Group(name, _) => {
                    assert!(crate::ast::is_valid_name(&name));
                }
                Directive::Import(_) => {}
            }
        }
        assert!(parse("t", "9x = 1").is_err());
        assert!(!crate::ast::is_valid_name("9x"));
    }
}
