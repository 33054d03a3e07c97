//! Reader and writer for the data-literal subset of module syntax.
//!
//! Accepts JSON plus the relaxations people use when hand-editing the
//! generated module: unquoted keys, single-quoted strings, trailing commas
//! and comments. Anything else (calls, templates, spreads, identifiers in
//! value position) is a syntax error.

use serde_json::{Map, Number, Value};

use super::ParseError;

/// Deeper nesting than any real archive uses
const MAX_DEPTH: usize = 64;

/// Parse one literal starting at `start` (leading whitespace and comments are
/// skipped). Returns the value and the byte offset just past it.
pub fn parse_literal(src: &str, start: usize) -> Result<(Value, usize), ParseError> {
    let mut parser = LiteralParser { src, pos: start };
    parser.skip_trivia()?;
    let value = parser.parse_value(0)?;
    Ok((value, parser.pos))
}

/// Offset of the first byte that is not whitespace or a comment.
pub fn skip_trivia(src: &str, start: usize) -> Result<usize, ParseError> {
    let mut parser = LiteralParser { src, pos: start };
    parser.skip_trivia()?;
    Ok(parser.pos)
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= c.len_utf8();
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                match rest.find('\n') {
                    Some(end) => self.pos += end + 1,
                    None => self.pos = self.src.len(),
                }
            } else if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => return Err(self.error("unterminated block comment")),
                }
            } else {
                match self.peek() {
                    Some(c) if c.is_whitespace() || c == '\u{feff}' => {
                        self.pos += c.len_utf8();
                    }
                    _ => return Ok(()),
                }
            }
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value, ParseError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }

        match self.peek() {
            Some('{') => self.parse_object(depth),
            Some('[') => self.parse_array(depth),
            Some(q @ ('"' | '\'')) => self.parse_string(q).map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => {
                self.parse_number().map(Value::Number)
            }
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                let word = self.parse_identifier();
                match word {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    other => {
                        self.pos = start;
                        Err(self.error(format!("unexpected identifier '{}'", other)))
                    }
                }
            }
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_object(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.expect('{')?;
        let mut map = Map::new();

        loop {
            self.skip_trivia()?;
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }

            let key = match self.peek() {
                Some(q @ ('"' | '\'')) => self.parse_string(q)?,
                Some(c) if is_ident_start(c) => self.parse_identifier().to_string(),
                Some(c) if c.is_ascii_digit() => self.parse_number()?.to_string(),
                _ => return Err(self.error("expected property name")),
            };

            self.skip_trivia()?;
            self.expect(':')?;
            self.skip_trivia()?;
            let value = self.parse_value(depth + 1)?;
            map.insert(key, value);

            self.skip_trivia()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_array(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.expect('[')?;
        let mut items = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.peek() == Some(']') {
                self.bump();
                return Ok(Value::Array(items));
            }

            items.push(self.parse_value(depth + 1)?);

            self.skip_trivia()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {}
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    fn parse_number(&mut self) -> Result<Number, ParseError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        while let Some(c) = self.peek() {
            let in_exponent = matches!(c, '+' | '-')
                && matches!(self.src[..self.pos].chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || in_exponent {
                self.bump();
            } else {
                break;
            }
        }

        let text = self.src[start..self.pos].trim_start_matches('+');
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Number::from(int));
        }
        if let Ok(int) = text.parse::<u64>() {
            return Ok(Number::from(int));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| ParseError::Syntax {
                offset: start,
                message: format!("invalid number '{}'", text),
            })
    }

    fn parse_string(&mut self, quote: char) -> Result<String, ParseError> {
        self.expect(quote)?;
        let mut out = String::new();

        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            match c {
                c if c == quote => return Ok(out),
                '\n' | '\r' => return Err(self.error("line break inside string")),
                '\\' => self.parse_escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // Line continuation
            '\n' => {}
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            'x' => {
                let code = self.parse_hex(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid \\x escape"))?);
            }
            'u' => {
                let ch = self.parse_unicode_escape()?;
                out.push(ch);
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn parse_unicode_escape(&mut self) -> Result<char, ParseError> {
        let code = if self.peek() == Some('{') {
            self.bump();
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.bump();
            }
            let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                .map_err(|_| self.error("invalid \\u{} escape"))?;
            self.expect('}')?;
            code
        } else {
            self.parse_hex(4)?
        };

        // Surrogate pair
        if (0xD800..0xDC00).contains(&code) && self.rest().starts_with("\\u") {
            let save = self.pos;
            self.pos += 2;
            let low = self.parse_hex(4)?;
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(combined).ok_or_else(|| self.error("invalid surrogate pair"));
            }
            self.pos = save;
        }

        char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn parse_hex(&mut self, digits: usize) -> Result<u32, ParseError> {
        let end = self.pos + digits;
        let hex = self
            .src
            .get(self.pos..end)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid hex escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        Ok(code)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

const RESERVED_WORDS: &[&str] = &[
    "true", "false", "null", "undefined", "class", "const", "default", "delete", "export",
    "function", "import", "new", "return", "this", "var",
];

fn is_bare_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => {}
        _ => return false,
    }
    chars.all(is_ident_continue) && !RESERVED_WORDS.contains(&key)
}

/// Render `value` as a data literal: unquoted keys where possible, two-space
/// indent, trailing commas so that diffs stay one line per change.
pub fn write_literal(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Array(items) => {
            out.push_str("[\n");
            for item in items {
                push_indent(out, indent + 1);
                write_literal(item, indent + 1, out);
                out.push_str(",\n");
            }
            push_indent(out, indent);
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("{\n");
            for (key, item) in map {
                push_indent(out, indent + 1);
                if is_bare_key(key) {
                    out.push_str(key);
                } else {
                    out.push_str(&Value::String(key.clone()).to_string());
                }
                out.push_str(": ");
                write_literal(item, indent + 1, out);
                out.push_str(",\n");
            }
            push_indent(out, indent);
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(src: &str) -> Value {
        parse_literal(src, 0).unwrap().0
    }

    #[test]
    fn test_parses_plain_json() {
        let value = parse(r#"{"a": [1, 2.5, -3], "b": null, "c": true, "d": "x\"y"}"#);
        assert_eq!(value, json!({ "a": [1, 2.5, -3], "b": null, "c": true, "d": "x\"y" }));
    }

    #[test]
    fn test_parses_relaxed_syntax() {
        let src = r#"
            // leading comment
            [
              {
                id: 'one', /* inline */
                label: "Two é \x41",
                'quoted-key': 'it\'s',
                $weird_key: 1e3,
              },
            ]"#;
        let value = parse(src);
        assert_eq!(
            value,
            json!([{ "id": "one", "label": "Two é A", "quoted-key": "it's", "$weird_key": 1000.0 }])
        );
    }

    #[test]
    fn test_surrogate_pairs() {
        assert_eq!(parse(r#""📷""#), json!("📷"));
        assert_eq!(parse(r#""\u{1F4F7}""#), json!("📷"));
    }

    #[test]
    fn test_rejects_code() {
        for src in [
            "[eval('x')]",
            "{ a: fetch('/x') }",
            "[`template`]",
            "{ a: undefined }",
            "[...other]",
            "{ a: () => 1 }",
        ] {
            let err = parse_literal(src, 0).unwrap_err();
            assert!(matches!(err, ParseError::Syntax { .. }), "accepted {}", src);
        }
    }

    #[test]
    fn test_reports_offset() {
        match parse_literal("[1, 2,, 3]", 0) {
            Err(ParseError::Syntax { offset, .. }) => assert_eq!(offset, 6),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_returns_end_offset() {
        let src = "const x = [1, 2];\nrest";
        let (value, end) = parse_literal(src, 10).unwrap();
        assert_eq!(value, json!([1, 2]));
        assert_eq!(&src[end..end + 1], ";");
    }

    #[test]
    fn test_unterminated_input() {
        assert!(parse_literal("[1, 2", 0).is_err());
        assert!(parse_literal("'abc", 0).is_err());
        assert!(parse_literal("/* never closed", 0).is_err());
    }

    #[test]
    fn test_write_uses_bare_keys() {
        let value = json!({ "id": "a", "accent-color": "#fff", "photos": [], "new": 1 });
        let mut out = String::new();
        write_literal(&value, 0, &mut out);

        assert!(out.contains("\n  id: \"a\",\n"));
        assert!(out.contains("\n  \"accent-color\": \"#fff\",\n"));
        assert!(out.contains("\n  photos: [],\n"));
        assert!(out.contains("\n  \"new\": 1,\n"));
        assert_eq!(parse(&out), value);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let src = "[".repeat(200) + &"]".repeat(200);
        assert!(parse_literal(&src, 0).is_err());
    }
}
