//! # Python String Literals
//!
//! Decoding of string literal source text into the value Python would build,
//! and encoding of values back into double-quoted literals that decode to the
//! exact same value.

use std::fmt;

/// Flags carried by a string prefix such as `rb` or `F`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringPrefix {
    pub raw: bool,
    pub bytes: bool,
    pub format: bool,
}

impl StringPrefix {
    /// Parse the opening token of a string (`rf"""`, `'`, `b"` ...).
    pub fn parse(start_token: &str) -> Self {
        let mut prefix = StringPrefix::default();
        for c in start_token.chars().take_while(|c| *c != '"' && *c != '\'') {
            match c.to_ascii_lowercase() {
                'r' => prefix.raw = true,
                'b' => prefix.bytes = true,
                'f' => prefix.format = true,
                _ => {}
            }
        }
        prefix
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// `\N{...}` needs the Unicode name database
    NamedEscape,
    /// Truncated or out-of-range `\x`, `\u` or `\U` escape
    InvalidEscape(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NamedEscape => write!(f, "named unicode escapes are not supported"),
            DecodeError::InvalidEscape(seq) => write!(f, "invalid escape sequence {seq}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode the body of a literal (the text between its quotes, or one literal
/// segment of an f-string) into its runtime value.
pub fn decode_segment(body: &str, prefix: StringPrefix) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                // source newlines are normalized to \n before tokenizing
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '{' | '}' if prefix.format && chars.peek() == Some(&c) => {
                chars.next();
                out.push(c);
            }
            '\\' if prefix.raw => {
                out.push('\\');
                // an escaped quote or backslash still belongs to the literal
                if let Some(next) = chars.next() {
                    if next == '\r' {
                        if chars.peek() == Some(&'\n') {
                            chars.next();
                        }
                        out.push('\n');
                    } else {
                        out.push(next);
                    }
                }
            }
            '\\' => decode_escape(&mut chars, &mut out)?,
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn decode_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    out: &mut String,
) -> Result<(), DecodeError> {
    let Some(c) = chars.next() else {
        out.push('\\');
        return Ok(());
    };
    match c {
        '\n' => {}
        '\r' => {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
        }
        '\\' => out.push('\\'),
        '\'' => out.push('\''),
        '"' => out.push('"'),
        'a' => out.push('\u{07}'),
        'b' => out.push('\u{08}'),
        'f' => out.push('\u{0C}'),
        'n' => out.push('\n'),
        'r' => out.push('\r'),
        't' => out.push('\t'),
        'v' => out.push('\u{0B}'),
        '0'..='7' => {
            let mut value = c.to_digit(8).unwrap_or(0);
            for _ in 0..2 {
                match chars.peek().and_then(|d| d.to_digit(8)) {
                    Some(d) => {
                        value = value * 8 + d;
                        chars.next();
                    }
                    None => break,
                }
            }
            push_code_point(out, value, &format!("\\{c}"))?;
        }
        'x' => {
            let value = read_hex(chars, 2, 'x')?;
            push_code_point(out, value, "\\x")?;
        }
        'u' => {
            let value = read_hex(chars, 4, 'u')?;
            push_code_point(out, value, "\\u")?;
        }
        'U' => {
            let value = read_hex(chars, 8, 'U')?;
            push_code_point(out, value, "\\U")?;
        }
        'N' => return Err(DecodeError::NamedEscape),
        other => {
            // unknown escapes keep their backslash
            out.push('\\');
            out.push(other);
        }
    }
    Ok(())
}

fn read_hex(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    digits: usize,
    marker: char,
) -> Result<u32, DecodeError> {
    let mut value = 0u32;
    let mut seen = String::new();
    for _ in 0..digits {
        match chars.next() {
            Some(d) if d.is_ascii_hexdigit() => {
                seen.push(d);
                value = value * 16 + d.to_digit(16).unwrap_or(0);
            }
            _ => return Err(DecodeError::InvalidEscape(format!("\\{marker}{seen}"))),
        }
    }
    Ok(value)
}

fn push_code_point(out: &mut String, value: u32, seq: &str) -> Result<(), DecodeError> {
    match char::from_u32(value) {
        Some(c) => {
            out.push(c);
            Ok(())
        }
        None => Err(DecodeError::InvalidEscape(format!("{seq}{value:x}"))),
    }
}

/// Encode `value` as a double-quoted Python literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7F}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Double literal braces so `str.format` reproduces them.
pub fn escape_braces(value: &str) -> String {
    value.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> StringPrefix {
        StringPrefix::default()
    }

    fn unquote(literal: &str) -> String {
        decode_segment(&literal[1..literal.len() - 1], plain()).unwrap()
    }

    #[test]
    fn test_prefix_parsing() {
        assert_eq!(
            StringPrefix::parse("rf\"\"\""),
            StringPrefix {
                raw: true,
                bytes: false,
                format: true
            }
        );
        assert!(StringPrefix::parse("B'").bytes);
        assert_eq!(StringPrefix::parse("'"), plain());
        assert!(!StringPrefix::parse("u\"").format);
    }

    #[test]
    fn test_decode_common_escapes() {
        assert_eq!(
            decode_segment(r#"Tab\there \"quoted\" \\ done\n"#, plain()).unwrap(),
            "Tab\there \"quoted\" \\ done\n"
        );
        assert_eq!(decode_segment(r"\x41\101\u00e9\U0001F600", plain()).unwrap(), "AAé😀");
        assert_eq!(decode_segment("line one \\\nline two", plain()).unwrap(), "line one line two");
        assert_eq!(decode_segment(r"\d+", plain()).unwrap(), "\\d+");
    }

    #[test]
    fn test_decode_raw_and_format() {
        let raw = StringPrefix {
            raw: true,
            ..plain()
        };
        assert_eq!(decode_segment(r#"C:\new\"x"#, raw).unwrap(), r#"C:\new\"x"#);

        let fmt = StringPrefix {
            format: true,
            ..plain()
        };
        assert_eq!(decode_segment("{{literal}} ", fmt).unwrap(), "{literal} ");
        assert_eq!(decode_segment("{{literal}}", plain()).unwrap(), "{{literal}}");
    }

    #[test]
    fn test_decode_normalizes_crlf() {
        assert_eq!(decode_segment("a\r\nb", plain()).unwrap(), "a\nb");
    }

    #[test]
    fn test_decode_rejects_unsupported() {
        assert_eq!(
            decode_segment(r"\N{BULLET} item", plain()),
            Err(DecodeError::NamedEscape)
        );
        assert!(matches!(
            decode_segment(r"\x4", plain()),
            Err(DecodeError::InvalidEscape(_))
        ));
        assert!(decode_segment(r"\ud800", plain()).is_err());
    }

    #[test]
    fn test_quote_round_trips() {
        for value in [
            "Say \"hi\"",
            "back\\slash",
            "multi\nline\r\n",
            "bell\u{07} and del\u{7F}",
            "tab\tand 'single'",
            "✅ Operation complete",
            "",
        ] {
            assert_eq!(unquote(&quote(value)), value);
        }
    }

    #[test]
    fn test_quote_output_shape() {
        assert_eq!(quote("a\"b\\c\n"), r#""a\"b\\c\n""#);
        assert_eq!(quote("\u{01}"), r#""\x01""#);
    }

    #[test]
    fn test_escape_braces() {
        assert_eq!(escape_braces("{x} and }"), "{{x}} and }}");
    }
}
