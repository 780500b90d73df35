//! Decoding of C-style string literals (`"..."`, `L"..."`, `u"..."`).
//!
//! Narrow literals decode `\x` and octal escapes as raw bytes, the result must then be valid
//! UTF-8. Wide literals (`L`/`u` prefix) treat every numeric escape as a code point.
//! `\u`/`\U` escapes are always code points and are encoded to UTF-8.

use crate::err::{EvtcError, Result};
use crate::invalid_content;

/// Decode a single quoted literal into its value.
pub fn decode(literal: &str) -> Result<String> {
    let (wide, quoted) = match literal.as_bytes().first() {
        Some(b'L') | Some(b'u') => (true, &literal[1..]),
        _ => (false, literal),
    };

    let bytes = quoted.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'"' || bytes[bytes.len() - 1] != b'"' {
        return Err(invalid_content!("expected a quoted string, found `{}`", literal));
    }

    let body = &bytes[1..bytes.len() - 1];
    let mut out: Vec<u8> = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        let b = body[i];
        match b {
            b'"' => {
                return Err(invalid_content!(
                    "unescaped quote inside string literal `{}`",
                    literal
                ));
            }
            b'\\' => {
                i += 1;
                let Some(&esc) = body.get(i) else {
                    return Err(invalid_content!(
                        "unterminated escape sequence in `{}`",
                        literal
                    ));
                };
                i += 1;

                match esc {
                    b'\\' => out.push(b'\\'),
                    b'\'' => out.push(b'\''),
                    b'"' => out.push(b'"'),
                    b'?' => out.push(b'?'),
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'v' => out.push(0x0b),
                    b'x' => {
                        let digits = take_while_max(body, i, 2, |c| c.is_ascii_hexdigit());
                        if digits == 0 {
                            return Err(invalid_content!(
                                "`\\x` escape without hex digits in `{}`",
                                literal
                            ));
                        }
                        let value = parse_radix(&body[i..i + digits], 16, literal)?;
                        i += digits;
                        push_numeric(&mut out, value, wide, literal)?;
                    }
                    b'u' => {
                        let value = take_exact_hex(body, i, 4, literal)?;
                        i += 4;
                        push_code_point(&mut out, value, literal)?;
                    }
                    b'U' => {
                        let value = take_exact_hex(body, i, 8, literal)?;
                        i += 8;
                        push_code_point(&mut out, value, literal)?;
                    }
                    b'0'..=b'7' => {
                        // First digit is already consumed, allow one more.
                        let extra = take_while_max(body, i, 1, |c| (b'0'..=b'7').contains(&c));
                        let value = parse_radix(&body[i - 1..i + extra], 8, literal)?;
                        i += extra;
                        push_numeric(&mut out, value, wide, literal)?;
                    }
                    other => {
                        return Err(invalid_content!(
                            "unknown escape sequence `\\{}` in `{}`",
                            other as char,
                            literal
                        ));
                    }
                }
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out)
        .map_err(|_| invalid_content!("string literal `{}` does not decode to UTF-8", literal))
}

/// Whether `arg` is spelled as a string literal, with or without a wide prefix.
pub fn is_literal(arg: &str) -> bool {
    let unprefixed = arg
        .strip_prefix('L')
        .or_else(|| arg.strip_prefix('u'))
        .unwrap_or(arg);
    unprefixed.starts_with('"')
}

/// Decode `arg` if it is a literal, otherwise take a bare identifier as written.
pub fn decode_or_bare(arg: &str) -> Result<String> {
    if is_literal(arg) {
        decode(arg)
    } else {
        Ok(arg.to_owned())
    }
}

/// Wrap a plain value in quotes, the inverse of [`decode`] for values without
/// characters that need escaping.
pub fn quote(value: &str) -> String {
    let mut s = String::with_capacity(value.len() + 2);
    s.push('"');
    s.push_str(value);
    s.push('"');
    s
}

fn take_while_max(body: &[u8], start: usize, max: usize, pred: impl Fn(u8) -> bool) -> usize {
    body[start..]
        .iter()
        .take(max)
        .take_while(|&&c| pred(c))
        .count()
}

fn take_exact_hex(body: &[u8], start: usize, count: usize, literal: &str) -> Result<u32> {
    let digits = take_while_max(body, start, count, |c| c.is_ascii_hexdigit());
    if digits != count {
        return Err(invalid_content!(
            "expected exactly {} hex digits in unicode escape of `{}`",
            count,
            literal
        ));
    }
    parse_radix(&body[start..start + count], 16, literal)
}

fn parse_radix(digits: &[u8], radix: u32, literal: &str) -> Result<u32> {
    // Digits were validated by the caller, so they are ASCII.
    let s = std::str::from_utf8(digits).map_err(|_| EvtcError::internal("non-ASCII digits"))?;
    u32::from_str_radix(s, radix)
        .map_err(|_| invalid_content!("numeric escape overflows in `{}`", literal))
}

fn push_numeric(out: &mut Vec<u8>, value: u32, wide: bool, literal: &str) -> Result<()> {
    if wide {
        return push_code_point(out, value, literal);
    }
    let byte = u8::try_from(value)
        .map_err(|_| invalid_content!("escape value {:#x} overflows a byte in `{}`", value, literal))?;
    out.push(byte);
    Ok(())
}

fn push_code_point(out: &mut Vec<u8>, value: u32, literal: &str) -> Result<()> {
    let c = char::from_u32(value).ok_or_else(|| {
        invalid_content!(
            "escape value {:#x} is not a valid code point in `{}`",
            value,
            literal
        )
    })?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::ErrorKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn fails(s: &str) {
        let err = decode(s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidContent, "{}", s);
    }

    #[test]
    fn test_simple_escapes() {
        assert_eq!(decode(r#""\n\t\\""#).unwrap(), "\n\t\\");
        assert_eq!(decode(r#""\n\t\\""#).unwrap().chars().count(), 3);
        assert_eq!(decode(r#""\'\"\?""#).unwrap(), "'\"?");
        assert_eq!(
            decode(r#""\a\b\f\r\v""#).unwrap(),
            "\u{7}\u{8}\u{c}\r\u{b}"
        );
    }

    #[test]
    fn test_prefixed_literals() {
        assert_eq!(decode(r#"L"wide""#).unwrap(), "wide");
        assert_eq!(decode(r#"u"utf16""#).unwrap(), "utf16");
        fails(r#"L'c'"#);
    }

    #[test]
    fn test_hex_and_octal_escapes() {
        assert_eq!(decode(r#""\x41\x4a""#).unwrap(), "AJ");
        // Only two hex digits belong to the escape.
        assert_eq!(decode(r#""\x414""#).unwrap(), "A4");
        assert_eq!(decode(r#""\101""#).unwrap(), "\u{8}1");
        assert_eq!(decode(r#""\0""#).unwrap(), "\0");
        assert_eq!(decode(r#""\77x""#).unwrap(), "?x");
    }

    #[test]
    fn test_wide_hex_escape_is_a_code_point() {
        assert_eq!(decode(r#"L"\xe9""#).unwrap(), "é");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(decode(r#""é""#).unwrap(), "é");
        assert_eq!(decode(r#""\U0001F600""#).unwrap(), "😀");
    }

    #[test]
    fn test_bare_identifiers_pass_through() {
        assert!(is_literal(r#""x""#));
        assert!(is_literal(r#"L"x""#));
        assert!(is_literal(r#"u"x""#));
        assert!(!is_literal("Level"));
        assert!(!is_literal("u8"));
        assert_eq!(decode_or_bare("Socket").unwrap(), "Socket");
        assert_eq!(decode_or_bare(r#""Socket""#).unwrap(), "Socket");
        assert!(decode_or_bare(r#""broken"#).is_err());
    }

    #[test]
    fn test_malformed_literals_fail() {
        fails("noquotes");
        fails("\"");
        fails("\"open");
        fails("\"a\"b\"");
        fails(r#""trailing\""#);
        fails(r#""\x""#);
        fails(r#""\u12""#);
        fails(r#""\U0001F60""#);
        fails(r#""\UFFFFFFFF""#);
        fails(r#""\q""#);
        // A lone high byte is not UTF-8.
        fails(r#""\xff""#);
    }

    proptest! {
        #[test]
        fn test_decode_of_quoted_plain_string_is_identity(s in "[a-zA-Z0-9 _.,:;!()-]{0,40}") {
            prop_assert_eq!(decode(&quote(&s)).unwrap(), s);
        }
    }
}
