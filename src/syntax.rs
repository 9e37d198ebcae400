// Copyright (C) 2023 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Field syntax shared by every message variant: the token grammar used for
//! header names, methods and protocol versions, and the field-value grammar
//! used for header values.
//!
//! # References
//! * [RFC 9110 Section 5](https://www.rfc-editor.org/rfc/rfc9110.html#name-fields)
//! * [RFC 5234 Augmented BNF for Syntax Specifications: ABNF](https://www.rfc-editor.org/rfc/rfc5234.html)

use crate::GrammarError;

/// Is the character a visible (printing) character.
///
/// ```text
/// VCHAR          =  %x21-7E
/// ```
#[inline]
pub fn is_visible_character(byte: u8) -> bool {
    matches!(byte, 0x21..=0x7E)
}

/// Validate obs-text.
/// ```text
/// obs-text       = %x80-FF
/// ```
#[inline]
fn is_obs_text(byte: u8) -> bool {
    matches!(byte, 0x80..=0xFF)
}

/// A character that may appear inside a field value. UTF-8 is never assumed,
/// the value is validated as raw octets.
///
/// ```text
/// field-vchar    = VCHAR / obs-text
/// ```
#[inline]
fn is_field_value_character(byte: u8) -> bool {
    is_visible_character(byte) || is_obs_text(byte)
}

/// Horizontal whitespace, the only whitespace HTTP fields know about.
///
/// ```text
/// OWS            = *( SP / HTAB )
/// ```
#[inline]
pub fn is_whitespace_character(character: char) -> bool {
    character == ' ' || character == '\t'
}

/// Strips optional whitespace (`OWS`) from both ends of a field value.
#[must_use]
pub fn trim_whitespace(value: &str) -> &str {
    value.trim_matches(|c| is_whitespace_character(c))
}

/// Validate a field value after OWS trimming. Folded whitespace (bare CR or
/// LF) and NUL are rejected, interior SP/HTAB are allowed.
pub fn validate_field_value(value: &str) -> Result<(), GrammarError> {
    if value.bytes().all(|byte| is_field_value_character(byte) || byte == b' ' || byte == b'\t') {
        Ok(())
    } else {
        Err(GrammarError::FieldValueContainsInvalidCharacters)
    }
}

pub fn validate_token(value: &str) -> Result<(), GrammarError> {
    if value.is_empty() {
        return Err(GrammarError::TokenEmpty);
    }

    for character in value.bytes() {
        validate_token_character(character)?;
    }

    Ok(())
}

/// Validate a token character.
///
/// ```text
/// tchar          = "!" / "#" / "$" / "%" / "&" / "'" / "*"
///                / "+" / "-" / "." / "^" / "_" / "`" / "|" / "~"
///                / DIGIT / ALPHA
///                ; any VCHAR, except delimiters
/// ```
fn validate_token_character(character: u8) -> Result<(), GrammarError> {
    match character {
        b' ' | b'\t' => Err(GrammarError::TokenContainsWhitespace),

        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'|' | b'~' => Ok(()),

        b'0'..=b'9' => Ok(()),
        b'A'..=b'Z' => Ok(()),
        b'a'..=b'z' => Ok(()),

        b'"' | b'(' | b')' | b',' | b'/' | b':' | b';' | b'<' | b'=' | b'>' |
        b'?' | b'@' | b'[' | b'\\' | b']' | b'{' | b'}' => Err(GrammarError::TokenContainsDelimiter),

        _ => Err(GrammarError::TokenContainsNonVisibleAscii),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b'!', true)]
    #[case(b'0', true)]
    #[case(b'9', true)]
    #[case(b'a', true)]
    #[case(b'~', true)]
    #[case(b' ', false)]
    #[case(b'\t', false)]
    #[case(b'\r', false)]
    #[case(b'\n', false)]
    #[case(0x00, false)]
    #[case(0x1F, false)]
    #[case(0x7F, false)]
    fn test_is_visible_character(#[case] character: u8, #[case] expected: bool) {
        assert_eq!(is_visible_character(character), expected);
    }

    #[test]
    fn test_validate_token() {
        assert_eq!(validate_token(""), Err(GrammarError::TokenEmpty));
        assert_eq!(validate_token("x-custom-header"), Ok(()));
        assert_eq!(validate_token("123"), Ok(()));
        assert_eq!(validate_token(" host"), Err(GrammarError::TokenContainsWhitespace));
        assert_eq!(validate_token("ho st"), Err(GrammarError::TokenContainsWhitespace));
        assert_eq!(validate_token("host:"), Err(GrammarError::TokenContainsDelimiter));
        assert_eq!(validate_token("host\n"), Err(GrammarError::TokenContainsNonVisibleAscii));
    }

    #[rstest]
    #[case("", Ok(()))]
    #[case("application/json", Ok(()))]
    #[case("two words", Ok(()))]
    #[case("tab\tseparated", Ok(()))]
    #[case("nul\0byte", Err(GrammarError::FieldValueContainsInvalidCharacters))]
    #[case("line\rbreak", Err(GrammarError::FieldValueContainsInvalidCharacters))]
    #[case("line\nbreak", Err(GrammarError::FieldValueContainsInvalidCharacters))]
    fn test_validate_field_value(#[case] input: &str, #[case] expected: Result<(), GrammarError>) {
        assert_eq!(validate_field_value(input), expected);
    }

    #[rstest]
    #[case("  value  ", "value")]
    #[case("\tvalue\t", "value")]
    #[case("value", "value")]
    #[case("  two words ", "two words")]
    #[case("", "")]
    fn test_trim_whitespace(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(trim_whitespace(input), expected);
    }
}
