//! Reference parser for `$NAME` and `${NAME}` syntax
//!
//! Parses strings to extract variable references with their positions.

use std::ops::Range;

/// Represents a parsed variable reference in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    /// The referenced name (without `$`, `{` or `}`).
    pub name: String,

    /// Whether the reference used the `${NAME}` form.
    pub braced: bool,

    /// Byte range in the original string where this reference appears.
    pub span: Range<usize>,
}

impl VariableReference {
    /// Creates a new variable reference.
    #[must_use]
    pub fn new(name: impl Into<String>, braced: bool, span: Range<usize>) -> Self {
        Self {
            name: name.into(),
            braced,
            span,
        }
    }
}

/// Characters allowed in a referenced name.
#[must_use]
const fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Parses a string and extracts all variable references.
///
/// Supports:
/// - `$NAME` - the name is the longest run of `[A-Za-z0-9_]` after `$`
/// - `${NAME}` - only when `}` directly follows the name
///
/// Anything else after a `$` is plain text.
///
/// # Examples
///
/// ```
/// use shipyard_application::variable_resolver::parser::parse_references;
///
/// let refs = parse_references("STAGE--$POD_ID--${POD_ID}--${ bad}");
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[0].name, "POD_ID");
/// assert!(!refs[0].braced);
/// assert!(refs[1].braced);
/// ```
#[must_use]
pub fn parse_references(input: &str) -> Vec<VariableReference> {
    let bytes = input.as_bytes();
    let mut references = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }

        let start = i;
        let braced = bytes.get(i + 1) == Some(&b'{');
        let name_start = if braced { i + 2 } else { i + 1 };
        let name_len = bytes[name_start.min(bytes.len())..]
            .iter()
            .take_while(|b| is_name_char(**b))
            .count();
        let name_end = name_start + name_len;

        if name_len == 0 {
            i += 1;
            continue;
        }

        if braced {
            if bytes.get(name_end) == Some(&b'}') {
                let end = name_end + 1;
                let name = &input[name_start..name_end];
                references.push(VariableReference::new(name, true, start..end));
                i = end;
            } else {
                // `${` without a closing brace right after the name is text.
                i += 1;
            }
        } else {
            let name = &input[name_start..name_end];
            references.push(VariableReference::new(name, false, start..name_end));
            i = name_end;
        }
    }

    references
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_reference() {
        let refs = parse_references("$NAME");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "NAME");
        assert!(!refs[0].braced);
        assert_eq!(refs[0].span, 0..5);
    }

    #[test]
    fn test_parse_braced_reference() {
        let refs = parse_references("${NAME}");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "NAME");
        assert!(refs[0].braced);
        assert_eq!(refs[0].span, 0..7);
    }

    #[test]
    fn test_bare_reference_is_greedy() {
        let refs = parse_references("$POD_ID_NOT--");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "POD_ID_NOT");
    }

    #[test]
    fn test_braced_reference_stops_at_brace() {
        let refs = parse_references("${POD}_ID");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "POD");
        assert_eq!(refs[0].span, 0..6);
    }

    #[test]
    fn test_parse_multiple_references() {
        let refs = parse_references("STAGE--$POD_ID--$POD_ID_NOT--${POD_ID}");
        let names: Vec<_> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["POD_ID", "POD_ID_NOT", "POD_ID"]);
    }

    #[test]
    fn test_adjacent_references() {
        let refs = parse_references("$A$B${C}");
        let names: Vec<_> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_not_references() {
        for input in ["$", "$$", "${}", "${NAME", "${ NAME}", "$-x", "price: 5$", "${NA-ME}"] {
            assert!(parse_references(input).is_empty(), "{input} should have no references");
        }
    }

    #[test]
    fn test_dollar_dollar_name() {
        let refs = parse_references("$$NAME");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].span, 1..6);
    }

    #[test]
    fn test_multibyte_text_around_references() {
        let input = "héllo $NAME wörld";
        let refs = parse_references(input);
        assert_eq!(refs.len(), 1);
        assert_eq!(&input[refs[0].span.clone()], "$NAME");
    }
}
