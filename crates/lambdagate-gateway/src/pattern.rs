//! Route path patterns.
//!
//! Supported syntax:
//!
//! - literal segments, matched case-insensitively: `/users`
//! - named parameters: `/users/:id`
//! - a trailing wildcard, captured under the key `"0"`: `/files/*`
//!
//! Empty segments are ignored on both sides, so `/users/42/` and
//! `/users//42` match `/users/:id`. Captured values are percent-decoded.

use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;
use std::fmt;

/// Key under which a trailing wildcard is captured.
pub const WILDCARD_KEY: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Lowercased literal
    Literal(String),
    Param(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
    wildcard: bool,
}

/// Why a pattern failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    MissingLeadingSlash,
    EmptyParameterName,
    InvalidParameterName(String),
    MisplacedWildcard,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::MissingLeadingSlash => write!(f, "pattern must start with '/'"),
            PatternError::EmptyParameterName => write!(f, "parameter name is empty"),
            PatternError::InvalidParameterName(name) => {
                write!(f, "invalid parameter name '{}'", name)
            }
            PatternError::MisplacedWildcard => write!(f, "'*' is only allowed as the last segment"),
        }
    }
}

impl std::error::Error for PatternError {}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }

        let raw: Vec<&str> = split_segments(pattern).collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut wildcard = false;

        for (i, segment) in raw.iter().enumerate() {
            if *segment == "*" {
                if i + 1 != raw.len() {
                    return Err(PatternError::MisplacedWildcard);
                }
                wildcard = true;
            } else if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PatternError::EmptyParameterName);
                }
                if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(PatternError::InvalidParameterName(name.to_string()));
                }
                segments.push(Segment::Param(name.to_string()));
            } else if segment.contains('*') {
                return Err(PatternError::MisplacedWildcard);
            } else {
                segments.push(Segment::Literal(segment.to_lowercase()));
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
            wildcard,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Canonical form used to detect patterns that can never both match first:
    /// literals lowercased, parameter names erased.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(_) => out.push(':'),
            }
        }
        if self.wildcard {
            out.push_str("/*");
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Matches `path` and returns the captured parameters.
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split_segments(path).collect();

        if parts.len() < self.segments.len() || (!self.wildcard && parts.len() != self.segments.len()) {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(lit) => {
                    if part.to_lowercase() != *lit {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), percent_decode(part));
                }
            }
        }

        if self.wildcard {
            let rest = parts[self.segments.len()..].join("/");
            params.insert(WILDCARD_KEY.to_string(), percent_decode(&rest));
        }

        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Decodes `%XX` escapes. Malformed escapes are kept as-is and invalid UTF-8
/// is replaced.
pub fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_literal_match_is_case_insensitive() {
        let pattern = RoutePattern::parse("/Hello").unwrap();
        assert_eq!(pattern.matches("/hello"), Some(BTreeMap::new()));
        assert_eq!(pattern.matches("/HELLO/"), Some(BTreeMap::new()));
        assert_eq!(pattern.matches("/hello/world"), None);
        assert_eq!(pattern.matches("/bye"), None);
    }

    #[test]
    fn test_named_parameters() {
        let pattern = RoutePattern::parse("/users/:id/posts/:post_id").unwrap();
        assert_eq!(
            pattern.matches("/users/42/posts/7"),
            Some(params(&[("id", "42"), ("post_id", "7")]))
        );
        assert_eq!(pattern.matches("/users/42/posts"), None);
    }

    #[test]
    fn test_parameters_are_percent_decoded() {
        let pattern = RoutePattern::parse("/search/:term").unwrap();
        assert_eq!(
            pattern.matches("/search/caf%C3%A9%20au%20lait"),
            Some(params(&[("term", "café au lait")]))
        );
    }

    #[test]
    fn test_wildcard() {
        let pattern = RoutePattern::parse("/files/*").unwrap();
        assert_eq!(
            pattern.matches("/files/a/b.txt"),
            Some(params(&[("0", "a/b.txt")]))
        );
        assert_eq!(pattern.matches("/files"), Some(params(&[("0", "")])));
        assert_eq!(pattern.matches("/other/a"), None);
    }

    #[test]
    fn test_root_pattern() {
        let pattern = RoutePattern::parse("/").unwrap();
        assert_eq!(pattern.matches("/"), Some(BTreeMap::new()));
        assert_eq!(pattern.matches(""), Some(BTreeMap::new()));
        assert_eq!(pattern.matches("/x"), None);
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(RoutePattern::parse("hello"), Err(PatternError::MissingLeadingSlash));
        assert_eq!(RoutePattern::parse("/users/:"), Err(PatternError::EmptyParameterName));
        assert_eq!(RoutePattern::parse("/*/tail"), Err(PatternError::MisplacedWildcard));
        assert!(matches!(
            RoutePattern::parse("/users/:id?"),
            Err(PatternError::InvalidParameterName(_))
        ));
    }

    #[test]
    fn test_canonical_form() {
        let a = RoutePattern::parse("/Users/:id/").unwrap();
        let b = RoutePattern::parse("/users/:userId").unwrap();
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(RoutePattern::parse("/").unwrap().canonical(), "/");
    }

    #[test]
    fn test_percent_decode_malformed() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("a%2Fb"), "a/b");
        assert_eq!(percent_decode("%FF"), "\u{FFFD}");
    }
}
