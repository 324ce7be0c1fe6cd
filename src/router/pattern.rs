//! Path-pattern compiler.
//!
//! Segment grammar:
//! - a literal segment matches verbatim;
//! - `:name` matches exactly one non-separator segment;
//! - `:name+` matches one or more remaining segments, joined, final only;
//! - `:name*` matches zero or more remaining segments, joined, final only.

use std::sync::Arc;

use regex::Regex;

use super::RouteError;

/// Compile a path pattern into a regex with named captures plus the ordered
/// capture names.
pub(crate) fn compile(pattern: &str) -> Result<(Regex, Vec<Arc<str>>), RouteError> {
    let bad = |reason: &str| RouteError::BadPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if !pattern.starts_with('/') {
        return Err(bad("must start with '/'"));
    }
    if pattern == "/" {
        let regex = Regex::new("^/$").map_err(|e| bad(&e.to_string()))?;
        return Ok((regex, Vec::new()));
    }

    let segments: Vec<&str> = pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let mut source = String::with_capacity(pattern.len() + 16);
    source.push('^');
    let mut names: Vec<Arc<str>> = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        let last = idx == segments.len() - 1;
        if let Some(spec) = segment.strip_prefix(':') {
            let (name, kind) = if let Some(n) = spec.strip_suffix('+') {
                (n, SegmentKind::OneOrMore)
            } else if let Some(n) = spec.strip_suffix('*') {
                (n, SegmentKind::ZeroOrMore)
            } else {
                (spec, SegmentKind::One)
            };
            if name.is_empty() {
                return Err(bad("capture segment with no name"));
            }
            if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
                return Err(bad("capture names may only use [A-Za-z0-9_]"));
            }
            if !last && kind != SegmentKind::One {
                return Err(bad("multi-segment captures are only valid as the final segment"));
            }
            match kind {
                SegmentKind::One => source.push_str(&format!("/(?P<{name}>[^/]+)")),
                SegmentKind::OneOrMore => source.push_str(&format!("/(?P<{name}>.+)")),
                SegmentKind::ZeroOrMore => source.push_str(&format!("(?:/(?P<{name}>.*))?")),
            }
            names.push(Arc::from(name));
        } else {
            source.push('/');
            source.push_str(&regex::escape(segment));
        }
    }

    source.push('$');
    let regex = Regex::new(&source).map_err(|e| bad(&e.to_string()))?;
    Ok((regex, names))
}

#[derive(PartialEq, Eq)]
enum SegmentKind {
    One,
    OneOrMore,
    ZeroOrMore,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(pattern: &str, path: &str) -> Option<Vec<(String, String)>> {
        let (regex, names) = compile(pattern).unwrap();
        let caps = regex.captures(path)?;
        Some(
            names
                .iter()
                .map(|n| {
                    let v = caps.name(n.as_ref()).map(|m| m.as_str()).unwrap_or("");
                    (n.to_string(), v.to_string())
                })
                .collect(),
        )
    }

    #[test]
    fn single_capture_segments() {
        let caps = captures("/api/:root/:id", "/api/x/123").unwrap();
        assert_eq!(
            caps,
            vec![
                ("root".to_string(), "x".to_string()),
                ("id".to_string(), "123".to_string())
            ]
        );
        assert!(captures("/api/:root/:id", "/api/x").is_none());
    }

    #[test]
    fn zero_or_more_matches_empty_and_deep() {
        for (path, expected) in [("/files/", ""), ("/files/a", "a"), ("/files/a/b/c", "a/b/c")] {
            let caps = captures("/files/:rest*", path).unwrap();
            assert_eq!(caps, vec![("rest".to_string(), expected.to_string())]);
        }
        // Bare prefix with no trailing slash also matches with an empty capture.
        let caps = captures("/files/:rest*", "/files").unwrap();
        assert_eq!(caps[0].1, "");
    }

    #[test]
    fn one_or_more_requires_a_segment() {
        assert!(captures("/files/:rest+", "/files").is_none());
        assert!(captures("/files/:rest+", "/files/").is_none());
        let caps = captures("/files/:rest+", "/files/a/b").unwrap();
        assert_eq!(caps[0].1, "a/b");
    }

    #[test]
    fn literal_segments_are_escaped() {
        let (regex, _) = compile("/v1.0/ping").unwrap();
        assert!(regex.is_match("/v1.0/ping"));
        assert!(!regex.is_match("/v1x0/ping"));
    }

    #[test]
    fn multi_segment_capture_must_be_final() {
        assert!(compile("/a/:rest*/b").is_err());
        assert!(compile("/a/:rest+/b").is_err());
    }

    #[test]
    fn root_pattern() {
        let (regex, names) = compile("/").unwrap();
        assert!(regex.is_match("/"));
        assert!(!regex.is_match("/x"));
        assert!(names.is_empty());
    }
}
