//! Route pattern compilation and segment matching.
//!
//! # Responsibilities
//! - Split paths into `/`-separated segments
//! - Compile a pattern into literal and wildcard segments
//! - Record parameter positions for later extraction
//!
//! # Design Decisions
//! - No regex to guarantee O(n) matching; literal segments compare exactly
//! - A `{name}` segment matches any single segment, including an empty one
//! - A trailing literal segment is also exposed as a parameter named after itself,
//!   so query strings on fixed paths (`/api/v1/get_time?x=1`) stay reachable

/// Split on `/` the way a line reader does: no trailing empty token, nothing for "".
pub fn split_segments(path: &str) -> Vec<&str> {
    split_tokens(path, '/')
}

/// Split on `delimiter` with the same rule as [`split_segments`].
pub fn split_tokens(input: &str, delimiter: char) -> Vec<&str> {
    if input.is_empty() {
        return Vec::new();
    }
    let mut tokens: Vec<&str> = input.split(delimiter).collect();
    if input.ends_with(delimiter) {
        tokens.pop();
    }
    tokens
}

/// Path without its query string.
pub fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(head, _)| head)
}

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Wildcard(String),
}

impl Segment {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            Segment::Literal(text) => text == candidate,
            Segment::Wildcard(_) => true,
        }
    }
}

/// A named parameter at a segment position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParameter {
    pub pos: usize,
    pub name: String,
}

/// A pattern ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRoute {
    pattern: String,
    segments: Vec<Segment>,
    params: Vec<RouteParameter>,
}

impl CompiledRoute {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of segments; only paths of equal depth are tested.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn params(&self) -> &[RouteParameter] {
        &self.params
    }

    /// Match against a query-free path already split into segments.
    pub fn matches(&self, segments: &[&str]) -> bool {
        segments.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(segments)
                .all(|(segment, candidate)| segment.matches(candidate))
    }
}

fn wildcard_name(token: &str) -> Option<&str> {
    token.strip_prefix('{')?.strip_suffix('}')
}

/// Compile a pattern such as `/api/v1/sync_relay/{imsi}`.
pub fn compile(pattern: &str) -> CompiledRoute {
    let tokens = split_segments(pattern);
    let last = tokens.len().saturating_sub(1);
    let mut segments = Vec::with_capacity(tokens.len());
    let mut params = Vec::new();

    for (pos, token) in tokens.iter().enumerate() {
        match wildcard_name(token) {
            Some(name) => {
                params.push(RouteParameter {
                    pos,
                    name: name.to_string(),
                });
                segments.push(Segment::Wildcard(name.to_string()));
            }
            None => {
                if pos == last {
                    params.push(RouteParameter {
                        pos,
                        name: token.to_string(),
                    });
                }
                segments.push(Segment::Literal(token.to_string()));
            }
        }
    }

    CompiledRoute {
        pattern: pattern.to_string(),
        segments,
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_like_a_line_reader() {
        assert!(split_segments("").is_empty());
        assert_eq!(split_segments("/a"), vec!["", "a"]);
        assert_eq!(split_segments("a/"), vec!["a"]);
        assert_eq!(split_segments("/"), vec![""]);
        assert_eq!(split_segments("a//b"), vec!["a", "", "b"]);
        assert_eq!(split_tokens("k=v1,", ','), vec!["k=v1"]);
        assert_eq!(split_tokens("VAL?", '?'), vec!["VAL"]);
    }

    #[test]
    fn compile_records_parameters() {
        let route = compile("example.com/namf-comm/v1/ue-contexts/{ueContextId}/release");
        assert_eq!(route.depth(), 6);
        assert_eq!(
            route.params(),
            &[
                RouteParameter {
                    pos: 4,
                    name: "ueContextId".into()
                },
                RouteParameter {
                    pos: 5,
                    name: "release".into()
                },
            ]
        );
    }

    #[test]
    fn wildcard_segments_match_anything_literals_exactly() {
        let route = compile("example.com/namf-comm/v1/ue-contexts/{ueContextId}/release");
        let hit = split_segments("example.com/namf-comm/v1/ue-contexts/BOGUS/release");
        assert!(route.matches(&hit));

        let plural = split_segments("example.com/namf-comm/v1/ue-contexts/x/releases");
        assert!(!route.matches(&plural));
        let singular = split_segments("example.com/namf-comm/v1/ue-context/x/release");
        assert!(!route.matches(&singular));
    }

    #[test]
    fn literal_dots_are_not_patterns() {
        let route = compile("/a.c");
        assert!(route.matches(&split_segments("/a.c")));
        assert!(!route.matches(&split_segments("/abc")));
    }

    #[test]
    fn strip_query_keeps_path() {
        assert_eq!(strip_query("/a/b?x=1&y=2"), "/a/b");
        assert_eq!(strip_query("/a/b"), "/a/b");
    }
}
