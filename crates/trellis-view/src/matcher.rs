// File: src/matcher.rs
// Purpose: Path matching interface consumed by the blocker, plus a segment-pattern matcher

use crate::match_model::{Params, RouteId};

/// A location split into its path and search parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub pathname: String,
    pub search: String,
}

/// Result of matching a pathname against the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoutes {
    pub found_route: Option<RouteId>,
    pub route_params: Params,
}

impl MatchedRoutes {
    pub fn none() -> Self {
        Self { found_route: None, route_params: Params::new() }
    }
}

/// The path-matching engine, external to this subsystem. The blocker only
/// needs `get_matched_routes`; everything else about matching is the
/// router core's business.
pub trait PathMatcher: Send + Sync {
    fn get_matched_routes(&self, pathname: &str) -> MatchedRoutes;
}

/// One segment of a URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Static text segment.
    Static(String),
    /// Dynamic parameter: `:id`.
    Param(String),
    /// Catch-all: `*slug`, consumes the rest of the path.
    CatchAll(String),
}

fn classify_segment(segment: &str) -> Segment {
    if let Some(name) = segment.strip_prefix(':') {
        return Segment::Param(name.to_string());
    }
    if let Some(name) = segment.strip_prefix('*') {
        return Segment::CatchAll(name.to_string());
    }
    Segment::Static(segment.to_string())
}

fn split_path(pathname: &str) -> Vec<&str> {
    pathname.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Segment-pattern matcher: `/users/:id`, `/docs/*slug`. First registered
/// pattern wins.
#[derive(Debug, Default)]
pub struct SegmentMatcher {
    patterns: Vec<(Vec<Segment>, RouteId)>,
}

impl SegmentMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pattern(&mut self, pattern: &str, route: RouteId) {
        let segments = split_path(pattern).into_iter().map(classify_segment).collect();
        self.patterns.push((segments, route));
    }

    fn match_pattern(segments: &[Segment], path: &[&str]) -> Option<Params> {
        let mut params = Params::new();
        let mut index = 0;
        for segment in segments {
            match segment {
                Segment::Static(text) => {
                    if path.get(index) != Some(&text.as_str()) {
                        return None;
                    }
                    index += 1;
                }
                Segment::Param(name) => {
                    let value = path.get(index)?;
                    params.insert(name.clone(), (*value).to_string());
                    index += 1;
                }
                Segment::CatchAll(name) => {
                    params.insert(name.clone(), path[index..].join("/"));
                    return Some(params);
                }
            }
        }
        (index == path.len()).then_some(params)
    }
}

impl PathMatcher for SegmentMatcher {
    fn get_matched_routes(&self, pathname: &str) -> MatchedRoutes {
        let path = split_path(pathname);
        for (segments, route) in &self.patterns {
            if let Some(params) = Self::match_pattern(segments, &path) {
                return MatchedRoutes {
                    found_route: Some(route.clone()),
                    route_params: params,
                };
            }
        }
        MatchedRoutes::none()
    }
}

pub(crate) fn parse_location(href: &str) -> ParsedLocation {
    match href.split_once('?') {
        Some((pathname, search)) => ParsedLocation {
            pathname: pathname.to_string(),
            search: search.to_string(),
        },
        None => ParsedLocation { pathname: href.to_string(), search: String::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn matcher() -> SegmentMatcher {
        let mut matcher = SegmentMatcher::new();
        matcher.add_pattern("/", RouteId::from("index"));
        matcher.add_pattern("/about", RouteId::from("about"));
        matcher.add_pattern("/users/:id", RouteId::from("user"));
        matcher.add_pattern("/docs/*slug", RouteId::from("docs"));
        matcher
    }

    #[rstest]
    #[case("/", Some("index"))]
    #[case("/about", Some("about"))]
    #[case("/users/42", Some("user"))]
    #[case("/docs/a/b/c", Some("docs"))]
    #[case("/nowhere", None)]
    #[case("/users/42/extra", None)]
    fn test_pattern_matching(#[case] pathname: &str, #[case] expected: Option<&str>) {
        let matched = matcher().get_matched_routes(pathname);
        assert_eq!(matched.found_route, expected.map(RouteId::from));
    }

    #[test]
    fn test_params_captured() {
        let matched = matcher().get_matched_routes("/users/42");
        assert_eq!(matched.route_params.get("id").map(String::as_str), Some("42"));

        let matched = matcher().get_matched_routes("/docs/guide/intro");
        assert_eq!(
            matched.route_params.get("slug").map(String::as_str),
            Some("guide/intro")
        );
    }

    #[test]
    fn test_parse_location_splits_search() {
        let parsed = parse_location("/users/42?tab=posts");
        assert_eq!(parsed.pathname, "/users/42");
        assert_eq!(parsed.search, "tab=posts");
        assert_eq!(parse_location("/plain").search, "");
    }
}
