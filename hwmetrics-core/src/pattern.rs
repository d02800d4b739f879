//! Sensor path patterns
//!
//! Sensor paths look like `/<hardware>/<instance>/<category>/<index>`, for
//! example `/amdcpu/0/load/1`. A [`PathPattern`] is written the same way, with
//! each segment being a comma-separated list of fragments:
//!
//! - an integer (`1`), matched numerically,
//! - an inclusive integer range (`1-4`),
//! - a name (`load`, `gpu-nvidia`), matched ignoring ASCII case,
//! - the wildcard `*`.
//!
//! Patterns are compiled once into per-segment matchers, so checking a path
//! costs one comparison per segment regardless of how wide a range is.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One alternative within a pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Exact integer
    Index(u64),
    /// Inclusive integer range
    Range(u64, u64),
    /// Literal name, stored lowercased
    Name(String),
}

impl Fragment {
    fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("empty fragment".to_string());
        }
        if raw.contains('*') {
            return Err(format!("wildcard must stand alone, got '{}'", raw));
        }

        // Anything starting with a digit or made only of digits and dashes
        // must be an index or a range
        let numeric = raw.starts_with(|c: char| c.is_ascii_digit())
            || raw.chars().all(|c| c.is_ascii_digit() || c == '-');
        if numeric {
            if let Ok(index) = raw.parse::<u64>() {
                return Ok(Fragment::Index(index));
            }
            let (start, end) = raw
                .split_once('-')
                .and_then(|(a, b)| Some((a.parse::<u64>().ok()?, b.parse::<u64>().ok()?)))
                .ok_or_else(|| format!("invalid range '{}'", raw))?;
            if start > end {
                return Err(format!("range '{}' is reversed", raw));
            }
            return Ok(Fragment::Range(start, end));
        }

        Ok(Fragment::Name(raw.to_ascii_lowercase()))
    }

    fn accepts(&self, segment: &str, index: Option<u64>) -> bool {
        match (self, index) {
            (Fragment::Index(expected), Some(index)) => *expected == index,
            (Fragment::Range(start, end), Some(index)) => (*start..=*end).contains(&index),
            (Fragment::Name(name), _) => name.eq_ignore_ascii_case(segment),
            _ => false,
        }
    }
}

/// Matcher for a single path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentMatcher {
    /// `*`: accepts any value
    Any,
    /// Accepts a value matching any of the fragments
    OneOf(Vec<Fragment>),
}

impl SegmentMatcher {
    fn parse(raw: &str) -> Result<Self, String> {
        let fragments = raw.split(',').map(str::trim).collect::<Vec<_>>();
        if fragments.iter().any(|f| *f == "*") {
            if fragments.iter().any(|f| f.is_empty()) {
                return Err(format!("empty fragment in '{}'", raw));
            }
            return Ok(SegmentMatcher::Any);
        }

        fragments
            .into_iter()
            .map(Fragment::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(SegmentMatcher::OneOf)
    }

    /// Whether `segment` is accepted.
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            SegmentMatcher::Any => true,
            SegmentMatcher::OneOf(fragments) => {
                let index = segment.parse::<u64>().ok();
                fragments.iter().any(|f| f.accepts(segment, index))
            }
        }
    }

    /// Whether this segment is the wildcard.
    pub fn is_any(&self) -> bool {
        matches!(self, SegmentMatcher::Any)
    }

    /// Literal names among the fragments.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let fragments = match self {
            SegmentMatcher::Any => &[][..],
            SegmentMatcher::OneOf(fragments) => fragments.as_slice(),
        };
        fragments.iter().filter_map(|f| match f {
            Fragment::Name(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A compiled sensor path pattern.
///
/// A path matches when every segment matcher accepts the corresponding path
/// segment. Paths shorter than the pattern never match; longer paths match
/// only when the pattern ends in `*`, which then covers the remainder.
///
/// # Examples
///
/// ```
/// use hwmetrics_core::pattern::PathPattern;
///
/// let pattern: PathPattern = "/amdcpu/*/load/1-2,7".parse().unwrap();
/// assert!(pattern.matches("/amdcpu/0/load/2"));
/// assert!(pattern.matches("/amdcpu/3/load/7"));
/// assert!(!pattern.matches("/amdcpu/0/load/3"));
/// assert!(!pattern.matches("/amdcpu/0/clock/1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<SegmentMatcher>,
}

impl PathPattern {
    /// Compile a pattern such as `/amdcpu/0/load/1-2`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('/')
            .ok_or_else(|| format!("pattern '{}' must start with '/'", trimmed))?
            .trim_end_matches('/');
        if body.is_empty() {
            return Err("pattern has no segments".to_string());
        }

        let segments = body
            .split('/')
            .map(|segment| {
                let segment = segment.trim();
                if segment.is_empty() {
                    Err(format!("empty segment in '{}'", trimmed))
                } else {
                    SegmentMatcher::parse(segment)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: format!("/{}", body),
            segments,
        })
    }

    /// Whether `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path.strip_prefix('/').unwrap_or(path).split('/');

        for matcher in &self.segments {
            match parts.next() {
                Some(part) if matcher.matches(part) => {}
                _ => return false,
            }
        }

        parts.next().is_none() || self.segments.last().is_some_and(SegmentMatcher::is_any)
    }

    /// Matcher for the hardware root (first segment).
    pub fn root(&self) -> &SegmentMatcher {
        &self.segments[0]
    }

    /// Whether the pattern matches everything under the roots it names: at
    /// least one segment follows the root and all of them are wildcards.
    pub fn covers_whole_root(&self) -> bool {
        self.segments.len() > 1 && self.segments[1..].iter().all(SegmentMatcher::is_any)
    }

    /// Compiled segment matchers.
    pub fn segments(&self) -> &[SegmentMatcher] {
        &self.segments
    }

    /// Normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for PathPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for PathPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn test_literal_path() {
        let p = pattern("/amdcpu/0/load/1");
        assert!(p.matches("/amdcpu/0/load/1"));
        assert!(!p.matches("/amdcpu/0/load/2"));
        assert!(!p.matches("/amdcpu/1/load/1"));
        assert!(!p.matches("/intelcpu/0/load/1"));
    }

    #[test]
    fn test_range_boundaries() {
        let p = pattern("/amdcpu/0/load/1-2");
        assert!(!p.matches("/amdcpu/0/load/0"));
        assert!(p.matches("/amdcpu/0/load/1"));
        assert!(p.matches("/amdcpu/0/load/2"));
        assert!(!p.matches("/amdcpu/0/load/3"));
    }

    #[test]
    fn test_wide_range_is_membership() {
        let p = pattern("/nvme/0-1000000/temperature/*");
        assert!(p.matches("/nvme/999999/temperature/0"));
        assert!(!p.matches("/nvme/1000001/temperature/0"));
        assert_eq!(p.segments().len(), 4);
    }

    #[test]
    fn test_comma_alternatives() {
        let p = pattern("/amdcpu/0/load,clock/1,3-4");
        assert!(p.matches("/amdcpu/0/load/1"));
        assert!(p.matches("/amdcpu/0/clock/4"));
        assert!(!p.matches("/amdcpu/0/load/2"));
        assert!(!p.matches("/amdcpu/0/power/1"));
    }

    #[test]
    fn test_wildcards() {
        let p = pattern("/amdcpu/*/clock/*");
        assert!(p.matches("/amdcpu/0/clock/1"));
        assert!(p.matches("/amdcpu/1/clock/100"));
        assert!(!p.matches("/amdcpu/0/load/1"));
    }

    #[test]
    fn test_trailing_wildcard_absorbs_remainder() {
        let p = pattern("/lpc/*");
        assert!(p.matches("/lpc/nct6798d/0/temperature/1"));
        assert!(p.matches("/lpc/0"));
        assert!(!p.matches("/lpc"));

        let p = pattern("/lpc/*/fan");
        assert!(!p.matches("/lpc/0/fan/1"));
    }

    #[test]
    fn test_numeric_match_ignores_leading_zeros() {
        let p = pattern("/nvme/1/data/2");
        assert!(p.matches("/nvme/01/data/2"));
    }

    #[test]
    fn test_names_ignore_case() {
        let p = pattern("/NVIDIA-GPU/0/Power/1");
        assert!(p.matches("/nvidia-gpu/0/power/1"));
        assert_eq!(p.root().names().collect::<Vec<_>>(), vec!["nvidia-gpu"]);
    }

    #[test]
    fn test_non_numeric_segment_never_matches_index() {
        let p = pattern("/nvme/0/factor/1-5");
        assert!(!p.matches("/nvme/0/factor/power_cycles"));
    }

    #[test]
    fn test_covers_whole_root() {
        assert!(!pattern("/amdcpu").covers_whole_root());
        assert!(pattern("/amdcpu/*").covers_whole_root());
        assert!(pattern("/amdcpu/*/*/*").covers_whole_root());
        assert!(!pattern("/amdcpu/*/clock/*").covers_whole_root());
        assert!(!pattern("/amdcpu/0/*/*").covers_whole_root());
    }

    #[test]
    fn test_normalizes_text() {
        assert_eq!(pattern(" /amdcpu/0/ ").as_str(), "/amdcpu/0");
        assert_eq!(pattern("/amdcpu/0").to_string(), "/amdcpu/0");
    }

    #[test]
    fn test_parse_errors() {
        for raw in [
            "",
            "/",
            "amdcpu/0",
            "/amdcpu//load",
            "/amdcpu/0/load/1-",
            "/amdcpu/0/load/3-1",
            "/amdcpu/0/load/1,,2",
            "/amdcpu/0/lo*d/1",
            "/amdcpu/0/load/*,",
            "/amdcpu/0/load/1 - 2",
            "/amdcpu/0/load/1..2",
            "/amdcpu/0/load/1-2x",
            "/amdcpu/0x/load/1",
        ] {
            assert!(PathPattern::parse(raw).is_err(), "'{raw}' should not parse");
        }
    }
}
