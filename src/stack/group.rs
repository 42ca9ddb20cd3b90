// ABOUTME: Hierarchical stack group path, used for display, scoping and config inheritance.
// ABOUTME: Never used for ordering; ordering comes from the dependency graph only.

use std::fmt;

/// Slash-separated group path such as `dev/network`. The root group is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupPath(Vec<String>);

impl GroupPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path, ignoring empty segments and surrounding slashes.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty() && *s != ".")
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// This path and each of its ancestors, root first (root itself excluded).
    pub fn ancestors_inclusive(&self) -> impl Iterator<Item = GroupPath> + '_ {
        (1..=self.0.len()).map(|n| GroupPath(self.0[..n].to_vec()))
    }

    /// Whether `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &GroupPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn join(&self, segment: &str) -> GroupPath {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        GroupPath(segments)
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_slashes() {
        let path = GroupPath::parse("/dev//network/");
        assert_eq!(path.segments(), ["dev", "network"]);
        assert_eq!(path.to_string(), "dev/network");
    }

    #[test]
    fn dot_is_root() {
        assert!(GroupPath::parse(".").is_root());
        assert!(GroupPath::parse("").is_root());
    }

    #[test]
    fn ancestors_are_root_first() {
        let ancestors: Vec<String> = GroupPath::parse("dev/network/core")
            .ancestors_inclusive()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(ancestors, ["dev", "dev/network", "dev/network/core"]);
    }

    #[test]
    fn prefix_matches_whole_segments() {
        let path = GroupPath::parse("dev/network");
        assert!(path.starts_with(&GroupPath::parse("dev")));
        assert!(!path.starts_with(&GroupPath::parse("de")));
    }
}
