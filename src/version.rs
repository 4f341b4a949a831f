use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CiError, Result};

/// Pre-release marker, ordered `a < b < rc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseKind {
    Alpha,
    Beta,
    ReleaseCandidate,
}

impl PreReleaseKind {
    fn from_marker(marker: &str) -> Option<Self> {
        match marker.to_ascii_lowercase().as_str() {
            "a" | "alpha" => Some(PreReleaseKind::Alpha),
            "b" | "beta" => Some(PreReleaseKind::Beta),
            "rc" | "c" | "pre" | "preview" => Some(PreReleaseKind::ReleaseCandidate),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            PreReleaseKind::Alpha => "a",
            PreReleaseKind::Beta => "b",
            PreReleaseKind::ReleaseCandidate => "rc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    pub kind: PreReleaseKind,
    pub number: u64,
}

/// A package version as published to the package index.
///
/// Holds the dot-separated release segments (`0.42`, `1.2.3`), an optional
/// pre-release marker (`a1`, `b2`, `rc1`) and optional post (`.post1`) and
/// development (`.dev2`) segments. Comparison pads missing release segments
/// with zeros, so `1.2` and `1.2.0` are equal. For one release the order is
/// `1.0.dev1 < 1.0a1 < 1.0 < 1.0.post1`.
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Option<PreRelease>,
    post: Option<u64>,
    dev: Option<u64>,
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^v?(\d+(?:\.\d+)*)",
            r"(?:[-_.]?(alpha|beta|preview|pre|rc|a|b|c)[-_.]?(\d*))?",
            r"(?:[-_.]?(post|rev|r)[-_.]?(\d*))?",
            r"(?:[-_.]?(dev)[-_.]?(\d*))?$",
        ))
            .expect("version pattern is valid")
    })
}

impl Version {
    /// Create a final release from its segments, e.g. `Version::new(&[0, 1, 2])`.
    pub fn new(release: &[u64]) -> Self {
        Version {
            release: release.to_vec(),
            pre: None,
            post: None,
            dev: None,
        }
    }

    pub fn with_pre(mut self, kind: PreReleaseKind, number: u64) -> Self {
        self.pre = Some(PreRelease { kind, number });
        self
    }

    /// Parse a version string such as `1.2.3`, `v0.42rc1` or `0.42a1`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let captures = version_regex().captures(trimmed).ok_or_else(|| {
            CiError::version(format!("'{}' is not a valid version string", input))
        })?;

        let release = captures[1]
            .split('.')
            .map(|segment| {
                segment.parse::<u64>().map_err(|_| {
                    CiError::version(format!("Invalid release segment '{}' in '{}'", segment, input))
                })
            })
            .collect::<Result<Vec<u64>>>()?;

        let pre = match captures.get(2) {
            Some(marker) => {
                let kind = PreReleaseKind::from_marker(marker.as_str()).ok_or_else(|| {
                    CiError::version(format!("Unknown pre-release marker in '{}'", input))
                })?;
                let number = match captures.get(3).map(|m| m.as_str()) {
                    Some("") | None => 0,
                    Some(digits) => digits.parse::<u64>().map_err(|_| {
                        CiError::version(format!("Invalid pre-release number in '{}'", input))
                    })?,
                };
                Some(PreRelease { kind, number })
            }
            None => None,
        };

        let post = optional_number(&captures, 4, 5, input)?;
        let dev = optional_number(&captures, 6, 7, input)?;

        Ok(Version {
            release,
            pre,
            post,
            dev,
        })
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<PreRelease> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    /// Pre-releases and development releases.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// `.devN` of a final release sorts before its pre-releases.
    fn pre_key(&self) -> (u8, Option<PreRelease>) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (0, None),
            (Some(pre), _, _) => (1, Some(pre)),
            _ => (2, None),
        }
    }

    fn dev_key(&self) -> (bool, Option<u64>) {
        (self.dev.is_none(), self.dev)
    }

    fn padded_release(&self, len: usize) -> Vec<u64> {
        let mut segments = self.release.clone();
        segments.resize(len.max(segments.len()), 0);
        segments
    }
}

/// Number of an optional `marker N` pair of capture groups, `0` when the
/// marker is present without digits.
fn optional_number(
    captures: &regex::Captures<'_>,
    marker: usize,
    number: usize,
    input: &str,
) -> Result<Option<u64>> {
    if captures.get(marker).is_none() {
        return Ok(None);
    }
    match captures.get(number).map(|m| m.as_str()) {
        Some("") | None => Ok(Some(0)),
        Some(digits) => digits
            .parse::<u64>()
            .map(Some)
            .map_err(|_| CiError::version(format!("Invalid number in '{}'", input))),
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release: Vec<String> = self.release.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", release.join("."))?;
        if let Some(pre) = self.pre {
            write!(f, "{}{}", pre.kind.marker(), pre.number)?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{}", post)?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{}", dev)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        self.padded_release(len)
            .cmp(&other.padded_release(len))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl std::str::FromStr for Version {
    type Err = CiError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

/// Checks the shape a releasable version must have.
///
/// Pre-releases carry two release segments (`0.42a1`, `0.42rc1`); final
/// releases carry three (`0.1.2`).
pub fn validate_version(version: &Version) -> Result<()> {
    if version.is_prerelease() {
        if version.release().len() != 2 {
            return Err(CiError::version(format!(
                "Pre-releases should be of form 0.42a1 or 0.42rc1, yours is {}",
                version
            )));
        }
        return Ok(());
    }
    if version.release().len() != 3 {
        return Err(CiError::version(format!(
            "Version should be of form 0.1.2, yours is {}",
            version
        )));
    }
    Ok(())
}

/// Result of scanning tags for the newest version.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestVersion {
    pub version: Version,
    /// The tag the version was read from, `None` when no tag parsed.
    pub tag: Option<String>,
    /// Tags that are not version strings.
    pub skipped: Vec<String>,
}

/// Finds the newest version among tag names, starting from `0.0.0`.
pub fn latest_version<S: AsRef<str>>(tags: &[S]) -> LatestVersion {
    let mut latest = LatestVersion {
        version: Version::new(&[0, 0, 0]),
        tag: None,
        skipped: Vec::new(),
    };

    for tag in tags {
        let tag = tag.as_ref();
        match Version::parse(tag) {
            Ok(version) if version > latest.version => {
                latest.version = version;
                latest.tag = Some(tag.to_string());
            }
            Ok(_) => {}
            Err(_) => latest.skipped.push(tag.to_string()),
        }
    }

    latest
}
