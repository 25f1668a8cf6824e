//! Version parsing, precedence and range matching.
//!
//! This is a deliberately small subset of npm semver: `major.minor.patch`
//! with an optional dot-separated prerelease after the first `-`. Build
//! metadata, caret/tilde ranges and hyphen ranges are not understood.
//!
//! Ranges use the grammar found in advisory feeds:
//!
//! ```text
//! range  := clause ("||" clause)*
//! clause := term ("," term)*
//! term   := [">=" | "<=" | ">" | "<" | "="] version
//! ```
//!
//! # Example
//!
//! ```
//! use threatscan::version::{satisfies, Version};
//!
//! assert!(satisfies("1.2.3", ">= 1.0.0, < 2.0.0"));
//! assert!(Version::parse("1.0.0-alpha") < Version::parse("1.0.0"));
//! ```

use std::borrow::Cow;
use std::cmp::{Ordering, Reverse};

/// One dot-separated prerelease component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Numeric(u64),
    Text(String),
}

impl Segment {
    fn parse(s: &str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse() {
                return Segment::Numeric(n);
            }
        }
        Segment::Text(s.to_string())
    }

    fn as_text(&self) -> Cow<'_, str> {
        match self {
            Segment::Numeric(n) => Cow::Owned(n.to_string()),
            Segment::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Numeric(a), Segment::Numeric(b)) => a.cmp(b),
            _ => self.as_text().cmp(&other.as_text()),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed version.
///
/// Core components are `None` when the input had no leading digits there
/// (e.g. `"latest"` or `"1.x"`). Such components sort below every number,
/// so malformed versions lose comparisons instead of aborting a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub prerelease: Vec<Segment>,
}

impl Version {
    /// Parses a version string. Never fails.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (core, pre) = match input.split_once('-') {
            Some((core, pre)) => (core, pre),
            None => (input, ""),
        };

        let mut parts = core.split('.');
        let major = parts.next().and_then(leading_number);
        let minor = parts.next().and_then(leading_number);
        let patch = parts.next().and_then(leading_number);

        let prerelease = if pre.is_empty() {
            Vec::new()
        } else {
            pre.split('.').map(Segment::parse).collect()
        };

        Self {
            major,
            minor,
            patch,
            prerelease,
        }
    }
}

/// Reads the leading ASCII digits of a component, like `parseInt`.
fn leading_number(s: &str) -> Option<u64> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

fn compare_prerelease(a: &[Segment], b: &[Segment]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            for i in 0..a.len().max(b.len()) {
                let ord = match (a.get(i), b.get(i)) {
                    (None, _) => Ordering::Less,
                    (_, None) => Ordering::Greater,
                    (Some(x), Some(y)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| compare_prerelease(&self.prerelease, &other.prerelease))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Op {
    /// Longest operators first so `>=` is not read as `>`.
    const PREFIXES: [(&'static str, Op); 5] = [
        (">=", Op::Ge),
        ("<=", Op::Le),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
    ];
}

/// A single `op version` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    /// Parses a term; empty terms yield `None`.
    pub fn parse(term: &str) -> Option<Self> {
        let term = term.trim();
        let (op, rest) = Op::PREFIXES
            .iter()
            .find_map(|(prefix, op)| term.strip_prefix(*prefix).map(|rest| (*op, rest)))
            .unwrap_or((Op::Eq, term));

        let rest = rest.trim();
        if rest.is_empty() {
            return None;
        }

        Some(Self {
            op,
            version: Version::parse(rest),
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        let ord = version.cmp(&self.version);
        match self.op {
            Op::Eq => ord == Ordering::Equal,
            Op::Gt => ord == Ordering::Greater,
            Op::Lt => ord == Ordering::Less,
            Op::Ge => ord != Ordering::Less,
            Op::Le => ord != Ordering::Greater,
        }
    }
}

/// A disjunction of conjunctive clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    clauses: Vec<Vec<Comparator>>,
}

impl Range {
    pub fn parse(input: &str) -> Self {
        let clauses = input
            .split("||")
            .map(|clause| clause.split(',').filter_map(Comparator::parse).collect())
            .collect();
        Self { clauses }
    }

    /// True if every term of at least one clause holds.
    ///
    /// A clause with no usable terms holds vacuously.
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|term| term.matches(version)))
    }
}

/// Compares two version strings by precedence.
pub fn compare(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// Returns whether `version` lies in `range`.
pub fn satisfies(version: &str, range: &str) -> bool {
    Range::parse(range).matches(&Version::parse(version))
}

/// Sorts version strings from highest to lowest precedence.
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by_cached_key(|v| Reverse(Version::parse(v)));
}
