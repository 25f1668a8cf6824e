//! `yarn.lock`, classic (v1) and Berry (v2+).
//!
//! Classic entries are blank-line separated blocks whose header lists one
//! or more selectors sharing a resolved version:
//!
//! ```text
//! "@babel/core@^7.0.0", "@babel/core@^7.1.0":
//!   version "7.1.2"
//! ```
//!
//! Berry writes YAML-like blocks with a `version:` field:
//!
//! ```text
//! "left-pad@npm:^1.3.0":
//!   version: 1.3.0
//! ```
//!
//! Classic parsing is tried first; Berry only when it finds nothing.

use crate::model::DependencyFact;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

static CLASSIC_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s+version\s+"([^"]+)""#).expect("valid regex"));

static BERRY_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^"?([^"\n]+)"?:\n((?: {2}.+\n)+)"#).expect("valid regex")
});

static BERRY_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^ {2}version:\s+"?([^"\s]+)"?"#).expect("valid regex"));

pub(super) fn extract(text: &str) -> Vec<DependencyFact> {
    let mut text = text.replace("\r\n", "\n");
    if !text.ends_with('\n') {
        text.push('\n');
    }

    let facts = extract_classic(&text);
    if !facts.is_empty() {
        return facts;
    }
    extract_berry(&text)
}

fn extract_classic(text: &str) -> Vec<DependencyFact> {
    let mut facts = Vec::new();

    for block in BLOCK_SEPARATOR.split(text) {
        let Some(header) = block.lines().find(|line| is_header(line)) else {
            continue;
        };
        let Some(version) = CLASSIC_VERSION.captures(block).map(|c| c[1].to_string()) else {
            continue;
        };

        let selectors: Vec<&str> = header
            .trim_end()
            .trim_end_matches(':')
            .split(',')
            .map(|s| s.trim().trim_matches('"'))
            .filter(|s| !s.is_empty())
            .collect();
        let provenance = selectors.join(", ");

        let names: BTreeSet<&str> = selectors.iter().filter_map(|s| package_name(s)).collect();
        for name in names {
            facts.push(DependencyFact::resolved(name, &version, &provenance));
        }
    }

    facts
}

/// A top-level `key:` line; indented field lines and comments are not.
fn is_header(line: &str) -> bool {
    !line.starts_with(char::is_whitespace)
        && !line.starts_with('#')
        && line.trim_end().ends_with(':')
}

fn extract_berry(text: &str) -> Vec<DependencyFact> {
    let mut facts = Vec::new();

    for caps in BERRY_BLOCK.captures_iter(text) {
        let key = &caps[1];
        if key == "__metadata" {
            continue;
        }
        let Some(version) = BERRY_VERSION.captures(&caps[2]).map(|c| c[1].to_string()) else {
            continue;
        };
        let Some(name) = package_name(key) else {
            continue;
        };
        facts.push(DependencyFact::resolved(name, version, key));
    }

    facts
}

/// Package name from a selector such as `foo@^1.0.0`, `@scope/foo@1.x` or
/// `foo@npm:^1.0.0`.
///
/// An `@npm:` protocol marker ends the name; otherwise the last `@` past
/// the first character does, so a scope's leading `@` is kept.
fn package_name(selector: &str) -> Option<&str> {
    if let Some(at) = selector.find("@npm:").filter(|&at| at > 0) {
        return Some(&selector[..at]);
    }
    match selector.rfind('@') {
        Some(at) if at > 0 => Some(&selector[..at]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &str = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.10.4":
  version "7.12.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame/-/code-frame-7.12.13.tgz"
  dependencies:
    "@babel/highlight" "^7.12.13"

foo@^1.0.0, foo@^1.0.1:
  version "1.0.1"
  resolved "https://registry.yarnpkg.com/foo/-/foo-1.0.1.tgz"

"left-pad@1.3.0":
  version "1.3.0"
"#;

    const BERRY: &str = r#"# This file is generated by running "yarn install" inside your project.

__metadata:
  version: 6
  cacheKey: 8

"@types/node@npm:*, @types/node@npm:^20.0.0":
  version: 20.11.5
  resolution: "@types/node@npm:20.11.5"
  dependencies:
    undici-types: "npm:~5.26.4"
  languageName: node
  linkType: hard

"left-pad@npm:^1.3.0":
  version: 1.3.0
  resolution: "left-pad@npm:1.3.0"
"#;

    #[test]
    fn test_classic_blocks() {
        let facts = extract(CLASSIC);

        let summary: Vec<(&str, &str, &str)> = facts
            .iter()
            .map(|f| (f.package.as_str(), f.version.as_str(), f.provenance.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (
                    "@babel/code-frame",
                    "7.12.13",
                    "@babel/code-frame@^7.0.0, @babel/code-frame@^7.10.4"
                ),
                ("foo", "1.0.1", "foo@^1.0.0, foo@^1.0.1"),
                ("left-pad", "1.3.0", "left-pad@1.3.0"),
            ]
        );
    }

    #[test]
    fn test_classic_single_quoted_block() {
        let facts = extract("\"foo@^1.0.0\":\n  version \"1.0.1\"");
        assert_eq!(facts, vec![DependencyFact::resolved("foo", "1.0.1", "foo@^1.0.0")]);
    }

    #[test]
    fn test_classic_block_with_distinct_names() {
        let facts = extract("a@^1.0.0, b@npm:a@^1.0.0:\n  version \"1.2.0\"\n");
        let names: Vec<&str> = facts.iter().map(|f| f.package.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_berry_blocks() {
        let facts = extract(BERRY);

        let summary: Vec<(&str, &str)> = facts
            .iter()
            .map(|f| (f.package.as_str(), f.version.as_str()))
            .collect();
        assert_eq!(summary, vec![("@types/node", "20.11.5"), ("left-pad", "1.3.0")]);
        assert_eq!(facts[1].provenance, "left-pad@npm:^1.3.0");
    }

    #[test]
    fn test_berry_with_windows_line_endings() {
        let facts = extract(&BERRY.replace('\n', "\r\n"));
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn test_package_name_heuristics() {
        assert_eq!(package_name("foo@^1.0.0"), Some("foo"));
        assert_eq!(package_name("@scope/foo@^1.0.0"), Some("@scope/foo"));
        assert_eq!(package_name("@scope/foo@npm:1.0.0"), Some("@scope/foo"));
        assert_eq!(package_name("foo@npm:^1.0.0"), Some("foo"));
        assert_eq!(package_name("@scope"), None);
        assert_eq!(package_name("foo"), None);
    }

    #[test]
    fn test_empty_or_unrelated_text() {
        assert!(extract("").is_empty());
        assert!(extract("# yarn lockfile v1\n").is_empty());
    }
}
