//! `pnpm-lock.yaml`.
//!
//! Rather than parsing YAML, package keys are matched line by line. This
//! covers the key styles of lockfile v6 through v9:
//!
//! ```text
//!   /left-pad@1.3.0:
//!   '@babel/core@7.24.0':
//!   '@testing-library/react@14.0.0(react@18.2.0)':
//! ```

use crate::model::DependencyFact;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static PACKAGE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*['"]?/?(@?[^@\s/'"][^@:\s/'"]*/?[^@:\s/'"]*)@([0-9][^:\s'"(_]*)(?:[(_]\S*?)?['"]?:"#,
    )
    .expect("valid regex")
});

/// Every distinct `name@version` package key, in order of appearance.
pub(super) fn extract(text: &str) -> Vec<DependencyFact> {
    let mut seen = HashSet::new();

    PACKAGE_KEY
        .captures_iter(text)
        .filter_map(|caps| {
            let name = &caps[1];
            let version = &caps[2];
            let key = format!("{name}@{version}");
            seen.insert(key.clone())
                .then(|| DependencyFact::resolved(name, version, key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(facts: &[DependencyFact]) -> Vec<(&str, &str)> {
        facts
            .iter()
            .map(|f| (f.package.as_str(), f.version.as_str()))
            .collect()
    }

    #[test]
    fn test_v6_slash_keys() {
        let text = "lockfileVersion: '6.0'\n\npackages:\n\n  /left-pad@1.3.0:\n    resolution: {integrity: sha512-abc}\n    dev: false\n\n  /@babel/core@7.24.0:\n    resolution: {integrity: sha512-def}\n";
        let facts = extract(text);
        assert_eq!(pairs(&facts), vec![("left-pad", "1.3.0"), ("@babel/core", "7.24.0")]);
        assert_eq!(facts[0].provenance, "left-pad@1.3.0");
    }

    #[test]
    fn test_v9_quoted_keys_with_peer_suffix() {
        let text = r#"lockfileVersion: '9.0'

importers:

  .:
    dependencies:
      react:
        specifier: ^18.2.0
        version: 18.2.0

packages:

  '@testing-library/react@14.0.0':
    resolution: {integrity: sha512-xyz}

  react@18.2.0:
    resolution: {integrity: sha512-r}

snapshots:

  '@testing-library/react@14.0.0(react@18.2.0)':
    dependencies:
      react: 18.2.0

  react@18.2.0: {}
"#;
        let facts = extract(text);
        assert_eq!(
            pairs(&facts),
            vec![("@testing-library/react", "14.0.0"), ("react", "18.2.0")]
        );
    }

    #[test]
    fn test_prerelease_versions() {
        let facts = extract("  /foo@1.0.0-beta.2:\n");
        assert_eq!(pairs(&facts), vec![("foo", "1.0.0-beta.2")]);
    }

    #[test]
    fn test_ignores_non_package_lines() {
        let facts = extract("settings:\n  autoInstallPeers: true\n  excludeLinksFromLockfile: false\n");
        assert!(facts.is_empty());
    }
}
