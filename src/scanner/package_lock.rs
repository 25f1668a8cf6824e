//! `package-lock.json` in both shapes npm has written.
//!
//! Lockfile v2/v3 carry a flat `packages` map keyed by install path:
//!
//! ```json
//! { "packages": { "node_modules/@scope/pkg": { "version": "1.0.0" } } }
//! ```
//!
//! Lockfile v1 only has a nested `dependencies` tree, which is walked
//! recursively.

use crate::error::ParseError;
use crate::model::DependencyFact;
use serde_json::{Map, Value};

const DIALECT: &str = "package-lock.json";
const NODE_MODULES: &str = "node_modules/";

/// Entries are read leniently: one that is `null`, not an object, or has no
/// string `version` is skipped rather than failing the whole lockfile.
pub(super) fn extract(text: &str) -> Result<Vec<DependencyFact>, ParseError> {
    let lock: Value = serde_json::from_str(text).map_err(|source| ParseError::Json {
        dialect: DIALECT,
        source,
    })?;
    let Value::Object(lock) = lock else {
        return Err(shape("top level is not an object"));
    };

    let mut facts = Vec::new();
    match lock.get("packages") {
        Some(Value::Object(packages)) => {
            for (key, entry) in packages {
                let Some(version) = string_field(entry, "version") else {
                    continue;
                };
                let Some(name) = string_field(entry, "name")
                    .map(str::to_string)
                    .or_else(|| name_from_install_path(key))
                else {
                    continue;
                };
                let provenance = if key.is_empty() {
                    "(root)"
                } else {
                    key.as_str()
                };
                facts.push(DependencyFact::resolved(name, version, provenance));
            }
        }
        Some(Value::Null) | None => {
            if let Some(deps) = lock.get("dependencies").and_then(Value::as_object) {
                walk(deps, &mut Vec::new(), &mut facts);
            }
        }
        Some(_) => return Err(shape("`packages` is not an object")),
    }

    Ok(facts)
}

fn shape(reason: &str) -> ParseError {
    ParseError::Shape {
        dialect: DIALECT,
        reason: reason.to_string(),
    }
}

fn string_field<'a>(entry: &'a Value, field: &str) -> Option<&'a str> {
    entry.get(field).and_then(Value::as_str)
}

/// `node_modules/a/node_modules/@s/b` -> `@s/b`
fn name_from_install_path(key: &str) -> Option<String> {
    key.rfind(NODE_MODULES)
        .map(|pos| key[pos + NODE_MODULES.len()..].to_string())
        .filter(|name| !name.is_empty())
}

fn walk(deps: &Map<String, Value>, path: &mut Vec<String>, facts: &mut Vec<DependencyFact>) {
    for (name, dep) in deps {
        path.push(name.clone());
        if let Some(version) = string_field(dep, "version") {
            facts.push(DependencyFact::resolved(name, version, path.join(" > ")));
        }
        if let Some(children) = dep.get("dependencies").and_then(Value::as_object) {
            walk(children, path, facts);
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V3_LOCK: &str = r#"{
      "name": "my-app",
      "version": "1.0.0",
      "lockfileVersion": 3,
      "packages": {
        "": { "name": "my-app", "version": "1.0.0", "dependencies": { "lodash": "^4.17.21" } },
        "node_modules/lodash": { "version": "4.17.21", "resolved": "https://registry.npmjs.org/lodash/-/lodash-4.17.21.tgz" },
        "node_modules/express/node_modules/@types/node": { "version": "20.1.0" },
        "node_modules/linked": { "resolved": "../linked", "link": true },
        "packages/local": { "version": "0.1.0" }
      },
      "dependencies": {
        "ignored": { "version": "9.9.9" }
      }
    }"#;

    const V1_LOCK: &str = r#"{
      "name": "legacy",
      "lockfileVersion": 1,
      "dependencies": {
        "express": {
          "version": "4.18.2",
          "requires": { "accepts": "~1.3.8" },
          "dependencies": {
            "accepts": {
              "version": "1.3.8",
              "dependencies": { "mime-types": { "version": "2.1.35" } }
            }
          }
        },
        "left-pad": { "version": "1.3.0" }
      }
    }"#;

    #[test]
    fn test_prefers_flat_packages_map() {
        let facts = extract(V3_LOCK).unwrap();

        let summary: Vec<(&str, &str, &str)> = facts
            .iter()
            .map(|f| (f.package.as_str(), f.version.as_str(), f.provenance.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("my-app", "1.0.0", "(root)"),
                ("@types/node", "20.1.0", "node_modules/express/node_modules/@types/node"),
                ("lodash", "4.17.21", "node_modules/lodash"),
            ]
        );
    }

    #[test]
    fn test_walks_nested_dependency_tree() {
        let facts = extract(V1_LOCK).unwrap();

        let summary: Vec<(&str, &str)> = facts
            .iter()
            .map(|f| (f.package.as_str(), f.provenance.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("express", "express"),
                ("accepts", "express > accepts"),
                ("mime-types", "express > accepts > mime-types"),
                ("left-pad", "left-pad"),
            ]
        );
    }

    #[test]
    fn test_name_from_install_path_handles_scopes() {
        assert_eq!(
            name_from_install_path("node_modules/a/node_modules/@s/b"),
            Some("@s/b".to_string())
        );
        assert_eq!(name_from_install_path("packages/local"), None);
        assert_eq!(name_from_install_path("node_modules/"), None);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        assert!(matches!(extract("not json"), Err(ParseError::Json { .. })));
    }

    #[test]
    fn test_skips_malformed_entries() {
        let facts = extract(
            r#"{
              "packages": {
                "node_modules/broken": null,
                "node_modules/numeric": { "version": 1 },
                "node_modules/odd": "1.0.0",
                "node_modules/left-pad": { "version": "1.3.0" }
              }
            }"#,
        )
        .unwrap();

        assert_eq!(
            facts,
            vec![DependencyFact::resolved(
                "left-pad",
                "1.3.0",
                "node_modules/left-pad"
            )]
        );
    }

    #[test]
    fn test_unexpected_shape_is_a_parse_error() {
        assert!(matches!(extract("[1, 2]"), Err(ParseError::Shape { .. })));
        assert!(matches!(
            extract(r#"{ "packages": ["node_modules/a"] }"#),
            Err(ParseError::Shape { .. })
        ));
    }
}
