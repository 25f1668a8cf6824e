use crate::error::ParseError;
use crate::model::DependencyFact;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const DIALECT: &str = "package.json";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    dependencies: Option<BTreeMap<String, Value>>,
    dev_dependencies: Option<BTreeMap<String, Value>>,
    peer_dependencies: Option<BTreeMap<String, Value>>,
    optional_dependencies: Option<BTreeMap<String, Value>>,
}

/// Declared ranges from every dependency section.
///
/// Sections are applied in order, so a name declared twice keeps the range
/// from the later section. Non-string specs are ignored.
pub(super) fn extract(text: &str) -> Result<Vec<DependencyFact>, ParseError> {
    let manifest: PackageManifest =
        serde_json::from_str(text).map_err(|source| ParseError::Json {
            dialect: DIALECT,
            source,
        })?;

    let sections = [
        manifest.dependencies,
        manifest.dev_dependencies,
        manifest.peer_dependencies,
        manifest.optional_dependencies,
    ];

    let mut declared = BTreeMap::new();
    for section in sections.into_iter().flatten() {
        for (name, spec) in section {
            if let Value::String(range) = spec {
                declared.insert(name, range);
            }
        }
    }

    Ok(declared
        .into_iter()
        .map(|(name, range)| DependencyFact::declared(name, range, "declared dependency"))
        .collect())
}
