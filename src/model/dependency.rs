use serde::{Deserialize, Serialize};

/// Whether a fact carries an installed version or a declared range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    /// A concrete version pinned by a lockfile.
    Resolved,
    /// A range from `package.json`, which may or may not be exact.
    Declared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyFact {
    pub package: String,
    pub version: String,
    /// Where in the manifest the dependency was found, e.g. a lockfile key
    /// or a `parent > child` path.
    pub provenance: String,
    pub kind: FactKind,
}

impl DependencyFact {
    pub fn resolved(
        package: impl Into<String>,
        version: impl Into<String>,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            provenance: provenance.into(),
            kind: FactKind::Resolved,
        }
    }

    pub fn declared(
        package: impl Into<String>,
        range: impl Into<String>,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version: range.into(),
            provenance: provenance.into(),
            kind: FactKind::Declared,
        }
    }
}
