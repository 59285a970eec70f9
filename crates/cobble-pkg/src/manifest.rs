//! Component manifest (`component.json`) parsing and normalization.

use crate::io::Fs;
use crate::AssetType;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// The manifest filename.
pub const MANIFEST_FILE: &str = "component.json";

/// Errors that can occur when working with manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("unknown asset type '{0}', expected one of: scripts, styles, templates, json, images, fonts, files")]
    UnknownAssetType(String),
}

/// An ordered `name -> constraint` dependency table.
///
/// Declaration order is significant: it decides resolution order and
/// therefore the order of every concatenated output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies(Vec<(String, String)>);

impl Dependencies {
    /// Add a dependency, replacing the constraint of an existing entry in place.
    pub fn insert(&mut self, name: impl Into<String>, constraint: impl Into<String>) {
        let name = name.into();
        let constraint = constraint.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = constraint,
            None => self.0.push((name, constraint)),
        }
    }

    /// Get the constraint for a dependency.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }

    /// Dependency names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate over `(name, constraint)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Dependencies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DependenciesVisitor;

        impl<'de> Visitor<'de> for DependenciesVisitor {
            type Value = Dependencies;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of dependency names to version constraints")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut deps = Dependencies::default();
                while let Some((name, constraint)) = map.next_entry::<String, Value>()? {
                    // The constraint text is never interpreted.
                    let constraint = match constraint {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    deps.insert(name, constraint);
                }
                Ok(deps)
            }
        }

        deserializer.deserialize_map(DependenciesVisitor)
    }
}

impl Serialize for Dependencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, constraint) in &self.0 {
            map.serialize_entry(name, constraint)?;
        }
        map.end()
    }
}

/// A parsed `component.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Declared package name. Not unique across a resolution.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Entry file, relative to the package directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Runtime dependencies.
    #[serde(default)]
    pub dependencies: Dependencies,

    /// Dependencies pulled in only when building in development mode.
    #[serde(default)]
    pub development: Dependencies,

    /// Sibling packages found through `paths`. Canonical form of the
    /// legacy `local` and `bundled` fields.
    #[serde(default)]
    pub locals: Vec<String>,

    #[serde(default, skip_serializing)]
    local: Vec<String>,

    #[serde(default, skip_serializing)]
    bundled: Vec<String>,

    /// Extra search paths for this package's own dependencies.
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub scripts: Vec<String>,

    #[serde(default)]
    pub styles: Vec<String>,

    #[serde(default)]
    pub templates: Vec<String>,

    #[serde(default)]
    pub json: Vec<String>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub fonts: Vec<String>,

    #[serde(default)]
    pub files: Vec<String>,

    /// Fields this crate does not interpret, kept for pipeline stages.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Asset types whose file list appears in the source, even if empty.
    #[serde(skip)]
    listed: BTreeSet<AssetType>,
}

impl Manifest {
    /// Load and normalize the manifest in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn load(fs: &dyn Fs, dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        debug!(path = %path.display(), "reading manifest");
        let content = fs
            .read_to_string(&path)
            .await
            .map_err(|source| ManifestError::Read { path, source })?;
        Self::parse(&content)
    }

    /// Parse a manifest from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or `name` is missing.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(content)?;
        let listed: BTreeSet<AssetType> = AssetType::ALL
            .into_iter()
            .filter(|ty| value.get(ty.as_str()).is_some_and(Value::is_array))
            .collect();
        let mut manifest: Self = serde_json::from_value(value)?;
        manifest.listed = listed;
        manifest.normalize();
        manifest.validate()?;
        Ok(manifest)
    }

    /// Fold the legacy `local` and `bundled` fields into `locals`.
    fn normalize(&mut self) {
        let legacy = std::mem::take(&mut self.local);
        let current = std::mem::take(&mut self.locals);
        let bundled = std::mem::take(&mut self.bundled);

        for name in legacy.into_iter().chain(current).chain(bundled) {
            if !self.locals.contains(&name) {
                self.locals.push(name);
            }
        }
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::InvalidField {
                field: "name",
                reason: "name cannot be empty",
            });
        }
        Ok(())
    }

    /// The declared (unloaded) file list for an asset type.
    #[must_use]
    pub fn files_of(&self, ty: AssetType) -> &[String] {
        match ty {
            AssetType::Scripts => &self.scripts,
            AssetType::Styles => &self.styles,
            AssetType::Templates => &self.templates,
            AssetType::Json => &self.json,
            AssetType::Images => &self.images,
            AssetType::Fonts => &self.fonts,
            AssetType::Files => &self.files,
        }
    }

    /// Whether the manifest lists files of `ty` at all. An empty list
    /// counts; an absent field does not.
    #[must_use]
    pub fn declares(&self, ty: AssetType) -> bool {
        self.listed.contains(&ty)
    }

    /// Effective dependency names, normalized, in declaration order.
    ///
    /// Runtime dependencies come first, then development dependencies when
    /// `dev` is set, then locals. A name appearing twice keeps its first
    /// position.
    #[must_use]
    pub fn dependency_names(&self, dev: bool) -> Vec<String> {
        let development = if dev {
            Some(self.development.names())
        } else {
            None
        };

        let mut names: Vec<String> = Vec::new();
        for name in self
            .dependencies
            .names()
            .chain(development.into_iter().flatten())
            .chain(self.locals.iter().map(String::as_str))
        {
            let name = normalize_name(name);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Serialize the manifest back to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Map a dependency name onto its on-disk directory name.
///
/// `component/emitter` is installed as `component-emitter`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.replace('/', "-")
}
