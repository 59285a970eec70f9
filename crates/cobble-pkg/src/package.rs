//! Resolved packages and their asset files.

use crate::{Manifest, ManifestError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A category of file with its own processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Scripts,
    Styles,
    Templates,
    Json,
    Images,
    Fonts,
    Files,
}

impl AssetType {
    /// Every asset type, in pull order.
    pub const ALL: [AssetType; 7] = [
        Self::Templates,
        Self::Scripts,
        Self::Styles,
        Self::Json,
        Self::Images,
        Self::Fonts,
        Self::Files,
    ];

    /// Returns the manifest field name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scripts => "scripts",
            Self::Styles => "styles",
            Self::Templates => "templates",
            Self::Json => "json",
            Self::Images => "images",
            Self::Fonts => "fonts",
            Self::Files => "files",
        }
    }

    /// Text assets are read into memory; the rest are only copied.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Scripts | Self::Styles | Self::Templates | Self::Json
        )
    }

    /// Types that become modules in the client-side registry.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Scripts | Self::Templates | Self::Json)
    }

    /// The full set of types.
    #[must_use]
    pub fn all() -> BTreeSet<AssetType> {
        Self::ALL.into_iter().collect()
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssetType {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ManifestError::UnknownAssetType(s.to_string()))
    }
}

/// One loaded asset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Path relative to the package directory, as declared.
    pub filename: String,
    pub contents: String,
}

impl AssetFile {
    pub fn new(filename: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            contents: contents.into(),
        }
    }
}

/// One node of a resolution: a manifest plus where it was found.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    /// The parsed manifest. Its file lists stay as declared.
    pub manifest: Manifest,
    dir: PathBuf,
    id: String,
    parent: Option<usize>,
    search_paths: Vec<PathBuf>,
    edges: Vec<String>,
    types: BTreeSet<AssetType>,
    assets: BTreeMap<AssetType, Vec<AssetFile>>,
}

impl ResolvedPackage {
    pub(crate) fn new(
        manifest: Manifest,
        dir: PathBuf,
        parent: Option<usize>,
        edges: Vec<String>,
        types: BTreeSet<AssetType>,
    ) -> Self {
        let id = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| manifest.name.clone());
        let search_paths = manifest
            .paths
            .iter()
            .map(|p| crate::lookup::clean(&dir.join(p)))
            .collect();

        Self {
            manifest,
            dir,
            id,
            parent,
            search_paths,
            edges,
            types,
            assets: BTreeMap::new(),
        }
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Directory the package was loaded from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location-derived identifier: the directory basename.
    ///
    /// Unique within a resolution, unlike [`name`](Self::name).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this is the root of its resolution.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Index of the package whose dependency this is, if any.
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Prefix of this package's module names: the declared name for the
    /// root, the location-derived identifier for everything else.
    #[must_use]
    pub fn prefix(&self) -> &str {
        if self.is_root() {
            &self.manifest.name
        } else {
            &self.id
        }
    }

    /// Fully-qualified module name of one of this package's files.
    #[must_use]
    pub fn module_name(&self, filename: &str) -> String {
        format!("{}/{}", self.prefix(), filename)
    }

    /// Absolute path of a file relative to the package directory.
    #[must_use]
    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Extra search paths declared by this package through `paths`.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Normalized names of the dependencies this package declared.
    #[must_use]
    pub fn edges(&self) -> &[String] {
        &self.edges
    }

    /// Whether this package contributes assets of `ty` to this resolution.
    #[must_use]
    pub fn includes(&self, ty: AssetType) -> bool {
        self.types.contains(&ty)
    }

    /// Asset types this package was resolved for.
    #[must_use]
    pub fn types(&self) -> &BTreeSet<AssetType> {
        &self.types
    }

    /// Loaded files of a textual type. Empty until pulled.
    #[must_use]
    pub fn files(&self, ty: AssetType) -> &[AssetFile] {
        self.assets.get(&ty).map(Vec::as_slice).unwrap_or_default()
    }

    /// Mutable access to the loaded files of a type.
    pub fn files_mut(&mut self, ty: AssetType) -> &mut Vec<AssetFile> {
        self.assets.entry(ty).or_default()
    }

    /// Declared file names of a type this package is resolved for.
    ///
    /// Binary types are never loaded, so stages that copy files use this.
    #[must_use]
    pub fn declared(&self, ty: AssetType) -> &[String] {
        if self.includes(ty) {
            self.manifest.files_of(ty)
        } else {
            &[]
        }
    }

    /// Inject a fabricated file, e.g. the compiled output of a template.
    pub fn add_file(
        &mut self,
        ty: AssetType,
        filename: impl Into<String>,
        contents: impl Into<String>,
    ) {
        self.types.insert(ty);
        self.files_mut(ty).push(AssetFile::new(filename, contents));
    }

    pub(crate) fn set_files(&mut self, ty: AssetType, files: Vec<AssetFile>) {
        self.assets.insert(ty, files);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(dir: &str, name: &str, parent: Option<usize>) -> ResolvedPackage {
        let manifest = Manifest::parse(&format!(
            r#"{{ "name": "{name}", "paths": ["lib/components"] }}"#
        ))
        .unwrap();
        ResolvedPackage::new(manifest, PathBuf::from(dir), parent, Vec::new(), AssetType::all())
    }

    #[test]
    fn asset_type_round_trips_through_str() {
        for ty in AssetType::ALL {
            assert_eq!(ty.as_str().parse::<AssetType>().unwrap(), ty);
        }
        assert!(matches!(
            "videos".parse::<AssetType>(),
            Err(ManifestError::UnknownAssetType(..))
        ));
    }

    #[test]
    fn root_prefix_is_declared_name() {
        let root = package("/work/app", "my-app", None);
        assert!(root.is_root());
        assert_eq!(root.id(), "app");
        assert_eq!(root.module_name("index.js"), "my-app/index.js");
    }

    #[test]
    fn dependency_prefix_is_location_derived() {
        let dep = package("/work/components/component-emitter", "emitter", Some(0));
        assert_eq!(dep.name(), "emitter");
        assert_eq!(dep.prefix(), "component-emitter");
        assert_eq!(
            dep.module_name("index.js"),
            "component-emitter/index.js"
        );
    }

    #[test]
    fn search_paths_are_relative_to_the_package() {
        let dep = package("/work/bundled", "bundled", None);
        assert_eq!(
            dep.search_paths(),
            [PathBuf::from("/work/bundled/lib/components")]
        );
    }

    #[test]
    fn add_file_appends_after_loaded_files() {
        let mut pkg = package("/work/user", "user", None);
        pkg.set_files(AssetType::Scripts, vec![AssetFile::new("index.js", "a")]);
        pkg.add_file(AssetType::Scripts, "user.js", "b");

        let names: Vec<_> = pkg
            .files(AssetType::Scripts)
            .iter()
            .map(|f| f.filename.as_str())
            .collect();
        assert_eq!(names, vec!["index.js", "user.js"]);
        assert!(pkg.files(AssetType::Styles).is_empty());
    }
}
