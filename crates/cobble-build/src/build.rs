//! The in-progress build shared by every pipeline stage.

use cobble_pkg::{AliasTable, AssetFile, AssetType, Fs, ResolutionList, ResolveError, ResolvedPackage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A stage or hook reported failure. The message is passed through as is.
    #[error("{0}")]
    Hook(String),

    /// A file to copy or link does not exist.
    #[error("file does not exist: {}", .path.display())]
    MissingAsset { path: PathBuf },

    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The result object stages read from and write to.
#[derive(Debug)]
pub struct Build {
    /// Resolved packages, root first.
    pub packages: ResolutionList,
    /// Wrap scripts with `sourceURL` annotations.
    pub source_urls: bool,
    /// Aliases accumulated by the module-wrapping stages.
    pub aliases: AliasTable,
    /// Client-side module runtime, supplied by the embedder.
    pub require: String,
    /// Raw text appended after the bundle, e.g. an auto-invoking `require`.
    pub append: String,
    outputs: BTreeMap<AssetType, String>,
    fields: BTreeMap<String, String>,
    copied: BTreeMap<AssetType, Vec<PathBuf>>,
    fs: Arc<dyn Fs>,
}

impl Build {
    pub fn new(packages: ResolutionList, fs: Arc<dyn Fs>) -> Self {
        Self {
            packages,
            source_urls: false,
            aliases: AliasTable::new(),
            require: String::new(),
            append: String::new(),
            outputs: BTreeMap::new(),
            fields: BTreeMap::new(),
            copied: BTreeMap::new(),
            fs,
        }
    }

    /// Whether development dependencies were resolved.
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.packages.is_dev()
    }

    /// Filesystem used by stages that materialize files.
    #[must_use]
    pub fn fs(&self) -> &dyn Fs {
        &*self.fs
    }

    /// Loaded files of `ty` across all packages, in resolution order.
    pub fn each(&self, ty: AssetType) -> impl Iterator<Item = (&ResolvedPackage, &AssetFile)> {
        self.packages.each(ty)
    }

    /// Replace every file of `ty` with `f(package, file)`.
    pub fn map<F>(&mut self, ty: AssetType, mut f: F)
    where
        F: FnMut(&ResolvedPackage, AssetFile) -> AssetFile,
    {
        for package in self.packages.iter_mut() {
            if package.files(ty).is_empty() {
                continue;
            }
            let files = std::mem::take(package.files_mut(ty));
            let mapped: Vec<AssetFile> = files.into_iter().map(|file| f(package, file)).collect();
            *package.files_mut(ty) = mapped;
        }
    }

    /// The concatenated output for `ty`, if a stage produced one.
    #[must_use]
    pub fn output(&self, ty: AssetType) -> Option<&str> {
        self.outputs.get(&ty).map(String::as_str)
    }

    /// Mutable output buffer for `ty`, created empty on first use.
    pub fn output_mut(&mut self, ty: AssetType) -> &mut String {
        self.outputs.entry(ty).or_default()
    }

    /// A named result attached by an earlier stage.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Attach a named result for later stages and the caller, replacing any
    /// previous value.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Every attached field, by name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Destination paths materialized for `ty`, in resolution order.
    #[must_use]
    pub fn copied(&self, ty: AssetType) -> &[PathBuf] {
        self.copied.get(&ty).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn record_copies(&mut self, ty: AssetType, paths: impl IntoIterator<Item = PathBuf>) {
        self.copied.entry(ty).or_default().extend(paths);
    }

    /// Whether a destination was already materialized for `ty`.
    #[must_use]
    pub fn was_copied(&self, ty: AssetType, path: &Path) -> bool {
        self.copied(ty).iter().any(|p| p == path)
    }

    /// Runtime, every script-like output and the alias table as one script.
    #[must_use]
    pub fn script_bundle(&self) -> String {
        let mut js = self.require.clone();
        for ty in [AssetType::Scripts, AssetType::Templates, AssetType::Json] {
            if let Some(out) = self.output(ty) {
                js.push_str(out);
            }
        }
        js.push_str(&self.aliases.render());
        js.push_str(&self.append);
        js
    }
}
