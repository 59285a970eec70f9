//! Recursive resolution of a component and its dependencies.
//!
//! Resolution produces a flat [`ResolutionList`]: the root first, then each
//! dependency's subtree depth-first in declaration order. Every package
//! appears at most once per asset type. Which types a package is still
//! needed for is tracked in a shared [`IgnoreSet`] keyed by
//! `(normalized name, asset type)`.
//!
//! Sibling lookups and manifest reads run concurrently; subtrees are then
//! walked in declaration order, so the list never depends on I/O timing.

use crate::io::{Fs, LocalFs};
use crate::lookup::{clean, PathResolver};
use crate::{normalize_name, AssetFile, AssetType, Manifest, ManifestError, ResolvedPackage};
use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// The implicit search path under every root package.
pub const COMPONENTS_DIR: &str = "components";

/// Errors that can occur during resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A package manifest is missing or malformed.
    #[error("invalid manifest in {}: {source}", .dir.display())]
    Manifest {
        dir: PathBuf,
        #[source]
        source: ManifestError,
    },

    /// No search path contains the dependency.
    #[error("failed to lookup \"{package}\"'s dependency \"{dependency}\"")]
    DependencyNotFound { package: String, dependency: String },

    /// A declared asset file could not be read.
    #[error("failed to read asset {}: {source}", .path.display())]
    AssetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root directory could not be made absolute.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Called once for every dependency as soon as it has been loaded.
pub type DiscoveryVisitor = Arc<dyn Fn(&ResolvedPackage) + Send + Sync>;

/// `(normalized name, asset type)` pairs that must not be pulled again.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    entries: HashSet<(String, AssetType)>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore `name` for every asset type.
    pub fn ignore(&mut self, name: &str) {
        for ty in AssetType::ALL {
            self.ignore_type(name, ty);
        }
    }

    /// Ignore `name` for one asset type.
    pub fn ignore_type(&mut self, name: &str, ty: AssetType) {
        self.entries.insert((normalize_name(name), ty));
    }

    #[must_use]
    pub fn is_ignored(&self, name: &str, ty: AssetType) -> bool {
        self.entries.contains(&(normalize_name(name), ty))
    }

    /// Whether `name` is ignored for every asset type.
    #[must_use]
    pub fn is_fully_ignored(&self, name: &str) -> bool {
        AssetType::ALL.into_iter().all(|ty| self.is_ignored(name, ty))
    }

    /// Take the types in `wanted` that `name` is not yet ignored for, and
    /// ignore them from now on. An empty result means nothing is left to pull.
    pub fn claim(&mut self, name: &str, wanted: &BTreeSet<AssetType>) -> BTreeSet<AssetType> {
        let name = normalize_name(name);
        let mut claimed = BTreeSet::new();
        for &ty in wanted {
            if self.entries.insert((name.clone(), ty)) {
                claimed.insert(ty);
            }
        }
        claimed
    }
}

/// State shared by every branch of one resolution.
///
/// Built once at the root and passed by reference into each recursive step,
/// including the concurrent ones.
#[derive(Debug)]
pub(crate) struct ResolveContext {
    ignored: Mutex<IgnoreSet>,
    lookup: PathResolver,
    global_paths: Vec<PathBuf>,
    fs: Arc<dyn Fs>,
    dev: bool,
}

impl ResolveContext {
    fn new(
        fs: Arc<dyn Fs>,
        global_paths: Vec<PathBuf>,
        ignored: IgnoreSet,
        dev: bool,
    ) -> Self {
        Self {
            ignored: Mutex::new(ignored),
            lookup: PathResolver::new(fs.clone()),
            global_paths,
            fs,
            dev,
        }
    }

    /// Search paths inherited by every package of this resolution.
    fn global_paths(&self) -> &[PathBuf] {
        &self.global_paths
    }

    /// Check-and-mark in one step; holds no lock across a suspension point.
    fn claim(&self, name: &str, wanted: &BTreeSet<AssetType>) -> BTreeSet<AssetType> {
        self.ignored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .claim(name, wanted)
    }
}

/// A dependency that has been located and loaded but not yet walked.
struct Discovered {
    manifest: Manifest,
    dir: PathBuf,
    types: BTreeSet<AssetType>,
}

/// The flattened result of a resolution.
#[derive(Debug, Clone)]
pub struct ResolutionList {
    packages: Vec<ResolvedPackage>,
    dev: bool,
}

impl ResolutionList {
    /// The root package.
    #[must_use]
    pub fn root(&self) -> &ResolvedPackage {
        &self.packages[0]
    }

    /// Whether development dependencies were included.
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.dev
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Always false: a resolution contains at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ResolvedPackage> {
        self.packages.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.packages.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ResolvedPackage> {
        self.packages.iter_mut()
    }

    /// The package that caused `package` to be resolved.
    #[must_use]
    pub fn parent_of(&self, package: &ResolvedPackage) -> Option<&ResolvedPackage> {
        package.parent().and_then(|i| self.packages.get(i))
    }

    /// Packages that `package` declared as dependencies, in list order.
    pub fn dependencies_of<'a>(
        &'a self,
        package: &'a ResolvedPackage,
    ) -> impl Iterator<Item = &'a ResolvedPackage> + 'a {
        self.packages
            .iter()
            .skip(1)
            .filter(move |dep| package.edges().iter().any(|e| e == dep.id()))
    }

    /// Loaded files of `ty` across all packages, in resolution order.
    pub fn each(&self, ty: AssetType) -> impl Iterator<Item = (&ResolvedPackage, &AssetFile)> {
        self.packages
            .iter()
            .flat_map(move |pkg| pkg.files(ty).iter().map(move |file| (pkg, file)))
    }
}

impl<'a> IntoIterator for &'a ResolutionList {
    type Item = &'a ResolvedPackage;
    type IntoIter = std::slice::Iter<'a, ResolvedPackage>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

/// Resolver for a root component directory.
#[derive(Clone)]
pub struct Resolver {
    root: PathBuf,
    paths: Vec<PathBuf>,
    dev: bool,
    ignored: IgnoreSet,
    fs: Arc<dyn Fs>,
    visitor: Option<DiscoveryVisitor>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("root", &self.root)
            .field("paths", &self.paths)
            .field("dev", &self.dev)
            .field("ignored", &self.ignored)
            .field("fs", &self.fs)
            .field("visitor", &self.visitor.is_some())
            .finish()
    }
}

impl Resolver {
    /// Create a resolver for the component in `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: Vec::new(),
            dev: false,
            ignored: IgnoreSet::new(),
            fs: Arc::new(LocalFs),
            visitor: None,
        }
    }

    /// Use a different filesystem.
    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn Fs>) -> Self {
        self.fs = fs;
        self
    }

    /// Include the root's development dependencies.
    #[must_use]
    pub fn with_dev(mut self, include: bool) -> Self {
        self.dev = include;
        self
    }

    /// Add a global search path, relative to the root directory.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Skip a dependency for every asset type.
    #[must_use]
    pub fn with_ignored(mut self, name: &str) -> Self {
        self.ignored.ignore(name);
        self
    }

    /// Skip a dependency for one asset type.
    #[must_use]
    pub fn with_ignored_type(mut self, name: &str, ty: AssetType) -> Self {
        self.ignored.ignore_type(name, ty);
        self
    }

    /// Call `visitor` for every dependency as it is discovered.
    #[must_use]
    pub fn on_dependency(mut self, visitor: DiscoveryVisitor) -> Self {
        self.visitor = Some(visitor);
        self
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the root and every transitive dependency, then load their
    /// textual assets.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any manifest is missing or malformed
    /// - A dependency is not found in any search path
    /// - A declared asset file cannot be read
    pub async fn resolve(&self) -> Result<ResolutionList, ResolveError> {
        let root = if self.root.is_absolute() {
            clean(&self.root)
        } else {
            clean(&std::env::current_dir()?.join(&self.root))
        };

        let mut global_paths = vec![root.join(COMPONENTS_DIR)];
        global_paths.extend(self.paths.iter().map(|p| clean(&root.join(p))));

        let ctx = ResolveContext::new(
            self.fs.clone(),
            global_paths,
            self.ignored.clone(),
            self.dev,
        );

        debug!(root = %root.display(), "resolving");
        let manifest = Manifest::load(&*self.fs, &root)
            .await
            .map_err(|source| ResolveError::Manifest {
                dir: root.clone(),
                source,
            })?;

        // A dependency cycle back to the root stops here.
        let types = AssetType::all();
        ctx.claim(&manifest.name, &types);

        let mut packages = Vec::new();
        let node = Discovered {
            manifest,
            dir: root,
            types,
        };
        self.walk(&ctx, node, None, &mut packages).await?;

        try_join_all(packages.iter_mut().map(|pkg| pull(&*self.fs, pkg))).await?;

        debug!(packages = packages.len(), "resolved");
        Ok(ResolutionList {
            packages,
            dev: self.dev,
        })
    }

    /// Append `node` and, depth-first, everything it still needs.
    fn walk<'a>(
        &'a self,
        ctx: &'a ResolveContext,
        node: Discovered,
        parent: Option<usize>,
        list: &'a mut Vec<ResolvedPackage>,
    ) -> BoxFuture<'a, Result<(), ResolveError>> {
        async move {
            let dev = ctx.dev && parent.is_none();
            let edges = node.manifest.dependency_names(dev);
            let package =
                ResolvedPackage::new(node.manifest, node.dir, parent, edges, node.types);

            if parent.is_some() {
                if let Some(visit) = &self.visitor {
                    visit(&package);
                }
            }

            // Claim every direct dependency before any of them is looked up,
            // so a diamond below this package cannot pull one twice.
            let pending: Vec<(String, BTreeSet<AssetType>)> = package
                .edges()
                .iter()
                .filter_map(|name| {
                    let types = ctx.claim(name, package.types());
                    if types.is_empty() {
                        debug!(dependency = %name, "ignore");
                        None
                    } else {
                        Some((name.clone(), types))
                    }
                })
                .collect();

            if pending.is_empty() {
                debug!(package = package.name(), "no dependencies to resolve");
                list.push(package);
                return Ok(());
            }

            let roots: Vec<PathBuf> = package
                .search_paths()
                .iter()
                .chain(ctx.global_paths())
                .cloned()
                .collect();
            let requester = package.name().to_string();
            let index = list.len();
            list.push(package);

            let found = try_join_all(pending.into_iter().map(|(name, types)| {
                let roots = &roots;
                let requester = &requester;
                async move {
                    let dir = ctx.lookup.lookup(&name, roots).await.ok_or_else(|| {
                        ResolveError::DependencyNotFound {
                            package: requester.clone(),
                            dependency: name.clone(),
                        }
                    })?;
                    let manifest = Manifest::load(&*ctx.fs, &dir).await.map_err(|source| {
                        ResolveError::Manifest {
                            dir: dir.clone(),
                            source,
                        }
                    })?;
                    Ok::<_, ResolveError>(Discovered {
                        manifest,
                        dir,
                        types,
                    })
                }
            }))
            .await?;

            for node in found {
                self.walk(ctx, node, Some(index), list).await?;
            }
            Ok(())
        }
        .boxed()
    }
}

/// Replace a package's declared textual file lists with loaded files.
async fn pull(fs: &dyn Fs, package: &mut ResolvedPackage) -> Result<(), ResolveError> {
    let types: Vec<AssetType> = package
        .types()
        .iter()
        .copied()
        .filter(AssetType::is_textual)
        .collect();

    for ty in types {
        let declared = package.manifest.files_of(ty);
        if declared.is_empty() {
            continue;
        }
        debug!(package = package.name(), count = declared.len(), %ty, "pull");

        let files = try_join_all(declared.iter().map(|filename| {
            let path = package.path(filename);
            async move {
                let contents =
                    fs.read_to_string(&path)
                        .await
                        .map_err(|source| ResolveError::AssetRead {
                            path: path.clone(),
                            source,
                        })?;
                Ok::<_, ResolveError>(AssetFile::new(filename.clone(), contents))
            }
        }))
        .await?;

        package.set_files(ty, files);
    }
    Ok(())
}
