//! The embedding surface: configure a build, then run it.

use crate::pipeline::{Pipeline, Stage};
use crate::{Build, BuildConfig, BuildError, DEFAULT_OUT_DIR};
use cobble_pkg::{AssetType, Fs, LocalFs, ResolutionList, ResolvedPackage, Resolver};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A `before <type>` hook. May inject files with
/// [`ResolvedPackage::add_file`]; an `Err` aborts the build.
pub type Hook = Box<dyn Fn(&mut ResolvedPackage) -> Result<(), String> + Send + Sync>;

/// Builds one root component.
///
/// ```no_run
/// # async fn demo() -> Result<(), cobble_build::BuildError> {
/// use cobble_build::{Builder, CommonJs, Concat};
/// use cobble_pkg::AssetType;
///
/// let build = Builder::new("app")
///     .development()
///     .add_path("../shared")
///     .ignore("component/jquery")
///     .use_stage(CommonJs(AssetType::Scripts))
///     .use_stage(Concat(AssetType::Scripts))
///     .build()
///     .await?;
/// println!("{}", build.script_bundle());
/// # Ok(())
/// # }
/// ```
pub struct Builder {
    root: PathBuf,
    fs: Arc<dyn Fs>,
    dev: bool,
    source_urls: bool,
    paths: Vec<PathBuf>,
    ignored: Vec<(String, Option<AssetType>)>,
    pipeline: Pipeline,
    hooks: BTreeMap<AssetType, Vec<Hook>>,
    visitor: Option<cobble_pkg::DiscoveryVisitor>,
    runtime: String,
    append: String,
    out_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("root", &self.root)
            .field("dev", &self.dev)
            .field("source_urls", &self.source_urls)
            .field("paths", &self.paths)
            .field("ignored", &self.ignored)
            .field("pipeline", &self.pipeline)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("out_dir", &self.out_dir)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Create a builder for the component in `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fs: Arc::new(LocalFs),
            dev: false,
            source_urls: false,
            paths: Vec::new(),
            ignored: Vec::new(),
            pipeline: Pipeline::new(),
            hooks: BTreeMap::new(),
            visitor: None,
            runtime: String::new(),
            append: String::new(),
            out_dir: None,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn Fs>) -> Self {
        self.fs = fs;
        self
    }

    /// Include the root's development dependencies.
    #[must_use]
    pub fn development(mut self) -> Self {
        self.dev = true;
        self
    }

    /// Wrap scripts with `sourceURL` annotations.
    #[must_use]
    pub fn add_source_urls(mut self) -> Self {
        self.source_urls = true;
        self
    }

    /// Add a global search path, relative to the root component.
    #[must_use]
    pub fn add_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Leave a dependency out of every asset type.
    #[must_use]
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignored.push((name.into(), None));
        self
    }

    /// Leave a dependency out of one asset type.
    #[must_use]
    pub fn ignore_type(mut self, name: impl Into<String>, ty: AssetType) -> Self {
        self.ignored.push((name.into(), Some(ty)));
        self
    }

    /// Append a stage to the pipeline.
    #[must_use]
    pub fn use_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.pipeline.push(stage);
        self
    }

    /// Run `hook` on every package that includes `ty`, after its assets have
    /// been read and before the pipeline starts.
    #[must_use]
    pub fn hook_before<F>(mut self, ty: AssetType, hook: F) -> Self
    where
        F: Fn(&mut ResolvedPackage) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks.entry(ty).or_default().push(Box::new(hook));
        self
    }

    /// Call `visitor` for every dependency as it is discovered.
    #[must_use]
    pub fn on_dependency<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ResolvedPackage) + Send + Sync + 'static,
    {
        self.visitor = Some(Arc::new(visitor));
        self
    }

    /// The client-side module runtime placed in front of the script bundle.
    #[must_use]
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Text placed after the script bundle.
    #[must_use]
    pub fn append(mut self, text: impl AsRef<str>) -> Self {
        self.append.push_str(text.as_ref());
        self
    }

    /// Where copied assets go. Relative paths are taken from the root
    /// component.
    #[must_use]
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    /// The destination of copied assets: the configured directory, or
    /// `build` under the root component.
    #[must_use]
    pub fn out_dir(&self) -> PathBuf {
        let dir = self
            .out_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_OUT_DIR));
        self.root.join(dir)
    }

    /// Apply the resolution options and output directory of a configuration
    /// file.
    #[must_use]
    pub fn with_config(mut self, config: &BuildConfig) -> Self {
        self.dev |= config.development;
        self.source_urls |= config.source_urls;
        self.paths.extend(config.paths.iter().cloned());
        self.ignored
            .extend(config.ignore.iter().map(|name| (name.clone(), None)));
        if let Some(dir) = &config.out_dir {
            self.out_dir = Some(dir.clone());
        }
        self
    }

    /// Names of the registered stages, in order.
    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.pipeline.names()
    }

    fn resolver(&self) -> Resolver {
        let mut resolver = Resolver::new(&self.root)
            .with_fs(self.fs.clone())
            .with_dev(self.dev);
        for path in &self.paths {
            resolver = resolver.with_path(path.clone());
        }
        for (name, ty) in &self.ignored {
            resolver = match ty {
                Some(ty) => resolver.with_ignored_type(name, *ty),
                None => resolver.with_ignored(name),
            };
        }
        if let Some(visitor) = &self.visitor {
            resolver = resolver.on_dependency(visitor.clone());
        }
        resolver
    }

    fn run_hooks(&self, packages: &mut ResolutionList) -> Result<(), BuildError> {
        for (&ty, hooks) in &self.hooks {
            for package in packages.iter_mut().filter(|p| p.includes(ty)) {
                for hook in hooks {
                    hook(package).map_err(BuildError::Hook)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve the component, run hooks, then run every stage in order.
    ///
    /// A builder can be run more than once; each run starts from a fresh
    /// resolution.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, hook or stage error. No partial build is
    /// returned.
    pub async fn build(&self) -> Result<Build, BuildError> {
        let mut packages = self.resolver().resolve().await?;
        self.run_hooks(&mut packages)?;

        let mut build = Build::new(packages, self.fs.clone());
        build.source_urls = self.source_urls;
        build.require.clone_from(&self.runtime);
        build.append.clone_from(&self.append);

        debug!(
            root = %build.packages.root().dir().display(),
            packages = build.packages.len(),
            stages = self.pipeline.len(),
            "building"
        );
        self.pipeline.run(&mut build).await?;
        Ok(build)
    }
}
