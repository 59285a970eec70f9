//! Built-in pipeline stages.

use crate::assets::{module_source, register, register_with_source_url, rewrite_urls};
use crate::pipeline::Stage;
use crate::{Build, BuildError};
use cobble_pkg::{normalize_name, Aliaser, AssetFile, AssetType, Fs};
use futures_util::future::{self, try_join_all, BoxFuture};
use futures_util::FutureExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Wrap every file of a type as a registered module and record the aliases
/// its consumers need.
#[derive(Debug, Clone, Copy)]
pub struct CommonJs(pub AssetType);

impl Stage for CommonJs {
    fn name(&self) -> &str {
        "commonjs"
    }

    fn run<'a>(&'a self, build: &'a mut Build) -> BoxFuture<'a, Result<(), BuildError>> {
        let ty = self.0;
        let source_urls = build.source_urls && ty == AssetType::Scripts;

        build.map(ty, |package, file| {
            let name = package.module_name(&file.filename);
            let source = module_source(ty, &file.contents);
            let contents = if source_urls {
                register_with_source_url(&name, &source)
            } else {
                register(&name, &source)
            };
            AssetFile::new(file.filename, contents)
        });

        let aliases = Aliaser::new(&build.packages).for_type(ty);
        build.aliases.extend(aliases);
        future::ready(Ok(())).boxed()
    }
}

/// Join every file of a type, in resolution order, into the type's output.
///
/// The output exists afterwards even when no package had files of the type.
#[derive(Debug, Clone, Copy)]
pub struct Concat(pub AssetType);

impl Stage for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn run<'a>(&'a self, build: &'a mut Build) -> BoxFuture<'a, Result<(), BuildError>> {
        let joined: String = build
            .each(self.0)
            .map(|(_, file)| file.contents.as_str())
            .collect();
        build.output_mut(self.0).push_str(&joined);
        future::ready(Ok(())).boxed()
    }
}

/// Resolve relative `url(...)` references in stylesheets against `prefix`.
#[derive(Debug, Clone, Default)]
pub struct RewriteUrls(pub String);

impl Stage for RewriteUrls {
    fn name(&self) -> &str {
        "rewrite-urls"
    }

    fn run<'a>(&'a self, build: &'a mut Build) -> BoxFuture<'a, Result<(), BuildError>> {
        let url_prefix = self.0.as_str();
        build.map(AssetType::Styles, |package, file| {
            let contents = rewrite_urls(&file.contents, &file.filename, package.prefix(), url_prefix);
            AssetFile::new(file.filename, contents)
        });
        future::ready(Ok(())).boxed()
    }
}

/// How [`CopyAssets`] materializes a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    #[default]
    Copy,
    Symlink,
}

/// Copy or link the declared files of a type under `dest`.
///
/// Files land in `<dest>/<package name>/<file>`, with `/` in the package
/// name replaced by `-`. An existing destination is replaced, so running
/// the stage again over the same tree succeeds.
#[derive(Debug, Clone)]
pub struct CopyAssets {
    pub ty: AssetType,
    pub dest: PathBuf,
    pub mode: CopyMode,
}

impl CopyAssets {
    pub fn new(ty: AssetType, dest: impl Into<PathBuf>, mode: CopyMode) -> Self {
        Self {
            ty,
            dest: dest.into(),
            mode,
        }
    }
}

impl Stage for CopyAssets {
    fn name(&self) -> &str {
        match self.mode {
            CopyMode::Copy => "copy",
            CopyMode::Symlink => "symlink",
        }
    }

    fn run<'a>(&'a self, build: &'a mut Build) -> BoxFuture<'a, Result<(), BuildError>> {
        async move {
            let ty = self.ty;
            let mut seen = HashSet::new();
            let jobs: Vec<(PathBuf, PathBuf)> = build
                .packages
                .iter()
                .flat_map(|package| {
                    let dir = self.dest.join(normalize_name(package.name()));
                    package
                        .declared(ty)
                        .iter()
                        .map(move |file| (package.path(file), dir.join(file)))
                })
                .filter(|(_, to)| !build.was_copied(ty, to) && seen.insert(to.clone()))
                .collect();

            if jobs.is_empty() {
                return Ok(());
            }
            debug!(%ty, count = jobs.len(), dest = %self.dest.display(), "materializing");

            let fs = build.fs();
            try_join_all(
                jobs.iter()
                    .map(|(from, to)| materialize(fs, self.mode, from, to)),
            )
            .await?;

            build.record_copies(ty, jobs.into_iter().map(|(_, to)| to));
            Ok(())
        }
        .boxed()
    }
}

async fn materialize(fs: &dyn Fs, mode: CopyMode, from: &Path, to: &Path) -> Result<(), BuildError> {
    if !fs.exists(from).await {
        return Err(BuildError::MissingAsset {
            path: from.to_path_buf(),
        });
    }

    if let Some(parent) = to.parent() {
        fs.create_dir_all(parent)
            .await
            .map_err(|source| BuildError::Io {
                op: "create",
                path: parent.to_path_buf(),
                source,
            })?;
    }

    if fs.symlink_exists(to).await {
        fs.remove_file(to).await.map_err(|source| BuildError::Io {
            op: "replace",
            path: to.to_path_buf(),
            source,
        })?;
    }

    trace!(from = %from.display(), to = %to.display(), ?mode, "materialize");
    let (op, result) = match mode {
        CopyMode::Copy => ("copy", fs.copy(from, to).await),
        CopyMode::Symlink => ("symlink", fs.symlink(from, to).await),
    };
    result.map_err(|source| BuildError::Io {
        op,
        path: to.to_path_buf(),
        source,
    })
}
