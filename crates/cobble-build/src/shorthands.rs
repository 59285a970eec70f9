//! One-call builds of the common asset types.

use crate::stages::{CommonJs, Concat, CopyAssets, CopyMode, RewriteUrls};
use crate::{Build, BuildConfig, BuildError, Builder};
use cobble_pkg::AssetType;

/// Options for [`Builder::build_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllOptions {
    /// Link binary assets instead of copying them.
    pub symlink: bool,
    /// Prefix for rewritten stylesheet urls.
    pub url_prefix: String,
}

impl AllOptions {
    fn copy_mode(&self) -> CopyMode {
        if self.symlink {
            CopyMode::Symlink
        } else {
            CopyMode::Copy
        }
    }
}

impl From<&BuildConfig> for AllOptions {
    fn from(config: &BuildConfig) -> Self {
        Self {
            symlink: config.symlink,
            url_prefix: config.url_prefix.clone(),
        }
    }
}

impl Builder {
    /// Register and concatenate scripts.
    pub async fn build_scripts(self) -> Result<Build, BuildError> {
        self.use_stage(CommonJs(AssetType::Scripts))
            .use_stage(Concat(AssetType::Scripts))
            .build()
            .await
    }

    /// Rewrite stylesheet urls against `url_prefix` and concatenate.
    pub async fn build_styles(self, url_prefix: impl Into<String>) -> Result<Build, BuildError> {
        self.use_stage(RewriteUrls(url_prefix.into()))
            .use_stage(Concat(AssetType::Styles))
            .build()
            .await
    }

    /// Register templates as string modules and concatenate.
    pub async fn build_templates(self) -> Result<Build, BuildError> {
        self.use_stage(CommonJs(AssetType::Templates))
            .use_stage(Concat(AssetType::Templates))
            .build()
            .await
    }

    /// Register JSON documents as modules and concatenate.
    pub async fn build_json(self) -> Result<Build, BuildError> {
        self.use_stage(CommonJs(AssetType::Json))
            .use_stage(Concat(AssetType::Json))
            .build()
            .await
    }

    /// Copy or link images under [`Builder::out_dir`].
    pub async fn build_images(self, mode: CopyMode) -> Result<Build, BuildError> {
        let out = self.out_dir();
        self.use_stage(CopyAssets::new(AssetType::Images, out, mode))
            .build()
            .await
    }

    /// Copy or link fonts under [`Builder::out_dir`].
    pub async fn build_fonts(self, mode: CopyMode) -> Result<Build, BuildError> {
        let out = self.out_dir();
        self.use_stage(CopyAssets::new(AssetType::Fonts, out, mode))
            .build()
            .await
    }

    /// Copy or link other files under [`Builder::out_dir`].
    pub async fn build_files(self, mode: CopyMode) -> Result<Build, BuildError> {
        let out = self.out_dir();
        self.use_stage(CopyAssets::new(AssetType::Files, out, mode))
            .build()
            .await
    }

    /// Every asset type at once: modules for scripts, JSON and templates,
    /// rewritten and concatenated styles, and binary assets under
    /// [`Builder::out_dir`].
    ///
    /// # Errors
    ///
    /// Returns the first resolution, hook or stage error.
    pub async fn build_all(self, options: AllOptions) -> Result<Build, BuildError> {
        let out = self.out_dir();
        let out = out.as_path();
        let mode = options.copy_mode();
        self.use_stage(CommonJs(AssetType::Json))
            .use_stage(CommonJs(AssetType::Scripts))
            .use_stage(CommonJs(AssetType::Templates))
            .use_stage(RewriteUrls(options.url_prefix))
            .use_stage(Concat(AssetType::Json))
            .use_stage(Concat(AssetType::Scripts))
            .use_stage(Concat(AssetType::Styles))
            .use_stage(Concat(AssetType::Templates))
            .use_stage(CopyAssets::new(AssetType::Fonts, out, mode))
            .use_stage(CopyAssets::new(AssetType::Images, out, mode))
            .use_stage(CopyAssets::new(AssetType::Files, out, mode))
            .build()
            .await
    }
}
