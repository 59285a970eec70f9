//! Asset pipeline for cobble component graphs.
//!
//! This crate provides:
//! - Per-file transforms that wrap sources as registered modules
//! - An ordered pipeline of stages over a resolved component graph
//! - Built-in stages for module wrapping, concatenation, url rewriting and
//!   copying binary assets
//! - A [`Builder`] that resolves, runs hooks and runs the pipeline
//! - Build configuration loaded from `cobble.toml`

pub mod assets;
mod build;
mod builder;
mod config;
mod pipeline;
mod shorthands;
mod stages;

pub use build::{Build, BuildError};
pub use builder::{Builder, Hook};
pub use config::{BuildConfig, ConfigError, CONFIG_FILE, DEFAULT_OUT_DIR};
pub use pipeline::{stage_fn, FnStage, Pipeline, Stage};
pub use shorthands::AllOptions;
pub use stages::{CommonJs, Concat, CopyAssets, CopyMode, RewriteUrls};
