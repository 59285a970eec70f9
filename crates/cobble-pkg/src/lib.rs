//! Component graph resolution for cobble.
//!
//! This crate provides:
//! - Parsing and normalization of `component.json` manifests
//! - Search-path lookup of dependency directories with a per-resolution cache
//! - Recursive, deduplicating resolution of a component and its dependencies
//! - Aliasing of declared names onto location-derived module identifiers

mod alias;
pub mod io;
mod lookup;
mod manifest;
mod package;
mod resolve;

pub use alias::{Alias, AliasTable, Aliaser};
pub use io::{Fs, LocalFs};
pub use lookup::PathResolver;
pub use manifest::{normalize_name, Dependencies, Manifest, ManifestError, MANIFEST_FILE};
pub use package::{AssetFile, AssetType, ResolvedPackage};
pub use resolve::{
    DiscoveryVisitor, IgnoreSet, ResolutionList, ResolveError, Resolver,
    COMPONENTS_DIR,
};
