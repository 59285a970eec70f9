//! Name aliasing for a flat module registry.
//!
//! Modules register under their package's location-derived identifier
//! (`component-emitter/index.js`). A consumer refers to a dependency by its
//! declared name, so each edge gets aliases of the form
//! `<consumer>/deps/<declared name>/<file>` -> `<identifier>/<file>`.
//! Two unrelated packages that both call themselves `emitter` therefore
//! never collide.

use crate::{AssetType, ResolutionList, ResolvedPackage};
use std::fmt;

/// The entry file assumed when a package declares no `main`.
const INDEX: &str = "index.js";

/// One `from -> to` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alias {
    pub from: String,
    pub to: String,
}

impl Alias {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "require.alias(\"{}\", \"{}\");", self.to, self.from)
    }
}

/// An ordered list of aliases. Duplicates are kept; emission order follows
/// resolution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<Alias>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alias: Alias) {
        self.entries.push(alias);
    }

    /// Whether the table maps `from` to `to`.
    #[must_use]
    pub fn contains(&self, from: &str, to: &str) -> bool {
        self.entries.iter().any(|a| a.from == from && a.to == to)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alias> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render one `require.alias(...)` statement per line.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Extend<Alias> for AliasTable {
    fn extend<T: IntoIterator<Item = Alias>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for AliasTable {
    type Item = Alias;
    type IntoIter = std::vec::IntoIter<Alias>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for AliasTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for alias in &self.entries {
            writeln!(f, "{alias}")?;
        }
        Ok(())
    }
}

/// Computes aliases for a completed resolution.
#[derive(Debug, Clone, Copy)]
pub struct Aliaser<'a> {
    list: &'a ResolutionList,
}

impl<'a> Aliaser<'a> {
    pub fn new(list: &'a ResolutionList) -> Self {
        Self { list }
    }

    /// Aliases for every registered asset type, scripts first.
    #[must_use]
    pub fn all(&self) -> AliasTable {
        let mut table = AliasTable::new();
        for ty in [AssetType::Scripts, AssetType::Templates, AssetType::Json] {
            table.extend(self.for_type(ty));
        }
        table
    }

    /// Aliases for the files of one asset type.
    ///
    /// Entry-point aliases (`main` and root-level names) are emitted with
    /// scripts only.
    #[must_use]
    pub fn for_type(&self, ty: AssetType) -> AliasTable {
        let mut table = AliasTable::new();
        for package in self.list {
            self.package_aliases(package, ty, &mut table);
        }
        table
    }

    fn package_aliases(&self, package: &ResolvedPackage, ty: AssetType, table: &mut AliasTable) {
        let prefix = package.prefix();
        let root = package.is_root();
        let scripts = ty == AssetType::Scripts;

        for dep in self.list.dependencies_of(package) {
            let files = dep.files(ty);
            // An empty but declared list still exposes the entry points.
            if files.is_empty() && !(dep.includes(ty) && dep.manifest.declares(ty)) {
                continue;
            }
            let base = dep.id();
            let name = dep.name();

            table.extend(files.iter().map(|file| {
                Alias::new(
                    format!("{prefix}/deps/{name}/{}", file.filename),
                    format!("{base}/{}", file.filename),
                )
            }));

            if !scripts {
                continue;
            }
            if let Some(main) = &dep.manifest.main {
                table.push(Alias::new(
                    format!("{prefix}/deps/{name}/{INDEX}"),
                    format!("{base}/{main}"),
                ));
            }
            if root {
                let main = dep.manifest.main.as_deref().unwrap_or(INDEX);
                table.push(Alias::new(format!("{name}/{INDEX}"), format!("{base}/{main}")));
            }
        }

        if root && scripts {
            if let Some(main) = &package.manifest.main {
                table.push(Alias::new(
                    format!("{prefix}/{INDEX}"),
                    format!("{prefix}/{main}"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resolver;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn component(root: &Path, dir: &str, manifest: &str, files: &[&str]) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(crate::MANIFEST_FILE), manifest).unwrap();
        for name in files {
            fs::write(dir.join(name), format!("// {name}")).unwrap();
        }
    }

    async fn resolve(root: &Path, dir: &str) -> ResolutionList {
        Resolver::new(root.join(dir))
            .with_path("..")
            .resolve()
            .await
            .unwrap()
    }

    #[test]
    fn alias_renders_target_first() {
        let alias = Alias::new("boot/index.js", "boot/boot.js");
        assert_eq!(
            alias.to_string(),
            r#"require.alias("boot/boot.js", "boot/index.js");"#
        );
    }

    #[tokio::test]
    async fn main_aliases() {
        let tmp = TempDir::new().unwrap();
        component(
            tmp.path(),
            "main-boot",
            r#"{ "name": "boot", "main": "boot.js", "scripts": ["boot.js"], "dependencies": { "main": "*" } }"#,
            &["boot.js"],
        );
        component(
            tmp.path(),
            "main",
            r#"{ "name": "main", "main": "foo.js", "scripts": ["foo.js"] }"#,
            &["foo.js"],
        );

        let list = resolve(tmp.path(), "main-boot").await;
        let table = Aliaser::new(&list).for_type(AssetType::Scripts);

        assert!(table.contains("boot/index.js", "boot/boot.js"));
        assert!(table.contains("boot/deps/main/index.js", "main/foo.js"));
        assert!(table.contains("boot/deps/main/foo.js", "main/foo.js"));
        assert!(table.contains("main/index.js", "main/foo.js"));

        let rendered = table.render();
        assert!(rendered.contains(r#"require.alias("boot/boot.js", "boot/index.js");"#));
        assert!(rendered.contains(r#"require.alias("main/foo.js", "boot/deps/main/index.js");"#));
    }

    #[tokio::test]
    async fn colliding_names_map_to_distinct_identifiers() {
        let tmp = TempDir::new().unwrap();
        component(
            tmp.path(),
            "app",
            r#"{ "name": "app", "dependencies": { "component/emitter": "*", "other": "*" } }"#,
            &[],
        );
        component(
            tmp.path(),
            "component-emitter",
            r#"{ "name": "emitter", "scripts": ["index.js"] }"#,
            &["index.js"],
        );
        component(
            tmp.path(),
            "other",
            r#"{ "name": "other", "scripts": ["index.js"], "dependencies": { "visionmedia/emitter": "*" } }"#,
            &["index.js"],
        );
        component(
            tmp.path(),
            "visionmedia-emitter",
            r#"{ "name": "emitter", "scripts": ["index.js"] }"#,
            &["index.js"],
        );

        let list = resolve(tmp.path(), "app").await;
        let table = Aliaser::new(&list).for_type(AssetType::Scripts);

        assert!(table.contains(
            "app/deps/emitter/index.js",
            "component-emitter/index.js"
        ));
        assert!(table.contains(
            "other/deps/emitter/index.js",
            "visionmedia-emitter/index.js"
        ));
        assert!(!table.contains(
            "other/deps/emitter/index.js",
            "component-emitter/index.js"
        ));
    }

    #[tokio::test]
    async fn aliases_follow_resolution_order_transitively() {
        let tmp = TempDir::new().unwrap();
        component(
            tmp.path(),
            "deep",
            r#"{ "name": "deep", "scripts": ["index.js"], "dependencies": { "component/dialog": "*" } }"#,
            &["index.js"],
        );
        component(
            tmp.path(),
            "component-dialog",
            r#"{ "name": "dialog", "scripts": ["index.js"], "dependencies": { "component/jquery": "*" } }"#,
            &["index.js"],
        );
        component(
            tmp.path(),
            "component-jquery",
            r#"{ "name": "jquery", "scripts": ["index.js"] }"#,
            &["index.js"],
        );

        let list = resolve(tmp.path(), "deep").await;
        let table = Aliaser::new(&list).for_type(AssetType::Scripts);
        let pairs: Vec<_> = table.iter().map(|a| (a.from.as_str(), a.to.as_str())).collect();

        assert_eq!(
            pairs,
            vec![
                ("deep/deps/dialog/index.js", "component-dialog/index.js"),
                ("dialog/index.js", "component-dialog/index.js"),
                (
                    "component-dialog/deps/jquery/index.js",
                    "component-jquery/index.js"
                ),
            ]
        );
    }

    #[tokio::test]
    async fn empty_script_list_still_aliases_main() {
        let tmp = TempDir::new().unwrap();
        component(
            tmp.path(),
            "app",
            r#"{ "name": "app", "scripts": [], "dependencies": { "main": "*", "bare": "*" } }"#,
            &[],
        );
        component(
            tmp.path(),
            "main",
            r#"{ "name": "main", "main": "foo.js", "scripts": [] }"#,
            &[],
        );
        component(tmp.path(), "bare", r#"{ "name": "bare", "main": "x.js" }"#, &[]);

        let list = resolve(tmp.path(), "app").await;
        let table = Aliaser::new(&list).for_type(AssetType::Scripts);
        let pairs: Vec<_> = table.iter().map(|a| (a.from.as_str(), a.to.as_str())).collect();

        assert_eq!(
            pairs,
            vec![
                ("app/deps/main/index.js", "main/foo.js"),
                ("main/index.js", "main/foo.js"),
            ]
        );
    }

    #[tokio::test]
    async fn non_script_types_alias_files_only() {
        let tmp = TempDir::new().unwrap();
        component(
            tmp.path(),
            "app",
            r#"{ "name": "app", "dependencies": { "config": "*" } }"#,
            &[],
        );
        component(
            tmp.path(),
            "config",
            r#"{ "name": "config", "main": "index.js", "json": ["index.json"] }"#,
            &["index.json"],
        );

        let list = resolve(tmp.path(), "app").await;
        let table = Aliaser::new(&list).for_type(AssetType::Json);
        assert_eq!(table.len(), 1);
        assert!(table.contains("app/deps/config/index.json", "config/index.json"));

        assert!(Aliaser::new(&list).for_type(AssetType::Scripts).is_empty());
        assert_eq!(Aliaser::new(&list).all().len(), 1);
    }
}
