//! Locating dependency directories across ordered search paths.

use crate::io::Fs;
use crate::MANIFEST_FILE;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Finds the directory of a named dependency.
///
/// A hit for a `(name, search root)` pair is remembered for the lifetime of
/// the resolver, so later lookups never touch the filesystem again.
#[derive(Debug)]
pub struct PathResolver {
    fs: Arc<dyn Fs>,
    cache: Mutex<HashMap<(String, PathBuf), PathBuf>>,
}

impl PathResolver {
    pub fn new(fs: Arc<dyn Fs>) -> Self {
        Self {
            fs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Probe `roots` in order for `<root>/<name>/component.json`.
    ///
    /// Returns the first matching directory, or `None` once every root has
    /// been tried. Probes run one at a time and stop at the first hit.
    pub async fn lookup(&self, name: &str, roots: &[PathBuf]) -> Option<PathBuf> {
        for root in roots {
            let key = (name.to_string(), root.clone());
            if let Some(dir) = self.cached(&key) {
                trace!(name, dir = %dir.display(), "lookup cache hit");
                return Some(dir);
            }

            let dir = root.join(name);
            if self.fs.exists(&dir.join(MANIFEST_FILE)).await {
                debug!(name, dir = %dir.display(), "found dependency");
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, dir.clone());
                return Some(dir);
            }
            trace!(name, root = %root.display(), "not in search path");
        }
        None
    }

    fn cached(&self, key: &(String, PathBuf)) -> Option<PathBuf> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of memoized lookups.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Lexically remove `.` and `..` components.
pub(crate) fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalFs;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::collections::HashSet;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// A filesystem holding a fixed set of existing paths and counting existence checks.
    #[derive(Debug, Default)]
    struct ProbeFs {
        existing: HashSet<PathBuf>,
        checks: AtomicUsize,
    }

    impl Fs for ProbeFs {
        fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            let hit = self.existing.contains(path);
            async move { hit }.boxed()
        }

        fn symlink_exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
            self.exists(path)
        }

        fn read_to_string<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
            async { Err(io::ErrorKind::NotFound.into()) }.boxed()
        }

        fn create_dir_all<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
            async { Ok(()) }.boxed()
        }

        fn copy<'a>(&'a self, _from: &'a Path, _to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
            async { Ok(()) }.boxed()
        }

        fn symlink<'a>(
            &'a self,
            _target: &'a Path,
            _link: &'a Path,
        ) -> BoxFuture<'a, io::Result<()>> {
            async { Ok(()) }.boxed()
        }

        fn remove_file<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
            async { Ok(()) }.boxed()
        }
    }

    #[tokio::test]
    async fn first_root_with_manifest_wins() {
        let tmp = TempDir::new().unwrap();
        for root in ["a", "b"] {
            let dir = tmp.path().join(root).join("emitter");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(MANIFEST_FILE), r#"{"name":"emitter"}"#).unwrap();
        }
        let roots = vec![
            tmp.path().join("missing"),
            tmp.path().join("b"),
            tmp.path().join("a"),
        ];

        let resolver = PathResolver::new(Arc::new(LocalFs));
        let dir = resolver.lookup("emitter", &roots).await.unwrap();
        assert_eq!(dir, tmp.path().join("b").join("emitter"));
    }

    #[tokio::test]
    async fn directory_without_manifest_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("a/emitter")).unwrap();

        let resolver = PathResolver::new(Arc::new(LocalFs));
        let found = resolver
            .lookup("emitter", &[tmp.path().join("a")])
            .await;
        assert!(found.is_none());
        assert_eq!(resolver.cached_len(), 0);
    }

    #[tokio::test]
    async fn hits_are_memoized() {
        let mut fs = ProbeFs::default();
        fs.existing
            .insert(PathBuf::from("/deps/emitter").join(MANIFEST_FILE));
        let fs = Arc::new(fs);
        let resolver = PathResolver::new(fs.clone());
        let roots = vec![PathBuf::from("/deps")];

        let first = resolver.lookup("emitter", &roots).await;
        let checks = fs.checks.load(Ordering::SeqCst);
        let second = resolver.lookup("emitter", &roots).await;

        assert_eq!(first, Some(PathBuf::from("/deps/emitter")));
        assert_eq!(first, second);
        assert_eq!(checks, 1);
        assert_eq!(fs.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn misses_check_every_root() {
        let fs = Arc::new(ProbeFs::default());
        let resolver = PathResolver::new(fs.clone());
        let roots = vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")];

        assert!(resolver.lookup("foo", &roots).await.is_none());
        assert_eq!(fs.checks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clean_folds_dot_segments() {
        assert_eq!(
            clean(Path::new("/work/app/./../components/x")),
            PathBuf::from("/work/components/x")
        );
        assert_eq!(clean(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
