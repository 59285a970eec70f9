//! Filesystem access used by resolution and the build pipeline.
//!
//! Every operation returns a boxed future so lookups, manifest reads and
//! asset reads can suspend and fan out without blocking each other.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::io;
use std::path::Path;

/// Asynchronous filesystem primitives.
pub trait Fs: Send + Sync + fmt::Debug {
    /// Whether `path` exists. Errors while probing count as "does not exist".
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    /// Whether `path` exists without following a trailing symlink.
    fn symlink_exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    /// Read a UTF-8 file into a string.
    fn read_to_string<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>>;

    /// Create a directory and all missing parents.
    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>>;

    /// Copy a file, overwriting `to` if it exists.
    fn copy<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>>;

    /// Create a symbolic link at `link` pointing to `target`.
    fn symlink<'a>(&'a self, target: &'a Path, link: &'a Path) -> BoxFuture<'a, io::Result<()>>;

    /// Remove a file or symlink.
    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>>;
}

/// The local filesystem, backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl Fs for LocalFs {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        async move { tokio::fs::try_exists(path).await.unwrap_or(false) }.boxed()
    }

    fn symlink_exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        async move { tokio::fs::symlink_metadata(path).await.is_ok() }.boxed()
    }

    fn read_to_string<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        tokio::fs::read_to_string(path).boxed()
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        tokio::fs::create_dir_all(path).boxed()
    }

    fn copy<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        async move { tokio::fs::copy(from, to).await.map(|_| ()) }.boxed()
    }

    fn symlink<'a>(&'a self, target: &'a Path, link: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        #[cfg(unix)]
        {
            tokio::fs::symlink(target, link).boxed()
        }
        #[cfg(windows)]
        {
            tokio::fs::symlink_file(target, link).boxed()
        }
    }

    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        tokio::fs::remove_file(path).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn exists_and_read() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let local = LocalFs;
        assert!(local.exists(&file).await);
        assert!(!local.exists(&tmp.path().join("missing")).await);
        assert_eq!(local.read_to_string(&file).await.unwrap(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_symlink_is_visible_to_lstat_only() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("link");
        let local = LocalFs;
        local
            .symlink(&tmp.path().join("nowhere"), &link)
            .await
            .unwrap();

        assert!(!local.exists(&link).await);
        assert!(local.symlink_exists(&link).await);

        local.remove_file(&link).await.unwrap();
        assert!(!local.symlink_exists(&link).await);
    }
}
