//! Local directory backend: logical paths are files under a root directory.

use crate::content::{BlobReader, Content};
use crate::context::Context;
use crate::error::{Result, StorageError};
use crate::public_url::PublicUrl;
use crate::storage::{Stat, Storage};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, DirBuilder, File};
use tokio::io::AsyncWriteExt;

pub struct LocalFsStorage {
    root: PathBuf,
    public_url: Option<PublicUrl>,
}

impl LocalFsStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_url: None,
        }
    }

    pub fn with_public_url(mut self, public_url: PublicUrl) -> Self {
        self.public_url = Some(public_url);
        self
    }

    /// Maps `path` to a file under the root. The path is checked lexically
    /// first, then resolved against the filesystem so that no symbolic link
    /// can lead outside the root.
    async fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = relative_path(path)?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || confine(&root, &rel))
            .await
            .map_err(io::Error::other)?
    }
}

/// Normalizes `path` to a relative path. `..` segments are applied
/// lexically and may not climb above the root.
fn relative_path(path: &str) -> Result<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(StorageError::InvalidPath(format!(
                        "{path} escapes the storage root"
                    )));
                }
            }
            Component::Prefix(_) => {
                return Err(StorageError::InvalidPath(format!(
                    "{path} is not a relative path"
                )));
            }
        }
    }
    if parts.is_empty() {
        return Err(StorageError::InvalidPath(format!("{path:?} names no file")));
    }
    Ok(parts.into_iter().collect())
}

/// Joins `rel` to `root`, failing when following the symlinks on the way
/// would land anywhere other than the plain join.
fn confine(root: &Path, rel: &Path) -> Result<PathBuf> {
    let root = match root.canonicalize() {
        Ok(root) => root,
        // an absent root holds no links yet
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(root.join(rel)),
        Err(e) => return Err(e.into()),
    };
    let lexical = root.join(rel);
    let scoped = safe_path::scoped_join(&root, rel)?;
    if scoped != lexical {
        return Err(StorageError::InvalidPath(format!(
            "{} crosses a symbolic link",
            rel.display()
        )));
    }
    Ok(lexical)
}

fn not_exist(e: io::Error) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::NotExist
    } else {
        StorageError::Io(e)
    }
}

async fn create_parent_dirs(path: &Path) -> io::Result<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(dir).await
}

#[async_trait]
impl Storage for LocalFsStorage {
    async fn save(&self, ctx: &Context, content: Content, path: &str) -> Result<()> {
        let abs = self.resolve(path).await?;
        tracing::debug!("localfs save {}", abs.display());
        ctx.run(async {
            create_parent_dirs(&abs).await?;
            let mut file = File::create(&abs).await?;
            let mut reader = content.into_reader();
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            tracing::debug!("localfs wrote {written} bytes to {}", abs.display());
            Ok(())
        })
        .await
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<Stat> {
        let abs = self.resolve(path).await?;
        let meta = ctx
            .run(async { fs::metadata(&abs).await.map_err(not_exist) })
            .await?;
        if meta.is_dir() {
            return Err(StorageError::NotExist);
        }
        Ok(Stat {
            modified_time: meta.modified()?,
            size: meta.len(),
        })
    }

    async fn open(&self, ctx: &Context, path: &str) -> Result<BlobReader> {
        let abs = self.resolve(path).await?;
        let file = ctx
            .run(async {
                let file = File::open(&abs).await.map_err(not_exist)?;
                if file.metadata().await?.is_dir() {
                    return Err(StorageError::NotExist);
                }
                Ok(file)
            })
            .await?;
        Ok(Box::pin(file))
    }

    fn url(&self, path: &str) -> Option<String> {
        self.public_url.as_ref().map(|u| u.url_for(path))
    }

    /// Removes the file. A missing file is reported as the native
    /// `io::ErrorKind::NotFound` error, not as `NotExist`.
    async fn delete(&self, ctx: &Context, path: &str) -> Result<()> {
        let abs = self.resolve(path).await?;
        tracing::debug!("localfs delete {}", abs.display());
        ctx.run(async { Ok(fs::remove_file(&abs).await?) }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_relative_path_normalizes() {
        assert_eq!(
            relative_path("a/b/c.txt").unwrap(),
            PathBuf::from("a/b/c.txt")
        );
        assert_eq!(relative_path("/abs/key").unwrap(), PathBuf::from("abs/key"));
        assert_eq!(relative_path("a/./../b").unwrap(), PathBuf::from("b"));
    }

    #[test]
    fn test_relative_path_rejects_escapes() {
        for bad in ["../x", "a/../../x", "..", "", ".", "a/.."] {
            let err = relative_path(bad).unwrap_err();
            assert!(matches!(err, StorageError::InvalidPath(_)), "{bad}: {err}");
        }
    }

    #[tokio::test]
    async fn test_resolve_missing_root_is_lexical() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("not-yet");
        let store = LocalFsStorage::new(&root);
        assert_eq!(store.resolve("a/b").await.unwrap(), root.join("a/b"));
    }

    #[tokio::test]
    async fn test_localfs_save_stat_open_delete() {
        let tmp = tempdir().unwrap();
        let store = LocalFsStorage::new(tmp.path());
        let ctx = Context::background();

        let err = store.stat(&ctx, "world").await.unwrap_err();
        assert!(err.is_not_exist());
        assert!(store.open(&ctx, "world").await.err().is_some_and(|e| e.is_not_exist()));

        let before = SystemTime::now() - Duration::from_secs(1);
        store.save(&ctx, Content::from("hello"), "world").await.unwrap();
        let after = SystemTime::now() + Duration::from_secs(1);

        let st = store.stat(&ctx, "world").await.unwrap();
        assert_eq!(st.size, 5);
        assert!(st.modified_time >= before && st.modified_time <= after);

        let mut out = String::new();
        let mut reader = store.open(&ctx, "world").await.unwrap();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello");
        drop(reader);

        store.delete(&ctx, "world").await.unwrap();
        assert!(store.stat(&ctx, "world").await.unwrap_err().is_not_exist());
    }

    #[tokio::test]
    async fn test_localfs_save_creates_parents_and_truncates() {
        let tmp = tempdir().unwrap();
        let store = LocalFsStorage::new(tmp.path());
        let ctx = Context::background();

        store.save(&ctx, Content::from("hello"), "a/b/c").await.unwrap();
        store
            .save(&ctx, Content::from_reader(&b"hi"[..]), "a/b/c")
            .await
            .unwrap();

        assert_eq!(store.size(&ctx, "a/b/c").await.unwrap(), 2);
        assert_eq!(store.read(&ctx, "a/b/c").await.unwrap(), b"hi");
        assert!(tmp.path().join("a/b/c").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_localfs_parent_dir_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let store = LocalFsStorage::new(tmp.path());
        store
            .save(&Context::background(), Content::from("x"), "dir/blob")
            .await
            .unwrap();
        let mode = std::fs::metadata(tmp.path().join("dir"))
            .unwrap()
            .permissions()
            .mode();
        // umask may only clear bits
        assert_eq!(mode & !0o755 & 0o777, 0);
    }

    #[tokio::test]
    async fn test_localfs_delete_missing_is_native_error() {
        let tmp = tempdir().unwrap();
        let store = LocalFsStorage::new(tmp.path());
        let err = store
            .delete(&Context::background(), "missing")
            .await
            .unwrap_err();
        match err {
            StorageError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_localfs_directory_is_not_a_blob() {
        let tmp = tempdir().unwrap();
        let store = LocalFsStorage::new(tmp.path());
        let ctx = Context::background();
        store.save(&ctx, Content::from("x"), "dir/blob").await.unwrap();
        assert!(store.stat(&ctx, "dir").await.unwrap_err().is_not_exist());
        assert!(store.open(&ctx, "dir").await.err().is_some_and(|e| e.is_not_exist()));
        assert!(!store.exists(&ctx, "dir").await.unwrap());
        assert!(store.exists(&ctx, "dir/blob").await.unwrap());
    }

    #[tokio::test]
    async fn test_localfs_cancelled_context() {
        let tmp = tempdir().unwrap();
        let store = LocalFsStorage::new(tmp.path());
        let ctx = Context::background();
        ctx.cancel();

        let err = store.save(&ctx, Content::from("x"), "blob").await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
        assert!(!tmp.path().join("blob").exists());
        assert!(matches!(
            store.stat(&ctx, "blob").await.unwrap_err(),
            StorageError::Cancelled
        ));
    }

    #[tokio::test]
    async fn test_localfs_rejects_traversal() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        let store = LocalFsStorage::new(&root);
        let err = store
            .save(&Context::background(), Content::from("x"), "../outside")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
        assert!(!tmp.path().join("outside").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_localfs_rejects_symlink_out_of_root() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        let outside = tmp.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret"), "s").unwrap();
        std::os::unix::fs::symlink("../outside", root.join("link")).unwrap();

        let store = LocalFsStorage::new(&root);
        let ctx = Context::background();
        let err = store
            .save(&ctx, Content::from("pwn"), "link/f")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)), "{err}");
        assert!(!outside.join("f").exists());

        assert!(matches!(
            store.stat(&ctx, "link/secret").await.unwrap_err(),
            StorageError::InvalidPath(_)
        ));
        assert!(matches!(
            store.open(&ctx, "link/secret").await.err(),
            Some(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.delete(&ctx, "link/secret").await.unwrap_err(),
            StorageError::InvalidPath(_)
        ));
        assert!(outside.join("secret").exists());
    }

    #[tokio::test]
    async fn test_localfs_url() {
        let tmp = tempdir().unwrap();
        let store = LocalFsStorage::new(tmp.path());
        assert_eq!(store.url("test"), None);

        let store = store.with_public_url(PublicUrl::new("http://example.com", "media").unwrap());
        assert_eq!(
            store.url("test").as_deref(),
            Some("http://example.com/media/test")
        );
    }
}
