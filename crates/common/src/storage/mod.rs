//! File Store
//!
//! A flat directory of uploaded binaries keyed by their generated filename.
//! Writes never overwrite: an existing name is reported as a duplicate so the
//! filename uniqueness invariant holds on disk as well as in the catalog.

mod naming;

pub use naming::{sanitize_stem, unique_filename, NameGenerator, RandomSuffix, SUFFIX_LEN};

use crate::errors::{AppError, PersistenceFailure, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

/// Storage backend for paper binaries
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stream `data` into a new object called `name`, returning bytes written.
    ///
    /// Fails with `Persistence { DuplicateFilename }` if `name` exists and with
    /// `StorageWrite` on I/O failure. A failed write leaves nothing behind.
    async fn write(&self, name: &str, data: &mut (dyn AsyncRead + Unpin + Send)) -> Result<u64>;

    /// Read an object back; `NotFound` if it does not exist
    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    async fn exists(&self, name: &str) -> Result<bool>;
}

/// Filesystem storage backend rooted at a single directory
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Open the store, creating the root directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| AppError::Configuration {
            message: format!("cannot create upload directory {}: {}", root.display(), e),
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Readiness probe: the root must still be a directory
    pub async fn check(&self) -> Result<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(AppError::Internal {
                message: format!("{} is not a directory", self.root.display()),
            });
        }
        Ok(())
    }

    /// Map an object name to its path, rejecting anything that is not a
    /// single plain path component
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        if !single_normal || name.contains('\\') || name.contains('\0') {
            return Err(AppError::invalid_field(
                "filename",
                format!("'{}' is not a valid stored filename", name),
            ));
        }

        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for FilesystemStore {
    async fn write(&self, name: &str, data: &mut (dyn AsyncRead + Unpin + Send)) -> Result<u64> {
        let path = self.resolve(name)?;
        debug!(filename = %name, path = %path.display(), "file_store: write");

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(filename = %name, "file_store: name already taken");
                return Err(AppError::Persistence {
                    kind: PersistenceFailure::DuplicateFilename,
                    message: format!("'{}' already exists in the file store", name),
                });
            }
            Err(e) => {
                warn!(filename = %name, error = %e, "file_store: create failed");
                return Err(AppError::StorageWrite {
                    message: format!("create {}: {}", name, e),
                });
            }
        };

        let written = async {
            let n = tokio::io::copy(data, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(n)
        }
        .await;
        drop(file);

        let written = match written {
            Ok(n) => n,
            Err(e) => {
                warn!(filename = %name, error = %e, "file_store: write failed, removing partial file");
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!(filename = %name, error = %cleanup, "file_store: partial file cleanup failed");
                }
                return Err(AppError::StorageWrite {
                    message: format!("write {}: {}", name, e),
                });
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).await {
                warn!(filename = %name, error = %e, "file_store: set_permissions failed");
            }
        }

        Ok(written)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound {
                resource_type: "file".to_string(),
                id: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.resolve(name)?;
        Ok(fs::try_exists(path).await?)
    }
}
