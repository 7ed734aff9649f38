//! Out-of-band storage of uploaded files.
//!
//! Files are written to `<upload root>/<kind dir>/<file name>` and exposed
//! under the public [`UploadLayout`] path the client predicted when it built
//! the details record. Names are kept as uploaded, so they must be a single
//! plain path component.

use std::path::PathBuf;

use offer_flow::files::FileKind;
use offer_flow::payload::UploadLayout;
use tracing::{debug, warn};

use crate::errors::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    public: UploadLayout,
}

/// Accept `name` only when it is one plain path component.
pub fn checked_file_name(name: &str) -> Result<&str> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(ApiError::BadRequest(format!("Unacceptable file name {name:?}")));
    }
    Ok(name)
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public: UploadLayout::default(),
        }
    }

    pub fn layout(&self) -> &UploadLayout {
        &self.public
    }

    /// Public path a file of `kind` named `name` is served under.
    pub fn public_path(&self, kind: FileKind, name: &str) -> Result<String> {
        Ok(self.public.path_for(kind, checked_file_name(name)?))
    }

    fn disk_path(&self, kind: FileKind, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(kind.dir()).join(checked_file_name(name)?))
    }

    /// Write `bytes` and return the public path.
    pub async fn save(&self, kind: FileKind, name: &str, bytes: &[u8]) -> Result<String> {
        let path = self.disk_path(kind, name)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "stored upload");
        self.public_path(kind, name)
    }

    /// Delete the file behind a public path. Missing files are ignored.
    pub async fn remove(&self, public_path: &str) {
        let Some(disk) = self.resolve(public_path) else {
            warn!("Refusing to remove {public_path}: not an upload path");
            return;
        };
        match tokio::fs::remove_file(&disk).await {
            Ok(()) => debug!(path = %disk.display(), "removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {e}", disk.display()),
        }
    }

    /// Map a public path back to its location on disk.
    fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let rest = public_path.strip_prefix(self.public.root())?.strip_prefix('/')?;
        let (dir, name) = rest.split_once('/')?;
        let kind = FileKind::ALL.into_iter().find(|k| k.dir() == dir)?;
        self.disk_path(kind, name).ok()
    }
}
