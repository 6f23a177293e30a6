//! Filesystem-backed binary storage for asset payloads.
//!
//! Binaries live under `<root>/<project id>/<asset id>` with no extension;
//! the asset row carries the original file name and mime type. The root
//! directory is configured by the host.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn asset_path(&self, project_id: &str, asset_id: &str) -> PathBuf {
        self.root.join(project_id).join(asset_id)
    }

    /// Creates the storage namespace for a project if it does not exist.
    pub async fn ensure_project_dir(&self, project_id: &str) -> io::Result<()> {
        fs::create_dir_all(self.root.join(project_id)).await
    }

    pub async fn exists(&self, project_id: &str, asset_id: &str) -> io::Result<bool> {
        fs::try_exists(self.asset_path(project_id, asset_id)).await
    }

    pub async fn read(&self, project_id: &str, asset_id: &str) -> io::Result<Vec<u8>> {
        fs::read(self.asset_path(project_id, asset_id)).await
    }

    pub async fn write(&self, project_id: &str, asset_id: &str, bytes: &[u8]) -> io::Result<()> {
        self.ensure_project_dir(project_id).await?;
        fs::write(self.asset_path(project_id, asset_id), bytes).await
    }

    pub async fn delete(&self, project_id: &str, asset_id: &str) -> io::Result<()> {
        fs::remove_file(self.asset_path(project_id, asset_id)).await
    }
}
