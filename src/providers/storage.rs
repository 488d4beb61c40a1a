use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;
use uuid::Uuid;

use crate::app_config::StorageConfig;
use crate::errors::StorageError;

use super::Storage;

/// Storage backed by a local directory
///
/// Uploaded files are copied under the root with a unique prefix. The
/// returned reference is `public_base_url/<name>` when a base URL is
/// configured and a `file://` URL otherwise.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: Option<String>,
    client: Client,
}

impl LocalStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            public_base_url: config.public_base_url.clone(),
            client: Client::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn reference_for(&self, stored: &Path, name: &str) -> Result<String, StorageError> {
        if let Some(base) = &self.public_base_url {
            return Ok(format!("{}/{}", base.trim_end_matches('/'), name));
        }
        let absolute = std::path::absolute(stored).map_err(|e| StorageError::Io(e.to_string()))?;
        Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .map_err(|_| StorageError::InvalidReference(absolute.display().to_string()))
    }

    async fn fetch(&self, url: &Url, work_dir: &Path) -> Result<PathBuf, StorageError> {
        let name = url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("download");
        let target = work_dir.join(format!("{}-{}", Uuid::new_v4().simple(), name));

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Download(format!("{} returned {}", url, response.status())));
        }

        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StorageError::Download(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| StorageError::Io(e.to_string()))?;
        }
        file.flush().await.map_err(|e| StorageError::Io(e.to_string()))?;

        info!("Downloaded {} to {:?}", url, target);
        Ok(target)
    }
}

/// Resolve a reference that points at the local file system
pub fn local_path(reference: &str) -> Result<Option<PathBuf>, StorageError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(StorageError::InvalidReference("empty reference".to_string()));
    }
    match Url::parse(reference) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(Some)
            .map_err(|_| StorageError::InvalidReference(reference.to_string())),
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(None),
        // single letters are Windows drive prefixes, not schemes
        Ok(url) if url.scheme().len() > 1 => Err(StorageError::InvalidReference(reference.to_string())),
        _ => Ok(Some(PathBuf::from(reference))),
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, local: &Path) -> Result<String, StorageError> {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidReference(local.display().to_string()))?;
        let name = format!("{}-{}", Uuid::new_v4().simple(), name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::Io(format!("cannot create {:?}: {}", self.root, e)))?;
        let stored = self.root.join(&name);
        tokio::fs::copy(local, &stored)
            .await
            .map_err(|e| StorageError::Io(format!("cannot copy {:?}: {}", local, e)))?;

        let reference = self.reference_for(&stored, &name)?;
        debug!("Uploaded {:?} as {}", local, reference);
        Ok(reference)
    }

    async fn download(&self, reference: &str, work_dir: &Path) -> Result<PathBuf, StorageError> {
        match local_path(reference)? {
            Some(path) if path.exists() => Ok(path),
            Some(path) => Err(StorageError::Io(format!("file not found: {:?}", path))),
            None => {
                let url = Url::parse(reference.trim()).map_err(|e| StorageError::InvalidReference(e.to_string()))?;
                self.fetch(&url, work_dir).await
            }
        }
    }
}
