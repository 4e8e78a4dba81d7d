//! File-backed asset catalog.
//!
//! Assets are described by a JSON document; their originals live under the
//! public directory the same way the host serves `/uploads/...` URLs.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use alttext_core::{Asset, AssetCatalog, AssetId, AssetStore, NewAsset};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    #[serde(default)]
    next_id: AssetId,
    #[serde(default)]
    assets: BTreeMap<AssetId, Asset>,
}

impl CatalogDocument {
    fn allocate_id(&mut self) -> AssetId {
        let highest = self.assets.keys().next_back().copied().unwrap_or(0);
        let id = self.next_id.max(highest + 1).max(1);
        self.next_id = id + 1;
        id
    }
}

/// Asset catalog persisted as a JSON document on disk.
pub struct FsAssetStore {
    catalog_path: PathBuf,
    public_dir: PathBuf,
    document: RwLock<CatalogDocument>,
}

impl FsAssetStore {
    /// Open the catalog at `catalog_path`, resolving files under `public_dir`.
    ///
    /// A missing document yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Io`] when the document cannot be read and
    /// [`MediaError::Catalog`] when it is malformed.
    pub async fn open(
        catalog_path: impl Into<PathBuf>,
        public_dir: impl Into<PathBuf>,
    ) -> MediaResult<Self> {
        let catalog_path = catalog_path.into();
        let document = match fs::read(&catalog_path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| MediaError::Catalog {
                    operation: "catalog.decode",
                    source,
                })?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %catalog_path.display(), "asset catalog absent; starting empty");
                CatalogDocument::default()
            }
            Err(source) => {
                return Err(MediaError::Io {
                    operation: "catalog.read",
                    path: catalog_path,
                    source,
                });
            }
        };
        Ok(Self {
            catalog_path,
            public_dir: public_dir.into(),
            document: RwLock::new(document),
        })
    }

    /// Location of the catalog document.
    #[must_use]
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Map an asset URL to a file on disk.
    ///
    /// `/uploads/...` resolves under `<public_dir>/uploads`, other absolute
    /// paths are used as-is, and relative paths resolve under `public_dir`.
    #[must_use]
    pub fn resolve_path(&self, url: &str) -> PathBuf {
        if let Some(relative) = url.strip_prefix(UPLOADS_PREFIX) {
            return self.public_dir.join("uploads").join(relative);
        }
        let path = Path::new(url);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.public_dir.join(path)
        }
    }

    /// Apply `change` to a copy of the catalog and swap it in once it is on disk.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut CatalogDocument) -> MediaResult<T>,
    ) -> MediaResult<T> {
        let mut document = self.document.write().await;
        let mut staged = document.clone();
        let value = change(&mut staged)?;
        self.persist(&staged).await?;
        *document = staged;
        Ok(value)
    }

    async fn persist(&self, document: &CatalogDocument) -> MediaResult<()> {
        if let Some(parent) = self.catalog_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| MediaError::Io {
                    operation: "catalog.create_dir",
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let payload = serde_json::to_vec_pretty(document).map_err(|source| MediaError::Catalog {
            operation: "catalog.encode",
            source,
        })?;
        let staging = self.catalog_path.with_extension("json.tmp");
        fs::write(&staging, payload)
            .await
            .map_err(|source| MediaError::Io {
                operation: "catalog.write",
                path: staging.clone(),
                source,
            })?;
        fs::rename(&staging, &self.catalog_path)
            .await
            .map_err(|source| MediaError::Io {
                operation: "catalog.rename",
                path: self.catalog_path.clone(),
                source,
            })
    }
}

fn escapes_root(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::ParentDir))
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn find_asset(&self, id: AssetId) -> anyhow::Result<Option<Asset>> {
        Ok(self.document.read().await.assets.get(&id).cloned())
    }

    async fn read_image(&self, asset: &Asset) -> anyhow::Result<Vec<u8>> {
        let path = self.resolve_path(&asset.url);
        if escapes_root(&path) {
            return Err(MediaError::MissingFile { path }.into());
        }
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(MediaError::MissingFile { path }.into())
            }
            Err(source) => Err(MediaError::Io {
                operation: "asset.read",
                path,
                source,
            }
            .into()),
        }
    }

    async fn write_alt_text(&self, id: AssetId, text: &str) -> anyhow::Result<()> {
        self.commit(|document| {
            let asset = document
                .assets
                .get_mut(&id)
                .ok_or(MediaError::UnknownAsset { asset_id: id })?;
            asset.alternative_text = Some(text.to_string());
            Ok(())
        })
        .await?;
        debug!(asset_id = id, "alt text saved");
        Ok(())
    }
}

#[async_trait]
impl AssetCatalog for FsAssetStore {
    async fn list_assets(&self) -> anyhow::Result<Vec<Asset>> {
        Ok(self.document.read().await.assets.values().cloned().collect())
    }

    async fn register_asset(&self, asset: NewAsset) -> anyhow::Result<Asset> {
        let registered = self
            .commit(|document| {
                let id = document.allocate_id();
                let registered = Asset {
                    id,
                    name: asset.name,
                    mime: asset.mime,
                    url: asset.url,
                    formats: asset.formats,
                    alternative_text: None,
                };
                document.assets.insert(id, registered.clone());
                Ok(registered)
            })
            .await?;
        info!(asset_id = registered.id, name = %registered.name, "asset registered");
        Ok(registered)
    }
}
