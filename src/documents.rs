use crate::identity::CurrentUser;
use crate::types::{PalaverError, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocumentId(pub String);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub name: String,
    pub owner_id: UserId,
    pub visibility: Visibility,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub digest: String,
}

/// Knowledge-base document storage: blobs on the filesystem under
/// `<root>/blobs/`, metadata as a flat JSON list at `<root>/documents.json`.
/// No relational integrity beyond id uniqueness.
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("documents.json")
    }

    fn blob_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join("blobs").join(&id.0)
    }

    async fn read_index(&self) -> Result<Vec<DocumentMeta>> {
        match tokio::fs::read(self.index_path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PalaverError::Io(e).into()),
        }
    }

    async fn write_index(&self, docs: &[DocumentMeta]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(docs)?;
        let tmp = self.root.join("documents.json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, self.index_path()).await?;
        Ok(())
    }

    pub async fn put(
        &self,
        bytes: &[u8],
        name: &str,
        owner: &UserId,
        visibility: Visibility,
    ) -> Result<DocumentMeta> {
        tokio::fs::create_dir_all(self.root.join("blobs")).await?;

        let id = DocumentId(Uuid::new_v4().to_string());
        let mut docs = self.read_index().await?;
        // Uuid collisions do not happen in practice; the check keeps the
        // uniqueness contract honest anyway.
        if docs.iter().any(|d| d.id == id) {
            return Err(PalaverError::Internal(
                format!("duplicate document id {}", id),
                tracing_error::SpanTrace::capture(),
            )
            .into());
        }

        let meta = DocumentMeta {
            id: id.clone(),
            name: name.to_string(),
            owner_id: owner.clone(),
            visibility,
            size: bytes.len() as u64,
            created_at: Utc::now(),
            digest: format!("{:x}", Sha256::digest(bytes)),
        };

        tokio::fs::write(self.blob_path(&id), bytes).await?;
        docs.push(meta.clone());
        if let Err(e) = self.write_index(&docs).await {
            // The index is the source of truth; an unindexed blob must not
            // survive a failed put.
            if let Err(cleanup) = tokio::fs::remove_file(self.blob_path(&id)).await {
                tracing::warn!(
                    "[DOCS] Failed to remove blob {} after index write error: {}",
                    id,
                    cleanup
                );
            }
            return Err(e);
        }

        tracing::info!(
            "[DOCS] Stored '{}' ({} bytes) as {} for {}",
            name,
            bytes.len(),
            meta.id,
            owner.0
        );
        Ok(meta)
    }

    pub async fn get(&self, id: &DocumentId) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(self.blob_path(id)).await?;
        Ok(bytes)
    }

    pub async fn meta(&self, id: &DocumentId) -> Result<Option<DocumentMeta>> {
        let docs = self.read_index().await?;
        Ok(docs.into_iter().find(|d| &d.id == id))
    }

    /// Admins see everything; everyone else sees public documents plus their
    /// own.
    pub async fn list_visible(&self, user: &CurrentUser) -> Result<Vec<DocumentMeta>> {
        let docs = self.read_index().await?;
        if user.is_admin() {
            return Ok(docs);
        }
        Ok(docs
            .into_iter()
            .filter(|d| d.visibility == Visibility::Public || d.owner_id == user.id)
            .collect())
    }

    /// Removes blob and metadata. Returns whether the document existed.
    pub async fn delete(&self, id: &DocumentId) -> Result<bool> {
        let mut docs = self.read_index().await?;
        let before = docs.len();
        docs.retain(|d| &d.id != id);
        if docs.len() == before {
            return Ok(false);
        }
        self.write_index(&docs).await?;
        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("[DOCS] Blob for {} already missing on delete", id);
            }
            Err(e) => return Err(PalaverError::Io(e).into()),
        }
        Ok(true)
    }
}
