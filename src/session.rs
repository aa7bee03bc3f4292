use crate::types::{Result, SessionId, Transcript};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    transcript: Transcript,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub turn_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Flat-file persistence of transcript snapshots, keyed by session id. One
/// JSON document holds the whole listing; writes go through a sibling temp
/// file and an atomic rename so a crash never leaves a half-written store.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, SessionRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(crate::types::PalaverError::Io(e).into()),
        }
    }

    async fn write_all(&self, sessions: &BTreeMap<String, SessionRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(sessions)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub async fn save(&self, id: &SessionId, transcript: &Transcript) -> Result<()> {
        let mut sessions = self.read_all().await?;
        sessions.insert(
            id.0.clone(),
            SessionRecord {
                transcript: transcript.clone(),
                updated_at: Utc::now(),
            },
        );
        self.write_all(&sessions).await?;
        tracing::debug!(
            "[SESSIONS] Saved {} ({} turns)",
            id.short(),
            transcript.turns.len()
        );
        Ok(())
    }

    pub async fn load(&self, id: &SessionId) -> Result<Option<Transcript>> {
        let sessions = self.read_all().await?;
        Ok(sessions.get(&id.0).map(|r| r.transcript.clone()))
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self.read_all().await?;
        let mut out: Vec<SessionSummary> = sessions
            .into_iter()
            .map(|(id, record)| SessionSummary {
                id: SessionId(id),
                turn_count: record.transcript.turns.len(),
                updated_at: record.updated_at,
            })
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    /// Returns whether the session existed.
    pub async fn delete(&self, id: &SessionId) -> Result<bool> {
        let mut sessions = self.read_all().await?;
        let existed = sessions.remove(&id.0).is_some();
        if existed {
            self.write_all(&sessions).await?;
        }
        Ok(existed)
    }
}
