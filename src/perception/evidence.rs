use std::path::{Path, PathBuf};

use crate::errors::{MobiClawError, MobiClawResult};

/// Screenshot retention directory. Evidence references are file names inside it.
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    dir: PathBuf,
}

impl EvidenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, evidence_ref: &str) -> PathBuf {
        self.dir.join(evidence_ref)
    }

    /// Write `png` as `name` and return its evidence reference.
    pub async fn save(&self, name: &str, png: &[u8]) -> MobiClawResult<String> {
        let file_name = sanitize_file_name(name);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MobiClawError::EvidenceCaptureFailed(format!("{}: {e}", self.dir.display())))?;
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, png)
            .await
            .map_err(|e| MobiClawError::EvidenceCaptureFailed(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), bytes = png.len(), "evidence saved");
        Ok(file_name)
    }
}

/// Keeps evidence inside the retention directory whatever an action's value contains.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "evidence.png".into()
    } else {
        trimmed.to_string()
    }
}
