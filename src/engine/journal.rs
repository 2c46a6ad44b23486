use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::MobiClawResult;
use crate::model::{Action, ActionType, Instruction, InstructionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    Action {
        ts: DateTime<Utc>,
        instruction_id: Uuid,
        sequence: u32,
        action_type: ActionType,
        description: String,
        locator: Option<String>,
        successful: bool,
        error: Option<String>,
        evidence: Option<String>,
    },
    Instruction {
        ts: DateTime<Utc>,
        instruction_id: Uuid,
        text: String,
        status: InstructionStatus,
        result: Option<String>,
    },
}

impl JournalEntry {
    pub fn for_action(action: &Action) -> Self {
        JournalEntry::Action {
            ts: action.executed_at.unwrap_or_else(Utc::now),
            instruction_id: action.instruction_id,
            sequence: action.sequence,
            action_type: action.action_type,
            description: action.element_description.clone(),
            locator: action.element_locator.clone(),
            successful: action.successful,
            error: action.error_message.clone(),
            evidence: action.screenshot.clone(),
        }
    }

    pub fn for_instruction(instruction: &Instruction) -> Self {
        JournalEntry::Instruction {
            ts: instruction.processed_at.unwrap_or_else(Utc::now),
            instruction_id: instruction.id,
            text: instruction.text().to_string(),
            status: instruction.status,
            result: instruction.result.clone(),
        }
    }
}

/// Append-only JSONL record of executions.
pub struct ExecutionJournal {
    file_path: PathBuf,
}

impl ExecutionJournal {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// `<local data dir>/mobiclaw/journal/executions.jsonl`
    pub fn in_data_dir() -> Self {
        Self::new(crate::config::data_dir().join("journal").join("executions.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub async fn append(&self, entry: &JournalEntry) -> MobiClawResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        if let Some(dir) = self.file_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        tracing::debug!(path = %self.file_path.display(), "journal entry appended");
        Ok(())
    }

    /// Like `append`, but failures are only logged.
    pub async fn record(&self, entry: &JournalEntry) {
        if let Err(e) = self.append(entry).await {
            tracing::warn!(path = %self.file_path.display(), error = %e, "journal write failed");
        }
    }
}
