use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{MobiClawError, MobiClawResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl InstructionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstructionStatus::Completed | InstructionStatus::Failed)
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstructionStatus::Pending => "PENDING",
            InstructionStatus::InProgress => "IN_PROGRESS",
            InstructionStatus::Completed => "COMPLETED",
            InstructionStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl FromStr for InstructionStatus {
    type Err = MobiClawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(InstructionStatus::Pending),
            "IN_PROGRESS" => Ok(InstructionStatus::InProgress),
            "COMPLETED" => Ok(InstructionStatus::Completed),
            "FAILED" => Ok(InstructionStatus::Failed),
            other => Err(MobiClawError::Config(format!("unknown instruction status '{other}'"))),
        }
    }
}

/// One natural-language test directive and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: Uuid,
    text: String,
    pub status: InstructionStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
}

impl Instruction {
    pub fn new(text: impl Into<String>) -> MobiClawResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(MobiClawError::InvalidInstruction(
                "instruction text cannot be blank".into(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text,
            status: InstructionStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            result: None,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn start(&mut self) {
        self.status = InstructionStatus::InProgress;
        self.processed_at = None;
        self.result = None;
    }

    pub fn finish(&mut self, status: InstructionStatus, result: impl Into<String>) {
        self.status = status;
        self.result = Some(result.into());
        self.processed_at = Some(Utc::now());
    }
}
