use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of device operations an instruction can be planned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Tap,
    LongPress,
    Type,
    Clear,
    Swipe,
    Scroll,
    Back,
    VerifyText,
    VerifyElement,
    Wait,
    LaunchApp,
    CloseApp,
    TakeScreenshot,
}

impl ActionType {
    pub const ALL: [ActionType; 13] = [
        ActionType::Tap,
        ActionType::LongPress,
        ActionType::Type,
        ActionType::Clear,
        ActionType::Swipe,
        ActionType::Scroll,
        ActionType::Back,
        ActionType::VerifyText,
        ActionType::VerifyElement,
        ActionType::Wait,
        ActionType::LaunchApp,
        ActionType::CloseApp,
        ActionType::TakeScreenshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Tap => "TAP",
            ActionType::LongPress => "LONG_PRESS",
            ActionType::Type => "TYPE",
            ActionType::Clear => "CLEAR",
            ActionType::Swipe => "SWIPE",
            ActionType::Scroll => "SCROLL",
            ActionType::Back => "BACK",
            ActionType::VerifyText => "VERIFY_TEXT",
            ActionType::VerifyElement => "VERIFY_ELEMENT",
            ActionType::Wait => "WAIT",
            ActionType::LaunchApp => "LAUNCH_APP",
            ActionType::CloseApp => "CLOSE_APP",
            ActionType::TakeScreenshot => "TAKE_SCREENSHOT",
        }
    }

    /// Kinds that act on a concrete on-screen element.
    pub fn targets_element(&self) -> bool {
        matches!(
            self,
            ActionType::Tap
                | ActionType::LongPress
                | ActionType::Type
                | ActionType::Clear
                | ActionType::VerifyText
                | ActionType::VerifyElement
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActionType(pub String);

impl fmt::Display for UnknownActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action type '{}'", self.0)
    }
}

impl std::error::Error for UnknownActionType {}

impl FromStr for ActionType {
    type Err = UnknownActionType;

    /// Accepts the canonical names case-insensitively; `long-press` and `long press`
    /// are read as `LONG_PRESS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        ActionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownActionType(s.to_string()))
    }
}

/// One atomic device operation belonging to an instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub instruction_id: Uuid,
    pub action_type: ActionType,
    /// Resolved locator; set by the resolver when absent at plan time.
    pub element_locator: Option<String>,
    pub element_description: String,
    pub value: Option<String>,
    /// 1-based position in the instruction's plan.
    pub sequence: u32,
    pub successful: bool,
    pub error_message: Option<String>,
    /// Evidence reference (screenshot file) captured after the attempt.
    pub screenshot: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Action {
    pub fn new(
        instruction_id: Uuid,
        action_type: ActionType,
        element_description: impl Into<String>,
        value: Option<String>,
        sequence: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instruction_id,
            action_type,
            element_locator: None,
            element_description: element_description.into(),
            value,
            sequence,
            successful: false,
            error_message: None,
            screenshot: None,
            executed_at: None,
        }
    }

    pub fn needs_resolution(&self) -> bool {
        self.action_type.targets_element()
            && self
                .element_locator
                .as_deref()
                .map_or(true, |l| l.trim().is_empty())
    }

    /// Trimmed value, or `None` when absent or blank.
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn has_outcome(&self) -> bool {
        self.executed_at.is_some()
    }

    pub fn apply_outcome(&mut self, outcome: &ActionOutcome) {
        self.successful = outcome.successful;
        self.error_message = outcome.error_message.clone();
        self.screenshot = outcome.evidence_ref.clone();
        self.executed_at = Some(outcome.finished_at);
    }

    /// "3: TAP on Login button"
    pub fn label(&self) -> String {
        format!(
            "{}: {} on {}",
            self.sequence, self.action_type, self.element_description
        )
    }
}

/// Result of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub successful: bool,
    pub error_message: Option<String>,
    pub evidence_ref: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn succeeded(evidence_ref: Option<String>) -> Self {
        Self {
            successful: true,
            error_message: None,
            evidence_ref,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>, evidence_ref: Option<String>) -> Self {
        Self {
            successful: false,
            error_message: Some(error.into()),
            evidence_ref,
            finished_at: Utc::now(),
        }
    }
}
