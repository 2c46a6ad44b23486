use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::action::ActionType;

pub const CONFIDENCE_STEP: f64 = 0.05;
pub const CONFIDENCE_MIN: f64 = 0.0;
pub const CONFIDENCE_MAX: f64 = 0.95;
pub const INITIAL_SUCCESS_CONFIDENCE: f64 = 0.7;
pub const INITIAL_FAILURE_CONFIDENCE: f64 = 0.3;

/// Screen description used when no screen analysis has happened yet.
pub const UNKNOWN_SCREEN: &str = "Current Screen";

/// (element description, screen description) pair that learning is indexed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextKey {
    pub element_description: String,
    pub screen_description: String,
}

impl ContextKey {
    pub fn new(element_description: &str, screen_description: &str) -> Self {
        Self {
            element_description: collapse_whitespace(element_description),
            screen_description: collapse_whitespace(screen_description),
        }
    }

    /// Stable string form, e.g. `Login button on screen 'Login Screen'`.
    pub fn render(&self) -> String {
        format!(
            "{} on screen '{}'",
            self.element_description, self.screen_description
        )
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bounded ±0.05 drift. Not a calibrated probability; threshold comparisons elsewhere
/// depend on these exact bounds.
pub fn nudge_confidence(current: f64, successful: bool) -> f64 {
    let next = if successful {
        current + CONFIDENCE_STEP
    } else {
        current - CONFIDENCE_STEP
    };
    next.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// One observation stream for a single context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub action_type: ActionType,
    pub locator: Option<String>,
    pub successful: bool,
    pub error_detail: Option<String>,
    pub correction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEntry {
    pub id: Uuid,
    /// `ContextKey::render()` of `key`.
    pub context: String,
    pub key: ContextKey,
    pub action_type: ActionType,
    pub successful: bool,
    pub error_details: Option<String>,
    pub correction: Option<String>,
    /// Locator that worked or was attempted.
    pub element_identifier: Option<String>,
    pub use_count: u32,
    confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearningEntry {
    pub fn first_observation(key: ContextKey, obs: Observation) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            context: key.render(),
            key,
            action_type: obs.action_type,
            successful: obs.successful,
            error_details: obs.error_detail,
            correction: obs.correction,
            element_identifier: obs.locator,
            use_count: 1,
            confidence: if obs.successful {
                INITIAL_SUCCESS_CONFIDENCE
            } else {
                INITIAL_FAILURE_CONFIDENCE
            },
            created_at: now,
            updated_at: now,
        }
    }

    /// In-place update for a repeat context.
    pub fn observe(&mut self, obs: Observation) {
        self.successful = obs.successful;
        self.action_type = obs.action_type;
        if !obs.successful {
            self.error_details = obs.error_detail;
            if obs.correction.is_some() {
                self.correction = obs.correction;
            }
        }
        if obs.locator.is_some() {
            self.element_identifier = obs.locator;
        }
        self.use_count = self.use_count.saturating_add(1);
        self.confidence = nudge_confidence(self.confidence, self.successful);
        self.updated_at = Utc::now();
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Last outcome was a failure for which a fix is known.
    pub fn is_correction(&self) -> bool {
        !self.successful
            && self
                .correction
                .as_deref()
                .map_or(false, |c| !c.trim().is_empty())
    }
}
