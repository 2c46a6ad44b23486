//! Single-action execution: resolve if needed, attempt, capture evidence, report to learning.
pub mod dispatch;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::driver::DeviceDriver;
use crate::errors::{MobiClawError, MobiClawResult};
use crate::learning::LearningStore;
use crate::model::{Action, ActionOutcome, ContextKey, Observation, UNKNOWN_SCREEN};
use crate::perception::{EvidenceStore, ScreenEvidence};
use crate::resolver::{ElementResolver, Resolution};

use dispatch::{handler_for, ActionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPhase {
    Resolving,
    Attempting,
    Succeeded,
    Failed,
}

/// Result of the attempt phase, before it is folded into an `ActionOutcome`.
struct Attempt {
    result: MobiClawResult<()>,
    /// Locator that first failed when an alternate ended up working.
    replaced: Option<(String, MobiClawError)>,
}

pub struct ActionExecutor {
    resolver: Arc<ElementResolver>,
    learning: Arc<LearningStore>,
    evidence: EvidenceStore,
    wait_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(
        resolver: Arc<ElementResolver>,
        learning: Arc<LearningStore>,
        evidence: EvidenceStore,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            learning,
            evidence,
            wait_timeout,
        }
    }

    /// Runs `action` once against `driver` and writes the outcome onto it.
    ///
    /// `last_screen` carries the most recent screen description across the actions of one
    /// instruction. Driver errors never escape: they become a failed outcome.
    pub async fn execute(
        &self,
        action: &mut Action,
        driver: &dyn DeviceDriver,
        last_screen: &mut Option<String>,
    ) -> ActionOutcome {
        let before = self.capture(driver, &format!("before_{}.png", action.id)).await;

        let mut resolution: Option<Resolution> = None;
        if action.needs_resolution() {
            trace_phase(action, ActionPhase::Resolving);
            let screen = ScreenEvidence {
                evidence_ref: before.as_ref().map(|(r, _)| r.clone()),
                screenshot: before.map(|(_, png)| png),
                screen_description: last_screen.clone(),
            };
            let r = self.resolver.resolve(action, &screen).await;
            action.element_locator = Some(r.locator.clone());
            if let Some(desc) = &r.matched_description {
                action.element_description = desc.clone();
            }
            *last_screen = Some(r.screen_description.clone());
            resolution = Some(r);
        }

        trace_phase(action, ActionPhase::Attempting);
        let alternates = resolution
            .as_ref()
            .map(|r| r.alternates.as_slice())
            .unwrap_or_default();
        let attempt = self.attempt(action, driver, alternates).await;

        let outcome = match &attempt.result {
            Ok(()) => {
                trace_phase(action, ActionPhase::Succeeded);
                let after = self.capture(driver, &format!("after_{}.png", action.id)).await;
                ActionOutcome::succeeded(after.map(|(r, _)| r))
            }
            Err(e) => {
                trace_phase(action, ActionPhase::Failed);
                tracing::warn!(sequence = action.sequence, error = %e, "action failed");
                let failure = self.capture(driver, &format!("failure_{}.png", action.id)).await;
                ActionOutcome::failed(e.to_string(), failure.map(|(r, _)| r))
            }
        };
        action.apply_outcome(&outcome);

        let screen = last_screen.as_deref().unwrap_or(UNKNOWN_SCREEN);
        self.report(action, screen, attempt).await;
        outcome
    }

    /// Primary locator first; on `ElementNotFound`, each alternate in order.
    async fn attempt(
        &self,
        action: &mut Action,
        driver: &dyn DeviceDriver,
        alternates: &[String],
    ) -> Attempt {
        let handler = handler_for(action.action_type);
        let first = {
            let cx = self.context(action, driver, action.element_locator.as_deref());
            handler(&cx).await
        };
        let primary_err = match first {
            Ok(()) => {
                return Attempt {
                    result: Ok(()),
                    replaced: None,
                }
            }
            Err(e @ MobiClawError::ElementNotFound { .. }) if !alternates.is_empty() => e,
            Err(e) => {
                return Attempt {
                    result: Err(e),
                    replaced: None,
                }
            }
        };

        for alternate in alternates {
            tracing::info!(sequence = action.sequence, locator = %alternate, "trying alternate locator");
            let result = {
                let cx = self.context(action, driver, Some(alternate.as_str()));
                handler(&cx).await
            };
            match result {
                Ok(()) => {
                    let primary = action.element_locator.replace(alternate.clone());
                    return Attempt {
                        result: Ok(()),
                        replaced: primary.map(|p| (p, primary_err)),
                    };
                }
                Err(MobiClawError::ElementNotFound { .. }) => continue,
                Err(e) => {
                    return Attempt {
                        result: Err(e),
                        replaced: None,
                    }
                }
            }
        }
        Attempt {
            result: Err(primary_err),
            replaced: None,
        }
    }

    fn context<'a>(
        &'a self,
        action: &'a Action,
        driver: &'a dyn DeviceDriver,
        locator: Option<&'a str>,
    ) -> ActionContext<'a> {
        ActionContext {
            action_type: action.action_type,
            locator,
            value: action.value_str(),
            driver,
            evidence: &self.evidence,
            wait_timeout: self.wait_timeout,
        }
    }

    /// Best-effort screenshot plus its saved reference. Failures are logged and dropped.
    async fn capture(&self, driver: &dyn DeviceDriver, name: &str) -> Option<(String, Vec<u8>)> {
        let png = match driver.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                let err = MobiClawError::EvidenceCaptureFailed(e.to_string());
                tracing::warn!(name, error = %err, "evidence capture skipped");
                return None;
            }
        };
        match self.evidence.save(name, &png).await {
            Ok(r) => Some((r, png)),
            Err(e) => {
                tracing::warn!(name, error = %e, "evidence capture skipped");
                None
            }
        }
    }

    async fn report(&self, action: &Action, screen: &str, attempt: Attempt) {
        if action.element_description.trim().is_empty() {
            tracing::debug!(sequence = action.sequence, "no element description, nothing to learn");
            return;
        }
        let key = ContextKey::new(&action.element_description, screen);
        let observation = match attempt.replaced {
            Some((primary, err)) => Observation {
                action_type: action.action_type,
                locator: Some(primary),
                successful: false,
                error_detail: Some(err.to_string()),
                correction: action.element_locator.clone(),
            },
            None => Observation {
                action_type: action.action_type,
                locator: action.element_locator.clone(),
                successful: action.successful,
                error_detail: action.error_message.clone(),
                correction: None,
            },
        };
        if let Err(e) = self.learning.record(&key, observation).await {
            tracing::warn!(context = %key, error = %e, "learning update failed");
        }
    }
}

fn trace_phase(action: &Action, phase: ActionPhase) {
    tracing::debug!(
        sequence = action.sequence,
        action = %action.action_type,
        phase = ?phase,
        "action phase"
    );
}
