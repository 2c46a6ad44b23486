//! Element resolution: learned correction, then vision oracle, then a fixed default.
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::driver::locator::xpath_literal;
use crate::errors::MobiClawError;
use crate::learning::LearningStore;
use crate::model::{Action, ContextKey, UNKNOWN_SCREEN};
use crate::perception::{ScreenAnalyzer, ScreenEvidence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Correction from a past failure at the same context.
    Correction,
    /// Locator that previously worked at the same context.
    Remembered,
    Vision,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub locator: String,
    /// Further candidates to try, in order, if `locator` is not found.
    pub alternates: Vec<String>,
    /// Element description reported by the vision oracle, when it matched.
    pub matched_description: Option<String>,
    pub screen_description: String,
    pub source: ResolutionSource,
}

pub struct ElementResolver {
    learning: Arc<LearningStore>,
    analyzer: ScreenAnalyzer,
    threshold: f64,
    reuse_successful: bool,
}

impl ElementResolver {
    pub fn new(learning: Arc<LearningStore>, analyzer: ScreenAnalyzer, threshold: f64) -> Self {
        Self {
            learning,
            analyzer,
            threshold,
            reuse_successful: false,
        }
    }

    /// Let confident successful locators skip the vision oracle too.
    pub fn with_successful_reuse(mut self, enabled: bool) -> Self {
        self.reuse_successful = enabled;
        self
    }

    /// Never fails: every path ends in some locator, the last one logged as degraded.
    /// Does not write to learning.
    pub async fn resolve(&self, action: &Action, evidence: &ScreenEvidence) -> Resolution {
        let screen = evidence
            .screen_description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SCREEN)
            .to_string();
        let key = ContextKey::new(&action.element_description, &screen);

        if let Some(resolution) = self.from_learning(&key, &screen).await {
            return resolution;
        }

        let Some(png) = evidence.screenshot.as_deref() else {
            return degraded(action, screen, "no screenshot available for the vision oracle");
        };

        let analysis = match self.analyzer.analyze(png, &action.element_description).await {
            Ok(a) => a,
            Err(e) => return degraded(action, screen, &format!("vision oracle failed: {e}")),
        };
        let screen = if analysis.screen_description.trim().is_empty() {
            screen
        } else {
            analysis.screen_description.trim().to_string()
        };
        let Some(matched) = analysis.matched_element else {
            return degraded(action, screen, "vision oracle reported no matching element");
        };

        let mut candidates = matched.suggested_locators.ordered().into_iter();
        let Some(locator) = candidates.next() else {
            return degraded(action, screen, "matched element carried no locator candidates");
        };
        let matched_description =
            Some(matched.description.trim().to_string()).filter(|d| !d.is_empty());

        tracing::info!(
            sequence = action.sequence,
            locator = %locator,
            screen = %screen,
            confidence = matched.confidence.unwrap_or_default(),
            "element resolved by vision oracle"
        );
        Resolution {
            locator,
            alternates: candidates.collect(),
            matched_description,
            screen_description: screen,
            source: ResolutionSource::Vision,
        }
    }

    async fn from_learning(&self, key: &ContextKey, screen: &str) -> Option<Resolution> {
        let entry = match self.learning.query(key, self.threshold).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(context = %key, error = %e, "learning lookup failed, skipping");
                return None;
            }
        };

        let (locator, source) = if entry.is_correction() {
            (entry.correction.clone()?, ResolutionSource::Correction)
        } else if self.reuse_successful && entry.successful {
            (entry.element_identifier.clone()?, ResolutionSource::Remembered)
        } else {
            return None;
        };
        if locator.trim().is_empty() {
            return None;
        }

        tracing::info!(
            context = %key,
            locator = %locator,
            confidence = entry.confidence(),
            source = ?source,
            "element resolved from learning"
        );
        Some(Resolution {
            locator,
            alternates: Vec::new(),
            matched_description: None,
            screen_description: screen.to_string(),
            source,
        })
    }
}

fn degraded(action: &Action, screen: String, reason: &str) -> Resolution {
    let locator = default_locator(&action.element_description);
    let err = MobiClawError::ResolutionDegraded(reason.to_string());
    tracing::warn!(
        sequence = action.sequence,
        description = %action.element_description,
        locator = %locator,
        error = %err,
        "falling back to default locator"
    );
    Resolution {
        locator,
        alternates: Vec::new(),
        matched_description: None,
        screen_description: screen,
        source: ResolutionSource::Degraded,
    }
}

struct Pattern {
    keyword: Regex,
    widget: &'static str,
}

fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)\b(button|btn)\b", "android.widget.Button"),
            (r"(?i)\b(field|input|textbox)\b", "android.widget.EditText"),
            (r"(?i)\b(text|message|label|title)\b", "android.widget.TextView"),
        ]
        .into_iter()
        .filter_map(|(re, widget)| {
            Regex::new(re).ok().map(|keyword| Pattern { keyword, widget })
        })
        .collect()
    })
}

fn noise_words() -> Option<&'static Regex> {
    static NOISE: OnceLock<Option<Regex>> = OnceLock::new();
    NOISE
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(the|a|an|button|btn|field|input|textbox|text|message|label|title|icon)\b",
            )
            .ok()
        })
        .as_ref()
}

/// Fixed XPath for the nearest known description pattern.
///
/// `"Login button"` → `//android.widget.Button[contains(@text,'Login')]`; descriptions with
/// no known widget keyword match on text or content description of any element.
pub fn default_locator(description: &str) -> String {
    let label = noise_words()
        .map(|re| re.replace_all(description, " ").into_owned())
        .unwrap_or_else(|| description.to_string());
    let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
    let label = if label.is_empty() {
        description.trim().to_string()
    } else {
        label
    };
    let literal = xpath_literal(&label);

    match patterns().iter().find(|p| p.keyword.is_match(description)) {
        Some(p) => format!("//{}[contains(@text,{literal})]", p.widget),
        None => format!("//*[contains(@text,{literal}) or contains(@content-desc,{literal})]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MobiClawResult;
    use crate::llm::oracle::VisionOracle;
    use crate::model::{ActionType, Observation};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Vision {
        reply: MobiClawResult<String>,
        calls: AtomicUsize,
    }

    impl Vision {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(MobiClawError::LlmProvider("timeout".into())),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VisionOracle for Vision {
        async fn analyze(&self, _system: &str, _prompt: &str, _png: &[u8]) -> MobiClawResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(MobiClawError::LlmProvider(e.to_string())),
            }
        }
    }

    const LOGIN_MATCH: &str = r#"{
        "screenDescription": "Login Screen",
        "matchedElement": {
            "description": "Blue Login button",
            "confidence": 0.9,
            "suggestedLocators": {
                "structural": "//android.widget.Button[@text='Login']",
                "accessibilityId": "login_button",
                "rawId": "com.app:id/login"
            }
        }
    }"#;

    fn learning() -> Arc<LearningStore> {
        Arc::new(LearningStore::new(Arc::new(MemoryStore::new()), true))
    }

    fn tap(description: &str) -> Action {
        Action::new(Uuid::new_v4(), ActionType::Tap, description, None, 1)
    }

    fn evidence(screen: Option<&str>) -> ScreenEvidence {
        ScreenEvidence {
            screenshot: Some(b"png".to_vec()),
            evidence_ref: None,
            screen_description: screen.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn vision_match_yields_structural_locator_and_alternates() {
        let vision = Vision::replying(LOGIN_MATCH);
        let resolver = ElementResolver::new(learning(), ScreenAnalyzer::new(vision.clone()), 0.7);
        let r = resolver.resolve(&tap("Login button"), &evidence(None)).await;
        assert_eq!(r.source, ResolutionSource::Vision);
        assert_eq!(r.locator, "//android.widget.Button[@text='Login']");
        assert_eq!(r.alternates, vec!["~login_button", "com.app:id/login"]);
        assert_eq!(r.matched_description.as_deref(), Some("Blue Login button"));
        assert_eq!(r.screen_description, "Login Screen");
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn confident_correction_beats_reachable_oracle() {
        let store = learning();
        let key = ContextKey::new("Login button", "Login Screen");
        for _ in 0..2 {
            store
                .record(
                    &key,
                    Observation {
                        action_type: ActionType::Tap,
                        locator: Some("//bad".into()),
                        successful: false,
                        error_detail: Some("not found".into()),
                        correction: Some("~login_button".into()),
                    },
                )
                .await
                .unwrap();
        }
        // 0.3 then 0.25: below 0.7, so lower the bar for this resolver.
        let vision = Vision::replying(LOGIN_MATCH);
        let resolver = ElementResolver::new(store, ScreenAnalyzer::new(vision.clone()), 0.2);
        let r = resolver
            .resolve(&tap("Login button"), &evidence(Some("Login Screen")))
            .await;
        assert_eq!(r.source, ResolutionSource::Correction);
        assert_eq!(r.locator, "~login_button");
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn low_confidence_correction_is_ignored() {
        let store = learning();
        let key = ContextKey::new("Login button", "Login Screen");
        store
            .record(
                &key,
                Observation {
                    action_type: ActionType::Tap,
                    locator: Some("//bad".into()),
                    successful: false,
                    error_detail: None,
                    correction: Some("~login_button".into()),
                },
            )
            .await
            .unwrap();
        let vision = Vision::replying(LOGIN_MATCH);
        let resolver = ElementResolver::new(store, ScreenAnalyzer::new(vision.clone()), 0.7);
        let r = resolver
            .resolve(&tap("Login button"), &evidence(Some("Login Screen")))
            .await;
        assert_eq!(r.source, ResolutionSource::Vision);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_locator_reuse_is_opt_in() {
        let store = learning();
        let key = ContextKey::new("Login button", UNKNOWN_SCREEN);
        store
            .record(
                &key,
                Observation {
                    action_type: ActionType::Tap,
                    locator: Some("//remembered".into()),
                    successful: true,
                    error_detail: None,
                    correction: None,
                },
            )
            .await
            .unwrap();

        let vision = Vision::replying(LOGIN_MATCH);
        let plain = ElementResolver::new(store.clone(), ScreenAnalyzer::new(vision.clone()), 0.7);
        assert_eq!(
            plain.resolve(&tap("Login button"), &evidence(None)).await.source,
            ResolutionSource::Vision
        );

        let reusing = ElementResolver::new(store, ScreenAnalyzer::new(vision), 0.7)
            .with_successful_reuse(true);
        let r = reusing.resolve(&tap("Login button"), &evidence(None)).await;
        assert_eq!(r.source, ResolutionSource::Remembered);
        assert_eq!(r.locator, "//remembered");
    }

    #[tokio::test]
    async fn oracle_failure_degrades_to_default() {
        let resolver = ElementResolver::new(learning(), ScreenAnalyzer::new(Vision::failing()), 0.7);
        let r = resolver
            .resolve(&tap("Login button"), &evidence(Some("Login Screen")))
            .await;
        assert_eq!(r.source, ResolutionSource::Degraded);
        assert_eq!(r.locator, "//android.widget.Button[contains(@text,'Login')]");
        assert_eq!(r.screen_description, "Login Screen");
    }

    #[tokio::test]
    async fn no_match_degrades_to_default() {
        let vision = Vision::replying(r#"{"screenDescription": "Home", "matchedElement": null}"#);
        let resolver = ElementResolver::new(learning(), ScreenAnalyzer::new(vision), 0.7);
        let r = resolver.resolve(&tap("Username field"), &evidence(None)).await;
        assert_eq!(r.source, ResolutionSource::Degraded);
        assert_eq!(r.screen_description, "Home");
        assert_eq!(r.locator, "//android.widget.EditText[contains(@text,'Username')]");
    }

    #[test]
    fn default_locators_follow_keyword_patterns() {
        assert_eq!(
            default_locator("Welcome message"),
            "//android.widget.TextView[contains(@text,'Welcome')]"
        );
        assert_eq!(
            default_locator("Settings"),
            "//*[contains(@text,'Settings') or contains(@content-desc,'Settings')]"
        );
        assert_eq!(
            default_locator("Don't allow button"),
            "//android.widget.Button[contains(@text,\"Don't allow\")]"
        );
    }
}
