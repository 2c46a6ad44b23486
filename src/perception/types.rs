use serde::{Deserialize, Serialize};

/// Vision oracle reply for one screenshot and one target description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenAnalysis {
    #[serde(default)]
    pub screen_description: String,
    #[serde(default)]
    pub matched_element: Option<MatchedElement>,
    #[serde(default)]
    pub other_elements: Vec<OtherElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedElement {
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub element_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub suggested_locators: SuggestedLocators,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Candidate locators for the matched element, in the driver's locator syntax.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedLocators {
    /// Structural path (XPath).
    #[serde(default, alias = "xpath")]
    pub structural: Option<String>,
    #[serde(default)]
    pub accessibility_id: Option<String>,
    /// Raw resource id.
    #[serde(default, alias = "id", alias = "resourceId")]
    pub raw_id: Option<String>,
}

impl SuggestedLocators {
    /// Non-empty candidates in preference order: structural, accessibility id, raw id.
    /// Accessibility ids get the `~` prefix the driver uses to pick that strategy.
    pub fn ordered(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(s) = non_empty(&self.structural) {
            out.push(s.to_string());
        }
        if let Some(a) = non_empty(&self.accessibility_id) {
            if a.starts_with('~') {
                out.push(a.to_string());
            } else {
                out.push(format!("~{a}"));
            }
        }
        if let Some(r) = non_empty(&self.raw_id) {
            out.push(r.to_string());
        }
        out
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherElement {
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub element_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// What the resolver knows about the screen an action is about to run on.
#[derive(Debug, Clone, Default)]
pub struct ScreenEvidence {
    /// PNG bytes captured just before the attempt.
    pub screenshot: Option<Vec<u8>>,
    pub evidence_ref: Option<String>,
    /// Last screen description reported by the vision oracle, if any.
    pub screen_description: Option<String>,
}
