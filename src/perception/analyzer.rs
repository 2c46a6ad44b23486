use std::sync::Arc;

use crate::errors::{MobiClawError, MobiClawResult};
use crate::llm::extract;
use crate::llm::oracle::VisionOracle;
use crate::perception::types::ScreenAnalysis;

const VISION_SYSTEM_TEMPLATE: &str = "\
You are an expert mobile app UI analyzer looking at a screenshot of a mobile application.

1. Identify and describe the visible UI elements on the screen.
2. For each element, suggest locator strategies (xpath, accessibility id, resource id).
3. Determine the element that best matches this description: {TARGET}

Respond with a JSON object in this format:
{
  \"screenDescription\": \"Brief description of the screen (e.g. 'Login Screen')\",
  \"matchedElement\": {
    \"description\": \"Description of the matched element\",
    \"type\": \"button, text field, ...\",
    \"text\": \"Text content of the element (if any)\",
    \"confidence\": 0.95,
    \"bounds\": {\"x\": 100, \"y\": 200, \"width\": 300, \"height\": 50},
    \"suggestedLocators\": {
      \"structural\": \"//android.widget.Button[@text='Login']\",
      \"accessibilityId\": \"login_button\",
      \"rawId\": \"com.example.app:id/login_button\"
    }
  },
  \"otherElements\": [
    {\"description\": \"Another element\", \"type\": \"...\", \"text\": \"...\"}
  ]
}

Use null for matchedElement when nothing on the screen matches.
Return ONLY the JSON object without any additional text or explanation.";

const VISION_USER_PROMPT: &str =
    "Analyze this screenshot and find the element that matches the given description.";

pub fn vision_system_prompt(target_description: &str) -> String {
    VISION_SYSTEM_TEMPLATE.replace("{TARGET}", target_description)
}

/// Vision-oracle client that turns a screenshot into a `ScreenAnalysis`.
pub struct ScreenAnalyzer {
    oracle: Arc<dyn VisionOracle>,
}

impl ScreenAnalyzer {
    pub fn new(oracle: Arc<dyn VisionOracle>) -> Self {
        Self { oracle }
    }

    pub async fn analyze(
        &self,
        screenshot_png: &[u8],
        target_description: &str,
    ) -> MobiClawResult<ScreenAnalysis> {
        tracing::info!(target = %target_description, bytes = screenshot_png.len(), "sending screenshot to vision oracle");
        let reply = self
            .oracle
            .analyze(
                &vision_system_prompt(target_description),
                VISION_USER_PROMPT,
                screenshot_png,
            )
            .await?;
        let analysis = parse_screen_analysis(&reply)?;
        tracing::debug!(
            screen = %analysis.screen_description,
            matched = analysis.matched_element.is_some(),
            others = analysis.other_elements.len(),
            "screen analysis parsed"
        );
        Ok(analysis)
    }
}

/// First JSON object in `reply` that decodes as a screen analysis.
pub fn parse_screen_analysis(reply: &str) -> MobiClawResult<ScreenAnalysis> {
    extract::balanced_spans(reply, '{')
        .into_iter()
        .find_map(|span| serde_json::from_str::<ScreenAnalysis>(span).ok())
        .ok_or_else(|| {
            MobiClawError::LlmProvider("vision oracle reply contained no screen analysis".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_reply_with_prose() {
        let reply = r#"Sure! Here it is:
        {
          "screenDescription": "Login Screen",
          "matchedElement": {
            "description": "Blue login button",
            "type": "button",
            "text": "Log in",
            "confidence": 0.92,
            "bounds": {"x": 10, "y": 20, "width": 100, "height": 40},
            "suggestedLocators": {
              "xpath": "//android.widget.Button[@text='Log in']",
              "accessibilityId": "login_button"
            }
          },
          "otherElements": [{"description": "Username field", "type": "text field"}]
        }"#;
        let analysis = parse_screen_analysis(reply).unwrap();
        assert_eq!(analysis.screen_description, "Login Screen");
        let matched = analysis.matched_element.unwrap();
        assert_eq!(matched.description, "Blue login button");
        assert_eq!(matched.element_type.as_deref(), Some("button"));
        assert_eq!(matched.bounds.unwrap().width, 100);
        assert_eq!(
            matched.suggested_locators.structural.as_deref(),
            Some("//android.widget.Button[@text='Log in']")
        );
        assert_eq!(analysis.other_elements.len(), 1);
    }

    #[test]
    fn null_match_is_kept_as_none() {
        let analysis =
            parse_screen_analysis(r#"{"screenDescription": "Home", "matchedElement": null}"#).unwrap();
        assert!(analysis.matched_element.is_none());
    }

    #[test]
    fn non_json_reply_is_an_error() {
        assert!(parse_screen_analysis("I see a login screen.").is_err());
    }

    #[test]
    fn template_carries_target() {
        let p = vision_system_prompt("Settings gear icon");
        assert!(p.contains("best matches this description: Settings gear icon"));
    }
}
