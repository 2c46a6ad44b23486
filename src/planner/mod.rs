//! Instruction planning: free text in, ordered typed actions out.
pub mod prompt;

use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{MobiClawError, MobiClawResult};
use crate::llm::extract;
use crate::llm::oracle::TextOracle;
use crate::model::{Action, ActionType, Instruction};

pub struct InstructionPlanner {
    oracle: Arc<dyn TextOracle>,
    system_prompt: String,
}

impl InstructionPlanner {
    pub fn new(oracle: Arc<dyn TextOracle>) -> Self {
        Self {
            oracle,
            system_prompt: prompt::planner_system_prompt(),
        }
    }

    /// Asks the text oracle for a plan. Any oracle error, unreadable payload or plan
    /// with no valid actions is `PlanningFailed`.
    pub async fn plan(&self, instruction: &Instruction) -> MobiClawResult<Vec<Action>> {
        tracing::info!(instruction = %instruction.id, text = %instruction.text(), "planning instruction");

        let reply = self
            .oracle
            .complete(&self.system_prompt, instruction.text())
            .await
            .map_err(|e| MobiClawError::PlanningFailed(format!("text oracle call failed: {e}")))?;
        tracing::debug!(reply_len = reply.len(), "planner oracle replied");

        let actions = parse_plan(instruction.id, &reply)?;
        tracing::info!(instruction = %instruction.id, actions = actions.len(), "plan ready");
        Ok(actions)
    }
}

/// Decode the first JSON array in `reply` into actions for `instruction_id`.
///
/// Records with an unknown `actionType` are dropped with a warning. Records are
/// ordered by their declared `sequence` (position in the array when missing or not
/// numeric) and renumbered to a contiguous `1..=N`.
pub fn parse_plan(instruction_id: Uuid, reply: &str) -> MobiClawResult<Vec<Action>> {
    let records = extract::balanced_spans(reply, '[')
        .into_iter()
        .find_map(|span| serde_json::from_str::<Vec<serde_json::Value>>(span).ok())
        .ok_or_else(|| MobiClawError::PlanningFailed("no JSON array found in oracle reply".into()))?;

    let mut planned: Vec<(u64, Action)> = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let position = idx as u64 + 1;
        let Some(obj) = record.as_object() else {
            tracing::warn!(index = idx, "plan record is not an object, dropped");
            continue;
        };
        let raw_type = obj.get("actionType").and_then(|v| v.as_str()).unwrap_or("");
        let action_type = match raw_type.parse::<ActionType>() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "plan record dropped");
                continue;
            }
        };
        let description = obj
            .get("elementDescription")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        let value = obj.get("value").and_then(scalar_text);
        let declared = obj.get("sequence").and_then(sequence_of).unwrap_or(position);

        planned.push((
            declared,
            Action::new(instruction_id, action_type, description, value, 0),
        ));
    }

    if planned.is_empty() {
        return Err(MobiClawError::PlanningFailed(format!(
            "oracle reply contained {} record(s) but no valid actions",
            records.len()
        )));
    }

    // Stable: ties keep array order.
    planned.sort_by_key(|(declared, _)| *declared);
    let actions: Vec<Action> = planned
        .into_iter()
        .enumerate()
        .map(|(i, (declared, mut action))| {
            let sequence = i as u32 + 1;
            if declared != u64::from(sequence) {
                tracing::debug!(declared, sequence, "plan sequence renumbered");
            }
            action.sequence = sequence;
            action
        })
        .collect();
    Ok(actions)
}

/// Strings pass through; numbers and booleans are rendered; null and empty strings are absent.
fn scalar_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn sequence_of(v: &serde_json::Value) -> Option<u64> {
    match v {
        serde_json::Value::Number(n) => n.as_u64().filter(|n| *n > 0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok().filter(|n| *n > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(MobiClawResult<String>);

    #[async_trait]
    impl TextOracle for Canned {
        async fn complete(&self, _system: &str, _user: &str) -> MobiClawResult<String> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(MobiClawError::LlmProvider(e.to_string())),
            }
        }
    }

    #[test]
    fn prose_wrapped_payload_yields_enclosed_records() {
        let reply = "Here is the plan:\n[ {\"actionType\": \"TAP\", \"elementDescription\": \"Login button\", \"value\": \"\", \"sequence\": 1}, {\"actionType\": \"TYPE\", \"elementDescription\": \"Username field\", \"value\": \"testuser\", \"sequence\": 2} ]\nDone.";
        let actions = parse_plan(Uuid::new_v4(), reply).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action_type, ActionType::Tap);
        assert_eq!(actions[0].value, None);
        assert_eq!(actions[1].action_type, ActionType::Type);
        assert_eq!(actions[1].value.as_deref(), Some("testuser"));
    }

    #[test]
    fn unknown_action_kinds_are_dropped() {
        let reply = r#"[{"actionType": "TAP", "elementDescription": "OK", "sequence": 1},
                        {"actionType": "FLY", "elementDescription": "sky", "sequence": 2}]"#;
        let actions = parse_plan(Uuid::new_v4(), reply).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].element_description, "OK");
        assert_eq!(actions[0].sequence, 1);
    }

    #[test]
    fn missing_sequences_default_to_position_and_are_contiguous() {
        let reply = r#"[{"actionType": "BACK"},
                        {"actionType": "WAIT", "value": 500, "sequence": "x"},
                        {"actionType": "SWIPE", "value": "up", "sequence": 7}]"#;
        let actions = parse_plan(Uuid::new_v4(), reply).unwrap();
        let seqs: Vec<u32> = actions.iter().map(|a| a.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(actions[1].value.as_deref(), Some("500"));
        assert_eq!(actions[2].action_type, ActionType::Swipe);
    }

    #[test]
    fn declared_order_is_respected() {
        let reply = r#"[{"actionType": "TAP", "elementDescription": "second", "sequence": 2},
                        {"actionType": "TAP", "elementDescription": "first", "sequence": 1}]"#;
        let actions = parse_plan(Uuid::new_v4(), reply).unwrap();
        assert_eq!(actions[0].element_description, "first");
        assert_eq!(actions[1].element_description, "second");
    }

    #[test]
    fn empty_or_malformed_payload_fails_planning() {
        for reply in [
            "I cannot help with that.",
            "[]",
            "[{\"actionType\": \"FLY\"}]",
            "[{\"actionType\": \"TAP\", ",
        ] {
            assert!(
                matches!(parse_plan(Uuid::new_v4(), reply), Err(MobiClawError::PlanningFailed(_))),
                "reply {reply:?} should fail"
            );
        }
    }

    #[test]
    fn prose_brackets_before_payload_are_skipped() {
        let reply = "Plan [draft]:\n[{\"actionType\": \"BACK\", \"sequence\": 1}]";
        let actions = parse_plan(Uuid::new_v4(), reply).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Back);
    }

    #[test]
    fn unclosed_prose_bracket_before_payload_is_skipped() {
        let reply = "Note: steps [see below:\n[{\"actionType\": \"BACK\", \"sequence\": 1}]\nDone.";
        let actions = parse_plan(Uuid::new_v4(), reply).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Back);
    }

    #[tokio::test]
    async fn oracle_failure_is_planning_failure() {
        let planner = InstructionPlanner::new(Arc::new(Canned(Err(MobiClawError::LlmProvider(
            "503".into(),
        )))));
        let ins = Instruction::new("Open settings").unwrap();
        assert!(matches!(
            planner.plan(&ins).await,
            Err(MobiClawError::PlanningFailed(_))
        ));
    }

    #[tokio::test]
    async fn actions_belong_to_the_instruction() {
        let planner = InstructionPlanner::new(Arc::new(Canned(Ok(
            r#"[{"actionType": "LAUNCH_APP", "value": "com.example"}]"#.into(),
        ))));
        let ins = Instruction::new("Open the example app").unwrap();
        let actions = planner.plan(&ins).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].instruction_id, ins.id);
    }
}
