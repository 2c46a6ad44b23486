use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{ActionType, InstructionStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    InstructionStarted {
        instruction_id: Uuid,
        text: String,
    },
    PlanReady {
        instruction_id: Uuid,
        action_count: usize,
    },
    ActionStarted {
        instruction_id: Uuid,
        sequence: u32,
        action_type: ActionType,
        description: String,
    },
    ActionFinished {
        instruction_id: Uuid,
        sequence: u32,
        successful: bool,
        error: Option<String>,
    },
    InstructionFinished {
        instruction_id: Uuid,
        status: InstructionStatus,
        result: String,
    },
}

/// Fan-out of engine progress. Publishing never blocks and never fails the run.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("engine event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();
        bus.publish(EngineEvent::PlanReady {
            instruction_id: id,
            action_count: 2,
        });
        bus.publish(EngineEvent::InstructionFinished {
            instruction_id: id,
            status: InstructionStatus::Completed,
            result: "ok".into(),
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            EngineEvent::PlanReady { action_count: 2, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            EngineEvent::InstructionFinished { .. }
        ));
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        EventBus::new(1).publish(EngineEvent::PlanReady {
            instruction_id: Uuid::new_v4(),
            action_count: 0,
        });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(EngineEvent::ActionStarted {
            instruction_id: Uuid::nil(),
            sequence: 3,
            action_type: ActionType::VerifyText,
            description: "Welcome".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "action_started");
        assert_eq!(json["action_type"], "VERIFY_TEXT");
    }
}
