use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::MobiClawResult;
use crate::model::{Action, Instruction, LearningEntry};
use crate::store::{ActionRepository, InstructionFilter, InstructionRepository, LearningRepository};

/// Process-local store backing all three repositories.
#[derive(Default)]
pub struct MemoryStore {
    instructions: RwLock<HashMap<Uuid, Instruction>>,
    actions: RwLock<HashMap<Uuid, Action>>,
    learning: RwLock<HashMap<String, LearningEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstructionRepository for MemoryStore {
    async fn save_instruction(&self, instruction: &Instruction) -> MobiClawResult<()> {
        self.instructions
            .write()
            .await
            .insert(instruction.id, instruction.clone());
        Ok(())
    }

    async fn get_instruction(&self, id: Uuid) -> MobiClawResult<Option<Instruction>> {
        Ok(self.instructions.read().await.get(&id).cloned())
    }

    async fn list_instructions(&self, filter: &InstructionFilter) -> MobiClawResult<Vec<Instruction>> {
        let mut out: Vec<Instruction> = self
            .instructions
            .read()
            .await
            .values()
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[async_trait]
impl ActionRepository for MemoryStore {
    async fn save_action(&self, action: &Action) -> MobiClawResult<()> {
        self.actions.write().await.insert(action.id, action.clone());
        Ok(())
    }

    async fn save_actions(&self, actions: &[Action]) -> MobiClawResult<()> {
        let mut guard = self.actions.write().await;
        for action in actions {
            guard.insert(action.id, action.clone());
        }
        Ok(())
    }

    async fn actions_for(&self, instruction_id: Uuid) -> MobiClawResult<Vec<Action>> {
        let mut out: Vec<Action> = self
            .actions
            .read()
            .await
            .values()
            .filter(|a| a.instruction_id == instruction_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.sequence);
        Ok(out)
    }
}

#[async_trait]
impl LearningRepository for MemoryStore {
    async fn find_by_context(&self, context: &str) -> MobiClawResult<Option<LearningEntry>> {
        Ok(self.learning.read().await.get(context).cloned())
    }

    async fn save_entry(&self, entry: &LearningEntry) -> MobiClawResult<()> {
        self.learning
            .write()
            .await
            .insert(entry.context.clone(), entry.clone());
        Ok(())
    }

    async fn list_entries(&self) -> MobiClawResult<Vec<LearningEntry>> {
        Ok(self.learning.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionType, InstructionStatus};

    #[tokio::test]
    async fn actions_come_back_in_sequence_order() {
        let store = MemoryStore::new();
        let ins = Instruction::new("x").unwrap();
        let other = Instruction::new("y").unwrap();
        let batch: Vec<Action> = [3, 1, 2]
            .into_iter()
            .map(|s| Action::new(ins.id, ActionType::Tap, format!("e{s}"), None, s))
            .collect();
        store.save_actions(&batch).await.unwrap();
        store
            .save_action(&Action::new(other.id, ActionType::Back, "", None, 1))
            .await
            .unwrap();

        let seqs: Vec<u32> = store
            .actions_for(ins.id)
            .await
            .unwrap()
            .iter()
            .map(|a| a.sequence)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn instructions_filter_by_status() {
        let store = MemoryStore::new();
        let mut done = Instruction::new("a").unwrap();
        done.finish(InstructionStatus::Completed, "ok");
        let pending = Instruction::new("b").unwrap();
        store.save_instruction(&done).await.unwrap();
        store.save_instruction(&pending).await.unwrap();

        let filter = InstructionFilter {
            status: Some(InstructionStatus::Pending),
        };
        let found = store.list_instructions(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, pending.id);
        assert_eq!(
            store.list_instructions(&InstructionFilter::default()).await.unwrap().len(),
            2
        );
    }
}
