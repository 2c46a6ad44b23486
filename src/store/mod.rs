//! Persistence seams. The core only needs create/update plus filtered queries, so each
//! record kind gets a small repository trait; `memory::MemoryStore` implements all three.
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::MobiClawResult;
use crate::model::{Action, Instruction, InstructionStatus, LearningEntry};

pub use memory::MemoryStore;

#[derive(Debug, Clone, Default)]
pub struct InstructionFilter {
    pub status: Option<InstructionStatus>,
}

#[async_trait]
pub trait InstructionRepository: Send + Sync {
    /// Insert or replace by id.
    async fn save_instruction(&self, instruction: &Instruction) -> MobiClawResult<()>;

    async fn get_instruction(&self, id: Uuid) -> MobiClawResult<Option<Instruction>>;

    /// Newest first.
    async fn list_instructions(&self, filter: &InstructionFilter) -> MobiClawResult<Vec<Instruction>>;
}

#[async_trait]
pub trait ActionRepository: Send + Sync {
    /// Insert or replace by id.
    async fn save_action(&self, action: &Action) -> MobiClawResult<()>;

    async fn save_actions(&self, actions: &[Action]) -> MobiClawResult<()> {
        for action in actions {
            self.save_action(action).await?;
        }
        Ok(())
    }

    /// Ordered by sequence.
    async fn actions_for(&self, instruction_id: Uuid) -> MobiClawResult<Vec<Action>>;
}

#[async_trait]
pub trait LearningRepository: Send + Sync {
    async fn find_by_context(&self, context: &str) -> MobiClawResult<Option<LearningEntry>>;

    /// Insert or replace by context.
    async fn save_entry(&self, entry: &LearningEntry) -> MobiClawResult<()>;

    async fn list_entries(&self) -> MobiClawResult<Vec<LearningEntry>>;
}
