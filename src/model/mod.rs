pub mod action;
pub mod instruction;
pub mod learning;

pub use action::{Action, ActionOutcome, ActionType};
pub use instruction::{Instruction, InstructionStatus};
pub use learning::{ContextKey, LearningEntry, Observation, UNKNOWN_SCREEN};
