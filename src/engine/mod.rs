pub mod coordinator;
pub mod event_bus;
pub mod journal;
pub mod run_control;

pub use coordinator::ExecutionCoordinator;
pub use event_bus::{EngineEvent, EventBus};
pub use journal::{ExecutionJournal, JournalEntry};
pub use run_control::{CancelFlag, RunControl};
