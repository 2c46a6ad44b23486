use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::driver::DeviceDriver;
use crate::engine::event_bus::{EngineEvent, EventBus};
use crate::engine::journal::{ExecutionJournal, JournalEntry};
use crate::engine::run_control::{CancelFlag, RunControl};
use crate::errors::{MobiClawError, MobiClawResult};
use crate::executor::ActionExecutor;
use crate::model::{Action, ActionOutcome, Instruction, InstructionStatus};
use crate::planner::InstructionPlanner;
use crate::store::{ActionRepository, InstructionFilter, InstructionRepository};

pub const ALL_SUCCEEDED: &str = "All actions completed successfully";

/// Plans an instruction once, then resolves and executes its actions in sequence order
/// against a single exclusively-held device driver.
pub struct ExecutionCoordinator {
    instructions: Arc<dyn InstructionRepository>,
    actions: Arc<dyn ActionRepository>,
    planner: Arc<InstructionPlanner>,
    executor: Arc<ActionExecutor>,
    driver: Mutex<Box<dyn DeviceDriver>>,
    events: EventBus,
    journal: Option<ExecutionJournal>,
    instruction_timeout: Option<Duration>,
}

impl ExecutionCoordinator {
    pub fn new(
        instructions: Arc<dyn InstructionRepository>,
        actions: Arc<dyn ActionRepository>,
        planner: Arc<InstructionPlanner>,
        executor: Arc<ActionExecutor>,
        driver: Box<dyn DeviceDriver>,
    ) -> Self {
        Self {
            instructions,
            actions,
            planner,
            executor,
            driver: Mutex::new(driver),
            events: EventBus::default(),
            journal: None,
            instruction_timeout: None,
        }
    }

    pub fn with_journal(mut self, journal: ExecutionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_instruction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.instruction_timeout = timeout;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Store a new PENDING instruction.
    pub async fn submit(&self, text: &str) -> MobiClawResult<Instruction> {
        let instruction = Instruction::new(text)?;
        self.instructions.save_instruction(&instruction).await?;
        tracing::info!(instruction = %instruction.id, "instruction submitted");
        Ok(instruction)
    }

    pub async fn process(&self, id: Uuid) -> MobiClawResult<Instruction> {
        self.process_with_cancel(id, CancelFlag::new()).await
    }

    /// Runs the instruction to a terminal status. Failures inside the pipeline are recorded on
    /// the returned instruction; only an unknown id, a non-PENDING instruction or a store
    /// failure come back as `Err`.
    pub async fn process_with_cancel(&self, id: Uuid, cancel: CancelFlag) -> MobiClawResult<Instruction> {
        let mut instruction = self
            .instructions
            .get_instruction(id)
            .await?
            .ok_or_else(|| MobiClawError::InvalidInstruction(format!("unknown instruction {id}")))?;
        if instruction.status != InstructionStatus::Pending {
            return Err(MobiClawError::InvalidInstruction(format!(
                "instruction {id} is {}, only PENDING instructions can be processed",
                instruction.status
            )));
        }

        instruction.start();
        self.instructions.save_instruction(&instruction).await?;
        tracing::info!(instruction = %id, text = %instruction.text(), "instruction processing started");
        self.events.publish(EngineEvent::InstructionStarted {
            instruction_id: id,
            text: instruction.text().to_string(),
        });

        let control = RunControl::new(self.instruction_timeout, cancel);
        let (status, summary) = match self.run(&instruction, &control).await {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(instruction = %id, error = %e, "instruction failed");
                (InstructionStatus::Failed, e.to_string())
            }
        };
        instruction.finish(status, summary);

        if let Err(e) = self.instructions.save_instruction(&instruction).await {
            tracing::error!(instruction = %id, error = %e, "final instruction state not persisted");
        }
        if let Some(journal) = &self.journal {
            journal.record(&JournalEntry::for_instruction(&instruction)).await;
        }
        tracing::info!(instruction = %id, status = %instruction.status, "instruction processing finished");
        self.events.publish(EngineEvent::InstructionFinished {
            instruction_id: id,
            status: instruction.status,
            result: instruction.result.clone().unwrap_or_default(),
        });
        Ok(instruction)
    }

    /// Fire-and-forget `process`. Sequencing inside the instruction is unchanged.
    pub fn spawn_process(self: &Arc<Self>, id: Uuid) -> JoinHandle<MobiClawResult<Instruction>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.process(id).await })
    }

    pub async fn list_instructions(&self) -> MobiClawResult<Vec<Instruction>> {
        self.instructions
            .list_instructions(&InstructionFilter::default())
            .await
    }

    pub async fn instructions_by_status(
        &self,
        status: InstructionStatus,
    ) -> MobiClawResult<Vec<Instruction>> {
        self.instructions
            .list_instructions(&InstructionFilter {
                status: Some(status),
            })
            .await
    }

    pub async fn actions_for(&self, id: Uuid) -> MobiClawResult<Vec<Action>> {
        self.actions.actions_for(id).await
    }

    async fn run(
        &self,
        instruction: &Instruction,
        control: &RunControl,
    ) -> MobiClawResult<(InstructionStatus, String)> {
        let mut actions = self.planner.plan(instruction).await?;
        self.actions.save_actions(&actions).await?;
        self.events.publish(EngineEvent::PlanReady {
            instruction_id: instruction.id,
            action_count: actions.len(),
        });

        // Held until every action has run; no other instruction can touch the device meanwhile.
        let mut driver = self.driver.lock().await;
        if let Err(e) = driver.start_session().await {
            if let Err(cleanup) = driver.end_session().await {
                tracing::warn!(error = %cleanup, "driver cleanup after failed start also failed");
            }
            let err = if matches!(e, MobiClawError::DriverSession(_)) {
                e
            } else {
                MobiClawError::DriverSession(e.to_string())
            };
            self.skip_remaining(&mut actions, &err).await;
            return Err(err);
        }

        let looped = self.run_actions(&mut actions, &**driver, control).await;

        if let Err(e) = driver.end_session().await {
            tracing::warn!(instruction = %instruction.id, error = %e, "driver session teardown failed");
        }
        drop(driver);

        looped?;
        Ok(summarize(&actions))
    }

    async fn run_actions(
        &self,
        actions: &mut [Action],
        driver: &dyn DeviceDriver,
        control: &RunControl,
    ) -> MobiClawResult<()> {
        let mut last_screen: Option<String> = None;
        let mut stopped: Option<MobiClawError> = None;

        for i in 0..actions.len() {
            let action = &mut actions[i];
            if stopped.is_none() {
                if let Err(e) = control.check() {
                    tracing::warn!(sequence = action.sequence, reason = %e, "stopping before action");
                    stopped = Some(e);
                }
            }

            match &stopped {
                Some(reason) => {
                    action.apply_outcome(&ActionOutcome::failed(format!("skipped: {reason}"), None));
                }
                None => {
                    self.events.publish(EngineEvent::ActionStarted {
                        instruction_id: action.instruction_id,
                        sequence: action.sequence,
                        action_type: action.action_type,
                        description: action.element_description.clone(),
                    });
                    tracing::info!(action = %action.label(), "executing action");
                    self.executor.execute(action, driver, &mut last_screen).await;
                }
            }

            if let Err(e) = self.finish_action(action).await {
                self.skip_remaining(&mut actions[i + 1..], &e).await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn skip_remaining(&self, actions: &mut [Action], reason: &MobiClawError) {
        for action in actions.iter_mut().filter(|a| !a.has_outcome()) {
            action.apply_outcome(&ActionOutcome::failed(format!("skipped: {reason}"), None));
            if let Err(e) = self.finish_action(action).await {
                tracing::warn!(sequence = action.sequence, error = %e, "skipped action not persisted");
            }
        }
    }

    async fn finish_action(&self, action: &Action) -> MobiClawResult<()> {
        self.actions.save_action(action).await?;
        if let Some(journal) = &self.journal {
            journal.record(&JournalEntry::for_action(action)).await;
        }
        self.events.publish(EngineEvent::ActionFinished {
            instruction_id: action.instruction_id,
            sequence: action.sequence,
            successful: action.successful,
            error: action.error_message.clone(),
        });
        Ok(())
    }
}

/// COMPLETED iff every action succeeded; otherwise one line per failed action.
pub fn summarize(actions: &[Action]) -> (InstructionStatus, String) {
    let failures: Vec<String> = actions
        .iter()
        .filter(|a| !a.successful)
        .map(|a| {
            format!(
                "{} — {}",
                a.label(),
                a.error_message.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();
    if failures.is_empty() {
        (InstructionStatus::Completed, ALL_SUCCEEDED.to_string())
    } else {
        (InstructionStatus::Failed, failures.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActionType;

    fn done(seq: u32, desc: &str, error: Option<&str>) -> Action {
        let mut a = Action::new(Uuid::nil(), ActionType::Tap, desc, None, seq);
        let outcome = match error {
            Some(e) => ActionOutcome::failed(e, None),
            None => ActionOutcome::succeeded(None),
        };
        a.apply_outcome(&outcome);
        a
    }

    #[test]
    fn all_successful_is_completed() {
        let (status, text) = summarize(&[done(1, "a", None), done(2, "b", None)]);
        assert_eq!(status, InstructionStatus::Completed);
        assert_eq!(text, ALL_SUCCEEDED);
    }

    #[test]
    fn any_failure_is_failed_with_one_line_each() {
        let (status, text) = summarize(&[
            done(1, "Username field", None),
            done(2, "Password field", Some("boom")),
            done(3, "Login button", Some("Element not found: //x (waited 10ms)")),
        ]);
        assert_eq!(status, InstructionStatus::Failed);
        assert_eq!(
            text,
            "2: TAP on Password field — boom\n3: TAP on Login button — Element not found: //x (waited 10ms)"
        );
    }
}
