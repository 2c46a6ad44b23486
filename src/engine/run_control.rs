use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{MobiClawError, MobiClawResult};

/// Shared stop request for one instruction run. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline and cancel checks, consulted only between actions.
pub struct RunControl {
    started: Instant,
    deadline: Option<Duration>,
    cancel: CancelFlag,
}

impl RunControl {
    pub fn new(deadline: Option<Duration>, cancel: CancelFlag) -> Self {
        Self {
            started: Instant::now(),
            deadline,
            cancel,
        }
    }

    pub fn check(&self) -> MobiClawResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MobiClawError::Cancelled);
        }
        match self.deadline {
            Some(limit) if self.started.elapsed() >= limit => Err(MobiClawError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_run_never_stops_on_its_own() {
        assert!(RunControl::new(None, CancelFlag::new()).check().is_ok());
    }

    #[test]
    fn cancel_is_seen_through_clones() {
        let flag = CancelFlag::new();
        let control = RunControl::new(None, flag.clone());
        flag.cancel();
        assert!(matches!(control.check(), Err(MobiClawError::Cancelled)));
    }

    #[test]
    fn zero_deadline_is_already_exceeded() {
        let control = RunControl::new(Some(Duration::ZERO), CancelFlag::new());
        assert!(matches!(control.check(), Err(MobiClawError::DeadlineExceeded)));
    }
}
