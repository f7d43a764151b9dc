use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Linear lifecycle of one tool call. `Blocked`, `Formatted` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Received,
    Resolved,
    PolicyChecked,
    ArgsCoerced,
    CollaboratorInvoked,
    Formatted,
    Blocked,
    Failed,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Received => "received",
            DispatchState::Resolved => "resolved",
            DispatchState::PolicyChecked => "policy_checked",
            DispatchState::ArgsCoerced => "args_coerced",
            DispatchState::CollaboratorInvoked => "collaborator_invoked",
            DispatchState::Formatted => "formatted",
            DispatchState::Blocked => "blocked",
            DispatchState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Formatted | DispatchState::Blocked | DispatchState::Failed
        )
    }
}

#[derive(Debug, Clone)]
pub struct DispatchRun {
    pub id: uuid::Uuid,
    pub state: DispatchState,
    started: Instant,
}

impl DispatchRun {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            state: DispatchState::Received,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, from: &[DispatchState], to: DispatchState) {
        debug_assert!(
            from.contains(&self.state),
            "illegal transition {} -> {}",
            self.state.as_str(),
            to.as_str()
        );
        self.state = to;
    }

    pub fn resolve(&mut self) {
        self.advance(&[DispatchState::Received], DispatchState::Resolved);
    }

    pub fn check_policy(&mut self) {
        self.advance(&[DispatchState::Resolved], DispatchState::PolicyChecked);
    }

    pub fn block(&mut self) {
        self.advance(
            &[DispatchState::Resolved, DispatchState::PolicyChecked],
            DispatchState::Blocked,
        );
    }

    pub fn coerce(&mut self) {
        self.advance(&[DispatchState::PolicyChecked], DispatchState::ArgsCoerced);
    }

    pub fn invoke(&mut self) {
        self.advance(&[DispatchState::ArgsCoerced], DispatchState::CollaboratorInvoked);
    }

    pub fn format(&mut self) {
        self.advance(&[DispatchState::CollaboratorInvoked], DispatchState::Formatted);
    }

    pub fn fail(&mut self) {
        debug_assert!(!self.state.is_terminal(), "run already finished");
        self.state = DispatchState::Failed;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for DispatchRun {
    fn default() -> Self {
        Self::new()
    }
}
