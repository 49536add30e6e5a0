//! Node lifecycle states, results and error codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateValue {
    /// Node is being processed (checkout in progress, job running)
    Running,
    /// Node is done with its own work but children may still be added
    Available,
    /// Node is waiting for its children to complete
    Closing,
    /// Node is final
    Done,
}

impl StateValue {
    pub const ALL: [StateValue; 4] = [
        StateValue::Running,
        StateValue::Available,
        StateValue::Closing,
        StateValue::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateValue::Running => "running",
            StateValue::Available => "available",
            StateValue::Closing => "closing",
            StateValue::Done => "done",
        }
    }

    /// States reachable from this one in a single update
    pub fn allowed_transitions(&self) -> &'static [StateValue] {
        match self {
            StateValue::Running => &[StateValue::Available, StateValue::Closing, StateValue::Done],
            StateValue::Available => &[StateValue::Closing, StateValue::Done],
            StateValue::Closing => &[StateValue::Done],
            StateValue::Done => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Check whether moving to `new_state` is legal. Pure predicate; the
    /// caller decides whether to refuse the update.
    pub fn validate_transition(&self, new_state: StateValue) -> TransitionCheck {
        if new_state == *self {
            return TransitionCheck::allowed(format!(
                "Transition to the same state: {}. No validation is required.",
                new_state
            ));
        }

        if self.allowed_transitions().contains(&new_state) {
            TransitionCheck::allowed("Transition validated successfully".to_string())
        } else {
            TransitionCheck::rejected(format!(
                "Transition not allowed from state {} to state {}",
                self, new_state
            ))
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StateValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateValue::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown state: {}", s))
    }
}

/// Outcome of a state transition check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCheck {
    pub allowed: bool,
    pub reason: String,
}

impl TransitionCheck {
    fn allowed(reason: String) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Check a proposed state change for a node currently in `current`
pub fn validate_node_state_transition(current: StateValue, new_state: StateValue) -> TransitionCheck {
    current.validate_transition(new_state)
}

/// Result of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultValue {
    Pass,
    Fail,
    Skip,
    Incomplete,
}

impl ResultValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultValue::Pass => "pass",
            ResultValue::Fail => "fail",
            ResultValue::Skip => "skip",
            ResultValue::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infrastructure or job error codes.
///
/// Mostly set when the runtime itself fails (scheduler error, lab
/// timeout...) so that automated tooling can decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "invalid_job_params")]
    InvalidJobParams,
    #[serde(rename = "submit_error")]
    SubmitError,
    /// Node reached its timeout and was forced to done
    #[serde(rename = "node_timeout")]
    NodeTimeout,
    // Lab error codes
    #[serde(rename = "Infrastructure")]
    Infrastructure,
    #[serde(rename = "Canceled")]
    Canceled,
    #[serde(rename = "Job")]
    Job,
    #[serde(rename = "Bug")]
    Bug,
    #[serde(rename = "Test")]
    Test,
    #[serde(rename = "Configuration")]
    Configuration,
    #[serde(rename = "LAVATimeout")]
    LavaTimeout,
    #[serde(rename = "MultinodeTimeout")]
    MultiNodeTimeout,
    #[serde(rename = "ObjectNotPersisted")]
    ObjectNotPersisted,
    #[serde(rename = "Unexisting permission codename.")]
    UnexistingPermissionCodename,
    #[serde(rename = "job_generation_error")]
    JobGenerationError,
    #[serde(rename = "kbuild_internal_error")]
    KbuildInternalError,
}

/// Error codes specific to checkout nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutErrorCode {
    NodeTimeout,
    /// Initializing or updating the source repository failed
    GitCheckoutFailure,
}
