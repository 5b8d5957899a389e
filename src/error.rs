//! Error taxonomy for the planning runtime.
//!
//! Structural errors (invalid declarations, registry conflicts) surface at
//! construction or registration time. Planning errors surface from
//! [`find_plan`](crate::planner::RegressivePlanner::find_plan). Runtime
//! errors wrap failures raised by host-provided `execute`/`exec` callbacks.

use thiserror::Error;

use crate::state::ValueKind;

/// Failure of the low-level A* search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The open set emptied before any node satisfied the finish predicate.
    #[error("no path found through the search space")]
    PathNotFound,
    /// The expansion budget ran out before the search concluded.
    #[error("search expansion budget of {0} exhausted")]
    BudgetExhausted(usize),
}

/// Failure to produce a plan for a goal.
#[derive(Debug, Error)]
pub enum PlanError {
    /// No action sequence transforms the observed state into the goal state.
    #[error("no plan satisfies goal keys {goal:?}")]
    PlanFailed { goal: Vec<String> },
    /// The planner gave up after exceeding its expansion budget.
    #[error("planning aborted after {expansions} node expansions")]
    SearchExhausted { expansions: usize },
}

/// Sensor declaration, registration, and execution failures.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor '{0}' is already in the collection")]
    AlreadyInCollection(String),
    #[error("sensor '{0}' does not exist")]
    DoesNotExist(String),
    /// Two sensors cannot write the same world-state key.
    #[error("sensors '{first}' and '{second}' both bind world-state key '{binding}'")]
    MultipleType {
        binding: String,
        first: String,
        second: String,
    },
    /// The sensor's probe callback failed.
    #[error("sensor '{name}' failed: {cause}")]
    Exec { name: String, cause: anyhow::Error },
}

/// Action declaration, registration, and execution failures.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action '{0}' is already in the collection")]
    AlreadyInCollection(String),
    #[error("action '{0}' does not exist")]
    DoesNotExist(String),
    /// A precondition references an effect key the action does not declare.
    #[error("precondition '{key}' of action '{action}' references unknown effect '{reference}'")]
    InvalidReference {
        action: String,
        key: String,
        reference: String,
    },
    /// One key is declared with incompatible atom kinds in the same action.
    #[error(
        "action '{action}' declares key '{key}' as {precondition} in preconditions \
         but {effect} in effects"
    )]
    MultipleType {
        action: String,
        key: String,
        precondition: ValueKind,
        effect: ValueKind,
    },
    /// The action's effector callback failed.
    #[error("action '{name}' failed: {cause}")]
    Exec { name: String, cause: anyhow::Error },
}

/// High-level failure of a controller operation.
#[derive(Debug, Error)]
#[error("operation failed: {0}")]
pub struct OperationFailed(pub String);

/// Any error the agent loop can surface from a tick.
#[derive(Debug, Error)]
pub enum GoapError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Operation(#[from] OperationFailed),
}
