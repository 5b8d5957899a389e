//! Goals: desired partial world states with priorities and eligibility.

use serde::{Deserialize, Serialize};

use crate::state::{StateMap, Value, WorldState};

/// A condition the agent wants to satisfy.
///
/// `desired_state` is what the planner works toward (subset semantics: the
/// world satisfies the goal when every entry matches). `preconditions` gate
/// eligibility only: a goal is considered during arbitration when they match
/// the current world state. The two are strictly distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    pub desired_state: StateMap,
    pub preconditions: StateMap,
    /// Larger wins arbitration. Ties fall to declaration order.
    pub priority: i32,
}

impl Goal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desired_state: StateMap::new(),
            preconditions: StateMap::new(),
            priority: 0,
        }
    }

    pub fn with_desired(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.desired_state.insert(key.into(), value.into());
        self
    }

    pub fn with_precondition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.preconditions.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// True when the world matches every desired entry.
    pub fn is_satisfied(&self, world: &WorldState) -> bool {
        world.satisfies(&self.desired_state)
    }

    /// True when the goal may be considered this tick.
    pub fn is_eligible(&self, world: &WorldState) -> bool {
        world.satisfies(&self.preconditions)
    }
}
