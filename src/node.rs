//! Regressive search nodes.
//!
//! A node pairs the state built up so far (`current_state`) with the demand
//! still to satisfy (`goal_state`), plus the action whose application
//! produced it. Applying an action *backwards* rewrites both maps: effects
//! settle entries of the current state, and the action's preconditions
//! become part of the goal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::action::{Action, Effect, Precondition, Services};
use crate::state::{StateMap, Value, WorldState};

/// One node of the regressive A* search.
#[derive(Clone)]
pub struct PlanNode {
    pub current_state: StateMap,
    pub goal_state: StateMap,
    /// The action whose backward application produced this node. `None`
    /// marks the synthetic start node.
    pub action: Option<Arc<dyn Action>>,
}

impl PlanNode {
    /// Synthetic start node: the goal itself, with current values drawn
    /// from the world (absent keys read as `NOT_DEFINED`).
    pub fn start(world: &WorldState, goal: &StateMap) -> Self {
        let current_state = goal
            .keys()
            .map(|key| (key.clone(), world.fetch(key)))
            .collect();
        Self {
            current_state,
            goal_state: goal.clone(),
            action: None,
        }
    }

    /// Resolved service bindings for this node's action.
    pub fn services(&self) -> Services {
        let mut services = Services::new();
        if let Some(action) = &self.action {
            for name in action.service_names() {
                services.insert(
                    name.to_string(),
                    self.current_state
                        .get(name)
                        .cloned()
                        .unwrap_or(Value::Undefined),
                );
            }
        }
        services
    }

    /// Cost of the edge into `neighbour`. The action lives on the
    /// destination node, so the destination's services price the edge.
    pub fn edge_cost(&self, neighbour: &PlanNode) -> f64 {
        match &neighbour.action {
            Some(action) => action.get_cost(&neighbour.services()),
            None => 0.0,
        }
    }

    /// Apply `action` backwards, producing the child node.
    pub fn apply_action(&self, world: &WorldState, action: &Arc<dyn Action>) -> PlanNode {
        let mut current_state = self.current_state.clone();
        for (key, effect) in action.effects() {
            let value = match effect {
                // A service effect fulfils whatever the goal demands here.
                Effect::Service => self
                    .goal_state
                    .get(key)
                    .cloned()
                    .unwrap_or(Value::Undefined),
                Effect::Literal(literal) => {
                    if action.preconditions().contains_key(key) {
                        // The effect is overwritten by this action's own
                        // precondition demand; seed from the world instead.
                        world.fetch(key)
                    } else {
                        literal.clone()
                    }
                }
            };
            current_state.insert(key.clone(), value);
        }

        // The new goal is to satisfy the action's preconditions.
        let mut goal_state = self.goal_state.clone();
        for (key, precondition) in action.preconditions() {
            let value = match precondition {
                Precondition::Reference(name) => current_state
                    .get(name)
                    .cloned()
                    .unwrap_or(Value::Undefined),
                Precondition::Literal(literal) => literal.clone(),
            };
            goal_state.insert(key.clone(), value);
            // Seed the current value from the world so satisfaction checks
            // on the widened goal are well-defined.
            current_state.insert(key.clone(), world.fetch(key));
        }

        PlanNode {
            current_state,
            goal_state,
            action: Some(action.clone()),
        }
    }

    /// Goal keys whose current value does not match the demand, in goal
    /// insertion order.
    pub fn unsatisfied_keys(&self) -> Vec<&str> {
        self.goal_state
            .iter()
            .filter(|(key, demanded)| self.current_state.get(*key) != Some(demanded))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn is_satisfied(&self) -> bool {
        self.goal_state
            .iter()
            .all(|(key, demanded)| self.current_state.get(key) == Some(demanded))
    }

    fn action_name(&self) -> Option<&str> {
        self.action.as_deref().map(|action| action.name())
    }
}

// Identity is content-based so the closed set dedups repeated states; the
// incoming action is identified by name.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.action_name() == other.action_name()
            && self.current_state == other.current_state
            && self.goal_state == other.goal_state
    }
}

impl Eq for PlanNode {}

impl Hash for PlanNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut hash_map_sorted = |map: &StateMap| {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                key.hash(state);
                value.hash(state);
            }
        };
        hash_map_sorted(&self.current_state);
        hash_map_sorted(&self.goal_state);
        self.action_name().hash(state);
    }
}

impl fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanNode")
            .field("current_state", &self.current_state)
            .field("goal_state", &self.goal_state)
            .field("action", &self.action_name())
            .finish()
    }
}
