//! The regressive planner: drives A* backwards from the goal and
//! materializes executable plan steps with resolved service bindings.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::action::{Action, Actions, Effect, Services};
use crate::error::{PlanError, SearchError};
use crate::node::PlanNode;
use crate::search::{find_path, SearchSpace};
use crate::state::{StateMap, WorldState};

/// Default bound on A* node expansions per planning call.
pub const DEFAULT_MAX_EXPANSIONS: usize = 10_000;

/// One executable step: an action plus its resolved services.
#[derive(Clone)]
pub struct PlanStep {
    pub action: Arc<dyn Action>,
    pub services: Services,
}

impl PlanStep {
    pub fn name(&self) -> &str {
        self.action.name()
    }
}

impl fmt::Debug for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanStep")
            .field("action", &self.action.name())
            .field("services", &self.services)
            .finish()
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action.name())?;
        if !self.services.is_empty() {
            write!(f, " {{")?;
            for (i, (key, value)) in self.services.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

/// A finite action sequence consumed one step at a time.
///
/// Each step is taken exactly once; the cursor only moves forward.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    steps: Vec<PlanStep>,
    cursor: usize,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps, cursor: 0 }
    }

    /// The step at the cursor, if any remain.
    pub fn current(&self) -> Option<&PlanStep> {
        self.steps.get(self.cursor)
    }

    /// Consume the current step.
    pub fn advance(&mut self) {
        if self.cursor < self.steps.len() {
            self.cursor += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// A* space for the backward search. Neighbours settle one unsatisfied goal
/// key each; candidates come from the effect index.
struct RegressiveSearch<'a> {
    world: &'a WorldState,
    effect_to_actions: &'a BTreeMap<String, Vec<Arc<dyn Action>>>,
}

impl SearchSpace for RegressiveSearch<'_> {
    type Node = PlanNode;

    fn neighbours(&self, node: &PlanNode) -> Vec<PlanNode> {
        let mut neighbours = Vec::new();
        for key in node.unsatisfied_keys() {
            let demanded = &node.goal_state[key];
            let Some(candidates) = self.effect_to_actions.get(key) else {
                continue;
            };
            for action in candidates {
                match action.effects().get(key) {
                    Some(Effect::Service) => {}
                    Some(Effect::Literal(value)) if value == demanded => {}
                    _ => continue,
                }

                let neighbour = node.apply_action(self.world, action);
                if !action.check_procedural_precondition(&neighbour.services(), true) {
                    continue;
                }
                neighbours.push(neighbour);
            }
        }
        // Precedence desc; the stable sort keeps declaration order for ties.
        neighbours.sort_by(|a, b| {
            let pa = a.action.as_ref().map_or(0.0, |action| action.precedence());
            let pb = b.action.as_ref().map_or(0.0, |action| action.precedence());
            pb.partial_cmp(&pa).unwrap_or(Ordering::Equal)
        });
        neighbours
    }

    fn g_step(&self, node: &PlanNode, neighbour: &PlanNode) -> f64 {
        node.edge_cost(neighbour)
    }

    fn h_score(&self, node: &PlanNode) -> f64 {
        node.unsatisfied_keys().len() as f64
    }

    fn is_finished(&self, node: &PlanNode) -> bool {
        node.is_satisfied()
    }
}

/// Searches backwards from a goal for a minimum-cost action sequence.
pub struct RegressivePlanner {
    actions: Vec<Arc<dyn Action>>,
    effect_to_actions: BTreeMap<String, Vec<Arc<dyn Action>>>,
    max_expansions: usize,
}

impl RegressivePlanner {
    /// Build a planner over the registered actions, indexing them by
    /// declared effect key.
    pub fn new(actions: &Actions) -> Self {
        let actions: Vec<Arc<dyn Action>> = actions.iter().cloned().collect();
        let mut effect_to_actions: BTreeMap<String, Vec<Arc<dyn Action>>> = BTreeMap::new();
        for action in &actions {
            for effect_key in action.effects().keys() {
                effect_to_actions
                    .entry(effect_key.clone())
                    .or_default()
                    .push(action.clone());
            }
        }
        Self {
            actions,
            effect_to_actions,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }

    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// Find a minimum-cost plan driving `world` to satisfy `goal`.
    ///
    /// A goal the world already satisfies yields an empty plan. The steps
    /// come out in execution order; the synthetic start node is dropped.
    pub fn find_plan(
        &self,
        world: &WorldState,
        goal: &StateMap,
    ) -> Result<Vec<PlanStep>, PlanError> {
        let start = PlanNode::start(world, goal);
        let space = RegressiveSearch {
            world,
            effect_to_actions: &self.effect_to_actions,
        };

        let path = find_path(&space, start, self.max_expansions).map_err(|err| match err {
            SearchError::PathNotFound => {
                tracing::warn!(goal = ?goal.keys().collect::<Vec<_>>(), "no plan found");
                PlanError::PlanFailed {
                    goal: goal.keys().cloned().collect(),
                }
            }
            SearchError::BudgetExhausted(expansions) => {
                tracing::warn!(expansions, "planning budget exhausted");
                PlanError::SearchExhausted { expansions }
            }
        })?;

        // The search discovers the plan goal-first; execution order is the
        // reverse of the reconstructed path.
        let mut steps = Vec::new();
        for node in path.into_iter().rev() {
            let services = node.services();
            match node.action {
                Some(action) => steps.push(PlanStep { action, services }),
                None => break,
            }
        }

        let cost: f64 = steps
            .iter()
            .map(|step| step.action.get_cost(&step.services))
            .sum();
        tracing::debug!(steps = steps.len(), cost, "plan found");
        Ok(steps)
    }
}
