//! The sense -> plan -> act state machine.
//!
//! The automaton owns the world state, the working memory, the sensor and
//! action registries, the planner, and the current goal and plan. It is a
//! four-state machine driven by explicit inputs; `input_goal` is the
//! cancellation primitive and returns it to `WaitingOrders` from any state.

use std::collections::BTreeSet;
use std::time::SystemTime;

use crate::action::{Action, Actions, Effect};
use crate::error::{ActionError, PlanError, SensorError};
use crate::goal::Goal;
use crate::planner::{Plan, RegressivePlanner};
use crate::sensor::{Fact, Sensor, Sensors, WorkingMemory};
use crate::state::WorldState;

/// The automaton's control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomatonState {
    /// Initial state; also reached on goal input, plan failure, and `wait`.
    WaitingOrders,
    Sensing,
    Planning,
    Acting,
}

/// Four-state agent core. One instance per agent, mutated in place.
pub struct Automaton {
    name: String,
    state: AutomatonState,
    world_state: WorldState,
    working_memory: WorkingMemory,
    sensors: Sensors,
    actions: Actions,
    planner: RegressivePlanner,
    plan: Option<Plan>,
    goal: Option<Goal>,
    /// World-state keys whose value changed during the last sense pass.
    changed_keys: BTreeSet<String>,
    goal_changed: bool,
    plans_computed: u64,
}

impl Automaton {
    pub fn new(
        name: impl Into<String>,
        actions: Actions,
        sensors: Sensors,
        world_state: WorldState,
    ) -> Self {
        let planner = RegressivePlanner::new(&actions);
        Self {
            name: name.into(),
            state: AutomatonState::WaitingOrders,
            world_state,
            working_memory: WorkingMemory::new(),
            sensors,
            actions,
            planner,
            plan: None,
            goal: None,
            changed_keys: BTreeSet::new(),
            goal_changed: false,
            plans_computed: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AutomatonState {
        self.state
    }

    pub fn world_state(&self) -> &WorldState {
        &self.world_state
    }

    /// Host access between ticks. Runtime components touch the world only
    /// through sensing and the effect-apply step.
    pub fn world_state_mut(&mut self) -> &mut WorldState {
        &mut self.world_state
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working_memory
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn current_goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    pub fn current_plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// How many times the planner has been invoked. Unchanged ticks reuse
    /// the existing plan and do not bump this.
    pub fn plans_computed(&self) -> u64 {
        self.plans_computed
    }

    /// Record a new goal and discard the current plan. Valid from any
    /// state; the automaton returns to `WaitingOrders`.
    pub fn input_goal(&mut self, goal: Goal) {
        tracing::info!(agent = %self.name, goal = %goal.name, "goal received");
        self.goal = Some(goal);
        self.plan = None;
        self.goal_changed = true;
        self.state = AutomatonState::WaitingOrders;
    }

    /// Run one sense pass: every sensor whose preconditions match the
    /// current world state executes in declaration order, deposits a fact,
    /// and writes its binding. Re-entry from `Acting` clears the working
    /// memory first. A sensor failure propagates; its fact is not added.
    pub fn sense(&mut self) -> Result<(), SensorError> {
        match self.state {
            AutomatonState::WaitingOrders | AutomatonState::Sensing => {}
            AutomatonState::Acting => self.working_memory.clear(),
            AutomatonState::Planning => return Ok(()),
        }
        self.state = AutomatonState::Sensing;
        self.changed_keys.clear();

        for sensor in self.sensors.iter_mut() {
            if let Some(preconditions) = sensor.preconditions() {
                if !self.world_state.satisfies(preconditions) {
                    continue;
                }
            }

            let value = match sensor.exec() {
                Ok(value) => value,
                Err(cause) => {
                    return Err(SensorError::Exec {
                        name: sensor.name().to_string(),
                        cause,
                    })
                }
            };

            let binding = sensor.binding().to_string();
            self.working_memory.push(Fact {
                binding: binding.clone(),
                value: value.clone(),
                sensor: sensor.name().to_string(),
                recorded_at: SystemTime::now(),
            });

            if self.world_state.fetch(&binding) != value {
                self.changed_keys.insert(binding.clone());
            }
            self.world_state.set(binding, value);
        }
        Ok(())
    }

    /// Decide whether to replan and, if so, invoke the planner.
    ///
    /// A replan happens when the goal changed, no plan is held, or the last
    /// sense pass changed a key the goal or the remaining plan depends on.
    /// On failure the plan is cleared and the automaton returns to
    /// `WaitingOrders` for the next tick.
    pub fn plan(&mut self) -> Result<(), PlanError> {
        if self.state != AutomatonState::Sensing {
            return Ok(());
        }
        self.state = AutomatonState::Planning;

        let Some(goal) = self.goal.clone() else {
            self.plan = None;
            return Ok(());
        };

        let needs_replan =
            self.goal_changed || self.plan.is_none() || self.relevant_drift(&goal);
        if !needs_replan {
            return Ok(());
        }

        self.goal_changed = false;
        self.plans_computed += 1;
        match self.planner.find_plan(&self.world_state, &goal.desired_state) {
            Ok(steps) => {
                self.plan = Some(Plan::new(steps));
                Ok(())
            }
            Err(err) => {
                self.plan = None;
                self.state = AutomatonState::WaitingOrders;
                Err(err)
            }
        }
    }

    /// Execute the plan step at the cursor.
    ///
    /// The procedural precondition is rechecked with `is_planning = false`;
    /// a veto invalidates the plan and forces a replan next cycle. Literal
    /// effects are written back when the action asks for it; service-valued
    /// effects are the effector's own business. An effector error
    /// propagates after invalidating the plan.
    pub fn act(&mut self) -> Result<(), ActionError> {
        if self.state != AutomatonState::Planning {
            return Ok(());
        }
        self.state = AutomatonState::Acting;

        let Some(step) = self.plan.as_ref().and_then(|plan| plan.current()).cloned() else {
            return Ok(());
        };

        if !step
            .action
            .check_procedural_precondition(&step.services, false)
        {
            tracing::warn!(
                agent = %self.name,
                action = step.action.name(),
                "procedural precondition failed at execution; invalidating plan"
            );
            self.plan = None;
            return Ok(());
        }

        if let Err(cause) = step.action.execute(&step.services) {
            self.plan = None;
            return Err(ActionError::Exec {
                name: step.action.name().to_string(),
                cause,
            });
        }

        if step.action.apply_effects_on_exit() {
            for (key, effect) in step.action.effects() {
                if let Effect::Literal(value) = effect {
                    self.world_state.set(key.clone(), value.clone());
                }
            }
        }

        if let Some(plan) = self.plan.as_mut() {
            plan.advance();
            if plan.is_exhausted() {
                tracing::debug!(agent = %self.name, "plan exhausted");
                self.plan = None;
            }
        }
        Ok(())
    }

    /// Return to `WaitingOrders` from `Sensing`, clearing working memory.
    pub fn wait(&mut self) {
        if self.state == AutomatonState::Sensing {
            self.state = AutomatonState::WaitingOrders;
            self.working_memory.clear();
        }
    }

    /// Drop all facts from the current cycle. Equivalent to the clear the
    /// state machine performs on its own transitions.
    pub fn reset_working_memory(&mut self) {
        self.working_memory.clear();
    }

    /// Did the last sense pass touch a key the goal or remaining plan
    /// steps depend on?
    fn relevant_drift(&self, goal: &Goal) -> bool {
        if self.changed_keys.is_empty() {
            return false;
        }
        if goal
            .desired_state
            .keys()
            .any(|key| self.changed_keys.contains(key))
        {
            return true;
        }
        if let Some(plan) = &self.plan {
            for step in &plan.steps()[plan.cursor()..] {
                if step
                    .action
                    .preconditions()
                    .keys()
                    .any(|key| self.changed_keys.contains(key))
                {
                    return true;
                }
            }
        }
        false
    }
}
