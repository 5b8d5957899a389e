//! Goal arbitration and the agent drive loop.
//!
//! The controller holds the candidate goals and drives the automaton one
//! cycle at a time: arbitrate, sense, plan if needed, act one step. The
//! loop is single-threaded and cooperative; `stop` is honored at the next
//! tick boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::action::Actions;
use crate::automaton::Automaton;
use crate::error::{GoapError, OperationFailed};
use crate::goal::Goal;
use crate::sensor::Sensors;
use crate::state::WorldState;

/// What one tick accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No goal was eligible; the agent stays in waiting.
    Idle,
    /// The active goal is already satisfied; nothing to do.
    GoalSatisfied,
    /// Planning found no path; the agent re-arbitrates next tick.
    PlanFailed,
    /// One plan step was dispatched.
    Acted,
}

/// Cloneable handle that stops a running controller from another thread.
#[derive(Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives an [`Automaton`] against a prioritized goal set.
pub struct AutomatonController {
    automaton: Automaton,
    goals: Vec<Goal>,
    tick_interval: Duration,
    running: Arc<AtomicBool>,
}

impl AutomatonController {
    pub fn new(
        name: impl Into<String>,
        actions: Actions,
        sensors: Sensors,
        world_state: WorldState,
        goals: Vec<Goal>,
    ) -> Self {
        Self {
            automaton: Automaton::new(name, actions, sensors, world_state),
            goals,
            tick_interval: Duration::from_millis(100),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Highest-priority eligible goal; declaration order breaks ties.
    fn arbitrate(&self) -> Option<&Goal> {
        let world = self.automaton.world_state();
        let mut best: Option<&Goal> = None;
        for goal in &self.goals {
            if !goal.is_eligible(world) {
                continue;
            }
            match best {
                Some(current) if goal.priority <= current.priority => {}
                _ => best = Some(goal),
            }
        }
        best
    }

    /// One cycle: arbitrate, sense, plan if needed, act one step.
    ///
    /// Sensor and action failures propagate; a failed plan is reported in
    /// the outcome and the agent waits for the next tick (fresh sensor data
    /// may re-arbitrate to a different goal).
    pub fn tick(&mut self) -> Result<TickOutcome, GoapError> {
        let switch_to = match self.arbitrate() {
            Some(goal) => {
                let active = self.automaton.current_goal();
                if active.map(|g| g.name != goal.name).unwrap_or(true) {
                    Some(goal.clone())
                } else {
                    None
                }
            }
            None => return Ok(TickOutcome::Idle),
        };
        if let Some(goal) = switch_to {
            tracing::info!(
                agent = %self.automaton.name(),
                goal = %goal.name,
                "arbitration selected new goal"
            );
            self.automaton.input_goal(goal);
        }

        self.automaton.sense()?;

        let satisfied = self
            .automaton
            .current_goal()
            .map(|goal| goal.is_satisfied(self.automaton.world_state()))
            .unwrap_or(false);
        if satisfied {
            self.automaton.wait();
            return Ok(TickOutcome::GoalSatisfied);
        }

        if let Err(err) = self.automaton.plan() {
            tracing::warn!(agent = %self.automaton.name(), error = %err, "tick could not plan");
            return Ok(TickOutcome::PlanFailed);
        }

        self.automaton.act()?;
        Ok(TickOutcome::Acted)
    }

    /// Blocking drive loop. Tick failures are logged and the loop retries
    /// on the next tick with fresh sensor data; there is no inner retry.
    pub fn start(&mut self) -> Result<(), OperationFailed> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(OperationFailed("controller is already running".into()));
        }
        tracing::info!(agent = %self.automaton.name(), "controller started");
        while self.running.load(Ordering::SeqCst) {
            match self.tick() {
                Ok(outcome) => {
                    tracing::trace!(agent = %self.automaton.name(), ?outcome, "tick complete")
                }
                Err(err) => {
                    tracing::warn!(agent = %self.automaton.name(), error = %err, "tick failed")
                }
            }
            std::thread::sleep(self.tick_interval);
        }
        tracing::info!(agent = %self.automaton.name(), "controller stopped");
        Ok(())
    }

    /// Request a graceful exit at the next tick boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Handle for stopping the loop from another thread.
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal(self.running.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionTemplate;
    use crate::sensor::FnSensor;
    use crate::state::Value;

    fn token_actions() -> Actions {
        let mut actions = Actions::new();
        actions
            .add(
                ActionTemplate::new("create_dir")
                    .with_precondition("dir", "not_exist")
                    .with_effect("dir", "exist")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        actions
            .add(
                ActionTemplate::new("create_token")
                    .with_precondition("dir", "exist")
                    .with_precondition("token", "token_not_found")
                    .with_effect("token", "token_found")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        actions
    }

    fn token_world() -> WorldState {
        WorldState::from_facts([
            ("dir", Value::Str("not_exist".into())),
            ("token", Value::Str("token_not_found".into())),
        ])
    }

    fn token_goal() -> Goal {
        Goal::new("build_token")
            .with_desired("dir", "exist")
            .with_desired("token", "token_found")
            .with_priority(1)
    }

    #[test]
    fn test_ticks_drive_world_to_goal() {
        let mut controller = AutomatonController::new(
            "builder",
            token_actions(),
            Sensors::new(),
            token_world(),
            vec![token_goal()],
        );

        assert_eq!(controller.tick().unwrap(), TickOutcome::Acted);
        assert_eq!(controller.tick().unwrap(), TickOutcome::Acted);
        assert_eq!(controller.tick().unwrap(), TickOutcome::GoalSatisfied);

        let world = controller.automaton().world_state();
        assert_eq!(world.fetch("dir"), Value::Str("exist".into()));
        assert_eq!(world.fetch("token"), Value::Str("token_found".into()));
    }

    #[test]
    fn test_no_eligible_goal_is_idle() {
        let goals = vec![Goal::new("sheltered")
            .with_desired("sheltered", true)
            .with_precondition("weather", "storm")];
        let mut controller = AutomatonController::new(
            "idler",
            Actions::new(),
            Sensors::new(),
            WorldState::new(),
            goals,
        );

        assert_eq!(controller.tick().unwrap(), TickOutcome::Idle);
    }

    #[test]
    fn test_priority_ties_fall_to_declaration_order() {
        let goals = vec![
            Goal::new("first").with_desired("a", true).with_priority(5),
            Goal::new("second").with_desired("b", true).with_priority(5),
        ];
        let controller = AutomatonController::new(
            "tied",
            Actions::new(),
            Sensors::new(),
            WorldState::new(),
            goals,
        );

        assert_eq!(controller.arbitrate().map(|g| g.name.as_str()), Some("first"));
    }

    #[test]
    fn test_infeasible_goal_reports_plan_failed_and_waits() {
        let goals = vec![Goal::new("open").with_desired("door_open", true)];
        let mut controller = AutomatonController::new(
            "stuck",
            Actions::new(),
            Sensors::new(),
            WorldState::from_facts([("has_key", Value::Bool(false))]),
            goals,
        );

        assert_eq!(controller.tick().unwrap(), TickOutcome::PlanFailed);
        assert_eq!(
            controller.automaton().state(),
            crate::automaton::AutomatonState::WaitingOrders
        );
        // The next tick goes through the same motions rather than wedging.
        assert_eq!(controller.tick().unwrap(), TickOutcome::PlanFailed);
    }

    #[test]
    fn test_higher_priority_goal_preempts_mid_plan() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let storm_flag = Arc::new(AtomicBool::new(false));
        let probe_flag = storm_flag.clone();

        let mut sensors = Sensors::new();
        sensors
            .add(FnSensor::new("weather_station", "weather", move || {
                Ok(if probe_flag.load(Ordering::SeqCst) {
                    Value::Str("storm".into())
                } else {
                    Value::Str("clear".into())
                })
            }))
            .unwrap();

        let mut actions = token_actions();
        actions
            .add(
                ActionTemplate::new("take_shelter")
                    .with_precondition("sheltered", false)
                    .with_effect("sheltered", true)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let mut world = token_world();
        world.set("sheltered", false);
        world.set("weather", "clear");

        let goals = vec![
            token_goal(),
            Goal::new("take_shelter")
                .with_desired("sheltered", true)
                .with_precondition("weather", "storm")
                .with_priority(200),
        ];

        let mut controller =
            AutomatonController::new("survivor", actions, sensors, world, goals);

        // Arbitration sees calm weather and starts the low-priority goal;
        // the storm lands during this tick's sense pass.
        storm_flag.store(true, Ordering::SeqCst);
        assert_eq!(controller.tick().unwrap(), TickOutcome::Acted);
        assert_eq!(
            controller.automaton().current_goal().map(|g| g.name.as_str()),
            Some("build_token")
        );
        assert_eq!(
            controller.automaton().current_plan().map(|p| p.cursor()),
            Some(1)
        );
        let plans_before = controller.automaton().plans_computed();

        // Next arbitration preempts mid-plan and discards the rest of it.
        assert_eq!(controller.tick().unwrap(), TickOutcome::Acted);
        assert_eq!(
            controller.automaton().current_goal().map(|g| g.name.as_str()),
            Some("take_shelter")
        );
        assert!(controller.automaton().plans_computed() > plans_before);
        assert_eq!(
            controller.automaton().world_state().fetch("token"),
            Value::Str("token_not_found".into())
        );

        assert_eq!(controller.tick().unwrap(), TickOutcome::GoalSatisfied);
        assert_eq!(
            controller.automaton().world_state().fetch("sheltered"),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_stop_ends_blocking_loop() {
        let mut controller = AutomatonController::new(
            "runner",
            token_actions(),
            Sensors::new(),
            token_world(),
            vec![token_goal()],
        )
        .with_tick_interval(Duration::from_millis(1));

        let signal = controller.stop_signal();
        let handle = std::thread::spawn(move || {
            // The loop flips `running` on entry; give it a moment, then stop.
            std::thread::sleep(Duration::from_millis(20));
            signal.stop();
        });

        controller.start().unwrap();
        handle.join().unwrap();

        assert_eq!(
            controller.automaton().world_state().fetch("token"),
            Value::Str("token_found".into())
        );
    }
}
