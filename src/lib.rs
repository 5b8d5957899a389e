//! Goal-oriented action planning runtime for autonomous agents.
//!
//! An agent senses its world through [`Sensor`]s, arbitrates between
//! prioritized [`Goal`]s, asks the [`RegressivePlanner`] for a minimum-cost
//! action sequence, and executes it one step per tick, replanning when the
//! world drifts or a more important goal becomes eligible.
//!
//! The planner searches *backwards* from the goal. Action effects may be
//! literal atoms or *services* (the downstream goal decides the value), and
//! preconditions may *reference* an effect of the same action, unifying
//! dynamic values across arbitrarily long action chains at plan time.
//!
//! ```
//! use goap_agent::{ActionTemplate, Actions, Goal, RegressivePlanner, WorldState};
//!
//! let mut actions = Actions::new();
//! actions.add(
//!     ActionTemplate::new("become_undead")
//!         .with_precondition("is_undead", false)
//!         .with_effect("is_undead", true)
//!         .build()?,
//! )?;
//! actions.add(
//!     ActionTemplate::new("haunt")
//!         .with_precondition("is_undead", true)
//!         .with_effect("is_spooky", true)
//!         .build()?,
//! )?;
//!
//! let world = WorldState::from_facts([("is_spooky", false), ("is_undead", false)]);
//! let goal = Goal::new("be_spooky").with_desired("is_spooky", true);
//!
//! let planner = RegressivePlanner::new(&actions);
//! let plan = planner.find_plan(&world, &goal.desired_state)?;
//! let names: Vec<_> = plan.iter().map(|step| step.name().to_string()).collect();
//! assert_eq!(names, vec!["become_undead", "haunt"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod action;
pub mod automaton;
pub mod controller;
pub mod error;
pub mod goal;
pub mod node;
pub mod planner;
pub mod search;
pub mod sensor;
pub mod state;

pub use action::{
    reference, Action, ActionTemplate, Actions, Effect, Precondition, Services,
};
pub use automaton::{Automaton, AutomatonState};
pub use controller::{AutomatonController, StopSignal, TickOutcome};
pub use error::{
    ActionError, GoapError, OperationFailed, PlanError, SearchError, SensorError,
};
pub use goal::Goal;
pub use node::PlanNode;
pub use planner::{Plan, PlanStep, RegressivePlanner, DEFAULT_MAX_EXPANSIONS};
pub use search::{find_path, PriorityQueue, SearchSpace};
pub use sensor::{Fact, FnSensor, Sensor, Sensors, WorkingMemory};
pub use state::{StateMap, Value, ValueKind, WorldState};
