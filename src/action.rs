//! Action capability: declarations, validation, and the registry.
//!
//! An action declares preconditions and effects over symbolic state keys.
//! Effect values are either literals or the service marker, meaning "the
//! downstream goal decides the value". Precondition values are either
//! literals or references that bind to the runtime value of one of the same
//! action's effects. The service marker is unrepresentable in preconditions
//! by construction; reference targets are checked when an action is
//! validated, so invalid declarations never reach the planner.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::state::{StateMap, Value};

/// Resolved concrete values for an action's service effects at plan time.
pub type Services = StateMap;

/// An effect value: a literal atom or the service marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Literal(Value),
    /// The downstream goal decides the concrete value.
    Service,
}

impl Effect {
    pub fn is_service(&self) -> bool {
        matches!(self, Effect::Service)
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Effect::Literal(v) => Some(v),
            Effect::Service => None,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Literal(v) => write!(f, "{v}"),
            Effect::Service => write!(f, "..."),
        }
    }
}

impl From<Value> for Effect {
    fn from(v: Value) -> Self {
        Effect::Literal(v)
    }
}

/// A precondition value: a literal atom or a reference to one of the same
/// action's effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precondition {
    Literal(Value),
    /// Bind to the runtime value of the named effect on this action.
    Reference(String),
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::Literal(v) => write!(f, "{v}"),
            Precondition::Reference(name) => write!(f, "ref({name})"),
        }
    }
}

impl From<Value> for Precondition {
    fn from(v: Value) -> Self {
        Precondition::Literal(v)
    }
}

/// Construct a precondition that binds to the named effect.
pub fn reference(name: impl Into<String>) -> Precondition {
    Precondition::Reference(name.into())
}

/// A capability the planner can schedule and the executor can run.
///
/// Implementations must keep declarations stable for the life of the agent.
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn preconditions(&self) -> &IndexMap<String, Precondition>;

    fn effects(&self) -> &IndexMap<String, Effect>;

    /// Static base cost. Non-negative.
    fn cost(&self) -> f64 {
        1.0
    }

    /// Cost given the resolved services. Defaults to the static cost.
    fn get_cost(&self, _services: &Services) -> f64 {
        self.cost()
    }

    /// Tie-breaker for neighbour expansion. Higher expands first.
    fn precedence(&self) -> f64 {
        0.0
    }

    /// When false, the runtime does not write literal effects back to the
    /// world state after execution; the effector is expected to do so.
    fn apply_effects_on_exit(&self) -> bool {
        true
    }

    /// Code-level veto, consulted both during planning and at execution.
    fn check_procedural_precondition(&self, _services: &Services, _is_planning: bool) -> bool {
        true
    }

    /// Run the effector. Errors propagate and invalidate the current plan.
    fn execute(&self, _services: &Services) -> anyhow::Result<()> {
        Ok(())
    }

    /// Keys whose effect is the service marker. Derived, never authored.
    fn service_names(&self) -> Vec<&str> {
        self.effects()
            .iter()
            .filter(|(_, effect)| effect.is_service())
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Validate an action's declarations.
///
/// Every reference in the preconditions must name an effect key of the same
/// action, and a key shared between preconditions and effects must use one
/// atom kind throughout.
pub fn validate_action(action: &dyn Action) -> Result<(), ActionError> {
    let effects = action.effects();
    for (key, precondition) in action.preconditions() {
        match precondition {
            Precondition::Reference(target) => {
                if !effects.contains_key(target) {
                    return Err(ActionError::InvalidReference {
                        action: action.name().to_string(),
                        key: key.clone(),
                        reference: target.clone(),
                    });
                }
            }
            Precondition::Literal(value) => {
                if let Some(Effect::Literal(effect_value)) = effects.get(key) {
                    if effect_value.kind() != value.kind() {
                        return Err(ActionError::MultipleType {
                            action: action.name().to_string(),
                            key: key.clone(),
                            precondition: value.kind(),
                            effect: effect_value.kind(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Declarative action with no custom code hooks.
///
/// Covers the common case where the effector work happens elsewhere and the
/// action exists for its symbolic preconditions and effects. Hosts needing
/// procedural preconditions, dynamic cost, or a real effector implement
/// [`Action`] directly.
#[derive(Debug, Clone)]
pub struct ActionTemplate {
    name: String,
    preconditions: IndexMap<String, Precondition>,
    effects: IndexMap<String, Effect>,
    cost: f64,
    precedence: f64,
    apply_effects_on_exit: bool,
}

impl ActionTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preconditions: IndexMap::new(),
            effects: IndexMap::new(),
            cost: 1.0,
            precedence: 0.0,
            apply_effects_on_exit: true,
        }
    }

    pub fn with_precondition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.preconditions
            .insert(key.into(), Precondition::Literal(value.into()));
        self
    }

    /// Precondition bound to the runtime value of the named effect.
    pub fn with_reference(mut self, key: impl Into<String>, effect: impl Into<String>) -> Self {
        self.preconditions
            .insert(key.into(), Precondition::Reference(effect.into()));
        self
    }

    pub fn with_effect(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.effects
            .insert(key.into(), Effect::Literal(value.into()));
        self
    }

    /// Effect whose value the downstream goal decides.
    pub fn with_service(mut self, key: impl Into<String>) -> Self {
        self.effects.insert(key.into(), Effect::Service);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_precedence(mut self, precedence: f64) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn with_apply_effects_on_exit(mut self, apply: bool) -> Self {
        self.apply_effects_on_exit = apply;
        self
    }

    /// Validate the declarations, yielding the template on success.
    pub fn build(self) -> Result<Self, ActionError> {
        validate_action(&self)?;
        Ok(self)
    }
}

impl Action for ActionTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn preconditions(&self) -> &IndexMap<String, Precondition> {
        &self.preconditions
    }

    fn effects(&self) -> &IndexMap<String, Effect> {
        &self.effects
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn precedence(&self) -> f64 {
        self.precedence
    }

    fn apply_effects_on_exit(&self) -> bool {
        self.apply_effects_on_exit
    }
}

/// Action registry, preserving declaration order.
#[derive(Default)]
pub struct Actions {
    entries: Vec<Arc<dyn Action>>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register an action. Names must be unique.
    pub fn add(&mut self, action: impl Action + 'static) -> Result<(), ActionError> {
        self.add_arc(Arc::new(action))
    }

    pub fn add_arc(&mut self, action: Arc<dyn Action>) -> Result<(), ActionError> {
        validate_action(action.as_ref())?;
        if self.entries.iter().any(|a| a.name() == action.name()) {
            return Err(ActionError::AlreadyInCollection(action.name().to_string()));
        }
        self.entries.push(action);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Action>, ActionError> {
        self.entries
            .iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| ActionError::DoesNotExist(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn Action>, ActionError> {
        let index = self
            .entries
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| ActionError::DoesNotExist(name.to_string()))?;
        Ok(self.entries.remove(index))
    }

    /// Actions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Action>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
