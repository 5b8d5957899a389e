//! Symbolic state primitives: atomic values and the agent's world state.
//!
//! State values are atoms compared by equality. The world state is a
//! deterministic key-value store owned by the automaton; goals, action
//! declarations, and planner nodes use insertion-ordered maps so that
//! declaration order is observable during search.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered symbolic mapping used for goals, declarations, and
/// planner node states.
pub type StateMap = IndexMap<String, Value>;

/// An atomic state value.
///
/// `Undefined` is the read-result for keys absent from the world state. It
/// never compares equal to a legitimate demanded value, so satisfaction
/// checks against missing keys fail deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Undefined,
}

/// Atom kind, used to report structural type conflicts in declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Str,
    Undefined,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Str(_) => ValueKind::Str,
            Value::Undefined => ValueKind::Undefined,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Value::Undefined)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Undefined => write!(f, "NOT_DEFINED"),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Str => write!(f, "string"),
            ValueKind::Undefined => write!(f, "NOT_DEFINED"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// The agent's belief about the world: a mutable fact store.
///
/// Backed by a `BTreeMap` so iteration and hashing are deterministic across
/// platforms. Insertion order carries no meaning here, unlike [`StateMap`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    facts: BTreeMap<String, Value>,
}

impl Hash for WorldState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (k, v) in &self.facts {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a world state from literal facts.
    pub fn from_facts<K, V>(facts: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut state = Self::new();
        for (key, value) in facts {
            state.set(key, value);
        }
        state
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.facts.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    /// Read a key, yielding `Value::Undefined` when it is absent.
    pub fn fetch(&self, key: &str) -> Value {
        self.facts.get(key).cloned().unwrap_or(Value::Undefined)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    /// True when every entry of `conditions` matches this state exactly.
    pub fn satisfies<'a>(
        &self,
        conditions: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> bool {
        conditions
            .into_iter()
            .all(|(key, value)| self.facts.get(key) == Some(value))
    }

    /// Overwrite this state with the given entries.
    pub fn apply<'a>(&mut self, entries: impl IntoIterator<Item = (&'a String, &'a Value)>) {
        for (key, value) in entries {
            self.facts.insert(key.clone(), value.clone());
        }
    }

    /// Count of `goal` entries this state does not match.
    pub fn distance_to<'a>(
        &self,
        goal: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> usize {
        goal.into_iter()
            .filter(|(key, value)| self.facts.get(*key) != Some(value))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
