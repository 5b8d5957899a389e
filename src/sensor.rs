//! Sensor capability, the sensor registry, and per-cycle working memory.
//!
//! Sensors are the agent's perception: each one probes the environment and
//! deposits an atom at its bound world-state key. Facts accumulate in
//! working memory for the duration of one sense/act cycle.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::state::{StateMap, Value};

/// A perception capability.
///
/// `exec` reads the environment and produces the new atom for `binding`.
/// When `preconditions` are present the sensor only runs while the current
/// world state matches them.
pub trait Sensor: Send {
    fn name(&self) -> &str;

    /// World-state key this sensor writes.
    fn binding(&self) -> &str;

    fn preconditions(&self) -> Option<&StateMap> {
        None
    }

    /// Probe the environment. Errors propagate out of the sense pass.
    fn exec(&mut self) -> anyhow::Result<Value>;
}

/// Sensor built from a closure, for hosts that do not need a type per probe.
pub struct FnSensor {
    name: String,
    binding: String,
    preconditions: StateMap,
    probe: Box<dyn FnMut() -> anyhow::Result<Value> + Send>,
}

impl FnSensor {
    pub fn new(
        name: impl Into<String>,
        binding: impl Into<String>,
        probe: impl FnMut() -> anyhow::Result<Value> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            binding: binding.into(),
            preconditions: StateMap::new(),
            probe: Box::new(probe),
        }
    }

    pub fn with_precondition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.preconditions.insert(key.into(), value.into());
        self
    }
}

impl Sensor for FnSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> &str {
        &self.binding
    }

    fn preconditions(&self) -> Option<&StateMap> {
        Some(&self.preconditions)
    }

    fn exec(&mut self) -> anyhow::Result<Value> {
        (self.probe)()
    }
}

/// A sensor reading deposited into working memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub binding: String,
    pub value: Value,
    pub sensor: String,
    pub recorded_at: SystemTime,
}

/// Chronological scratchpad of the current cycle's sensor readings.
///
/// Cleared on re-entry into sensing from acting and when the automaton
/// returns to waiting. Not long-term memory.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    facts: Vec<Fact>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fact: Fact) {
        self.facts.push(fact);
    }

    pub fn clear(&mut self) {
        self.facts.clear();
    }

    /// Facts in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Most recent fact for a binding, if any.
    pub fn latest(&self, binding: &str) -> Option<&Fact> {
        self.facts.iter().rev().find(|f| f.binding == binding)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Sensor registry, preserving declaration order.
///
/// Names must be unique, and no two sensors may write the same binding.
#[derive(Default)]
pub struct Sensors {
    entries: Vec<Box<dyn Sensor>>,
}

impl Sensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sensor: impl Sensor + 'static) -> Result<(), SensorError> {
        self.add_boxed(Box::new(sensor))
    }

    pub fn add_boxed(&mut self, sensor: Box<dyn Sensor>) -> Result<(), SensorError> {
        if self.entries.iter().any(|s| s.name() == sensor.name()) {
            return Err(SensorError::AlreadyInCollection(sensor.name().to_string()));
        }
        if let Some(existing) = self.entries.iter().find(|s| s.binding() == sensor.binding()) {
            return Err(SensorError::MultipleType {
                binding: sensor.binding().to_string(),
                first: existing.name().to_string(),
                second: sensor.name().to_string(),
            });
        }
        self.entries.push(sensor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&dyn Sensor, SensorError> {
        self.entries
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
            .ok_or_else(|| SensorError::DoesNotExist(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Result<Box<dyn Sensor>, SensorError> {
        let index = self
            .entries
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| SensorError::DoesNotExist(name.to_string()))?;
        Ok(self.entries.remove(index))
    }

    /// Sensors in declaration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Sensor>> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
