//! Derived ("computed") properties evaluated in dependency order.
//!
//! Declared `dependencies` are the single source of truth for ordering;
//! they may name raw columns or other computed properties. The evaluation
//! order is fixed once per engine, cycles are detected up front, and a
//! failing implementation never takes its siblings down with it.

use crate::Entity;
use crate::error::{Result, RowmapError};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A pure derivation over one entity.
pub type ComputedFn = Arc<dyn Fn(&Entity) -> Result<JsonValue> + Send + Sync>;

/// A named derived field with its declared dependencies.
#[derive(Clone)]
pub struct ComputedProperty {
    pub name: String,
    pub dependencies: Vec<String>,
    pub implementation: ComputedFn,
}

impl ComputedProperty {
    pub fn new<F>(name: impl Into<String>, dependencies: &[&str], implementation: F) -> Self
    where
        F: Fn(&Entity) -> Result<JsonValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            implementation: Arc::new(implementation),
        }
    }
}

impl fmt::Debug for ComputedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedProperty")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Unvisited,
    Active,
    Done,
}

/// Evaluates an entity's computed properties in topological order.
///
/// Construction resolves the order once; every `apply`/`apply_batch` call
/// reuses it. Properties participating in a dependency cycle are excluded
/// from evaluation entirely and reported through [`cycles`](Self::cycles).
pub struct ComputedPropertyEngine {
    properties: Vec<ComputedProperty>,
    /// Indices into `properties`, dependencies strictly before dependents.
    order: Vec<usize>,
    cycles: Vec<Vec<String>>,
}

impl ComputedPropertyEngine {
    pub fn new(properties: Vec<ComputedProperty>) -> Self {
        let (order, cycles) = Self::resolve_order(&properties);
        if !cycles.is_empty() {
            warn!(
                cycles = ?cycles,
                "computed property dependency cycle(s) detected; cyclic properties will not be evaluated"
            );
        }
        Self {
            properties,
            order,
            cycles,
        }
    }

    /// The evaluation order by property name.
    pub fn order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.properties[i].name.as_str())
            .collect()
    }

    /// Detected dependency cycles, each as the ordered list of property
    /// names involved.
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Materializes computed fields onto `entity`, skipping any property
    /// named in `skip`.
    ///
    /// Each result is written back before the next property evaluates, so
    /// later properties read earlier computed values by plain field access.
    /// An implementation error leaves that property unset and is logged;
    /// remaining properties still evaluate.
    pub fn apply(&self, entity: &mut Entity, skip: &HashSet<String>) {
        for &index in &self.order {
            let property = &self.properties[index];
            if skip.contains(&property.name) {
                continue;
            }
            match (property.implementation)(entity) {
                Ok(value) => {
                    entity.insert(property.name.clone(), value);
                }
                Err(err) => {
                    warn!(
                        property = %property.name,
                        error = %err,
                        "computed property evaluation failed"
                    );
                }
            }
        }
    }

    /// Applies the engine to every entity in `entities` using the order
    /// resolved at construction.
    pub fn apply_batch(&self, entities: &mut [Entity], skip: &HashSet<String>) {
        for entity in entities {
            self.apply(entity, skip);
        }
    }

    /// Evaluates a single property by name, as an explicit request rather
    /// than a full run. Cyclic properties are refused.
    pub fn evaluate(&self, name: &str, entity: &Entity) -> Result<JsonValue> {
        if self.cycles.iter().any(|c| c.iter().any(|n| n == name)) {
            return Err(RowmapError::ComputedProperty {
                property: name.to_string(),
                message: "property participates in a dependency cycle".to_string(),
            });
        }
        let property = self
            .properties
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| RowmapError::ComputedProperty {
                property: name.to_string(),
                message: "unknown computed property".to_string(),
            })?;
        (property.implementation)(entity).map_err(|err| RowmapError::ComputedProperty {
            property: name.to_string(),
            message: err.to_string(),
        })
    }

    /// Depth-first order resolution with active-path cycle detection.
    ///
    /// Only edges to other computed properties matter for ordering; raw
    /// column dependencies are satisfied by the row itself.
    fn resolve_order(properties: &[ComputedProperty]) -> (Vec<usize>, Vec<Vec<String>>) {
        let index_of: HashMap<&str, usize> = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();

        let mut states = vec![VisitState::Unvisited; properties.len()];
        let mut cyclic = vec![false; properties.len()];
        let mut order = Vec::with_capacity(properties.len());
        let mut cycles = Vec::new();
        let mut path: Vec<usize> = Vec::new();

        fn visit(
            node: usize,
            properties: &[ComputedProperty],
            index_of: &HashMap<&str, usize>,
            states: &mut [VisitState],
            cyclic: &mut [bool],
            order: &mut Vec<usize>,
            cycles: &mut Vec<Vec<String>>,
            path: &mut Vec<usize>,
        ) {
            states[node] = VisitState::Active;
            path.push(node);

            for dep in &properties[node].dependencies {
                let Some(&dep_index) = index_of.get(dep.as_str()) else {
                    continue;
                };
                match states[dep_index] {
                    VisitState::Unvisited => visit(
                        dep_index, properties, index_of, states, cyclic, order, cycles, path,
                    ),
                    VisitState::Active => {
                        // Back edge: the cycle is the path slice from the
                        // dependency back to the current node.
                        let start = path
                            .iter()
                            .position(|&n| n == dep_index)
                            .unwrap_or(path.len() - 1);
                        let members: Vec<usize> = path[start..].to_vec();
                        for &member in &members {
                            cyclic[member] = true;
                        }
                        cycles.push(
                            members
                                .iter()
                                .map(|&m| properties[m].name.clone())
                                .collect(),
                        );
                    }
                    VisitState::Done => {}
                }
            }

            path.pop();
            states[node] = VisitState::Done;
            if !cyclic[node] {
                order.push(node);
            }
        }

        for node in 0..properties.len() {
            if states[node] == VisitState::Unvisited {
                visit(
                    node,
                    properties,
                    &index_of,
                    &mut states,
                    &mut cyclic,
                    &mut order,
                    &mut cycles,
                    &mut path,
                );
            }
        }

        // A node marked cyclic after it was already pushed (possible when a
        // later traversal closes a loop through it) must not be evaluated.
        order.retain(|&i| !cyclic[i]);

        (order, cycles)
    }
}

impl fmt::Debug for ComputedPropertyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedPropertyEngine")
            .field("order", &self.order())
            .field("cycles", &self.cycles)
            .finish()
    }
}
