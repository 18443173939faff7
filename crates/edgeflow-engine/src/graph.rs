//! Dependency graph construction and ordering
//!
//! Builds the DAG from a declaration set and derives the execution order.
//! Structural validation happens here: duplicate ids, references to
//! undeclared resources and cycles all abort the run before any provider
//! call is made.

use crate::error::{EngineError, Result};
use edgeflow_core::{ResourceDescriptor, ResourceId};
use std::collections::{BTreeMap, BTreeSet};

/// Validated dependency graph over a declaration set
///
/// The topological order is deterministic: among nodes that become ready
/// at the same time, ids are taken in lexicographic order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    order: Vec<ResourceId>,
    dependencies: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
    dependents: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
}

impl DependencyGraph {
    /// Build and validate the graph
    ///
    /// Dependency edges are the union of each descriptor's explicit
    /// `depends_on` set and the references embedded in its configuration.
    pub fn build(descriptors: &[ResourceDescriptor]) -> Result<Self> {
        let mut dependencies: BTreeMap<ResourceId, BTreeSet<ResourceId>> = BTreeMap::new();
        for descriptor in descriptors {
            if dependencies
                .insert(descriptor.id.clone(), descriptor.dependencies())
                .is_some()
            {
                return Err(EngineError::DuplicateId(descriptor.id.to_string()));
            }
        }

        for (id, deps) in &dependencies {
            for dep in deps {
                if !dependencies.contains_key(dep) {
                    return Err(EngineError::UnknownDependency {
                        id: id.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }

        let mut dependents: BTreeMap<ResourceId, BTreeSet<ResourceId>> = dependencies
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();
        for (id, deps) in &dependencies {
            for dep in deps {
                if let Some(set) = dependents.get_mut(dep) {
                    set.insert(id.clone());
                }
            }
        }

        // Kahn's algorithm; a self-dependency keeps its own indegree above
        // zero and is reported as a cycle like any other loop.
        let mut indegree: BTreeMap<ResourceId, usize> = dependencies
            .iter()
            .map(|(id, deps)| (id.clone(), deps.len()))
            .collect();
        let mut ready: BTreeSet<ResourceId> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.clone())
            .collect();

        let mut order = Vec::with_capacity(dependencies.len());
        while let Some(id) = ready.pop_first() {
            if let Some(downstream) = dependents.get(&id) {
                for dependent in downstream {
                    if let Some(degree) = indegree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(dependent.clone());
                        }
                    }
                }
            }
            order.push(id);
        }

        if order.len() != dependencies.len() {
            let ordered: BTreeSet<_> = order.iter().collect();
            let stuck: Vec<String> = dependencies
                .keys()
                .filter(|id| !ordered.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(EngineError::Cycle(stuck.join(", ")));
        }

        Ok(Self {
            order,
            dependencies,
            dependents,
        })
    }

    /// Execution order (dependencies first)
    pub fn topological(&self) -> &[ResourceId] {
        &self.order
    }

    /// Teardown order (dependents first)
    pub fn reverse_topological(&self) -> Vec<ResourceId> {
        self.order.iter().rev().cloned().collect()
    }

    /// Direct dependencies of a node
    pub fn dependencies_of(&self, id: &ResourceId) -> Option<&BTreeSet<ResourceId>> {
        self.dependencies.get(id)
    }

    /// Direct dependents of a node
    pub fn dependents_of(&self, id: &ResourceId) -> Option<&BTreeSet<ResourceId>> {
        self.dependents.get(id)
    }

    /// All nodes downstream of `id`, directly or transitively
    pub fn transitive_dependents(&self, id: &ResourceId) -> BTreeSet<ResourceId> {
        let mut visited = BTreeSet::new();
        let mut frontier = vec![id.clone()];
        while let Some(current) = frontier.pop() {
            if let Some(downstream) = self.dependents.get(&current) {
                for dependent in downstream {
                    if visited.insert(dependent.clone()) {
                        frontier.push(dependent.clone());
                    }
                }
            }
        }
        visited
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.dependencies.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
