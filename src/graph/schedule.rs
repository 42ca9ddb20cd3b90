// ABOUTME: Layers a scoped part of the graph into generations of parallel-safe stacks.
// ABOUTME: Reverse direction tears dependents down before their dependencies.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{GraphError, StackGraph};
use crate::types::StackName;

/// Order in which an action walks the dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Dependencies before dependents (create, update, launch, drift).
    Forward,
    /// Dependents before dependencies (delete).
    Reverse,
}

impl StackGraph {
    /// Group `scope` into generations.
    ///
    /// A stack lands in generation `k` once every in-scope stack it depends
    /// on, directly or through stacks outside the scope, sits in an earlier
    /// generation. Each generation is sorted by name. The reverse order is
    /// exactly the forward order reversed.
    pub fn generations(
        &self,
        scope: &BTreeSet<StackName>,
        direction: Direction,
    ) -> Result<Vec<Vec<StackName>>, GraphError> {
        let mut waiting: BTreeMap<StackName, usize> = BTreeMap::new();
        let mut unblocks: BTreeMap<StackName, Vec<StackName>> = BTreeMap::new();

        for name in scope.iter().filter(|name| self.contains(name)) {
            let upstream = self.closure(&BTreeSet::from([name.clone()]), Direction::Forward);
            let blockers: Vec<&StackName> = upstream
                .iter()
                .filter(|d| *d != name && scope.contains(*d))
                .collect();
            for blocker in &blockers {
                unblocks
                    .entry((*blocker).clone())
                    .or_default()
                    .push(name.clone());
            }
            waiting.insert(name.clone(), blockers.len());
        }

        let mut generations = Vec::new();
        let mut ready: Vec<StackName> = waiting
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| name.clone())
            .collect();

        while !ready.is_empty() {
            let mut next = Vec::new();
            for name in &ready {
                waiting.remove(name);
                for dependent in unblocks.get(name).into_iter().flatten() {
                    if let Some(count) = waiting.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }
            next.sort();
            generations.push(std::mem::replace(&mut ready, next));
        }

        if !waiting.is_empty() {
            return Err(GraphError::CircularDependency {
                members: waiting.into_keys().collect(),
            });
        }

        if direction == Direction::Reverse {
            generations.reverse();
        }
        Ok(generations)
    }
}
