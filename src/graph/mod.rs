// ABOUTME: Dependency graph of stacks built from explicit and resolver-derived edges.
// ABOUTME: Construction validates names and rejects cycles; the graph is immutable afterwards.

mod schedule;

pub use schedule::Direction;

use petgraph::Direction::{Incoming, Outgoing};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use crate::resolvers::{ResolverError, ResolverRegistry};
use crate::stack::Stack;
use crate::types::StackName;

/// Errors raised while building a graph. All are fatal: no plan can run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("stack {0} is declared more than once")]
    DuplicateStack(StackName),

    #[error("stack {stack} depends on undeclared stack {dependency}")]
    UndeclaredDependency {
        stack: StackName,
        dependency: StackName,
    },

    #[error("circular dependency: {}", format_cycle(members))]
    CircularDependency { members: Vec<StackName> },

    #[error("stack {stack} uses unknown resolver {kind} in parameter {parameter}")]
    UnknownResolver {
        stack: StackName,
        parameter: String,
        kind: String,
    },

    #[error("stack {stack} has invalid {kind} arguments in parameter {parameter}: {message}")]
    InvalidResolverArguments {
        stack: StackName,
        parameter: String,
        kind: String,
        message: String,
    },
}

fn format_cycle(members: &[StackName]) -> String {
    let mut names: Vec<&str> = members.iter().map(StackName::as_str).collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    names.join(" -> ")
}

/// Why one stack depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Listed under `dependencies`.
    Explicit,
    /// Discovered by scanning resolver expressions.
    Resolver,
}

#[derive(Debug)]
struct GraphNode {
    stack: Arc<Stack>,
    resolver_dependencies: BTreeSet<StackName>,
}

/// Directed acyclic graph of stacks. Edges point from a dependency to its
/// dependent.
#[derive(Debug)]
pub struct StackGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    index: BTreeMap<StackName, NodeIndex>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl StackGraph {
    /// Build the graph, consulting `resolvers` for implicit dependencies.
    pub fn build<I>(stacks: I, resolvers: &ResolverRegistry) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = Stack>,
    {
        let mut graph = DiGraph::new();
        let mut index = BTreeMap::new();

        for stack in stacks {
            let name = stack.name().clone();
            if index.contains_key(&name) {
                return Err(GraphError::DuplicateStack(name));
            }
            let resolver_dependencies = scan_resolvers(&stack, resolvers)?;
            let node = graph.add_node(GraphNode {
                stack: Arc::new(stack),
                resolver_dependencies,
            });
            index.insert(name, node);
        }

        let mut built = Self { graph, index };
        built.connect()?;

        if let Some(members) = built.find_cycle() {
            return Err(GraphError::CircularDependency { members });
        }

        tracing::debug!(
            stacks = built.graph.node_count(),
            edges = built.graph.edge_count(),
            "Built dependency graph"
        );
        Ok(built)
    }

    fn connect(&mut self) -> Result<(), GraphError> {
        let mut edges = Vec::new();
        for (name, &node) in &self.index {
            let data = &self.graph[node];
            let explicit = data.stack.dependencies().iter().map(|d| (d, EdgeKind::Explicit));
            let implicit = data
                .resolver_dependencies
                .iter()
                .map(|d| (d, EdgeKind::Resolver));

            for (dependency, kind) in explicit.chain(implicit) {
                let source = self.index.get(dependency).copied().ok_or_else(|| {
                    GraphError::UndeclaredDependency {
                        stack: name.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                edges.push((source, node, kind));
            }
        }

        for (source, target, kind) in edges {
            // Explicit edges are added first, so a resolver edge never
            // overwrites one.
            if self.graph.find_edge(source, target).is_none() {
                self.graph.add_edge(source, target, kind);
            }
        }
        Ok(())
    }

    /// Three-colour depth-first search. Returns the stacks on the first
    /// cycle found, in traversal order.
    fn find_cycle(&self) -> Option<Vec<StackName>> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];

        for &start in self.index.values() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            marks[start.index()] = Mark::InProgress;
            let mut path = vec![start];
            let mut frontier = vec![self.sorted_neighbors(start, Outgoing)];

            while let Some(pending) = frontier.last_mut() {
                match pending.pop() {
                    Some(next) => match marks[next.index()] {
                        Mark::Unvisited => {
                            marks[next.index()] = Mark::InProgress;
                            path.push(next);
                            frontier.push(self.sorted_neighbors(next, Outgoing));
                        }
                        Mark::InProgress => {
                            let from = path.iter().position(|n| *n == next).unwrap_or(0);
                            return Some(
                                path[from..]
                                    .iter()
                                    .map(|n| self.graph[*n].stack.name().clone())
                                    .collect(),
                            );
                        }
                        Mark::Done => {}
                    },
                    None => {
                        frontier.pop();
                        if let Some(done) = path.pop() {
                            marks[done.index()] = Mark::Done;
                        }
                    }
                }
            }
        }

        None
    }

    /// Neighbours sorted so that popping yields them in name order.
    fn sorted_neighbors(&self, node: NodeIndex, direction: petgraph::Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort_by(|a, b| self.graph[*b].stack.name().cmp(self.graph[*a].stack.name()));
        neighbors
    }

    fn names(&self, node: NodeIndex, direction: petgraph::Direction) -> BTreeSet<StackName> {
        self.graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].stack.name().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &StackName) -> bool {
        self.index.contains_key(name)
    }

    pub fn stack(&self, name: &StackName) -> Option<&Arc<Stack>> {
        self.index.get(name).map(|n| &self.graph[*n].stack)
    }

    /// All stacks, ordered by name.
    pub fn stacks(&self) -> impl Iterator<Item = &Arc<Stack>> + '_ {
        self.index.values().map(|n| &self.graph[*n].stack)
    }

    /// Direct dependencies of a stack, explicit and resolver-derived.
    pub fn dependencies(&self, name: &StackName) -> BTreeSet<StackName> {
        self.index
            .get(name)
            .map(|n| self.names(*n, Incoming))
            .unwrap_or_default()
    }

    /// Stacks that directly depend on `name`.
    pub fn dependents(&self, name: &StackName) -> BTreeSet<StackName> {
        self.index
            .get(name)
            .map(|n| self.names(*n, Outgoing))
            .unwrap_or_default()
    }

    /// Stacks discovered as dependencies through resolver expressions.
    pub fn resolver_dependencies(&self, name: &StackName) -> Option<&BTreeSet<StackName>> {
        self.index
            .get(name)
            .map(|n| &self.graph[*n].resolver_dependencies)
    }

    /// How `dependent` came to depend on `dependency`, if it does directly.
    pub fn edge_kind(&self, dependency: &StackName, dependent: &StackName) -> Option<EdgeKind> {
        let source = *self.index.get(dependency)?;
        let target = *self.index.get(dependent)?;
        let edge = self.graph.find_edge(source, target)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Stacks selected by a command path (`""` or `"."` selects everything).
    pub fn select(&self, command_path: &str) -> BTreeSet<StackName> {
        self.stacks()
            .filter(|s| s.matches_path(command_path))
            .map(|s| s.name().clone())
            .collect()
    }

    /// `roots` plus everything reachable from them: transitive dependencies
    /// for [`Direction::Forward`], transitive dependents for
    /// [`Direction::Reverse`].
    pub fn closure(&self, roots: &BTreeSet<StackName>, direction: Direction) -> BTreeSet<StackName> {
        let edge_direction = match direction {
            Direction::Forward => Incoming,
            Direction::Reverse => Outgoing,
        };

        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<NodeIndex> =
            roots.iter().filter_map(|r| self.index.get(r).copied()).collect();

        while let Some(node) = queue.pop_front() {
            if seen.insert(self.graph[node].stack.name().clone()) {
                queue.extend(self.graph.neighbors_directed(node, edge_direction));
            }
        }
        seen
    }
}

fn scan_resolvers(
    stack: &Stack,
    resolvers: &ResolverRegistry,
) -> Result<BTreeSet<StackName>, GraphError> {
    let mut referenced = BTreeSet::new();
    for (parameter, value) in stack.parameters() {
        let stacks = resolvers
            .referenced_stacks(value)
            .map_err(|(kind, err)| match err {
                ResolverError::UnknownKind(_) => GraphError::UnknownResolver {
                    stack: stack.name().clone(),
                    parameter: parameter.clone(),
                    kind,
                },
                other => GraphError::InvalidResolverArguments {
                    stack: stack.name().clone(),
                    parameter: parameter.clone(),
                    kind,
                    message: other.to_string(),
                },
            })?;
        referenced.extend(stacks);
    }
    Ok(referenced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{GroupPath, ParamValue};

    fn name(s: &str) -> StackName {
        StackName::new(s).unwrap()
    }

    fn stack(s: &str, deps: &[&str]) -> Stack {
        Stack::new(name(s)).with_dependencies(deps.iter().map(|d| name(d)))
    }

    fn build(stacks: Vec<Stack>) -> Result<StackGraph, GraphError> {
        StackGraph::build(stacks, &ResolverRegistry::default())
    }

    #[test]
    fn builds_explicit_edges() {
        let graph = build(vec![stack("vpc", &[]), stack("app", &["vpc"])]).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependencies(&name("app")), BTreeSet::from([name("vpc")]));
        assert_eq!(graph.dependents(&name("vpc")), BTreeSet::from([name("app")]));
        assert_eq!(
            graph.edge_kind(&name("vpc"), &name("app")),
            Some(EdgeKind::Explicit)
        );
    }

    #[test]
    fn resolver_references_become_edges() {
        let app = Stack::new(name("app")).with_parameter(
            "VpcId",
            ParamValue::resolver("stack_output", ["vpc::VpcId".into()]),
        );
        let graph = build(vec![stack("vpc", &[]), app]).unwrap();

        assert_eq!(
            graph.edge_kind(&name("vpc"), &name("app")),
            Some(EdgeKind::Resolver)
        );
        assert_eq!(
            graph.resolver_dependencies(&name("app")),
            Some(&BTreeSet::from([name("vpc")]))
        );
    }

    #[test]
    fn explicit_edge_wins_over_resolver_edge() {
        let app = stack("app", &["vpc"]).with_parameter(
            "VpcId",
            ParamValue::resolver("stack_output", ["vpc".into(), "VpcId".into()]),
        );
        let graph = build(vec![stack("vpc", &[]), app]).unwrap();

        assert_eq!(
            graph.edge_kind(&name("vpc"), &name("app")),
            Some(EdgeKind::Explicit)
        );
        assert_eq!(graph.dependencies(&name("app")).len(), 1);
    }

    #[test]
    fn external_outputs_add_no_edge() {
        let app = Stack::new(name("app")).with_parameter(
            "ZoneId",
            ParamValue::resolver("stack_output_external", ["shared-dns::ZoneId".into()]),
        );
        let graph = build(vec![app]).unwrap();
        assert!(graph.dependencies(&name("app")).is_empty());
    }

    #[test]
    fn duplicate_stack_is_rejected() {
        let err = build(vec![stack("vpc", &[]), stack("vpc", &[])]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateStack(name("vpc")));
    }

    #[test]
    fn undeclared_dependency_is_rejected() {
        let err = build(vec![stack("app", &["vpc"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::UndeclaredDependency {
                stack: name("app"),
                dependency: name("vpc"),
            }
        );
    }

    #[test]
    fn undeclared_resolver_reference_is_rejected() {
        let app = Stack::new(name("app")).with_parameter(
            "VpcId",
            ParamValue::resolver("stack_output", ["vpc::VpcId".into()]),
        );
        let err = build(vec![app]).unwrap_err();
        assert!(matches!(err, GraphError::UndeclaredDependency { .. }));
    }

    #[test]
    fn unknown_resolver_is_rejected() {
        let app = Stack::new(name("app"))
            .with_parameter("Secret", ParamValue::resolver("vault", ["db".into()]));
        let err = build(vec![app]).unwrap_err();
        assert!(matches!(err, GraphError::UnknownResolver { kind, .. } if kind == "vault"));
    }

    #[test]
    fn malformed_resolver_arguments_are_rejected() {
        let app = Stack::new(name("app"))
            .with_parameter("VpcId", ParamValue::resolver("stack_output", ["vpc".into()]));
        let err = build(vec![app]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidResolverArguments { .. }));
    }

    #[test]
    fn cycle_names_every_member() {
        let err = build(vec![
            stack("a", &["c"]),
            stack("b", &["a"]),
            stack("c", &["b"]),
            stack("d", &["a"]),
        ])
        .unwrap_err();

        let GraphError::CircularDependency { members } = err else {
            panic!("expected a cycle, got {err:?}");
        };
        let members: BTreeSet<_> = members.into_iter().collect();
        assert_eq!(members, BTreeSet::from([name("a"), name("b"), name("c")]));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = build(vec![stack("a", &["a"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::CircularDependency {
                members: vec![name("a")]
            }
        );
        assert_eq!(err.to_string(), "circular dependency: a -> a");
    }

    #[test]
    fn resolver_cycle_is_detected() {
        let a = Stack::new(name("a")).with_parameter(
            "FromB",
            ParamValue::resolver("stack_output", ["b::Out".into()]),
        );
        let b = stack("b", &["a"]);
        let err = build(vec![a, b]).unwrap_err();
        assert!(matches!(err, GraphError::CircularDependency { members } if members.len() == 2));
    }

    #[test]
    fn select_and_closure() {
        let graph = build(vec![
            stack("vpc", &[]).with_group(GroupPath::parse("dev/network")),
            stack("db", &["vpc"]).with_group(GroupPath::parse("dev/data")),
            stack("app", &["db"]).with_group(GroupPath::parse("dev/app")),
        ])
        .unwrap();

        let selected = graph.select("dev/data");
        assert_eq!(selected, BTreeSet::from([name("db")]));
        assert_eq!(graph.select(".").len(), 3);

        assert_eq!(
            graph.closure(&selected, Direction::Forward),
            BTreeSet::from([name("db"), name("vpc")])
        );
        assert_eq!(
            graph.closure(&selected, Direction::Reverse),
            BTreeSet::from([name("app"), name("db")])
        );
    }
}
