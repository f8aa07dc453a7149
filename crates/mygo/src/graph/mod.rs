//! Sub-task dependency graph.
//!
//! This module provides the immutable, validated representation of a
//! decomposed task: sub-tasks, typed dependency edges and constraints. The
//! graph keeps forward and reverse adjacency so the planner can ask both
//! "what follows this sub-task" and "what does this sub-task wait on" in
//! constant time per edge.
//!
//! Edge kinds are evaluated as follows:
//! - `Sequential`: satisfied once the source is settled (completed, or skipped
//!   by explicit abandonment). Sequential and conditional successors of the
//!   same node are alternatives.
//! - `Conditional`: like sequential, and the edge condition must hold for a
//!   user utterance made while the source was active. A settled source whose
//!   condition fails voids the edge.
//! - `Parallel`: like sequential, but the target is pursued alongside the
//!   source's other successors and is never closed as an alternative.
//!
//! An edge whose source was closed as a branch not taken is void. A pending
//! sub-task is unlocked once no incoming edge is blocking, at least one is
//! satisfied (or the sub-task is a root), and its constraints hold.

pub mod constraint;
pub mod error;
pub mod mermaid;

pub use constraint::{
    Constraint, ConstraintDimension, ConstraintRule, ConstraintScope, EvalContext,
};
pub use error::GraphError;

use crate::history::DialogueHistory;
use crate::planner::{ProgressState, SkipReason, SubTaskStatus};
use constraint::mentions_any;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Unique identifier of a sub-task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubTaskId(String);

impl SubTaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubTaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SubTaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&SubTaskId> for SubTaskId {
    fn from(value: &SubTaskId) -> Self {
        value.clone()
    }
}

/// How checklist items in [`CompletionCriteria`] combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every item must be covered.
    #[default]
    All,
    /// One item is enough.
    Any,
}

/// Checklist the completion judge evaluates against the dialogue.
///
/// An empty checklist is satisfied as soon as the user has replied while the
/// sub-task was active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCriteria {
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub mode: MatchMode,
}

impl CompletionCriteria {
    /// Criteria requiring every item.
    pub fn all<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            mode: MatchMode::All,
        }
    }

    /// Criteria requiring at least one item.
    pub fn any<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            mode: MatchMode::Any,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An atomic unit of the predefined task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: SubTaskId,
    /// Goal text handed to the chat agent.
    #[serde(alias = "name")]
    pub description: String,
    #[serde(default)]
    pub criteria: CompletionCriteria,
    /// Tie-break among candidates; lower values win, `None` ranks last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Marks a sub-task the dialogue may end on even if it has successors.
    #[serde(default)]
    pub terminal: bool,
}

impl SubTask {
    pub fn new(id: impl Into<SubTaskId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            criteria: CompletionCriteria::default(),
            priority: None,
            terminal: false,
        }
    }

    pub fn with_criteria(mut self, criteria: CompletionCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    #[default]
    Sequential,
    Conditional,
    Parallel,
}

/// Branch condition of a conditional edge.
///
/// Holds when a user utterance made while the source was active mentions any
/// keyword, or the label itself when no keywords are given. Deserializes from
/// either a bare label string or a `{ label, keywords }` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConditionRepr")]
pub struct EdgeCondition {
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConditionRepr {
    Label(String),
    Full {
        label: String,
        #[serde(default)]
        keywords: Vec<String>,
    },
}

impl From<ConditionRepr> for EdgeCondition {
    fn from(repr: ConditionRepr) -> Self {
        match repr {
            ConditionRepr::Label(label) => Self {
                label,
                keywords: Vec::new(),
            },
            ConditionRepr::Full { label, keywords } => Self { label, keywords },
        }
    }
}

impl EdgeCondition {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if any utterance satisfies the condition.
    pub fn matches<'a>(&self, mut utterances: impl Iterator<Item = &'a str>) -> bool {
        if self.keywords.is_empty() {
            let label = [self.label.clone()];
            utterances.any(|u| mentions_any(u, &label))
        } else {
            utterances.any(|u| mentions_any(u, &self.keywords))
        }
    }
}

impl From<&str> for EdgeCondition {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// A directed dependency `source -> target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    #[serde(alias = "from")]
    pub source: SubTaskId,
    #[serde(alias = "to")]
    pub target: SubTaskId,
    #[serde(default, alias = "type")]
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EdgeCondition>,
}

impl DependencyEdge {
    pub fn new(source: impl Into<SubTaskId>, target: impl Into<SubTaskId>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            condition: None,
        }
    }

    pub fn conditional(
        source: impl Into<SubTaskId>,
        target: impl Into<SubTaskId>,
        condition: impl Into<EdgeCondition>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Conditional,
            condition: Some(condition.into()),
        }
    }

    /// Sequential and conditional successors of one node exclude each other.
    pub fn is_alternative(&self) -> bool {
        matches!(self.kind, EdgeKind::Sequential | EdgeKind::Conditional)
    }
}

/// The raw graph document produced by a graph generator.
///
/// Nothing is checked until [`GraphSpec::validate`] or
/// [`TaskGraph::from_spec`] runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(alias = "nodes")]
    pub subtasks: Vec<SubTask>,
    #[serde(default)]
    pub edges: Vec<DependencyEdge>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Explicit roots. When empty, every sub-task without incoming edges is a root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<SubTaskId>,
}

impl GraphSpec {
    /// Checks the document: structure, then acyclicity, then root reachability.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.check_structure()?;
        if let Some(id) = self.find_cycle() {
            return Err(GraphError::CycleDetected(id));
        }
        if let Some(id) = self.find_unreachable() {
            return Err(GraphError::UnreachableSubTask(id));
        }
        Ok(())
    }

    /// Roots in declaration order.
    pub fn effective_roots(&self) -> Vec<SubTaskId> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }
        let targets: HashSet<&SubTaskId> = self.edges.iter().map(|e| &e.target).collect();
        self.subtasks
            .iter()
            .filter(|s| !targets.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }

    fn check_structure(&self) -> Result<(), GraphError> {
        if self.subtasks.is_empty() {
            return Err(GraphError::invalid("graph has no sub-tasks"));
        }

        let mut ids = HashSet::new();
        for subtask in &self.subtasks {
            if subtask.id.as_str().trim().is_empty() {
                return Err(GraphError::invalid("sub-task with empty id"));
            }
            if !ids.insert(&subtask.id) {
                return Err(GraphError::invalid(format!(
                    "duplicate sub-task id: {}",
                    subtask.id
                )));
            }
        }

        let mut pairs = HashSet::new();
        for edge in &self.edges {
            for end in [&edge.source, &edge.target] {
                if !ids.contains(end) {
                    return Err(GraphError::invalid(format!(
                        "edge {} -> {} references unknown sub-task {}",
                        edge.source, edge.target, end
                    )));
                }
            }
            if !pairs.insert((&edge.source, &edge.target)) {
                return Err(GraphError::invalid(format!(
                    "duplicate edge {} -> {}",
                    edge.source, edge.target
                )));
            }
            match (edge.kind, &edge.condition) {
                (EdgeKind::Conditional, None) => {
                    return Err(GraphError::invalid(format!(
                        "conditional edge {} -> {} has no condition",
                        edge.source, edge.target
                    )));
                }
                (EdgeKind::Sequential | EdgeKind::Parallel, Some(_)) => {
                    return Err(GraphError::invalid(format!(
                        "edge {} -> {} carries a condition but is not conditional",
                        edge.source, edge.target
                    )));
                }
                _ => {}
            }
        }

        for constraint in &self.constraints {
            match &constraint.scope {
                ConstraintScope::SubTask(id) => {
                    if !ids.contains(id) {
                        return Err(GraphError::invalid(format!(
                            "constraint references unknown sub-task {}",
                            id
                        )));
                    }
                }
                ConstraintScope::Edge { source, target } => {
                    if !pairs.contains(&(source, target)) {
                        return Err(GraphError::invalid(format!(
                            "constraint references unknown edge {} -> {}",
                            source, target
                        )));
                    }
                }
            }
            if let ConstraintRule::After { subtasks } = &constraint.rule {
                if let Some(unknown) = subtasks.iter().find(|id| !ids.contains(id)) {
                    return Err(GraphError::invalid(format!(
                        "ordering constraint references unknown sub-task {}",
                        unknown
                    )));
                }
            }
        }

        let targets: HashSet<&SubTaskId> = self.edges.iter().map(|e| &e.target).collect();
        for root in &self.roots {
            if !ids.contains(root) {
                return Err(GraphError::invalid(format!("unknown root {}", root)));
            }
            if targets.contains(root) {
                return Err(GraphError::invalid(format!(
                    "root {} has incoming dependencies",
                    root
                )));
            }
        }

        Ok(())
    }

    fn adjacency(&self) -> HashMap<&SubTaskId, Vec<&SubTaskId>> {
        let mut adjacency: HashMap<&SubTaskId, Vec<&SubTaskId>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(&edge.source).or_default().push(&edge.target);
        }
        adjacency
    }

    /// Depth-first search with a recursion stack; returns a node on a cycle.
    fn find_cycle(&self) -> Option<SubTaskId> {
        let adjacency = self.adjacency();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for subtask in &self.subtasks {
            if let Some(id) = cycle_dfs(&subtask.id, &adjacency, &mut visited, &mut rec_stack) {
                return Some(id.clone());
            }
        }
        None
    }

    fn find_unreachable(&self) -> Option<SubTaskId> {
        let adjacency = self.adjacency();
        let roots = self.effective_roots();
        let mut seen: HashSet<&SubTaskId> = HashSet::new();
        let mut queue: VecDeque<&SubTaskId> = VecDeque::new();
        for root in &roots {
            if seen.insert(root) {
                queue.push_back(root);
            }
        }
        while let Some(node) = queue.pop_front() {
            for &next in adjacency.get(node).into_iter().flatten() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        self.subtasks
            .iter()
            .find(|s| !seen.contains(&s.id))
            .map(|s| s.id.clone())
    }
}

fn cycle_dfs<'a>(
    node: &'a SubTaskId,
    adjacency: &HashMap<&'a SubTaskId, Vec<&'a SubTaskId>>,
    visited: &mut HashSet<&'a SubTaskId>,
    rec_stack: &mut HashSet<&'a SubTaskId>,
) -> Option<&'a SubTaskId> {
    if rec_stack.contains(node) {
        return Some(node); // back edge
    }
    if visited.contains(node) {
        return None;
    }

    visited.insert(node);
    rec_stack.insert(node);

    for &next in adjacency.get(node).into_iter().flatten() {
        if let Some(id) = cycle_dfs(next, adjacency, visited, rec_stack) {
            return Some(id);
        }
    }

    rec_stack.remove(node);
    None
}

/// How a single incoming edge stands under a progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeStanding {
    Satisfied,
    Void,
    Blocking,
}

/// A validated, immutable sub-task dependency graph.
///
/// Built once per session and shared read-only (typically behind an `Arc`).
///
/// # Examples
///
/// ```
/// use mygo::graph::{SubTask, TaskGraph};
///
/// let graph = TaskGraph::builder()
///     .subtask(SubTask::new("greet", "Greet the user"))
///     .subtask(SubTask::new("collect", "Collect contact details"))
///     .sequential("greet", "collect")
///     .build()
///     .unwrap();
///
/// assert_eq!(graph.roots()[0].as_str(), "greet");
/// assert!(graph.is_terminal(&"collect".into()));
/// ```
#[derive(Debug, Clone)]
pub struct TaskGraph {
    spec: GraphSpec,
    roots: Vec<SubTaskId>,
    index: HashMap<SubTaskId, usize>,
    /// Forward edges: sub-task -> indices of its outgoing edges
    outgoing: HashMap<SubTaskId, Vec<usize>>,
    /// Reverse edges: sub-task -> indices of its incoming edges
    incoming: HashMap<SubTaskId, Vec<usize>>,
}

impl TaskGraph {
    /// Starts building a graph in code.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Validates `spec` and indexes it.
    pub fn from_spec(spec: GraphSpec) -> Result<Self, GraphError> {
        spec.validate()?;

        let roots = spec.effective_roots();
        let index = spec
            .subtasks
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let mut outgoing: HashMap<SubTaskId, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<SubTaskId, Vec<usize>> = HashMap::new();
        for (i, edge) in spec.edges.iter().enumerate() {
            outgoing.entry(edge.source.clone()).or_default().push(i);
            incoming.entry(edge.target.clone()).or_default().push(i);
        }

        Ok(Self {
            spec,
            roots,
            index,
            outgoing,
            incoming,
        })
    }

    /// Parses and validates a JSON graph document.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let spec: GraphSpec = serde_json::from_str(json)?;
        Self::from_spec(spec)
    }

    /// Parses and validates a Mermaid flowchart.
    pub fn from_mermaid(text: &str) -> Result<Self, GraphError> {
        Self::from_spec(mermaid::parse(text)?)
    }

    /// Returns the underlying document.
    pub fn spec(&self) -> &GraphSpec {
        &self.spec
    }

    pub fn subtasks(&self) -> &[SubTask] {
        &self.spec.subtasks
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.spec.edges
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.spec.constraints
    }

    pub fn len(&self) -> usize {
        self.spec.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spec.subtasks.is_empty()
    }

    pub fn roots(&self) -> &[SubTaskId] {
        &self.roots
    }

    pub fn is_root(&self, id: &SubTaskId) -> bool {
        self.roots.contains(id)
    }

    pub fn contains(&self, id: &SubTaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn subtask(&self, id: &SubTaskId) -> Option<&SubTask> {
        self.index.get(id).map(|&i| &self.spec.subtasks[i])
    }

    /// Declaration index of a sub-task.
    pub fn position(&self, id: &SubTaskId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Outgoing edges in declaration order.
    pub fn outgoing(&self, id: &SubTaskId) -> impl Iterator<Item = &DependencyEdge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.spec.edges[i])
    }

    /// Incoming edges in declaration order.
    pub fn incoming(&self, id: &SubTaskId) -> impl Iterator<Item = &DependencyEdge> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.spec.edges[i])
    }

    pub fn edge(&self, source: &SubTaskId, target: &SubTaskId) -> Option<&DependencyEdge> {
        self.outgoing(source).find(|e| &e.target == target)
    }

    /// Direct successors in declaration order.
    pub fn successors(&self, id: &SubTaskId) -> Vec<&SubTaskId> {
        let mut successors: Vec<&SubTaskId> = self.outgoing(id).map(|e| &e.target).collect();
        successors.sort_by_key(|s| self.position(s));
        successors
    }

    /// A dialogue may end on declared terminals and on sub-tasks without successors.
    pub fn is_terminal(&self, id: &SubTaskId) -> bool {
        self.subtask(id).is_some_and(|s| s.terminal) || self.outgoing(id).next().is_none()
    }

    pub fn constraints_for<'a>(
        &'a self,
        id: &'a SubTaskId,
    ) -> impl Iterator<Item = &'a Constraint> {
        self.spec
            .constraints
            .iter()
            .filter(move |c| matches!(&c.scope, ConstraintScope::SubTask(s) if s == id))
    }

    pub fn constraints_for_edge<'a>(
        &'a self,
        edge: &'a DependencyEdge,
    ) -> impl Iterator<Item = &'a Constraint> {
        self.spec.constraints.iter().filter(move |c| {
            matches!(&c.scope, ConstraintScope::Edge { source, target }
                if source == &edge.source && target == &edge.target)
        })
    }

    /// Immediate successors of `node` that become unlocked if `node` completes now.
    ///
    /// Pure: repeated calls with the same state and context return the same
    /// list, in declaration order.
    pub fn reachable_from(
        &self,
        state: &ProgressState,
        node: &SubTaskId,
        ctx: &EvalContext<'_>,
    ) -> Vec<SubTaskId> {
        let ctx = ctx.assuming_completed(node);
        let mut reachable: Vec<SubTaskId> = Vec::new();
        for target in self.successors(node) {
            if !reachable.contains(target) && self.unlocked_with(state, target, &ctx, true) {
                reachable.push(target.clone());
            }
        }
        reachable
    }

    /// Pending sub-tasks unlocked under the actual state, in declaration order.
    pub fn unlocked(&self, state: &ProgressState, ctx: &EvalContext<'_>) -> Vec<SubTaskId> {
        self.spec
            .subtasks
            .iter()
            .filter(|s| self.unlocked_with(state, &s.id, ctx, true))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Whether the sub-task is unlocked when constraints are ignored.
    ///
    /// Edge conditions still apply.
    pub fn is_unlocked_structurally(
        &self,
        state: &ProgressState,
        id: &SubTaskId,
        history: &DialogueHistory,
    ) -> bool {
        self.unlocked_with(state, id, &EvalContext::new(history, 0), false)
    }

    /// Whether the condition on `edge` holds (branch evidence).
    pub fn condition_met(&self, edge: &DependencyEdge, history: &DialogueHistory) -> bool {
        match &edge.condition {
            Some(condition) => condition.matches(history.user_utterances_for(&edge.source)),
            None => false,
        }
    }

    fn standing(
        &self,
        edge: &DependencyEdge,
        state: &ProgressState,
        ctx: &EvalContext<'_>,
    ) -> EdgeStanding {
        let status = if ctx.assume_completed == Some(&edge.source) {
            Some(SubTaskStatus::Completed)
        } else {
            state.status(&edge.source).copied()
        };

        match status {
            Some(SubTaskStatus::Completed | SubTaskStatus::Skipped(SkipReason::Abandoned)) => {
                if edge.kind == EdgeKind::Conditional && !self.condition_met(edge, ctx.history) {
                    EdgeStanding::Void
                } else {
                    EdgeStanding::Satisfied
                }
            }
            Some(SubTaskStatus::Skipped(SkipReason::NotTaken)) => EdgeStanding::Void,
            Some(SubTaskStatus::Pending | SubTaskStatus::Active) | None => EdgeStanding::Blocking,
        }
    }

    fn unlocked_with(
        &self,
        state: &ProgressState,
        id: &SubTaskId,
        ctx: &EvalContext<'_>,
        check_constraints: bool,
    ) -> bool {
        if !matches!(state.status(id), Some(SubTaskStatus::Pending)) {
            return false;
        }

        let mut satisfied_any = false;
        for edge in self.incoming(id) {
            match self.standing(edge, state, ctx) {
                EdgeStanding::Blocking => return false,
                EdgeStanding::Void => {}
                EdgeStanding::Satisfied => {
                    satisfied_any = true;
                    if check_constraints
                        && !self.constraints_for_edge(edge).all(|c| c.holds(state, ctx))
                    {
                        return false;
                    }
                }
            }
        }

        if !satisfied_any && !self.is_root(id) {
            return false;
        }

        !check_constraints || self.constraints_for(id).all(|c| c.holds(state, ctx))
    }
}

/// Builder for assembling a [`TaskGraph`] in code.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    spec: GraphSpec,
}

impl GraphBuilder {
    pub fn subtask(mut self, subtask: SubTask) -> Self {
        self.spec.subtasks.push(subtask);
        self
    }

    pub fn edge(mut self, edge: DependencyEdge) -> Self {
        self.spec.edges.push(edge);
        self
    }

    /// `target` follows `source`; alternatives to other sequential successors.
    pub fn sequential(self, source: impl Into<SubTaskId>, target: impl Into<SubTaskId>) -> Self {
        self.edge(DependencyEdge::new(source, target, EdgeKind::Sequential))
    }

    /// `target` follows `source` alongside its other successors.
    pub fn parallel(self, source: impl Into<SubTaskId>, target: impl Into<SubTaskId>) -> Self {
        self.edge(DependencyEdge::new(source, target, EdgeKind::Parallel))
    }

    /// `target` follows `source` when `condition` holds.
    pub fn conditional(
        self,
        source: impl Into<SubTaskId>,
        target: impl Into<SubTaskId>,
        condition: impl Into<EdgeCondition>,
    ) -> Self {
        self.edge(DependencyEdge::conditional(source, target, condition))
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.spec.constraints.push(constraint);
        self
    }

    pub fn root(mut self, id: impl Into<SubTaskId>) -> Self {
        self.spec.roots.push(id.into());
        self
    }

    /// Returns the unvalidated document.
    pub fn into_spec(self) -> GraphSpec {
        self.spec
    }

    pub fn build(self) -> Result<TaskGraph, GraphError> {
        TaskGraph::from_spec(self.spec)
    }
}
