//! Property tests for task graph validation and planner invariants
//!
//! Graphs are generated from a seeded RNG so failures are reproducible.

use mygo::decision::Decision;
use mygo::graph::{
    DependencyEdge, EdgeCondition, EdgeKind, GraphError, GraphSpec, SubTask, SubTaskId, TaskGraph,
};
use mygo::history::DialogueHistory;
use mygo::planner::{PlannerError, StatePlanner, SubTaskStatus, Termination};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Generators
// ============================================================================

fn node(i: usize) -> SubTaskId {
    SubTaskId::from(format!("n{i}"))
}

/// A random DAG where every node is reachable from `n0`.
///
/// Edges only point from lower to higher indices.
fn random_dag(rng: &mut StdRng) -> GraphSpec {
    let n = rng.gen_range(2..12);
    let subtasks = (0..n)
        .map(|i| SubTask::new(node(i), format!("Sub-task number {i}")))
        .collect();

    let mut edges = Vec::new();
    for target in 1..n {
        let anchor = rng.gen_range(0..target);
        for source in 0..target {
            if source != anchor && !rng.gen_bool(0.3) {
                continue;
            }
            let edge = match rng.gen_range(0..3) {
                0 => DependencyEdge::new(node(source), node(target), EdgeKind::Sequential),
                1 => DependencyEdge::new(node(source), node(target), EdgeKind::Parallel),
                _ => DependencyEdge::conditional(
                    node(source),
                    node(target),
                    EdgeCondition::new(format!("branch{target}")),
                ),
            };
            edges.push(edge);
        }
    }

    GraphSpec {
        subtasks,
        edges,
        constraints: Vec::new(),
        roots: vec![node(0)],
    }
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_random_dags_validate() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let spec = random_dag(&mut rng);
        assert!(spec.validate().is_ok(), "valid DAG rejected: {spec:?}");
        assert!(TaskGraph::from_spec(spec).is_ok());
    }
}

#[test]
fn test_reversed_edge_is_a_cycle() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let mut spec = random_dag(&mut rng);
        let pick = rng.gen_range(0..spec.edges.len());
        let reversed = DependencyEdge::new(
            spec.edges[pick].target.clone(),
            spec.edges[pick].source.clone(),
            EdgeKind::Sequential,
        );
        spec.edges.push(reversed);
        // implicit roots: the reversed edge may give n0 an incoming edge
        spec.roots.clear();

        let err = spec.validate().unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected(_)), "got {err:?}");
    }
}

#[test]
fn test_orphan_is_unreachable() {
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..200 {
        let mut spec = random_dag(&mut rng);
        spec.subtasks.push(SubTask::new("orphan", "Never reached"));
        if rng.gen_bool(0.5) {
            // an orphan may still point into the graph
            let target = node(rng.gen_range(1..spec.subtasks.len() - 1));
            spec.edges
                .push(DependencyEdge::new("orphan", target, EdgeKind::Sequential));
        }

        let err = spec.validate().unwrap_err();
        assert!(
            matches!(&err, GraphError::UnreachableSubTask(id) if id.as_str() == "orphan"),
            "got {err:?}"
        );
    }
}

#[test]
fn test_unknown_reference_is_invalid() {
    let mut rng = StdRng::seed_from_u64(17);
    let mut spec = random_dag(&mut rng);
    spec.edges
        .push(DependencyEdge::new(node(0), "missing", EdgeKind::Parallel));
    assert!(matches!(
        spec.validate().unwrap_err(),
        GraphError::InvalidGraph(_)
    ));
}

// ============================================================================
// Planner invariants over random walks
// ============================================================================

#[test]
fn test_random_walks_keep_planner_invariants() {
    let mut rng = StdRng::seed_from_u64(23);
    let history = DialogueHistory::new();

    for _ in 0..100 {
        let graph = Arc::new(TaskGraph::from_spec(random_dag(&mut rng)).unwrap());
        let all: Vec<SubTaskId> = graph.subtasks().iter().map(|s| s.id.clone()).collect();
        let mut planner = StatePlanner::new(graph.clone(), None);
        let mut completed: HashSet<SubTaskId> = HashSet::new();

        for _ in 0..(all.len() * 3) {
            if planner.current().is_none() {
                break;
            }

            // candidates are idempotent
            let candidates = planner.candidates(&history);
            assert_eq!(candidates, planner.candidates(&history));

            // an illegal advance leaves the snapshot byte-identical
            if let Some(outsider) = all.iter().find(|id| !candidates.contains(id)) {
                let before = planner.state().to_json().unwrap();
                let err = planner
                    .commit(&Decision::AdvanceTo(outsider.clone()), &history)
                    .unwrap_err();
                assert!(matches!(err, PlannerError::IllegalTransition { .. }));
                assert_eq!(before, planner.state().to_json().unwrap());
            }

            let decision = if candidates.is_empty() {
                Decision::Finish
            } else {
                let next = candidates[rng.gen_range(0..candidates.len())].clone();
                if rng.gen_bool(0.2) {
                    Decision::SkipTo(next)
                } else {
                    Decision::AdvanceTo(next)
                }
            };
            planner.commit(&decision, &history).unwrap();
            planner.record_turn();

            // completed sub-tasks never revert
            for id in &completed {
                assert_eq!(planner.state().status(id), Some(&SubTaskStatus::Completed));
            }
            completed.extend(planner.state().with_status(SubTaskStatus::Completed));

            let active = planner
                .state()
                .records()
                .iter()
                .filter(|r| r.status == SubTaskStatus::Active)
                .count();
            assert!(active <= 1);
        }

        assert_eq!(planner.current(), None);
        assert_eq!(planner.termination(&history), Some(Termination::Success));
    }
}
