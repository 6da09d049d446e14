//! Deadlock Detection - Cycle Search over the Wait-For Graph
//!
//! # Algorithm
//!
//! 1. For every BLOCKED worker waiting on lock `L`, add an edge to every
//!    current holder of `L` other than itself (locks are reentrant, so a
//!    self-edge never means a deadlock).
//! 2. Run an iterative three-colour DFS. Reaching a GREY node closes a
//!    cycle; the cycle is the stack slice from that node to the top.
//!
//! O(V + E). The graph is rebuilt on every call and nothing is written
//! back, so detection is idempotent.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::domain::registry::Registry;
use crate::domain::worker::{LockId, WorkerId};

/// Derived relation: `waiter` is blocked on `lock`, held by `holder`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WaitForEdge {
    /// Blocked worker
    pub waiter: WorkerId,
    /// Lock it is waiting on
    pub lock: LockId,
    /// A current holder of that lock
    pub holder: WorkerId,
}

/// One step of a deadlock cycle, with display names resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleLink {
    /// Blocked worker
    pub worker: WorkerId,
    /// Its display name
    pub worker_name: String,
    /// Lock it is waiting on
    pub lock: LockId,
    /// Lock display name
    pub lock_name: String,
    /// Holder of that lock (the next worker in the cycle)
    pub holder: WorkerId,
}

/// Ordered cycle of blocked workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlockCycle {
    links: Vec<CycleLink>,
}

impl DeadlockCycle {
    /// The links in cycle order
    pub fn links(&self) -> &[CycleLink] {
        &self.links
    }

    /// Workers in cycle order
    pub fn workers(&self) -> Vec<WorkerId> {
        self.links.iter().map(|l| l.worker).collect()
    }

    /// Locks involved, in cycle order
    pub fn locks(&self) -> Vec<LockId> {
        self.links.iter().map(|l| l.lock).collect()
    }

    /// Lock display names, in cycle order
    pub fn lock_names(&self) -> Vec<&str> {
        self.links.iter().map(|l| l.lock_name.as_str()).collect()
    }

    /// Number of workers in the cycle
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Always false for a detected cycle
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl fmt::Display for DeadlockCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for link in &self.links {
            write!(f, "{} ({}) --[{}]--> ", link.worker_name, link.worker, link.lock_name)?;
        }
        if let Some(first) = self.links.first() {
            write!(f, "{} ({})", first.worker_name, first.worker)?;
        }
        Ok(())
    }
}

/// Outcome of one detection pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DetectionResult {
    /// No cycle in the wait-for graph
    NoDeadlock,
    /// A cycle of two or more workers
    Deadlock(DeadlockCycle),
}

impl DetectionResult {
    /// Check if a cycle was found
    #[inline]
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Self::Deadlock(_))
    }

    /// The cycle, if one was found
    pub fn cycle(&self) -> Option<&DeadlockCycle> {
        match self {
            Self::Deadlock(cycle) => Some(cycle),
            Self::NoDeadlock => None,
        }
    }
}

/// Build the wait-for graph from current registry state
pub fn wait_for_edges(registry: &Registry) -> Vec<WaitForEdge> {
    let mut edges = Vec::new();
    for (waiter, record) in registry.workers() {
        if !record.state.is_blocked() {
            continue;
        }
        let Some(lock) = record.waiting_on else {
            continue;
        };
        let Some(lock_record) = registry.lock(lock) else {
            continue;
        };
        for holder in lock_record.holders {
            if holder != waiter {
                edges.push(WaitForEdge { waiter, lock, holder });
            }
        }
    }
    edges.sort();
    edges.dedup();
    edges
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Grey,
    Black,
}

struct Frame {
    node: WorkerId,
    next: usize,
    /// Edge used to reach this node from the frame below
    via: Option<WaitForEdge>,
}

/// Find one cycle in `edges`, as an ordered list of edges
///
/// Returns `None` for an acyclic graph.
pub fn find_cycle(edges: &[WaitForEdge]) -> Option<Vec<WaitForEdge>> {
    let mut adjacency: BTreeMap<WorkerId, Vec<WaitForEdge>> = BTreeMap::new();
    for edge in edges {
        adjacency.entry(edge.waiter).or_default().push(*edge);
    }

    let mut color: HashMap<WorkerId, Color> = HashMap::new();
    let roots: Vec<WorkerId> = adjacency.keys().copied().collect();

    for root in roots {
        if color.contains_key(&root) {
            continue;
        }

        let mut stack = vec![Frame { node: root, next: 0, via: None }];
        color.insert(root, Color::Grey);

        while let Some(top) = stack.last_mut() {
            let out = adjacency.get(&top.node).map(Vec::as_slice).unwrap_or(&[]);
            if top.next >= out.len() {
                color.insert(top.node, Color::Black);
                stack.pop();
                continue;
            }

            let edge = out[top.next];
            top.next += 1;

            match color.get(&edge.holder) {
                None => {
                    color.insert(edge.holder, Color::Grey);
                    stack.push(Frame {
                        node: edge.holder,
                        next: 0,
                        via: Some(edge),
                    });
                }
                Some(Color::Grey) => {
                    // Back edge: the cycle runs from `edge.holder` up the
                    // stack and back through `edge`.
                    let start = stack
                        .iter()
                        .position(|frame| frame.node == edge.holder)
                        .unwrap_or(0);
                    let mut cycle: Vec<WaitForEdge> =
                        stack[start + 1..].iter().filter_map(|frame| frame.via).collect();
                    cycle.push(edge);
                    return Some(cycle);
                }
                Some(Color::Black) => {}
            }
        }
    }

    None
}

/// Run a full detection pass against `registry`
pub fn detect(registry: &Registry) -> DetectionResult {
    let edges = wait_for_edges(registry);
    let Some(cycle) = find_cycle(&edges) else {
        return DetectionResult::NoDeadlock;
    };

    let links = cycle
        .into_iter()
        .map(|edge| CycleLink {
            worker: edge.waiter,
            worker_name: registry
                .worker(edge.waiter)
                .map(|r| r.name)
                .unwrap_or_else(|| edge.waiter.to_string()),
            lock: edge.lock,
            lock_name: registry
                .lock(edge.lock)
                .map(|r| r.name)
                .unwrap_or_else(|| edge.lock.to_string()),
            holder: edge.holder,
        })
        .collect();

    DetectionResult::Deadlock(DeadlockCycle { links })
}
