//! Transaction coordinators: shared commit-or-abort fate
//!
//! Every transaction belongs to exactly one coordinator, initially a
//! singleton. When transactions become mutually dependent, each waiting on
//! the other's uncommitted or future state, their coordinators merge, and
//! from then on the whole group commits or aborts as one.
//!
//! Coordinators are arena records keyed by [`CoordinatorId`] inside the
//! graph, and transactions point back at them by id. Predecessor and
//! successor relationships are *derived* from the surviving member-level
//! dependency edges rather than stored, so merging never has to reconcile
//! stale link sets and the object graph carries no owning cycles.

use crate::graph::Graph;
use std::collections::BTreeSet;
use worldline_core::TransactionId;

/// Identifier of one coordinator in the graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct CoordinatorId(u64);

impl CoordinatorId {
    pub(crate) fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Graph {
    /// Create a fresh singleton coordinator for a new transaction.
    pub(crate) fn new_coordinator_for(&mut self, txn: TransactionId) -> CoordinatorId {
        self.next_coordinator += 1;
        let id = CoordinatorId(self.next_coordinator);
        self.coordinators.insert(id, BTreeSet::from([txn]));
        id
    }

    /// Remove `txn` from its coordinator; an empty coordinator dissolves.
    pub(crate) fn remove_member(&mut self, coordinator: CoordinatorId, txn: TransactionId) {
        if let Some(members) = self.coordinators.get_mut(&coordinator) {
            members.remove(&txn);
            if members.is_empty() {
                self.coordinators.remove(&coordinator);
            }
        }
    }

    /// Coordinators whose members must commit before this group's members
    /// may: the targets of every live dependency edge leaving the group.
    pub(crate) fn coordinator_predecessors(
        &self,
        coordinator: CoordinatorId,
    ) -> BTreeSet<CoordinatorId> {
        let mut out = BTreeSet::new();
        let Some(members) = self.coordinators.get(&coordinator) else {
            return out;
        };
        for member in members {
            let Some(rec) = self.txns.get(member) else {
                continue;
            };
            for target in rec.depends_on.keys() {
                if let Some(target_rec) = self.txns.get(target) {
                    if target_rec.is_live() && target_rec.coordinator != coordinator {
                        out.insert(target_rec.coordinator);
                    }
                }
            }
        }
        out
    }

    /// All coordinators reachable from `from` along predecessor edges,
    /// including `from` itself.
    fn predecessor_closure(&self, from: CoordinatorId) -> BTreeSet<CoordinatorId> {
        let mut seen = BTreeSet::from([from]);
        let mut stack = vec![from];
        while let Some(c) = stack.pop() {
            for p in self.coordinator_predecessors(c) {
                if seen.insert(p) {
                    stack.push(p);
                }
            }
        }
        seen
    }

    /// Collapse the cycle, if any, closed by the dependency edge
    /// `source -> target`.
    ///
    /// The edge means source's coordinator must wait for target's. If
    /// target's coordinator already (transitively) waits for source's,
    /// every coordinator on a dependency path between the two lies on a
    /// cycle: merge them all into one. Merging is idempotent and
    /// associative, so cycles of any length collapse no matter the order
    /// in which their edges appear.
    pub(crate) fn merge_on_cycle(&mut self, source: TransactionId, target: TransactionId) {
        let source_coord = self.txns[&source].coordinator;
        let target_coord = self.txns[&target].coordinator;
        if source_coord == target_coord {
            return;
        }
        let downstream = self.predecessor_closure(target_coord);
        if !downstream.contains(&source_coord) {
            return;
        }
        let merged: BTreeSet<CoordinatorId> = downstream
            .into_iter()
            .filter(|c| self.predecessor_closure(*c).contains(&source_coord))
            .collect();
        let survivor = *merged.iter().next().expect("cycle contains both endpoints");
        let mut all_members: BTreeSet<TransactionId> = BTreeSet::new();
        for coordinator in &merged {
            if let Some(members) = self.coordinators.remove(coordinator) {
                all_members.extend(members);
            }
        }
        for member in &all_members {
            if let Some(rec) = self.txns.get_mut(member) {
                rec.coordinator = survivor;
            }
        }
        tracing::debug!(
            target: "worldline::txn",
            coordinator = survivor.as_u64(),
            members = all_members.len(),
            "merged mutually dependent transaction groups"
        );
        self.coordinators.insert(survivor, all_members);
    }
}
