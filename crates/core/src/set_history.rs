//! Set-valued histories and derived containment
//!
//! A [`SetHistory`] is a view over a [`ValueHistory`] whose values are
//! finite sets. On top of the plain step-function operations it derives
//! per-element *containment histories*: `contains(x)` is a boolean history
//! whose transition times are a subset of the parent's and whose value at
//! any time tells whether `x` is a member of the parent set at that time.

use crate::history::ValueHistory;
use crate::time::VirtualTime;
use std::collections::BTreeSet;

/// A history whose value at every time is a finite set of `E`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetHistory<E: Ord + Clone> {
    inner: ValueHistory<BTreeSet<E>>,
}

impl<E: Ord + Clone> SetHistory<E> {
    /// Create a history that is the empty set everywhere.
    pub fn new() -> Self {
        SetHistory {
            inner: ValueHistory::new(BTreeSet::new()),
        }
    }

    /// View an existing set-valued history.
    pub fn from_history(inner: ValueHistory<BTreeSet<E>>) -> Self {
        SetHistory { inner }
    }

    /// The set at `when`.
    pub fn get(&self, when: VirtualTime) -> &BTreeSet<E> {
        self.inner.get(when)
    }

    /// The underlying value history.
    pub fn history(&self) -> &ValueHistory<BTreeSet<E>> {
        &self.inner
    }

    /// Consume the view, returning the underlying history.
    pub fn into_history(self) -> ValueHistory<BTreeSet<E>> {
        self.inner
    }

    /// True when the set never changes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The containment history of `member`: at every time `t`,
    /// `contains(member).get(t) == self.get(t).contains(member)`.
    ///
    /// The boolean history's transition times are a subset of the parent's.
    pub fn contains(&self, member: &E) -> ValueHistory<bool> {
        let mut out = ValueHistory::new(self.inner.first_value().contains(member));
        for (when, set) in self.inner.transitions() {
            out.set_value_from(when, set.contains(member));
        }
        out
    }

    /// Make `member` part of the set at every time at or after `when`.
    pub fn add_from(&mut self, when: VirtualTime, member: E) {
        self.rebuild(std::iter::once(when), |t, set| {
            if t >= when {
                set.insert(member.clone());
            }
        });
    }

    /// Make `member` part of the set at every time up to and including
    /// `when`, and absent strictly after.
    pub fn add_until(&mut self, when: VirtualTime, member: E) {
        // The first instant strictly after `when`; for when == END there is
        // none and the member is simply present everywhere.
        let boundary = if when == VirtualTime::END {
            None
        } else {
            Some(when.advanced_by(1))
        };
        self.rebuild(boundary.into_iter(), |t, set| {
            if t <= when {
                set.insert(member.clone());
            } else {
                set.remove(&member);
            }
        });
    }

    /// Remove `member` from the set at every time.
    pub fn remove(&mut self, member: &E) {
        self.rebuild(std::iter::empty(), |_, set| {
            set.remove(member);
        });
    }

    /// Re-derive the history by editing the set on every segment.
    ///
    /// `extra_cuts` adds segment boundaries beyond the existing transition
    /// times so the edit can change value mid-segment. Adjacent equal sets
    /// collapse, preserving the no-adjacent-equality invariant.
    fn rebuild<I, F>(&mut self, extra_cuts: I, edit: F)
    where
        I: Iterator<Item = VirtualTime>,
        F: Fn(VirtualTime, &mut BTreeSet<E>),
    {
        let mut cuts: BTreeSet<VirtualTime> = self.inner.transition_times().into_iter().collect();
        cuts.extend(extra_cuts);
        cuts.remove(&VirtualTime::START);

        let mut first = self.inner.first_value().clone();
        edit(VirtualTime::START, &mut first);
        let mut out = ValueHistory::new(first);
        for cut in cuts {
            let mut set = self.inner.get(cut).clone();
            edit(cut, &mut set);
            out.set_value_from(cut, set);
        }
        self.inner = out;
    }
}

impl<E: Ord + Clone> Default for SetHistory<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u64) -> VirtualTime {
        VirtualTime::from_nanos(n)
    }

    fn set(members: &[i32]) -> BTreeSet<i32> {
        members.iter().copied().collect()
    }

    #[test]
    fn test_new_is_empty_everywhere() {
        let h: SetHistory<i32> = SetHistory::new();
        assert!(h.get(VirtualTime::START).is_empty());
        assert!(h.get(VirtualTime::END).is_empty());
        assert!(h.is_empty());
    }

    #[test]
    fn test_add_from() {
        let mut h = SetHistory::new();
        h.add_from(t(10), 1);
        assert!(h.get(t(9)).is_empty());
        assert_eq!(*h.get(t(10)), set(&[1]));
        assert_eq!(*h.get(VirtualTime::END), set(&[1]));

        h.add_from(t(20), 2);
        assert_eq!(*h.get(t(15)), set(&[1]));
        assert_eq!(*h.get(t(20)), set(&[1, 2]));
    }

    #[test]
    fn test_add_from_start() {
        let mut h = SetHistory::new();
        h.add_from(VirtualTime::START, 1);
        assert_eq!(*h.get(VirtualTime::START), set(&[1]));
        assert!(h.is_empty());
    }

    #[test]
    fn test_add_until() {
        let mut h = SetHistory::new();
        h.add_until(t(10), 1);
        assert_eq!(*h.get(VirtualTime::START), set(&[1]));
        assert_eq!(*h.get(t(10)), set(&[1]));
        assert!(h.get(t(11)).is_empty());
        assert!(h.get(VirtualTime::END).is_empty());
    }

    #[test]
    fn test_add_until_end_means_everywhere() {
        let mut h = SetHistory::new();
        h.add_until(VirtualTime::END, 1);
        assert_eq!(*h.get(VirtualTime::END), set(&[1]));
        assert!(h.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut h = SetHistory::new();
        h.add_from(t(10), 1);
        h.add_from(t(20), 2);
        h.remove(&1);
        assert!(h.get(t(15)).is_empty());
        assert_eq!(*h.get(t(20)), set(&[2]));
    }

    #[test]
    fn test_remove_collapses_redundant_transitions() {
        let mut h = SetHistory::new();
        h.add_from(t(10), 1);
        h.remove(&1);
        assert!(h.is_empty());
    }

    #[test]
    fn test_contains_tracks_membership() {
        let mut h = SetHistory::new();
        h.add_from(t(10), 1);
        h.add_until(t(30), 1);

        let membership = h.contains(&1);
        for probe in [0, 5, 10, 20, 30, 31, 100] {
            assert_eq!(
                *membership.get(t(probe)),
                h.get(t(probe)).contains(&1),
                "membership mismatch at {}",
                probe
            );
        }
    }

    #[test]
    fn test_contains_times_subset_of_parent() {
        let mut h = SetHistory::new();
        h.add_from(t(10), 1);
        h.add_from(t(20), 2);
        h.add_from(t(30), 3);

        let membership = h.contains(&2);
        let parent_times = h.history().transition_times();
        for time in membership.transition_times() {
            assert!(parent_times.contains(&time));
        }
        // Only the transition that affects membership of 2 survives.
        assert_eq!(membership.transition_times(), vec![t(20)]);
    }

    #[test]
    fn test_contains_absent_member_is_flat_false() {
        let mut h = SetHistory::new();
        h.add_from(t(10), 1);
        let membership = h.contains(&99);
        assert!(membership.is_empty());
        assert!(!*membership.first_value());
    }
}
