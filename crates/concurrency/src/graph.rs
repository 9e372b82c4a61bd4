//! The coordinator graph: live-transaction records and the commit protocol
//!
//! All coordination state (transaction records, dependency edges, the
//! coordinator arena) lives behind one universe-level mutex (the
//! coordinator-graph lock, the outer lock tier). Per-object entry locks
//! are only ever taken underneath it, one at a time.
//!
//! Listener callbacks never run under either lock: every operation
//! collects its callbacks as [`Notification`]s and the caller fires them
//! after the locks are released.

use crate::coordinator::CoordinatorId;
use crate::transaction::Openness;
use crate::universe::Universe;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::Ordering;
use worldline_core::{
    AbortReason, Error, ObjectId, Result, StateValue, TransactionId, TransactionListener,
    VirtualTime,
};

/// How a transaction depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepKind {
    /// The dependent read a provisional value staged by the target; if the
    /// target aborts, the dependent's view is wrong and it aborts too.
    Value,
    /// The dependent's past-the-end read awaits the target's commit to
    /// advance the watermark; if the target aborts, the read merely
    /// reverts to latent.
    Resolution,
}

/// A read past an object's committed watermark, pending later resolution.
#[derive(Debug, Clone)]
pub(crate) struct PastEndRead {
    pub object: ObjectId,
    pub when: VirtualTime,
    pub observed: StateValue,
    pub resolved: bool,
}

/// Graph-side record of one transaction.
pub(crate) struct TxnRecord {
    pub coordinator: CoordinatorId,
    pub openness: Openness,
    /// Taken exactly once, at the terminal transition.
    pub listener: Option<Box<dyn TransactionListener>>,
    /// The single time all of this transaction's writes land at.
    pub write_time: Option<VirtualTime>,
    /// Staged values, mirrored in the object entries' provisional maps.
    pub writes: BTreeMap<ObjectId, StateValue>,
    /// Objects this transaction has read (for reader deregistration).
    pub read_objects: HashSet<ObjectId>,
    /// Earliest read time; bounds how far history-start may advance.
    pub min_read: Option<VirtualTime>,
    /// Live transactions this one waits on, with the strongest edge kind.
    pub depends_on: HashMap<TransactionId, DepKind>,
    /// Live transactions waiting on this one.
    pub dependents: HashSet<TransactionId>,
    /// Past-the-end reads, resolved in place as the watermark advances.
    pub past_end: Vec<PastEndRead>,
}

impl TxnRecord {
    pub(crate) fn new(coordinator: CoordinatorId, listener: Box<dyn TransactionListener>) -> Self {
        TxnRecord {
            coordinator,
            openness: Openness::Reading,
            listener: Some(listener),
            write_time: None,
            writes: BTreeMap::new(),
            read_objects: HashSet::new(),
            min_read: None,
            depends_on: HashMap::new(),
            dependents: HashSet::new(),
            past_end: Vec::new(),
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.openness.is_terminal()
    }
}

/// The universe's coordination state, behind the coordinator-graph lock.
pub(crate) struct Graph {
    /// Transaction records; terminal records are kept for openness queries
    /// with their heavy fields drained.
    pub txns: HashMap<TransactionId, TxnRecord>,
    /// Coordinator arena: member sets keyed by id.
    pub coordinators: BTreeMap<CoordinatorId, BTreeSet<TransactionId>>,
    pub next_coordinator: u64,
}

impl Graph {
    pub(crate) fn new() -> Self {
        Graph {
            txns: HashMap::new(),
            coordinators: BTreeMap::new(),
            next_coordinator: 0,
        }
    }

    pub(crate) fn live(&self, id: TransactionId) -> bool {
        self.txns.get(&id).map(TxnRecord::is_live).unwrap_or(false)
    }
}

/// A listener callback collected under the graph lock, to be fired after
/// the lock is released.
pub(crate) enum Notification {
    Commit {
        listener: Box<dyn TransactionListener>,
        created: Vec<ObjectId>,
    },
    Abort {
        listener: Box<dyn TransactionListener>,
        reason: AbortReason,
    },
}

/// Fire collected callbacks. Must be called with no engine lock held.
pub(crate) fn fire_notifications(notifications: Vec<Notification>) {
    for notification in notifications {
        match notification {
            Notification::Commit { listener, created } => {
                for object in created {
                    listener.on_create(object);
                }
                listener.on_commit();
            }
            Notification::Abort { listener, reason } => {
                listener.on_abort(&reason);
            }
        }
    }
}

/// Deferred protocol steps, processed to quiescence under one lock hold.
enum Action {
    Abort(TransactionId, AbortReason),
    TryFinalize(CoordinatorId),
}

impl Universe {
    // =========================================================================
    // Transaction operations (called by the Transaction handle)
    // =========================================================================

    pub(crate) fn transaction_read(
        &self,
        id: TransactionId,
        object: ObjectId,
        when: VirtualTime,
    ) -> (Result<StateValue>, Vec<Notification>) {
        let mut notes = Vec::new();
        let mut graph = self.graph.lock();
        match graph.txns.get(&id) {
            Some(rec) if rec.openness.is_open() => {}
            Some(rec) => {
                return (
                    Err(Error::InvalidState(format!(
                        "read requires an open transaction, not {:?}",
                        rec.openness
                    ))),
                    notes,
                )
            }
            None => {
                return (
                    Err(Error::InvalidState(format!("unknown transaction {id}"))),
                    notes,
                )
            }
        }
        let history_start = self.history_start();
        if when < history_start {
            let actions = VecDeque::from([Action::Abort(id, AbortReason::Prehistory)]);
            self.pump(&mut graph, actions, &mut notes);
            return (Err(Error::Prehistory { when, history_start }), notes);
        }

        let entry = self.entry(object);
        let (observed, source, past_end, staged_writers) = {
            let mut state = entry.state.lock();
            state.readers.insert(id);
            let committed_covers = when <= state.latest_commit
                && state.history.last_transition_at_or_before(when).is_some();
            let (observed, source) = if committed_covers {
                (state.history.get(when).clone(), None)
            } else if let Some(write) = state.provisional_at_or_before(when) {
                (write.value.clone(), (write.txn != id).then_some(write.txn))
            } else {
                // No staged value either: the latest known state, which may
                // simply be "absent".
                (state.history.get(when).clone(), None)
            };
            let past_end = when > state.latest_commit;
            let staged_writers = if past_end {
                state.staged_writers()
            } else {
                Vec::new()
            };
            (observed, source, past_end, staged_writers)
        };

        {
            let rec = graph.txns.get_mut(&id).expect("record exists");
            rec.read_objects.insert(object);
            rec.min_read = Some(rec.min_read.map_or(when, |m| m.min(when)));
            if past_end {
                rec.past_end.push(PastEndRead {
                    object,
                    when,
                    observed: observed.clone(),
                    resolved: false,
                });
            }
        }
        if let Some(source) = source {
            // Uncommitted read: this transaction's view now stands or falls
            // with the writer's fate.
            self.add_dependency_locked(&mut graph, id, source, DepKind::Value);
        }
        // A past-the-end read tentatively depends on every subsequent
        // writer of the object until it resolves; writers already staged
        // count from the moment of the read.
        for writer in staged_writers {
            if writer != id && graph.live(writer) {
                self.add_dependency_locked(&mut graph, id, writer, DepKind::Resolution);
            }
        }
        (Ok(observed), notes)
    }

    pub(crate) fn transaction_begin_write(&self, id: TransactionId, when: VirtualTime) -> Result<()> {
        let mut graph = self.graph.lock();
        let rec = graph
            .txns
            .get_mut(&id)
            .ok_or_else(|| Error::InvalidState(format!("unknown transaction {id}")))?;
        if !matches!(rec.openness, Openness::Reading) {
            return Err(Error::InvalidState(format!(
                "begin_write requires READING, not {:?}",
                rec.openness
            )));
        }
        if when == VirtualTime::START {
            return Err(Error::InvalidState(
                "write time must be after START".to_string(),
            ));
        }
        rec.write_time = Some(when);
        rec.openness = Openness::Writing;
        Ok(())
    }

    pub(crate) fn transaction_put(
        &self,
        id: TransactionId,
        object: ObjectId,
        value: StateValue,
    ) -> Result<()> {
        let mut graph = self.graph.lock();
        let when = {
            let rec = graph
                .txns
                .get_mut(&id)
                .ok_or_else(|| Error::InvalidState(format!("unknown transaction {id}")))?;
            if !matches!(rec.openness, Openness::Writing) {
                return Err(Error::InvalidState(format!(
                    "put requires WRITING, not {:?}",
                    rec.openness
                )));
            }
            let when = rec.write_time.expect("writing transaction has a write time");
            rec.writes.insert(object, value.clone());
            when
        };
        let entry = self.entry(object);
        let readers: Vec<TransactionId> = {
            let mut state = entry.state.lock();
            state.stage(id, when, value);
            state.readers.iter().copied().collect()
        };
        // A new writer is a tentative dependency for every latent
        // past-the-end reader of this object.
        for reader in readers {
            if reader == id || !graph.live(reader) {
                continue;
            }
            let latent = graph.txns[&reader]
                .past_end
                .iter()
                .any(|read| read.object == object && !read.resolved);
            if latent {
                self.add_dependency_locked(&mut graph, reader, id, DepKind::Resolution);
            }
        }
        Ok(())
    }

    pub(crate) fn transaction_begin_commit(
        &self,
        id: TransactionId,
    ) -> (Result<()>, Vec<Notification>) {
        let mut notes = Vec::new();
        let mut graph = self.graph.lock();
        match graph.txns.get_mut(&id) {
            Some(rec) if rec.openness.is_open() => rec.openness = Openness::Committing,
            Some(rec) => {
                return (
                    Err(Error::InvalidState(format!(
                        "begin_commit requires an open transaction, not {:?}",
                        rec.openness
                    ))),
                    notes,
                )
            }
            None => {
                return (
                    Err(Error::InvalidState(format!("unknown transaction {id}"))),
                    notes,
                )
            }
        }
        tracing::debug!(target: "worldline::txn", txn = %id, "commit begun");

        if let Some(reason) = self.validate_writes_locked(&graph, id) {
            let actions = VecDeque::from([Action::Abort(id, reason)]);
            self.pump(&mut graph, actions, &mut notes);
            return (Ok(()), notes);
        }

        // Settle past-the-end reads against the current committed state and
        // take tentative dependencies on every live staged writer.
        let past_end = graph.txns[&id].past_end.clone();
        let mut contradicted = None;
        let mut resolved = Vec::new();
        let mut writer_edges: Vec<TransactionId> = Vec::new();
        for (index, read) in past_end.iter().enumerate() {
            if read.resolved {
                continue;
            }
            let entry = self.entry(read.object);
            let state = entry.state.lock();
            if state.latest_commit >= read.when {
                if *state.history.get(read.when) == read.observed {
                    resolved.push(index);
                } else {
                    contradicted = Some(AbortReason::ReadInvalidated {
                        object: read.object,
                        when: read.when,
                    });
                    break;
                }
            } else {
                writer_edges.extend(state.staged_writers().into_iter().filter(|w| *w != id));
            }
        }
        if let Some(reason) = contradicted {
            let actions = VecDeque::from([Action::Abort(id, reason)]);
            self.pump(&mut graph, actions, &mut notes);
            return (Ok(()), notes);
        }
        {
            let rec = graph.txns.get_mut(&id).expect("record exists");
            for index in resolved {
                rec.past_end[index].resolved = true;
            }
        }
        for writer in writer_edges {
            if graph.live(writer) {
                self.add_dependency_locked(&mut graph, id, writer, DepKind::Resolution);
            }
        }

        let coordinator = graph.txns[&id].coordinator;
        let actions = VecDeque::from([Action::TryFinalize(coordinator)]);
        self.pump(&mut graph, actions, &mut notes);
        (Ok(()), notes)
    }

    pub(crate) fn transaction_abort(
        &self,
        id: TransactionId,
        reason: AbortReason,
    ) -> Vec<Notification> {
        let mut notes = Vec::new();
        let mut graph = self.graph.lock();
        if graph.live(id) {
            let actions = VecDeque::from([Action::Abort(id, reason)]);
            self.pump(&mut graph, actions, &mut notes);
        }
        notes
    }

    pub(crate) fn transaction_openness(&self, id: TransactionId) -> Openness {
        self.graph
            .lock()
            .txns
            .get(&id)
            .map(|rec| rec.openness.clone())
            .unwrap_or(Openness::Aborted {
                reason: AbortReason::Requested,
            })
    }

    // =========================================================================
    // Protocol internals (graph lock held throughout)
    // =========================================================================

    /// Record the dependency edge `source -> target` and collapse any
    /// coordinator cycle it closes. `Value` edges dominate `Resolution`.
    fn add_dependency_locked(
        &self,
        graph: &mut Graph,
        source: TransactionId,
        target: TransactionId,
        kind: DepKind,
    ) {
        if source == target || !graph.live(target) || !graph.live(source) {
            return;
        }
        {
            let rec = graph.txns.get_mut(&source).expect("source is live");
            match kind {
                DepKind::Value => {
                    rec.depends_on.insert(target, DepKind::Value);
                }
                DepKind::Resolution => {
                    rec.depends_on.entry(target).or_insert(DepKind::Resolution);
                }
            }
        }
        graph
            .txns
            .get_mut(&target)
            .expect("target is live")
            .dependents
            .insert(source);
        graph.merge_on_cycle(source, target);
    }

    /// Validate a transaction's staged writes against the committed world.
    ///
    /// Returns the first failure, in fixed order: resurrection, then
    /// committed-cell collisions (duplicate or out-of-order), then the
    /// first-to-commit tie-break against concurrent writers of the same
    /// cell.
    fn validate_writes_locked(&self, graph: &Graph, id: TransactionId) -> Option<AbortReason> {
        let rec = graph.txns.get(&id)?;
        let when = rec.write_time?;
        for (object, value) in &rec.writes {
            let entry = self.entry(*object);
            let state = entry.state.lock();
            if state.latest_commit == VirtualTime::END {
                // Destroyed objects never come back; anything else at END
                // simply leaves no room to write after.
                return Some(if value.is_present() && state.history.last_value().is_absent() {
                    AbortReason::Resurrection {
                        object: *object,
                        when,
                    }
                } else {
                    AbortReason::OutOfOrderWrite {
                        object: *object,
                        when,
                    }
                });
            }
            if value.is_present()
                && state.history.last_transition_at_or_before(when).is_some()
                && state.history.get(when).is_absent()
            {
                return Some(AbortReason::Resurrection {
                    object: *object,
                    when,
                });
            }
            if let Some(last) = state.history.last_transition_time() {
                if when <= last {
                    return Some(if state.history.at_transition(when) == Some(value) {
                        AbortReason::DuplicateWrite {
                            object: *object,
                            when,
                        }
                    } else {
                        AbortReason::OutOfOrderWrite {
                            object: *object,
                            when,
                        }
                    });
                }
            }
            if when <= state.latest_commit {
                return Some(AbortReason::OutOfOrderWrite {
                    object: *object,
                    when,
                });
            }
            if let Some(writes) = state.staged.get(&when) {
                for write in writes {
                    if write.txn == id {
                        continue;
                    }
                    let other_committing = graph
                        .txns
                        .get(&write.txn)
                        .is_some_and(|r| matches!(r.openness, Openness::Committing));
                    if other_committing {
                        // The first transaction to begin commit wins the cell.
                        return Some(if write.value == *value {
                            AbortReason::DuplicateWrite {
                                object: *object,
                                when,
                            }
                        } else {
                            AbortReason::OutOfOrderWrite {
                                object: *object,
                                when,
                            }
                        });
                    }
                }
            }
        }
        None
    }

    /// Process deferred protocol steps until quiescence.
    fn pump(&self, graph: &mut Graph, mut actions: VecDeque<Action>, notes: &mut Vec<Notification>) {
        while let Some(action) = actions.pop_front() {
            match action {
                Action::Abort(id, reason) => self.abort_one(graph, id, reason, &mut actions, notes),
                Action::TryFinalize(coordinator) => {
                    self.try_finalize_one(graph, coordinator, &mut actions, notes)
                }
            }
        }
    }

    /// Abort one transaction: roll back its staged writes, cascade to its
    /// coordinator co-members and to readers of its provisional values, and
    /// release readers that were merely waiting on it for resolution.
    fn abort_one(
        &self,
        graph: &mut Graph,
        id: TransactionId,
        reason: AbortReason,
        actions: &mut VecDeque<Action>,
        notes: &mut Vec<Notification>,
    ) {
        if !graph.live(id) {
            return;
        }
        tracing::debug!(target: "worldline::txn", txn = %id, %reason, "aborting");
        let (coordinator, dependents, write_objects, read_objects) = {
            let rec = graph.txns.get_mut(&id).expect("record is live");
            rec.openness = Openness::Aborting;
            (
                rec.coordinator,
                rec.dependents.drain().collect::<Vec<_>>(),
                std::mem::take(&mut rec.writes)
                    .into_keys()
                    .collect::<Vec<_>>(),
                std::mem::take(&mut rec.read_objects),
            )
        };

        // The whole coordinator shares the abort.
        if let Some(members) = graph.coordinators.get(&coordinator) {
            for member in members.clone() {
                if member != id && graph.live(member) {
                    actions.push_back(Action::Abort(member, AbortReason::Cascaded { cause: id }));
                }
            }
        }

        // Readers of this transaction's provisional values cascade; readers
        // that only awaited its commit for resolution revert to latent and
        // re-validate.
        for dependent in dependents {
            let kind = graph
                .txns
                .get_mut(&dependent)
                .and_then(|rec| rec.depends_on.remove(&id));
            match kind {
                Some(DepKind::Value) => {
                    actions.push_back(Action::Abort(
                        dependent,
                        AbortReason::Cascaded { cause: id },
                    ));
                }
                Some(DepKind::Resolution) => {
                    if let Some(rec) = graph.txns.get(&dependent) {
                        if rec.is_live() {
                            actions.push_back(Action::TryFinalize(rec.coordinator));
                        }
                    }
                }
                None => {}
            }
        }

        // Roll back staged writes and deregister reads.
        for object in &write_objects {
            let entry = self.entry(*object);
            let mut state = entry.state.lock();
            state.unstage(id);
            state.readers.remove(&id);
        }
        for object in read_objects {
            let entry = self.entry(object);
            entry.state.lock().readers.remove(&id);
        }

        // Settle the record and detach it from the graph.
        let (listener, sources) = {
            let rec = graph.txns.get_mut(&id).expect("record is live");
            let sources: Vec<TransactionId> = rec.depends_on.keys().copied().collect();
            rec.depends_on.clear();
            rec.past_end.clear();
            rec.openness = Openness::Aborted {
                reason: reason.clone(),
            };
            (rec.listener.take(), sources)
        };
        for source in sources {
            if let Some(rec) = graph.txns.get_mut(&source) {
                rec.dependents.remove(&id);
            }
        }
        graph.remove_member(coordinator, id);
        self.txns_aborted.fetch_add(1, Ordering::Relaxed);
        if let Some(listener) = listener {
            notes.push(Notification::Abort { listener, reason });
        }
    }

    /// Commit a coordinator's members if the group is ready: every member
    /// COMMITTING, no live predecessors, and every unresolved past-the-end
    /// read consistent with (and covered by) the group's own writes.
    fn try_finalize_one(
        &self,
        graph: &mut Graph,
        coordinator: CoordinatorId,
        actions: &mut VecDeque<Action>,
        notes: &mut Vec<Notification>,
    ) {
        let members: Vec<TransactionId> = match graph.coordinators.get(&coordinator) {
            Some(members) => members.iter().copied().collect(),
            None => return,
        };
        if members
            .iter()
            .any(|m| !matches!(graph.txns[m].openness, Openness::Committing))
        {
            return;
        }
        if !graph.coordinator_predecessors(coordinator).is_empty() {
            return;
        }

        // Group-consistency of unresolved past-the-end reads: simulate the
        // members' combined writes over the committed state.
        let mut group_writes: HashMap<ObjectId, BTreeMap<VirtualTime, StateValue>> = HashMap::new();
        for member in &members {
            let rec = &graph.txns[member];
            if let Some(when) = rec.write_time {
                for (object, value) in &rec.writes {
                    group_writes
                        .entry(*object)
                        .or_default()
                        .insert(when, value.clone());
                }
            }
        }
        for member in &members {
            for read in &graph.txns[member].past_end {
                if read.resolved {
                    continue;
                }
                let entry = self.entry(read.object);
                let state = entry.state.lock();
                let mut simulated = state.history.clone();
                let mut watermark = state.latest_commit;
                if let Some(writes) = group_writes.get(&read.object) {
                    for (when, value) in writes {
                        simulated.set_value_from(*when, value.clone());
                        watermark = if value.is_absent() {
                            VirtualTime::END
                        } else {
                            watermark.max(*when)
                        };
                    }
                }
                if *simulated.get(read.when) != read.observed {
                    actions.push_back(Action::Abort(
                        *member,
                        AbortReason::ReadInvalidated {
                            object: read.object,
                            when: read.when,
                        },
                    ));
                    return;
                }
                if watermark < read.when {
                    // Still past the end; wait for a later writer.
                    return;
                }
            }
        }

        // The committed world may have moved while the members were
        // pending; check the writes once more before the point of no return.
        for member in &members {
            if let Some(reason) = self.validate_writes_locked(graph, *member) {
                actions.push_back(Action::Abort(*member, reason));
                return;
            }
        }

        tracing::debug!(
            target: "worldline::txn",
            coordinator = coordinator.as_u64(),
            members = members.len(),
            "committing"
        );

        // Commit every member. Writes are applied in ascending write-time
        // order so later appends never truncate earlier ones.
        let mut order = members.clone();
        order.sort_by_key(|m| (graph.txns[m].write_time.unwrap_or(VirtualTime::START), *m));
        let mut written: BTreeSet<ObjectId> = BTreeSet::new();
        for member in &order {
            let (write_time, writes, read_objects, dependents) = {
                let rec = graph.txns.get_mut(member).expect("member record exists");
                (
                    rec.write_time,
                    std::mem::take(&mut rec.writes),
                    std::mem::take(&mut rec.read_objects),
                    std::mem::take(&mut rec.dependents),
                )
            };
            let mut created = Vec::new();
            if let Some(when) = write_time {
                for (object, value) in writes {
                    let entry = self.entry(object);
                    let mut state = entry.state.lock();
                    if state.history.is_empty() && value.is_present() {
                        created.push(object);
                    }
                    state.history.set_value_from(when, value.clone());
                    state.latest_commit = if value.is_absent() {
                        // Destruction is forever.
                        VirtualTime::END
                    } else {
                        state.latest_commit.max(when)
                    };
                    state.unstage(*member);
                    state.readers.remove(member);
                    written.insert(object);
                }
            }
            for object in read_objects {
                let entry = self.entry(object);
                entry.state.lock().readers.remove(member);
            }
            for dependent in dependents {
                if let Some(rec) = graph.txns.get_mut(&dependent) {
                    rec.depends_on.remove(member);
                    if rec.is_live() {
                        let next = rec.coordinator;
                        actions.push_back(Action::TryFinalize(next));
                    }
                }
            }
            let (listener, sources) = {
                let rec = graph.txns.get_mut(member).expect("member record exists");
                let sources: Vec<TransactionId> = rec.depends_on.keys().copied().collect();
                rec.depends_on.clear();
                rec.past_end.clear();
                rec.openness = Openness::Committed;
                (rec.listener.take(), sources)
            };
            for source in sources {
                if let Some(rec) = graph.txns.get_mut(&source) {
                    rec.dependents.remove(member);
                }
            }
            self.txns_committed.fetch_add(1, Ordering::Relaxed);
            if let Some(listener) = listener {
                notes.push(Notification::Commit { listener, created });
            }
        }
        graph.coordinators.remove(&coordinator);

        // Newly committed history may settle other transactions' latent
        // past-the-end reads: confirm or invalidate them now.
        for object in written {
            let entry = self.entry(object);
            let readers: Vec<TransactionId> = entry.state.lock().readers.iter().copied().collect();
            for reader in readers {
                let Some(rec) = graph.txns.get(&reader) else {
                    continue;
                };
                if !rec.is_live() {
                    continue;
                }
                let committing = matches!(rec.openness, Openness::Committing);
                let pending: Vec<(usize, PastEndRead)> = rec
                    .past_end
                    .iter()
                    .enumerate()
                    .filter(|(_, read)| read.object == object && !read.resolved)
                    .map(|(index, read)| (index, read.clone()))
                    .collect();
                if pending.is_empty() {
                    continue;
                }
                let mut invalidated_at = None;
                let mut newly_resolved = Vec::new();
                {
                    let state = entry.state.lock();
                    for (index, read) in &pending {
                        if *state.history.get(read.when) != read.observed {
                            // Open readers re-validate at their own commit;
                            // committing ones are contradicted now.
                            if committing {
                                invalidated_at = Some(read.when);
                                break;
                            }
                        } else if state.latest_commit >= read.when {
                            newly_resolved.push(*index);
                        }
                    }
                }
                if let Some(when) = invalidated_at {
                    actions.push_back(Action::Abort(
                        reader,
                        AbortReason::ReadInvalidated { object, when },
                    ));
                } else {
                    let rec = graph.txns.get_mut(&reader).expect("reader record exists");
                    for index in newly_resolved {
                        rec.past_end[index].resolved = true;
                    }
                    if committing {
                        let next = rec.coordinator;
                        actions.push_back(Action::TryFinalize(next));
                    }
                }
            }
        }
    }
}
