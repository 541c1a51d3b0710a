//! Transactions
//!
//! A transaction is one atomic propagation step. It owns a priority queue
//! of pending observables keyed by topological rank (ascending), with FIFO
//! insertion order breaking ties between equal ranks.
//!
//! # Drain Algorithm
//!
//! 1. The transaction body runs. It typically fires one or more source
//!    observables, whose descendants enqueue themselves here once their
//!    inputs are ready.
//! 2. While the queue is non-empty, the node with the minimum rank is
//!    dequeued and `sync_fire` is invoked on it.
//! 3. `sync_fire` may enqueue further nodes. Because every node's rank is
//!    strictly greater than all of its parents' ranks, a node fires only
//!    after every parent that could fire in this transaction already has —
//!    which is the whole glitch-freedom argument.
//! 4. When the queue empties, the next queued transaction (if any) runs.
//!
//! # Re-entry
//!
//! Opening a transaction from inside an observer callback is legal: the new
//! transaction is queued and runs strictly after the current one drains. A
//! node enqueues itself at most once per transaction; the membership set
//! makes that check O(1).

use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observable::node::NodeId;

use super::runtime;

/// Unique identifier for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Generate a new unique transaction ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A node that can sit in a transaction's pending queue.
///
/// Multi-parent nodes (merge, combine, sample) implement this: when a
/// parent delivers during a transaction they enqueue themselves, and the
/// drain loop calls [`sync_fire`](PendingObservable::sync_fire) once all
/// lower-ranked nodes have settled.
pub(crate) trait PendingObservable: Send + Sync {
    /// The graph ID of this node, used for the at-most-once membership check.
    fn pending_id(&self) -> NodeId;

    /// The constant topological rank of this node.
    fn pending_rank(&self) -> u32;

    /// Fire this node within the given transaction.
    fn sync_fire(&self, txn: &mut Transaction);
}

/// An entry in the pending queue.
///
/// Ordered so that the smallest `(rank, seq)` pair is popped first from the
/// max-heap: ascending rank, FIFO among equal ranks.
struct PendingEntry {
    rank: u32,
    seq: u64,
    node: Arc<dyn PendingObservable>,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.rank, self.seq).cmp(&(other.rank, other.seq)).reverse()
    }
}

/// One atomic propagation step.
pub struct Transaction {
    id: TransactionId,

    /// Nodes whose inputs are ready, keyed by ascending rank.
    pending: BinaryHeap<PendingEntry>,

    /// IDs currently sitting in `pending`; a node is enqueued only if absent.
    members: HashSet<NodeId>,

    /// Insertion counter for the FIFO tie-break.
    next_seq: u64,
}

impl Transaction {
    fn new(id: TransactionId) -> Self {
        Self {
            id,
            pending: BinaryHeap::new(),
            members: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Get this transaction's ID.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Run `body` as a transaction.
    ///
    /// If no transaction is current on this thread, `body` runs immediately
    /// and the transaction drains to completion before this call returns
    /// (including any transactions queued while draining). Otherwise the
    /// body is queued and runs after the current transaction completes.
    pub fn run<F>(body: F)
    where
        F: FnOnce(&mut Transaction) + 'static,
    {
        let Some(mut body) = runtime::try_begin(Box::new(body)) else {
            return;
        };

        loop {
            let mut txn = Transaction::new(TransactionId::new());
            tracing::trace!(transaction = txn.id.raw(), "transaction begin");
            body(&mut txn);
            txn.drain();

            match runtime::finish_or_next() {
                Some(next) => body = next,
                None => break,
            }
        }
    }

    /// Add a node to the pending queue, unless it is already a member.
    pub(crate) fn enqueue(&mut self, node: Arc<dyn PendingObservable>) {
        if self.members.insert(node.pending_id()) {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.pending.push(PendingEntry {
                rank: node.pending_rank(),
                seq,
                node,
            });
        }
    }

    /// Drain the pending queue in ascending rank order.
    fn drain(&mut self) {
        while let Some(entry) = self.pending.pop() {
            self.members.remove(&entry.node.pending_id());
            entry.node.sync_fire(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;

    struct Recorder {
        id: NodeId,
        rank: u32,
        log: Arc<RwLock<Vec<u32>>>,
        tag: u32,
    }

    impl PendingObservable for Recorder {
        fn pending_id(&self) -> NodeId {
            self.id
        }

        fn pending_rank(&self) -> u32 {
            self.rank
        }

        fn sync_fire(&self, _txn: &mut Transaction) {
            self.log.write().expect("log lock poisoned").push(self.tag);
        }
    }

    fn recorder(rank: u32, tag: u32, log: &Arc<RwLock<Vec<u32>>>) -> Arc<Recorder> {
        Arc::new(Recorder {
            id: NodeId::new(),
            rank,
            log: log.clone(),
            tag,
        })
    }

    #[test]
    fn drains_in_ascending_rank_order() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let (a, b, c) = (
            recorder(3, 30, &log),
            recorder(1, 10, &log),
            recorder(2, 20, &log),
        );

        Transaction::run(move |txn| {
            txn.enqueue(a);
            txn.enqueue(b);
            txn.enqueue(c);
        });

        assert_eq!(*log.read().expect("log lock poisoned"), vec![10, 20, 30]);
    }

    #[test]
    fn equal_ranks_drain_in_insertion_order() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let (a, b, c) = (
            recorder(2, 1, &log),
            recorder(2, 2, &log),
            recorder(2, 3, &log),
        );

        Transaction::run(move |txn| {
            txn.enqueue(a);
            txn.enqueue(b);
            txn.enqueue(c);
        });

        assert_eq!(*log.read().expect("log lock poisoned"), vec![1, 2, 3]);
    }

    #[test]
    fn enqueue_is_guarded_by_membership() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let node = recorder(1, 7, &log);

        Transaction::run(move |txn| {
            txn.enqueue(node.clone());
            txn.enqueue(node.clone());
            txn.enqueue(node);
        });

        assert_eq!(*log.read().expect("log lock poisoned"), vec![7]);
    }

    #[test]
    fn nested_run_is_deferred_until_current_drains() {
        struct Nester {
            id: NodeId,
            log: Arc<RwLock<Vec<&'static str>>>,
        }

        impl PendingObservable for Nester {
            fn pending_id(&self) -> NodeId {
                self.id
            }

            fn pending_rank(&self) -> u32 {
                1
            }

            fn sync_fire(&self, _txn: &mut Transaction) {
                let log = self.log.clone();
                self.log
                    .write()
                    .expect("log lock poisoned")
                    .push("outer");
                Transaction::run(move |_| {
                    log.write().expect("log lock poisoned").push("inner");
                });
                self.log
                    .write()
                    .expect("log lock poisoned")
                    .push("outer-after-run");
            }
        }

        let log = Arc::new(RwLock::new(Vec::new()));
        let node = Arc::new(Nester {
            id: NodeId::new(),
            log: log.clone(),
        });

        Transaction::run(move |txn| txn.enqueue(node));

        // The inner transaction ran only after the outer one finished.
        assert_eq!(
            *log.read().expect("log lock poisoned"),
            vec!["outer", "outer-after-run", "inner"]
        );
    }
}
