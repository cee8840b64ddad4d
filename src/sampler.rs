//! Sampling row pairs into agree sets.
//!
//! Two rows "agree" on an attribute if they share a cluster in it. The set of attributes a pair
//! agrees on is a cheap, definite witness: for every attribute outside it, the pair proves that
//! the agree set does not functionally determine that attribute. The sampler's job is to find
//! many distinct agree sets quickly, mostly by comparing rows that sit close to each other inside
//! the (neighbour-sorted) clusters of each column, and to widen that window only for columns where
//! it keeps paying off.

use crate::pli::is_singleton;
use crate::pool::WorkerPool;
use crate::preprocess::{CompressedRecord, PreprocessedRelation};
use fixedbitset::FixedBitSet;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, trace};

/// A pair of row indices.
pub type IdPair = (usize, usize);

/// Comparison suggestions are matched in chunks of this many pairs per task.
const SUGGESTION_CHUNK: usize = 1024;

/// Computes the set of attributes on which rows `a` and `b` share a non-singleton cluster.
///
/// # Panics
///
/// Panics if either row is out of range.
pub fn agree_set(records: &[CompressedRecord], a: usize, b: usize) -> FixedBitSet {
    assert!(a < records.len() && b < records.len());
    let (first, second) = (&records[a], &records[b]);
    let mut attributes = FixedBitSet::with_capacity(first.len());
    for (attribute, (&x, &y)) in first.iter().zip(second).enumerate() {
        if x == y && !is_singleton(x) {
            attributes.insert(attribute);
        }
    }
    attributes
}

/// Agree sets grouped by their number of attributes.
///
/// Each agree set `lhs` stands for the non-FDs `lhs -/-> rhs` for every `rhs` not in `lhs`.
#[derive(Clone, Debug, Default)]
pub struct NonFdList {
    levels: Vec<Vec<FixedBitSet>>,
    len: usize,
}

impl NonFdList {
    /// Creates an empty list for sets over `attributes` attributes.
    pub fn new(attributes: usize) -> Self {
        NonFdList {
            levels: vec![Vec::new(); attributes + 1],
            len: 0,
        }
    }

    /// Adds one agree set. Callers are responsible for deduplication.
    pub fn add(&mut self, agree_set: FixedBitSet) {
        let level = agree_set.count_ones(..);
        if level >= self.levels.len() {
            self.levels.resize(level + 1, Vec::new());
        }
        self.levels[level].push(agree_set);
        self.len += 1;
    }

    /// The number of agree sets.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no agree sets.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The agree sets with exactly `level` attributes.
    pub fn level(&self, level: usize) -> &[FixedBitSet] {
        self.levels.get(level).map_or(&[][..], Vec::as_slice)
    }

    /// The highest level that holds any agree set.
    pub fn depth(&self) -> usize {
        self.levels.iter().rposition(|l| !l.is_empty()).unwrap_or(0)
    }

    /// All agree sets, those with the most attributes first.
    pub fn highest_first(&self) -> impl Iterator<Item = &FixedBitSet> + '_ {
        self.levels.iter().rev().flatten()
    }

    /// Every `(lhs, rhs)` non-FD the agree sets witness, highest level first.
    pub fn non_fds(&self) -> impl Iterator<Item = (&FixedBitSet, usize)> + '_ {
        self.highest_first().flat_map(|lhs| {
            (0..lhs.len())
                .filter(move |&rhs| !lhs.contains(rhs))
                .map(move |rhs| (lhs, rhs))
        })
    }
}

/// Every agree set seen so far, remembering which are new since [`take_new`](Self::take_new)
/// was last called.
#[derive(Debug)]
pub struct AgreeSetStore {
    attributes: usize,
    seen: HashSet<FixedBitSet>,
    fresh: Vec<FixedBitSet>,
}

impl AgreeSetStore {
    /// Creates an empty store for sets over `attributes` attributes.
    pub fn new(attributes: usize) -> Self {
        AgreeSetStore {
            attributes,
            seen: HashSet::new(),
            fresh: Vec::new(),
        }
    }

    /// Records an agree set, returning `true` if it wasn't seen before.
    pub fn add(&mut self, agree_set: FixedBitSet) -> bool {
        assert_eq!(agree_set.len(), self.attributes);
        if self.seen.contains(&agree_set) {
            return false;
        }
        self.seen.insert(agree_set.clone());
        self.fresh.push(agree_set);
        true
    }

    /// The number of distinct agree sets ever added.
    pub fn count(&self) -> usize {
        self.seen.len()
    }

    /// Moves out the agree sets added since the last call, in insertion order.
    pub fn take_new(&mut self) -> NonFdList {
        let mut list = NonFdList::new(self.attributes);
        for agree_set in self.fresh.drain(..) {
            list.add(agree_set);
        }
        list
    }
}

/// How productive sliding-window sampling has recently been for one attribute.
#[derive(Clone, Copy, Debug)]
struct Efficiency {
    attribute: usize,
    window: usize,
    violations: usize,
    comparisons: usize,
}

impl Efficiency {
    fn new(attribute: usize) -> Self {
        Efficiency {
            attribute,
            window: 0,
            violations: 0,
            comparisons: 0,
        }
    }

    fn value(&self) -> f64 {
        if self.comparisons == 0 {
            0.0
        } else {
            self.violations as f64 / self.comparisons as f64
        }
    }
}

impl PartialEq for Efficiency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Efficiency {}

impl PartialOrd for Efficiency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Efficiency {
    /// Higher efficiency sorts greater; among equals the lower attribute wins, so the heap pops
    /// in a deterministic order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.value()
            .total_cmp(&other.value())
            .then_with(|| other.attribute.cmp(&self.attribute))
    }
}

/// Produces new agree sets for every round of discovery.
pub struct Sampler<'a> {
    data: &'a PreprocessedRelation,
    pool: &'a WorkerPool,
    store: AgreeSetStore,
    queue: BinaryHeap<Efficiency>,
    threshold: f64,
    threshold_decrease: f64,
    initialized: bool,
}

impl<'a> Sampler<'a> {
    /// Creates a sampler. Nothing is compared until the first call to
    /// [`agree_sets`](Self::agree_sets).
    pub fn new(
        data: &'a PreprocessedRelation,
        pool: &'a WorkerPool,
        efficiency_threshold: f64,
        threshold_decrease: f64,
    ) -> Self {
        Sampler {
            data,
            pool,
            store: AgreeSetStore::new(data.attribute_count()),
            queue: BinaryHeap::new(),
            threshold: efficiency_threshold,
            threshold_decrease,
            initialized: false,
        }
    }

    /// Matches every suggested pair, then keeps running sliding windows over the most efficient
    /// attributes until none of them reaches the current threshold. Returns the agree sets that
    /// were never seen in an earlier round.
    pub fn agree_sets(&mut self, suggestions: &[IdPair]) -> NonFdList {
        let records = &self.data.compressed_records;
        let matched = self.pool.map_chunks(suggestions, SUGGESTION_CHUNK, |chunk| {
            chunk
                .iter()
                .map(|&(a, b)| agree_set(records, a, b))
                .collect::<Vec<_>>()
        });
        for agree_set in matched.into_iter().flatten() {
            self.store.add(agree_set);
        }

        if !self.initialized {
            self.initialize_queue();
            self.initialized = true;
        } else if let Some(best) = self.queue.peek() {
            let lowered = best.value() * self.threshold_decrease;
            self.threshold = (self.threshold / 2.0).min(lowered);
        }

        while let Some(mut best) = self.queue.peek().copied() {
            if best.value() < self.threshold {
                break;
            }
            self.queue.pop();
            let matches = Self::window(self.data, &mut best);
            self.record_window(&mut best, matches);
            trace!(
                attribute = best.attribute,
                window = best.window,
                efficiency = best.value(),
                "widened sampling window"
            );
            if best.value() > 0.0 {
                self.queue.push(best);
            }
        }

        let new = self.store.take_new();
        debug!(
            suggestions = suggestions.len(),
            new_agree_sets = new.len(),
            total_agree_sets = self.store.count(),
            threshold = self.threshold,
            "sampled"
        );
        new
    }

    /// Runs the first window over every attribute and ranks the attributes by how many new agree
    /// sets it found per comparison. The windows are computed in parallel, but merged in
    /// attribute order so the violation counts are the same as in a sequential run.
    fn initialize_queue(&mut self) {
        let data = self.data;
        let attributes: Vec<usize> = (0..data.attribute_count()).collect();
        let windows = self.pool.map(&attributes, |&attribute| {
            let mut efficiency = Efficiency::new(attribute);
            let matches = Self::window(data, &mut efficiency);
            (efficiency, matches)
        });

        for (mut efficiency, matches) in windows {
            self.record_window(&mut efficiency, matches);
            if efficiency.value() > 0.0 {
                self.queue.push(efficiency);
            }
        }

        if let Some(best) = self.queue.peek() {
            self.threshold = self.threshold.min(best.value() / 2.0);
        }
    }

    /// Widens the window for `efficiency`'s attribute by one and compares every row with the row
    /// that many places later in the same cluster.
    fn window(data: &PreprocessedRelation, efficiency: &mut Efficiency) -> Vec<FixedBitSet> {
        efficiency.window += 1;
        let window = efficiency.window;
        let records = &data.compressed_records;

        let mut matches = Vec::new();
        for cluster in data.plis[efficiency.attribute].clusters() {
            for i in 0..cluster.len().saturating_sub(window) {
                let agree = agree_set(records, cluster[i], cluster[i + window]);
                debug_assert!(agree.contains(efficiency.attribute));
                matches.push(agree);
            }
        }
        efficiency.comparisons = matches.len();
        matches
    }

    fn record_window(&mut self, efficiency: &mut Efficiency, matches: Vec<FixedBitSet>) {
        let before = self.store.count();
        for agree_set in matches {
            self.store.add(agree_set);
        }
        efficiency.violations = self.store.count() - before;
    }
}
