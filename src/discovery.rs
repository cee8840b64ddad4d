//! The discovery driver: alternates sampling, induction and validation until the candidate
//! lattice only holds minimal FDs.

use crate::config::{DiscoveryConfig, SAMPLING_THRESHOLD_DECREASE};
use crate::error::{Error, Result};
use crate::fd_tree::FdTree;
use crate::inductor;
use crate::pli::Pli;
use crate::pool::WorkerPool;
use crate::preprocess::{self, PreprocessedRelation};
use crate::relation::Relation;
use crate::sampler::{IdPair, Sampler};
use crate::validator::{ValidationOutcome, Validator};
use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A minimal, non-trivial functional dependency `lhs -> rhs` over original column indices.
///
/// ```
/// use agree_lattice::FunctionalDependency;
///
/// let fd = FunctionalDependency { lhs: vec![0, 2], rhs: 1 };
/// assert_eq!(fd.to_string(), "[0, 2] -> 1");
/// assert_eq!(fd.display_with(&["a", "b", "c"]).to_string(), "[a, c] -> b");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionalDependency {
    /// Determining columns, ascending. Empty when `rhs` is constant.
    pub lhs: Vec<usize>,
    /// The determined column.
    pub rhs: usize,
}

impl FunctionalDependency {
    /// Formats this dependency with column names instead of indices.
    pub fn display_with<'a, S: AsRef<str>>(&'a self, names: &'a [S]) -> NamedDependency<'a, S> {
        NamedDependency { fd: self, names }
    }
}

impl fmt::Display for FunctionalDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {}", self.lhs, self.rhs)
    }
}

/// A [`FunctionalDependency`] paired with column names for display.
pub struct NamedDependency<'a, S> {
    fd: &'a FunctionalDependency,
    names: &'a [S],
}

impl<S: AsRef<str>> fmt::Display for NamedDependency<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, &column) in self.fd.lhs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(self.names[column].as_ref())?;
        }
        write!(f, "] -> {}", self.names[self.fd.rhs].as_ref())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Preprocessing,
    Sampling,
    Inducting,
    Validating,
    Done,
}

/// Time spent in each phase of one run.
#[derive(Debug, Default)]
struct Timings {
    preprocessing: Duration,
    sampling: Duration,
    inducting: Duration,
    validating: Duration,
}

impl Timings {
    fn record(&mut self, phase: Phase, elapsed: Duration) {
        match phase {
            Phase::Preprocessing => self.preprocessing += elapsed,
            Phase::Sampling => self.sampling += elapsed,
            Phase::Inducting => self.inducting += elapsed,
            Phase::Validating => self.validating += elapsed,
            Phase::Done => {}
        }
    }
}

/// One discovery run over a loaded relation.
pub struct Discovery<'a> {
    relation: &'a Relation,
    config: &'a DiscoveryConfig,
}

impl<'a> Discovery<'a> {
    /// Prepares a run. Nothing is computed until [`run`](Self::run).
    pub fn new(relation: &'a Relation, config: &'a DiscoveryConfig) -> Self {
        Discovery { relation, config }
    }

    /// Finds every minimal, non-trivial FD of the relation.
    ///
    /// The result is sorted by rhs, then by lhs, and is the same for every thread count.
    pub fn run(&self) -> Result<Vec<FunctionalDependency>> {
        let pool = WorkerPool::new(self.config.threads);
        let mut timings = Timings::default();
        let mut phase = Phase::Preprocessing;
        debug!(
            relation = self.relation.relation_name(),
            columns = self.relation.column_count(),
            rows = self.relation.row_count(),
            threads = pool.threads(),
            ?phase,
            "starting discovery"
        );

        let started = Instant::now();
        let plis: Cow<'_, [Pli]> = if self.relation.null_policy() == self.config.null_policy {
            Cow::Borrowed(self.relation.plis())
        } else {
            Cow::Owned(self.relation.plis_for(self.config.null_policy))
        };
        let data = preprocess::run(&plis);
        drop(plis);
        timings.record(phase, started.elapsed());

        let mut tree = FdTree::new(data.attribute_count());
        tree.add_most_general_dependencies();
        let mut sampler = Sampler::new(
            &data,
            &pool,
            self.config.efficiency_threshold,
            SAMPLING_THRESHOLD_DECREASE,
        );
        let mut validator = Validator::new(&data, &pool, self.config.efficiency_threshold);

        let mut suggestions: Vec<IdPair> = Vec::new();
        let mut rounds = 0;
        let mut non_fds = None;
        loop {
            let next = match phase {
                Phase::Preprocessing => Phase::Sampling,
                Phase::Sampling => {
                    if let Some(limit) = self.config.max_rounds {
                        if rounds >= limit {
                            return Err(Error::BudgetExceeded { rounds: limit });
                        }
                    }
                    rounds += 1;
                    let started = Instant::now();
                    non_fds = Some(sampler.agree_sets(&suggestions));
                    timings.record(phase, started.elapsed());
                    Phase::Inducting
                }
                Phase::Inducting => {
                    let started = Instant::now();
                    if let Some(non_fds) = non_fds.take() {
                        inductor::update_fd_tree(&mut tree, &non_fds);
                    }
                    timings.record(phase, started.elapsed());
                    Phase::Validating
                }
                Phase::Validating => {
                    let started = Instant::now();
                    let outcome = validator.validate_and_extend_candidates(&mut tree);
                    timings.record(phase, started.elapsed());
                    match outcome {
                        ValidationOutcome::Exhausted => Phase::Done,
                        ValidationOutcome::NeedsSampling(next) => {
                            suggestions = next;
                            Phase::Sampling
                        }
                    }
                }
                Phase::Done => break,
            };
            debug!(from = ?phase, to = ?next, round = rounds, "discovery phase");
            phase = next;
        }

        let fds = collect_fds(&tree, &data);
        info!(
            rounds,
            fds = fds.len(),
            nodes = tree.node_count(),
            preprocessing_ms = timings.preprocessing.as_millis() as u64,
            sampling_ms = timings.sampling.as_millis() as u64,
            inducting_ms = timings.inducting.as_millis() as u64,
            validating_ms = timings.validating.as_millis() as u64,
            "discovery finished"
        );
        Ok(fds)
    }
}

/// Finds every minimal, non-trivial FD of `relation`.
///
/// ```
/// use agree_lattice::{discover_fds, DiscoveryConfig, InMemoryTable, NullPolicy, Relation};
///
/// let mut table = InMemoryTable::new("people", &["id", "city", "zip"])
///     .with_row(&["1", "Oslo", "0150"])
///     .with_row(&["2", "Oslo", "0150"])
///     .with_row(&["3", "Bergen", "5003"]);
/// let relation = Relation::load(&mut table, NullPolicy::NullEqualsNull).unwrap();
/// let fds = discover_fds(&relation, &DiscoveryConfig::default().with_threads(1)).unwrap();
///
/// let names = relation.column_names();
/// let shown: Vec<String> = fds.iter().map(|fd| fd.display_with(&names).to_string()).collect();
/// assert_eq!(shown, ["[id] -> city", "[zip] -> city", "[id] -> zip", "[city] -> zip"]);
/// ```
pub fn discover_fds(
    relation: &Relation,
    config: &DiscoveryConfig,
) -> Result<Vec<FunctionalDependency>> {
    Discovery::new(relation, config).run()
}

fn collect_fds(tree: &FdTree, data: &PreprocessedRelation) -> Vec<FunctionalDependency> {
    let mut fds: Vec<FunctionalDependency> = tree
        .fds()
        .into_iter()
        .map(|(lhs, rhs)| FunctionalDependency {
            lhs: data.to_original(&lhs),
            rhs: data.original_index[rhs],
        })
        .collect();
    fds.sort_by(|a, b| a.rhs.cmp(&b.rhs).then_with(|| a.lhs.cmp(&b.lhs)));
    fds
}
