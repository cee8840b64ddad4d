//! Level-wise validation of the candidates in an [`FdTree`].
//!
//! The validator checks candidates against the full relation one lattice level at a time,
//! starting with the empty lhs. Candidates that fail are replaced by their one-attribute
//! extensions on the next level. When a level turns up noticeably more failures than the one
//! before, the sampler is probably missing agree sets that would have ruled those candidates out
//! more cheaply, so validation stops and hands the row pairs it found violating back to the
//! sampler as suggestions. The level reached is kept, and the next call resumes there.

use crate::fd_tree::{FdTree, NodeId, ROOT};
use crate::pli::{is_singleton, ClusterId};
use crate::pool::WorkerPool;
use crate::preprocess::PreprocessedRelation;
use crate::sampler::IdPair;
use fixedbitset::FixedBitSet;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// What the caller should do after [`Validator::validate_and_extend_candidates`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every level has been validated; the tree holds exactly the minimal FDs.
    Exhausted,
    /// Validation became inefficient. Sample these row pairs, induct, and validate again. The
    /// list may be empty, in which case the sampler should simply widen its windows.
    NeedsSampling(Vec<IdPair>),
}

/// Counters for one validated level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidationStats {
    /// Number of `(lhs, rhs)` candidates checked.
    pub validations: usize,
    /// Number of PLI scans performed.
    pub intersections: usize,
    /// Number of candidates that turned out not to hold.
    pub invalid: usize,
    /// Number of extended candidates added to the next level.
    pub candidates: usize,
}

/// The result of validating every candidate at one node.
#[derive(Debug)]
struct NodeValidation {
    node: NodeId,
    valid: FixedBitSet,
    invalid: Vec<usize>,
    suggestions: Vec<IdPair>,
    validations: usize,
    intersections: usize,
}

impl NodeValidation {
    fn new(node: NodeId, attributes: usize) -> Self {
        NodeValidation {
            node,
            valid: FixedBitSet::with_capacity(attributes),
            invalid: Vec::new(),
            suggestions: Vec::new(),
            validations: 0,
            intersections: 0,
        }
    }
}

/// Cluster ids of one row in the non-pivot lhs attributes.
type RefineKey = SmallVec<[ClusterId; 4]>;

/// Checks candidate FDs level by level.
pub struct Validator<'a> {
    data: &'a PreprocessedRelation,
    pool: &'a WorkerPool,
    efficiency_threshold: f64,
    level: usize,
}

impl<'a> Validator<'a> {
    /// Creates a validator positioned at level 0.
    pub fn new(
        data: &'a PreprocessedRelation,
        pool: &'a WorkerPool,
        efficiency_threshold: f64,
    ) -> Self {
        Validator {
            data,
            pool,
            efficiency_threshold,
            level: 0,
        }
    }

    /// The lattice level the next call starts at.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Validates the tree's candidates from the current level upward, pruning those that fail
    /// and queueing their extensions, until either every level is done or validation stops
    /// paying off.
    pub fn validate_and_extend_candidates(&mut self, tree: &mut FdTree) -> ValidationOutcome {
        let attributes = self.data.attribute_count();
        assert_eq!(tree.attribute_count(), attributes);

        let mut current = tree.level(self.level);
        let mut previous_invalid = 0;
        let mut suggestions = Vec::new();

        while !current.is_empty() {
            let data = self.data;
            let level = self.level;
            let snapshot: &FdTree = tree;
            let results = self.pool.map(&current, |(node, lhs)| {
                validate_node(data, *node, lhs, snapshot.node_fds(*node), level)
            });

            let mut stats = ValidationStats::default();
            let mut invalid_fds = Vec::new();
            for (result, (_, lhs)) in results.into_iter().zip(&current) {
                stats.validations += result.validations;
                stats.intersections += result.intersections;
                invalid_fds.extend(result.invalid.iter().map(|&rhs| (lhs.clone(), rhs)));
                suggestions.extend(result.suggestions);
                tree.set_fds(result.node, result.valid);
            }
            stats.invalid = invalid_fds.len();

            if self.level >= attributes {
                break;
            }

            let mut next = tree.children_level(&current);
            stats.candidates = add_extended_candidates(tree, &mut next, &invalid_fds);
            debug!(
                level = self.level,
                nodes = current.len(),
                validations = stats.validations,
                intersections = stats.intersections,
                invalid = stats.invalid,
                candidates = stats.candidates,
                next = next.len(),
                "validated level"
            );

            let invalid = stats.invalid;
            let valid = stats.validations - invalid;
            current = next;
            self.level += 1;

            let inefficient = invalid as f64 > self.efficiency_threshold * valid as f64;
            if inefficient && previous_invalid < invalid {
                debug!(
                    level = self.level,
                    suggestions = suggestions.len(),
                    "validation inefficient, returning to sampling"
                );
                return ValidationOutcome::NeedsSampling(suggestions);
            }
            previous_invalid = invalid;
        }

        ValidationOutcome::Exhausted
    }
}

fn validate_node(
    data: &PreprocessedRelation,
    node: NodeId,
    lhs: &FixedBitSet,
    rhs: &FixedBitSet,
    level: usize,
) -> NodeValidation {
    let mut result = NodeValidation::new(node, data.attribute_count());
    let candidates = rhs.count_ones(..);
    if candidates == 0 {
        return result;
    }
    result.validations = candidates;

    match level {
        0 => {
            result.intersections = candidates;
            for attribute in rhs.ones() {
                if data.plis[attribute].is_constant() {
                    result.valid.insert(attribute);
                } else {
                    result.invalid.push(attribute);
                }
            }
        }
        1 => {
            result.intersections = candidates;
            let pivot = match lhs.ones().next() {
                Some(pivot) => pivot,
                None => return result,
            };
            for attribute in rhs.ones() {
                if determines(data, pivot, attribute) {
                    result.valid.insert(attribute);
                } else {
                    result.invalid.push(attribute);
                }
            }
        }
        _ => {
            result.intersections = 1;
            let (valid, suggestions) = refine(data, lhs, rhs);
            for attribute in rhs.ones() {
                if !valid.contains(attribute) {
                    result.invalid.push(attribute);
                }
            }
            result.valid = valid;
            result.suggestions = suggestions;
        }
    }
    result
}

/// Whether `lhs` alone determines `rhs`: within every cluster of `lhs`, all rows must share one
/// non-singleton cluster of `rhs`.
fn determines(data: &PreprocessedRelation, lhs: usize, rhs: usize) -> bool {
    let records = &data.compressed_records;
    data.plis[lhs].clusters().iter().all(|cluster| {
        let expected = records[cluster[0]][rhs];
        !is_singleton(expected) && cluster.iter().all(|&row| records[row][rhs] == expected)
    })
}

/// Checks every rhs in `rhs` against `lhs` by scanning the clusters of the lowest lhs attribute
/// and grouping each cluster's rows by their cluster ids in the remaining lhs attributes. Returns
/// the rhs attributes that held, plus one row pair for every violation found.
fn refine(
    data: &PreprocessedRelation,
    lhs: &FixedBitSet,
    rhs: &FixedBitSet,
) -> (FixedBitSet, Vec<IdPair>) {
    let records = &data.compressed_records;
    let mut lhs_attributes = lhs.ones();
    let pivot = match lhs_attributes.next() {
        Some(pivot) => pivot,
        None => return (rhs.clone(), Vec::new()),
    };
    let rest: SmallVec<[usize; 4]> = lhs_attributes.collect();
    let mut remaining: Vec<usize> = rhs.ones().collect();
    let mut suggestions = Vec::new();

    'clusters: for cluster in data.plis[pivot].clusters() {
        let mut groups: HashMap<RefineKey, usize> = HashMap::with_capacity(cluster.len());
        for &row in cluster {
            let record = &records[row];
            let key: RefineKey = rest.iter().map(|&attribute| record[attribute]).collect();
            if key.iter().any(|&id| is_singleton(id)) {
                continue;
            }

            let representative = *groups.entry(key).or_insert(row);
            if representative == row {
                continue;
            }
            let first = &records[representative];
            let before = remaining.len();
            remaining.retain(|&attribute| {
                let value = record[attribute];
                !is_singleton(value) && value == first[attribute]
            });
            if remaining.len() < before {
                suggestions.push((row, representative));
                if remaining.is_empty() {
                    break 'clusters;
                }
            }
        }
    }

    let mut valid = FixedBitSet::with_capacity(rhs.len());
    for attribute in remaining {
        valid.insert(attribute);
    }
    (valid, suggestions)
}

/// Adds `lhs ∪ {a} -> rhs` for every failed `lhs -> rhs` and every attribute `a` that could make
/// it hold, appending any node not already queued to `next`. Returns the number added.
fn add_extended_candidates(
    tree: &mut FdTree,
    next: &mut Vec<(NodeId, FixedBitSet)>,
    invalid_fds: &[(FixedBitSet, usize)],
) -> usize {
    let mut queued: HashSet<NodeId> = next.iter().map(|&(node, _)| node).collect();
    let mut added = 0;
    for (lhs, rhs) in invalid_fds {
        let rhs = *rhs;
        for attribute in 0..tree.attribute_count() {
            if lhs.contains(attribute) || attribute == rhs {
                continue;
            }
            // If lhs -> a holds, lhs ∪ {a} -> rhs would imply lhs -> rhs; if {a} -> rhs holds,
            // the extension isn't minimal.
            if tree.find_fd_or_general(lhs, attribute)
                || tree
                    .child(ROOT, attribute)
                    .map_or(false, |child| tree.is_fd(child, rhs))
            {
                continue;
            }

            let mut extended = lhs.clone();
            extended.insert(attribute);
            if let Some(node) = tree.add_fd(&extended, rhs) {
                added += 1;
                if queued.insert(node) {
                    next.push((node, extended));
                }
            }
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EFFICIENCY_THRESHOLD;
    use crate::pli::Pli;
    use crate::preprocess;
    use crate::relation::NullPolicy;

    fn relation(columns: &[&[u32]]) -> PreprocessedRelation {
        let plis: Vec<Pli> = columns
            .iter()
            .map(|values| Pli::create_for(values, NullPolicy::NullEqualsNull))
            .collect();
        preprocess::run(&plis)
    }

    fn bits(len: usize, ones: &[usize]) -> FixedBitSet {
        let mut set = FixedBitSet::with_capacity(len);
        for &i in ones {
            set.insert(i);
        }
        set
    }

    /// Runs validation until exhausted and returns the surviving FDs in original column indices.
    fn validate_all(data: &PreprocessedRelation, threshold: f64) -> Vec<(Vec<usize>, usize)> {
        let pool = WorkerPool::sequential();
        let mut tree = FdTree::new(data.attribute_count());
        tree.add_most_general_dependencies();
        let mut validator = Validator::new(data, &pool, threshold);
        while validator.validate_and_extend_candidates(&mut tree) != ValidationOutcome::Exhausted {}
        let mut fds: Vec<_> = tree
            .fds()
            .into_iter()
            .map(|(lhs, rhs)| {
                (data.to_original(&lhs), data.original_index[rhs])
            })
            .collect();
        fds.sort();
        fds
    }

    fn position(data: &PreprocessedRelation, column: usize) -> usize {
        data.original_index
            .iter()
            .position(|&c| c == column)
            .unwrap()
    }

    #[test]
    fn constant_column_is_determined_by_nothing() {
        let data = relation(&[&[1, 2, 3], &[7, 7, 7]]);
        assert_eq!(validate_all(&data, f64::INFINITY), vec![(vec![], 1)]);
    }

    #[test]
    fn finds_single_attribute_dependencies() {
        let data = relation(&[
            &[1, 1, 2, 2],
            &[1, 1, 2, 2],
            &[1, 2, 1, 2],
            &[1, 2, 1, 2],
        ]);
        assert_eq!(
            validate_all(&data, f64::INFINITY),
            vec![(vec![0], 1), (vec![1], 0), (vec![2], 3), (vec![3], 2)]
        );
    }

    #[test]
    fn finds_composite_dependencies() {
        // c = a + b over two independent binary columns.
        let data = relation(&[&[0, 0, 1, 1], &[0, 1, 0, 1], &[0, 1, 1, 2]]);
        assert_eq!(
            validate_all(&data, f64::INFINITY),
            vec![(vec![0, 1], 2), (vec![0, 2], 1), (vec![1, 2], 0)]
        );
    }

    #[test]
    fn early_returns_do_not_change_the_result() {
        let data = relation(&[
            &[0, 0, 1, 1, 1],
            &[0, 1, 0, 1, 1],
            &[0, 1, 1, 2, 2],
            &[3, 3, 3, 3, 4],
        ]);
        assert_eq!(validate_all(&data, 0.0), validate_all(&data, f64::INFINITY));
    }

    #[test]
    fn inefficient_level_asks_for_sampling() {
        let data = relation(&[&[1, 2, 3], &[1, 1, 2]]);
        let pool = WorkerPool::sequential();
        let mut tree = FdTree::new(2);
        tree.add_most_general_dependencies();
        let mut validator = Validator::new(&data, &pool, 0.0);
        assert!(matches!(
            validator.validate_and_extend_candidates(&mut tree),
            ValidationOutcome::NeedsSampling(_)
        ));
        assert_eq!(validator.level(), 1);
    }

    /// Twelve copies of one column, then `x` which none of them determines, then a constant `y`.
    /// The tree holds every `{copy} -> copy` candidate plus `{copy 0} -> x`, so level 1 has one
    /// failure against 132 successes and its extension `{copy 0, y} -> x` fails on level 2.
    fn copies_and_a_stray_column() -> (PreprocessedRelation, FdTree) {
        let mut columns = vec![vec![1, 1, 2, 2]; 12];
        columns.push(vec![1, 2, 1, 2]);
        columns.push(vec![1, 1, 1, 1]);
        let refs: Vec<&[u32]> = columns.iter().map(Vec::as_slice).collect();
        let data = relation(&refs);
        let n = data.attribute_count();

        let mut tree = FdTree::new(n);
        for a in 0..12 {
            for b in (0..12).filter(|&b| b != a) {
                tree.add_fd_unchecked(&bits(n, &[position(&data, a)]), position(&data, b));
            }
        }
        tree.add_fd_unchecked(&bits(n, &[position(&data, 0)]), position(&data, 12));
        (data, tree)
    }

    #[test]
    fn inefficient_level_without_more_failures_keeps_going() {
        let (data, mut tree) = copies_and_a_stray_column();
        let pool = WorkerPool::sequential();
        let mut validator = Validator::new(&data, &pool, EFFICIENCY_THRESHOLD);
        // Level 2 has one failure and no successes, but no more failures than level 1.
        assert_eq!(
            validator.validate_and_extend_candidates(&mut tree),
            ValidationOutcome::Exhausted
        );
        assert_eq!(validator.level(), 3);
        let extended = bits(14, &[position(&data, 0), position(&data, 13)]);
        assert!(!tree.find_fd_or_general(&extended, position(&data, 12)));
    }

    #[test]
    fn inefficient_level_with_more_failures_returns() {
        let (data, mut tree) = copies_and_a_stray_column();
        let lhs = bits(14, &[position(&data, 1), position(&data, 13)]);
        tree.add_fd_unchecked(&lhs, position(&data, 12));
        let pool = WorkerPool::sequential();
        let mut validator = Validator::new(&data, &pool, EFFICIENCY_THRESHOLD);
        // Level 2 now fails twice, one more than level 1.
        match validator.validate_and_extend_candidates(&mut tree) {
            ValidationOutcome::NeedsSampling(pairs) => assert_eq!(pairs.len(), 2),
            ValidationOutcome::Exhausted => panic!("validation should have stopped at level 2"),
        }
        assert_eq!(validator.level(), 3);
    }

    #[test]
    fn refine_reports_violating_pairs() {
        let data = relation(&[
            &[1, 1, 1, 1],
            &[1, 1, 2, 2],
            &[1, 2, 3, 3],
            &[5, 5, 6, 6],
        ]);
        let lhs = bits(4, &[position(&data, 0), position(&data, 1)]);
        let rhs = bits(4, &[position(&data, 2), position(&data, 3)]);
        let (valid, suggestions) = refine(&data, &lhs, &rhs);
        assert_eq!(valid, bits(4, &[position(&data, 3)]));
        assert_eq!(suggestions.len(), 1);
        let (a, b) = suggestions[0];
        assert_eq!((a.min(b), a.max(b)), (0, 1));
    }

    #[test]
    fn extensions_skip_known_dependencies() {
        let mut tree = FdTree::new(3);
        tree.add_fd_unchecked(&bits(3, &[0]), 1);
        let mut next = Vec::new();
        let invalid = vec![(bits(3, &[0]), 2)];
        // The only possible extension is by 1, and {0} -> 1 already holds.
        assert_eq!(add_extended_candidates(&mut tree, &mut next, &invalid), 0);
        assert!(next.is_empty());

        let invalid = vec![(bits(3, &[1]), 2)];
        assert_eq!(add_extended_candidates(&mut tree, &mut next, &invalid), 1);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].1, bits(3, &[0, 1]));
    }
}
