//! Folding sampled non-FDs into the candidate lattice.

use crate::fd_tree::FdTree;
use crate::sampler::NonFdList;
use fixedbitset::FixedBitSet;
use tracing::debug;

/// Specializes `tree` against every non-FD witnessed by `non_fds`, largest agree sets first.
/// Returns the number of candidates added.
///
/// Handling the largest agree sets first means most retracted candidates are replaced by
/// specializations which the smaller agree sets then leave alone.
pub fn update_fd_tree(tree: &mut FdTree, non_fds: &NonFdList) -> usize {
    let mut added = 0;
    for (lhs, rhs) in non_fds.non_fds() {
        added += specialize_tree_for_non_fd(tree, lhs, rhs);
    }
    debug!(
        non_fds = non_fds.len(),
        added,
        nodes = tree.node_count(),
        "induced candidates"
    );
    added
}

/// Makes `tree` consistent with the fact that `lhs` does not determine `rhs`.
///
/// Every candidate `lhs' -> rhs` with `lhs' ⊆ lhs` is now known to be wrong and is removed. Each
/// is replaced by the minimal specializations that could still hold: `lhs' ∪ {a} -> rhs` for
/// every attribute `a` outside `lhs` other than `rhs`, unless a generalization is already a
/// candidate. Returns the number of candidates added.
pub fn specialize_tree_for_non_fd(tree: &mut FdTree, lhs: &FixedBitSet, rhs: usize) -> usize {
    let retracted = tree.fd_and_generalizations(lhs, rhs);
    if retracted.is_empty() {
        return 0;
    }
    for generalization in &retracted {
        tree.remove(generalization, rhs);
    }

    let mut added = 0;
    for mut specialization in retracted {
        for attribute in (0..tree.attribute_count()).rev() {
            if attribute == rhs || lhs.contains(attribute) {
                continue;
            }
            specialization.insert(attribute);
            if tree.add_fd(&specialization, rhs).is_some() {
                added += 1;
            }
            specialization.set(attribute, false);
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(len: usize, ones: &[usize]) -> FixedBitSet {
        let mut set = FixedBitSet::with_capacity(len);
        for &i in ones {
            set.insert(i);
        }
        set
    }

    fn fds(tree: &FdTree) -> Vec<(Vec<usize>, usize)> {
        let mut fds: Vec<_> = tree
            .fds()
            .into_iter()
            .map(|(lhs, rhs)| (lhs.ones().collect(), rhs))
            .collect();
        fds.sort();
        fds
    }

    #[test]
    fn specializes_the_most_general_candidates() {
        let mut tree = FdTree::new(3);
        tree.add_most_general_dependencies();
        let added = specialize_tree_for_non_fd(&mut tree, &bits(3, &[0]), 1);
        assert_eq!(added, 1);
        assert_eq!(fds(&tree), vec![(vec![], 0), (vec![], 2), (vec![2], 1)]);
    }

    #[test]
    fn witnessed_non_fds_are_gone() {
        let mut tree = FdTree::new(4);
        tree.add_most_general_dependencies();
        let mut non_fds = NonFdList::new(4);
        non_fds.add(bits(4, &[0, 1]));
        non_fds.add(bits(4, &[2]));
        non_fds.add(bits(4, &[]));
        update_fd_tree(&mut tree, &non_fds);

        for agree_set in non_fds.highest_first() {
            for rhs in (0..4).filter(|&rhs| !agree_set.contains(rhs)) {
                assert!(!tree.find_fd_or_general(agree_set, rhs));
            }
        }
        // {0, 1} -/-> 3 and {2} -/-> 3 leave {0, 2} and {1, 2} as the minimal options.
        let for_three: Vec<_> = fds(&tree)
            .into_iter()
            .filter(|&(_, rhs)| rhs == 3)
            .collect();
        assert_eq!(for_three, vec![(vec![0, 2], 3), (vec![1, 2], 3)]);
    }

    #[test]
    fn untouched_candidates_survive() {
        let mut tree = FdTree::new(3);
        tree.add_fd_unchecked(&bits(3, &[1]), 0);
        assert_eq!(specialize_tree_for_non_fd(&mut tree, &bits(3, &[2]), 0), 0);
        assert_eq!(fds(&tree), vec![(vec![1], 0)]);
    }

    #[test]
    fn full_agree_set_leaves_no_specialization() {
        let mut tree = FdTree::new(2);
        tree.add_most_general_dependencies();
        assert_eq!(specialize_tree_for_non_fd(&mut tree, &bits(2, &[0]), 1), 0);
        assert_eq!(fds(&tree), vec![(vec![], 0)]);
    }
}
