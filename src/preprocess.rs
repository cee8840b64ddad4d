//! Turns a relation's PLIs into the structures the sampler and validator work on.
//!
//! Both of those spend nearly all their time looking up "which cluster is row `r` in for column
//! `c`", so preprocessing flips the column-major probing tables into row-major compressed
//! records. It also reorders the columns so that those with the most clusters come first; the
//! rest of discovery only ever sees the reordered attribute indices, and
//! [`PreprocessedRelation::original_index`] translates them back at the end.

use crate::pli::{ClusterId, Pli};
use fixedbitset::FixedBitSet;
use std::cmp::{Ordering, Reverse};

/// One row's cluster id in every (reordered) column.
pub type CompressedRecord = Vec<ClusterId>;

/// The read-only inputs to sampling and validation.
#[derive(Debug)]
pub struct PreprocessedRelation {
    /// PLIs in descending order of cluster count.
    pub plis: Vec<Pli>,
    /// `compressed_records[row][attribute] == plis[attribute].probing_table()[row]`.
    pub compressed_records: Vec<CompressedRecord>,
    /// `original_index[attribute]` is the original column index of reordered `attribute`.
    pub original_index: Vec<usize>,
}

impl PreprocessedRelation {
    /// The number of attributes.
    pub fn attribute_count(&self) -> usize {
        self.plis.len()
    }

    /// The number of rows.
    pub fn row_count(&self) -> usize {
        self.compressed_records.len()
    }

    /// Translates a set of reordered attributes back into sorted original column indices.
    pub fn to_original(&self, attributes: &FixedBitSet) -> Vec<usize> {
        let mut columns: Vec<usize> = attributes
            .ones()
            .map(|attribute| self.original_index[attribute])
            .collect();
        columns.sort_unstable();
        columns
    }
}

/// Returns the order in which to arrange `plis`: by descending cluster count, with ties kept in
/// their original order.
///
/// ```
/// use agree_lattice::{preprocess, NullPolicy, Pli};
///
/// let plis = vec![
///     Pli::create_for(&[1, 1, 2, 2], NullPolicy::NullEqualsNull),
///     Pli::create_for(&[1, 1, 1, 1], NullPolicy::NullEqualsNull),
///     Pli::create_for(&[1, 2, 3, 4], NullPolicy::NullEqualsNull),
/// ];
/// assert_eq!(preprocess::sort_and_get_mapping(&plis), vec![0, 1, 2]);
/// ```
pub fn sort_and_get_mapping(plis: &[Pli]) -> Vec<usize> {
    let mut mapping: Vec<usize> = (0..plis.len()).collect();
    mapping.sort_by_key(|&i| Reverse(plis[i].cluster_count()));
    mapping
}

/// Column-major cluster ids: `inverted[attribute][row]`.
pub fn build_inverted_index(plis: &[Pli]) -> Vec<Vec<ClusterId>> {
    plis.iter().map(|pli| pli.probing_table().to_vec()).collect()
}

/// Row-major cluster ids: `records[row][attribute]`.
pub fn build_compressed_records(inverted: &[Vec<ClusterId>]) -> Vec<CompressedRecord> {
    let rows = inverted.first().map_or(0, Vec::len);
    debug_assert!(inverted.iter().all(|column| column.len() == rows));
    (0..rows)
        .map(|row| inverted.iter().map(|column| column[row]).collect())
        .collect()
}

/// Runs every preprocessing step over a relation's PLIs, which must be in original column order.
pub fn run(plis: &[Pli]) -> PreprocessedRelation {
    let original_index = sort_and_get_mapping(plis);
    let mut sorted: Vec<Pli> = original_index.iter().map(|&i| plis[i].clone()).collect();

    let compressed_records = build_compressed_records(&build_inverted_index(&sorted));
    if sorted.len() >= 3 {
        sort_clusters_by_neighbours(&mut sorted, &compressed_records);
    }

    PreprocessedRelation {
        plis: sorted,
        compressed_records,
        original_index,
    }
}

/// Orders the rows within each cluster of attribute `i` by their clusters in attributes `i-1`
/// and `i+1` (wrapping around), largest first. After this, rows that are adjacent inside a
/// cluster tend to agree on more attributes, which makes the sampler's first small windows
/// productive.
fn sort_clusters_by_neighbours(plis: &mut [Pli], records: &[CompressedRecord]) {
    let n = plis.len();
    for (attribute, pli) in plis.iter_mut().enumerate() {
        let left = (attribute + n - 1) % n;
        let right = (attribute + 1) % n;
        pli.sort_clusters_by(|&a, &b| {
            let (ra, rb) = (&records[a], &records[b]);
            match rb[left].cmp(&ra[left]) {
                Ordering::Equal => rb[right].cmp(&ra[right]),
                other => other,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pli::SINGLETON_CLUSTER;
    use crate::relation::NullPolicy;

    fn plis(columns: &[&[u32]]) -> Vec<Pli> {
        columns
            .iter()
            .map(|values| Pli::create_for(values, NullPolicy::NullEqualsNull))
            .collect()
    }

    #[test]
    fn sorts_by_descending_cluster_count() {
        let plis = plis(&[&[1, 1, 1, 1], &[1, 1, 2, 2], &[1, 2, 3, 3]]);
        assert_eq!(sort_and_get_mapping(&plis), vec![1, 0, 2]);
    }

    #[test]
    fn compressed_records_match_probing_tables() {
        let plis = plis(&[&[1, 2, 3, 3], &[1, 1, 2, 2], &[5, 5, 5, 5]]);
        let pre = run(&plis);
        assert_eq!(pre.original_index, vec![1, 0, 2]);
        for (attribute, pli) in pre.plis.iter().enumerate() {
            for row in 0..pre.row_count() {
                let record = &pre.compressed_records[row];
                assert_eq!(record[attribute], pli.probing_table()[row]);
            }
        }
        assert_eq!(pre.compressed_records[0], vec![0, SINGLETON_CLUSTER, 0]);
    }

    #[test]
    fn neighbour_sort_keeps_partitions() {
        let plis = plis(&[&[1, 1, 1, 1, 2], &[1, 2, 1, 2, 3], &[1, 1, 2, 2, 2]]);
        let pre = run(&plis);
        for (sorted, &original) in pre.plis.iter().zip(&pre.original_index) {
            let mut a: Vec<Vec<usize>> = sorted
                .clusters()
                .iter()
                .map(|c| {
                    let mut c = c.clone();
                    c.sort_unstable();
                    c
                })
                .collect();
            a.sort();
            let mut b = plis[original].clusters().to_vec();
            b.sort();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn maps_back_to_original_columns() {
        let plis = plis(&[&[1, 2, 3, 3], &[1, 1, 2, 2]]);
        let pre = run(&plis);
        let mut attributes = FixedBitSet::with_capacity(2);
        attributes.insert(0);
        assert_eq!(pre.to_original(&attributes), vec![1]);
    }
}
