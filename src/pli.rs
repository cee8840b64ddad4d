//! Position List Indexes.

use crate::relation::{NullPolicy, NULL_VALUE_ID};
use std::collections::HashMap;

/// Identifies a cluster within one PLI. Cluster ids are dense, starting at zero, in cluster
/// order.
pub type ClusterId = u32;

/// The probing-table entry for a row whose value occurs nowhere else in its column.
pub const SINGLETON_CLUSTER: ClusterId = ClusterId::MAX;

/// Returns `true` if `id` is the [`SINGLETON_CLUSTER`] marker.
pub fn is_singleton(id: ClusterId) -> bool {
    id == SINGLETON_CLUSTER
}

/// A group of rows which share a value. Always holds at least two rows.
pub type Cluster = Vec<usize>;

/// A Position List Index: the partition of a relation's rows into clusters of equal values.
///
/// Rows with unique values are left out of the cluster list; the probing table records them as
/// [`SINGLETON_CLUSTER`] instead. A PLI never changes after construction (apart from the row
/// order inside clusters, which preprocessing may rearrange), so it can be shared freely between
/// worker threads.
///
/// ```
/// use agree_lattice::{NullPolicy, Pli, SINGLETON_CLUSTER};
///
/// let pli = Pli::create_for(&[1, 2, 1, 3, 2], NullPolicy::NullEqualsNull);
/// assert_eq!(pli.clusters(), &[vec![0, 2], vec![1, 4]]);
/// assert_eq!(pli.probing_table(), &[0, 1, 0, SINGLETON_CLUSTER, 1]);
/// assert!(!pli.all_values_are_unique());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pli {
    clusters: Vec<Cluster>,
    probing_table: Vec<ClusterId>,
}

impl Pli {
    /// Builds the PLI for one column given the value id of every row.
    ///
    /// Rows holding [`NULL_VALUE_ID`] share a cluster only under
    /// [`NullPolicy::NullEqualsNull`]; otherwise each of them is on its own.
    pub fn create_for(value_ids: &[u32], null_policy: NullPolicy) -> Self {
        let mut index: HashMap<u32, Vec<usize>> = HashMap::new();
        for (row, &value_id) in value_ids.iter().enumerate() {
            if value_id == NULL_VALUE_ID && null_policy == NullPolicy::NullNotEqualsNull {
                continue;
            }
            index.entry(value_id).or_insert_with(Vec::new).push(row);
        }

        let clusters = index
            .into_iter()
            .map(|(_, rows)| rows)
            .filter(|rows| rows.len() > 1)
            .collect();
        Self::from_clusters(clusters, value_ids.len())
    }

    /// Sorts clusters by their first row so that equal partitions get equal representations, and
    /// builds the probing table.
    fn from_clusters(mut clusters: Vec<Cluster>, relation_size: usize) -> Self {
        clusters.sort_unstable_by_key(|cluster| cluster[0]);

        let mut probing_table = vec![SINGLETON_CLUSTER; relation_size];
        for (id, cluster) in clusters.iter().enumerate() {
            for &row in cluster {
                probing_table[row] = id as ClusterId;
            }
        }

        Pli {
            clusters,
            probing_table,
        }
    }

    /// Refines this partition by another one, producing their product: two rows share a cluster
    /// in the result iff they share one in both inputs.
    ///
    /// The smaller PLI is probed against the larger one's probing table.
    pub fn intersect(&self, other: &Pli) -> Pli {
        assert_eq!(self.relation_size(), other.relation_size());
        if self.non_singleton_rows() > other.non_singleton_rows() {
            other.probe(&self.probing_table)
        } else {
            self.probe(&other.probing_table)
        }
    }

    /// Refines this partition by raw probing data: any row → cluster-id mapping where
    /// [`SINGLETON_CLUSTER`] marks rows that are unique.
    pub fn probe(&self, probing_table: &[ClusterId]) -> Pli {
        assert_eq!(self.relation_size(), probing_table.len());

        let mut clusters = Vec::new();
        // Reuse one map for every cluster instead of allocating a fresh one each time.
        let mut partial: HashMap<ClusterId, Vec<usize>> = HashMap::new();
        for cluster in &self.clusters {
            for &row in cluster {
                let id = probing_table[row];
                if !is_singleton(id) {
                    partial.entry(id).or_insert_with(Vec::new).push(row);
                }
            }
            for (_, mut rows) in partial.drain() {
                if rows.len() > 1 {
                    rows.sort_unstable();
                    clusters.push(rows);
                }
            }
        }
        Self::from_clusters(clusters, probing_table.len())
    }

    /// The number of non-singleton clusters.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// The non-singleton clusters, ordered by the smallest row each contained when the PLI was
    /// built.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Rearranges rows inside the clusters. The partition itself stays the same.
    pub(crate) fn sort_clusters_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&usize, &usize) -> std::cmp::Ordering,
    {
        for cluster in &mut self.clusters {
            cluster.sort_by(&mut compare);
        }
    }

    /// Maps every row to its cluster id, or [`SINGLETON_CLUSTER`].
    pub fn probing_table(&self) -> &[ClusterId] {
        &self.probing_table
    }

    /// The number of rows of the relation this PLI was built from, including singletons.
    pub fn relation_size(&self) -> usize {
        self.probing_table.len()
    }

    /// Returns `true` if no two rows share a value, meaning the column is a key.
    pub fn all_values_are_unique(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Returns `true` if every row is in the same single cluster.
    pub fn is_constant(&self) -> bool {
        self.clusters.len() == 1 && self.clusters[0].len() == self.relation_size()
    }

    /// The number of rows that appear in some cluster.
    pub fn non_singleton_rows(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }

    /// The number of rows that would have to be removed for this column to become a key.
    pub fn key_error(&self) -> usize {
        self.non_singleton_rows() - self.cluster_count()
    }

    /// The number of unordered pairs of rows which agree on this column.
    pub fn nep(&self) -> u64 {
        self.clusters
            .iter()
            .map(|c| {
                let len = c.len() as u64;
                len * (len - 1) / 2
            })
            .sum()
    }

    /// The Shannon entropy of the partition, measured in nats. Singleton rows contribute as
    /// clusters of one.
    pub fn entropy(&self) -> f64 {
        let n = self.relation_size() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let key_gap: f64 = self
            .clusters
            .iter()
            .map(|c| {
                let len = c.len() as f64;
                len * len.ln()
            })
            .sum();
        n.ln() - key_gap / n
    }
}
