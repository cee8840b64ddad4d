//! The FD-tree: a prefix tree over left-hand-side attribute sets.
//!
//! Every node corresponds to one lhs, spelled by the attributes on the path from the root, in
//! ascending order. A node records which rhs attributes are currently candidate FDs for exactly
//! that lhs. Nodes live in an arena and refer to each other by [`NodeId`], with a parent link so
//! that any node's lhs can be rebuilt without storing it.
//!
//! The tree maintains minimality: a candidate `lhs -> rhs` is only ever inserted through
//! [`FdTree::add_fd`] when no subset of `lhs` already determines `rhs`.

use fixedbitset::FixedBitSet;
use smallvec::SmallVec;
use sorted_iter::assume::{AssumeSortedByItemExt, AssumeSortedByKeyExt};
use sorted_iter::{SortedIterator, SortedPairIterator};

/// Index of a node in an [`FdTree`].
pub type NodeId = usize;

/// The node for the empty lhs.
pub const ROOT: NodeId = 0;

#[derive(Clone, Debug)]
struct Node {
    parent: Option<NodeId>,
    /// The attribute on the edge from the parent. Meaningless for the root.
    attribute: usize,
    depth: usize,
    fds: FixedBitSet,
    /// Every rhs that is, or once was, a candidate somewhere in this subtree. Searches for a
    /// given rhs skip subtrees that lack it.
    rhs_attributes: FixedBitSet,
    /// Sorted by attribute.
    children: SmallVec<[(usize, NodeId); 4]>,
}

impl Node {
    fn new(parent: Option<NodeId>, attribute: usize, depth: usize, attributes: usize) -> Self {
        Node {
            parent,
            attribute,
            depth,
            fds: FixedBitSet::with_capacity(attributes),
            rhs_attributes: FixedBitSet::with_capacity(attributes),
            children: SmallVec::new(),
        }
    }
}

/// A lattice of candidate minimal functional dependencies.
///
/// ```
/// use agree_lattice::FdTree;
/// use agree_lattice::fixedbitset::FixedBitSet;
///
/// let mut tree = FdTree::new(3);
/// let mut a = FixedBitSet::with_capacity(3);
/// a.insert(0);
/// assert!(tree.add_fd(&a, 2).is_some());
///
/// let mut ab = a.clone();
/// ab.insert(1);
/// // {A} -> C already covers {A, B} -> C.
/// assert!(tree.find_fd_or_general(&ab, 2));
/// assert!(tree.add_fd(&ab, 2).is_none());
/// ```
#[derive(Clone, Debug)]
pub struct FdTree {
    attributes: usize,
    nodes: Vec<Node>,
}

impl FdTree {
    /// Creates a tree with no candidates over `attributes` attributes.
    pub fn new(attributes: usize) -> Self {
        FdTree {
            attributes,
            nodes: vec![Node::new(None, 0, 0, attributes)],
        }
    }

    /// Marks `{} -> a` as a candidate for every attribute `a`: before looking at any data, every
    /// column might be constant.
    pub fn add_most_general_dependencies(&mut self) {
        let root = &mut self.nodes[ROOT];
        root.fds.insert_range(..);
        root.rhs_attributes.insert_range(..);
    }

    /// The number of attributes lhs and rhs indices range over.
    pub fn attribute_count(&self) -> usize {
        self.attributes
    }

    /// The number of nodes ever created, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The largest lhs size of any node.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
    }

    /// The child of `node` along `attribute`, if there is one.
    pub fn child(&self, node: NodeId, attribute: usize) -> Option<NodeId> {
        let children = &self.nodes[node].children;
        children
            .binary_search_by_key(&attribute, |&(a, _)| a)
            .ok()
            .map(|i| children[i].1)
    }

    /// Returns `true` if `node` has a child along `attribute`.
    pub fn contains_child(&self, node: NodeId, attribute: usize) -> bool {
        self.child(node, attribute).is_some()
    }

    /// Returns `true` if `node` has any children.
    pub fn has_children(&self, node: NodeId) -> bool {
        !self.nodes[node].children.is_empty()
    }

    /// The rhs candidates recorded at `node`.
    pub fn node_fds(&self, node: NodeId) -> &FixedBitSet {
        &self.nodes[node].fds
    }

    /// Returns `true` if `rhs` is a candidate at `node`.
    pub fn is_fd(&self, node: NodeId, rhs: usize) -> bool {
        self.nodes[node].fds.contains(rhs)
    }

    /// Replaces the rhs candidates at `node`. Used after validation to keep only the survivors.
    pub fn set_fds(&mut self, node: NodeId, fds: FixedBitSet) {
        assert_eq!(fds.len(), self.attributes);
        self.nodes[node].fds = fds;
    }

    /// Clears `rhs` at `node`.
    pub fn remove_fd(&mut self, node: NodeId, rhs: usize) {
        self.nodes[node].fds.set(rhs, false);
    }

    /// The size of `node`'s lhs.
    pub fn node_depth(&self, node: NodeId) -> usize {
        self.nodes[node].depth
    }

    /// Rebuilds the lhs that `node` stands for.
    pub fn lhs_of(&self, node: NodeId) -> FixedBitSet {
        let mut lhs = FixedBitSet::with_capacity(self.attributes);
        let mut current = node;
        while let Some(parent) = self.nodes[current].parent {
            lhs.insert(self.nodes[current].attribute);
            current = parent;
        }
        lhs
    }

    /// Finds the node for exactly `lhs`, if it exists.
    pub fn find_node(&self, lhs: &FixedBitSet) -> Option<NodeId> {
        assert_eq!(lhs.len(), self.attributes);
        lhs.ones()
            .try_fold(ROOT, |node, attribute| self.child(node, attribute))
    }

    /// Inserts `lhs -> rhs` without checking for generalizations, creating nodes along the path
    /// as needed. Returns the node for `lhs`.
    pub fn add_fd_unchecked(&mut self, lhs: &FixedBitSet, rhs: usize) -> NodeId {
        assert_eq!(lhs.len(), self.attributes);
        assert!(rhs < self.attributes);

        let mut node = ROOT;
        self.nodes[node].rhs_attributes.insert(rhs);
        for attribute in lhs.ones() {
            node = match self.child(node, attribute) {
                Some(child) => child,
                None => self.create_child(node, attribute),
            };
            self.nodes[node].rhs_attributes.insert(rhs);
        }
        self.nodes[node].fds.insert(rhs);
        node
    }

    fn create_child(&mut self, parent: NodeId, attribute: usize) -> NodeId {
        let id = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes
            .push(Node::new(Some(parent), attribute, depth, self.attributes));
        let children = &mut self.nodes[parent].children;
        let position = children
            .binary_search_by_key(&attribute, |&(a, _)| a)
            .unwrap_or_else(|i| i);
        children.insert(position, (attribute, id));
        id
    }

    /// Inserts `lhs -> rhs` unless it, or a generalization of it, is already a candidate.
    /// Returns the node for `lhs`, or `None` if nothing was inserted.
    pub fn add_fd(&mut self, lhs: &FixedBitSet, rhs: usize) -> Option<NodeId> {
        if self.find_fd_or_general(lhs, rhs) {
            None
        } else {
            Some(self.add_fd_unchecked(lhs, rhs))
        }
    }

    /// Clears `lhs -> rhs` if the node for `lhs` exists.
    pub fn remove(&mut self, lhs: &FixedBitSet, rhs: usize) {
        if let Some(node) = self.find_node(lhs) {
            self.remove_fd(node, rhs);
        }
    }

    /// Visits, depth first, every node whose lhs is a subset of `lhs` and whose subtree might
    /// hold `rhs`. Stops early if `visit` returns `true`, and reports whether it did.
    fn walk_generalizations<F>(&self, lhs: &FixedBitSet, rhs: usize, mut visit: F) -> bool
    where
        F: FnMut(NodeId) -> bool,
    {
        assert_eq!(lhs.len(), self.attributes);
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            if visit(node) {
                return true;
            }
            // Children are labelled with attributes greater than their parent's, so joining the
            // sorted children with the sorted lhs yields exactly the subsets' next steps.
            let children = self.nodes[node]
                .children
                .iter()
                .copied()
                .assume_sorted_by_key();
            for (_, (child, ())) in children.join(lhs.ones().assume_sorted_by_item().pairs()) {
                if self.nodes[child].rhs_attributes.contains(rhs) {
                    stack.push(child);
                }
            }
        }
        false
    }

    /// Returns `true` if `lhs -> rhs`, or `lhs' -> rhs` for some `lhs' ⊆ lhs`, is a candidate.
    pub fn find_fd_or_general(&self, lhs: &FixedBitSet, rhs: usize) -> bool {
        self.walk_generalizations(lhs, rhs, |node| self.nodes[node].fds.contains(rhs))
    }

    /// Returns every `lhs' ⊆ lhs` for which `lhs' -> rhs` is a candidate.
    pub fn fd_and_generalizations(&self, lhs: &FixedBitSet, rhs: usize) -> Vec<FixedBitSet> {
        let mut found = Vec::new();
        self.walk_generalizations(lhs, rhs, |node| {
            if self.nodes[node].fds.contains(rhs) {
                found.push(self.lhs_of(node));
            }
            false
        });
        found
    }

    /// Every node at depth `level`, together with its lhs, in creation order.
    pub fn level(&self, level: usize) -> Vec<(NodeId, FixedBitSet)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.depth == level)
            .map(|(id, _)| (id, self.lhs_of(id)))
            .collect()
    }

    /// The children of every node in `level`, one level deeper.
    pub fn children_level(&self, level: &[(NodeId, FixedBitSet)]) -> Vec<(NodeId, FixedBitSet)> {
        let mut next = Vec::new();
        for (node, lhs) in level {
            for &(attribute, child) in &self.nodes[*node].children {
                let mut child_lhs = lhs.clone();
                child_lhs.insert(attribute);
                next.push((child, child_lhs));
            }
        }
        next
    }

    /// Every remaining candidate as `(lhs, rhs)`.
    pub fn fds(&self) -> Vec<(FixedBitSet, usize)> {
        let mut fds = Vec::new();
        for (id, node) in self.nodes.iter().enumerate() {
            if node.fds.count_ones(..) == 0 {
                continue;
            }
            let lhs = self.lhs_of(id);
            for rhs in node.fds.ones() {
                fds.push((lhs.clone(), rhs));
            }
        }
        fds
    }
}
