//! Traversal chains.
//!
//! Nodes store no parent link, so "up" is only known to whoever walked down.
//! A [`NodeChain`] records that walk: for every level entered, a `None`
//! sentinel followed by the in-level path from the level root to the parent
//! of the current node, plus the node whose `down` link led into each level.
//! With that record the chain can step through every node of the tree in
//! canonical order.
//!
//! Canonical order visits a node, then everything in its `down` level, then
//! its in-level successor. A chain is only valid until the tree is next
//! modified; after that every navigation call reports
//! [`Error::StaleChain`].

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::name::{Label, Name};
use crate::node::NodeId;
use crate::NameTree;

/// Ancestors kept inline before spilling to the heap. Enough to cover the
/// full height of a level of 16 million nodes.
pub const ANCESTOR_INLINE: usize = 24;

/// Levels kept inline before spilling to the heap.
pub const LEVEL_INLINE: usize = 16;

/// Outcome of a successful chain movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainStep {
    /// Moved within the same level; the origin is unchanged.
    Moved,
    /// Entered or left a level, so [`NodeChain::origin`] changed.
    NewOrigin,
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Cursor over a [`NameTree`].
#[derive(Clone, Debug, Default)]
pub struct NodeChain {
    pub(crate) end: Option<NodeId>,
    pub(crate) ancestors: SmallVec<[Option<NodeId>; ANCESTOR_INLINE]>,
    pub(crate) levels: SmallVec<[NodeId; LEVEL_INLINE]>,
    pub(crate) stamp: u64,
}

impl NodeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the current position.
    pub fn reset(&mut self) {
        self.end = None;
        self.ancestors.clear();
        self.levels.clear();
    }

    /// The node the chain points at, if any.
    #[inline]
    pub fn current(&self) -> Option<NodeId> {
        self.end
    }

    /// Nodes whose `down` links lead to the current level, top first.
    #[inline]
    pub fn levels(&self) -> &[NodeId] {
        &self.levels
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// In-level path from the current level root to the parent of the
    /// current node.
    pub(crate) fn level_path(&self) -> impl Iterator<Item = NodeId> + '_ {
        let start = self
            .ancestors
            .iter()
            .rposition(Option::is_none)
            .map_or(0, |i| i + 1);
        self.ancestors[start..].iter().flatten().copied()
    }

    /// Drops the current level and returns the node that owned it. The
    /// chain's in-level path then leads to that node.
    pub(crate) fn pop_level(&mut self) -> Option<NodeId> {
        let owner = self.levels.pop()?;
        let sentinel = self
            .ancestors
            .iter()
            .rposition(Option::is_none)
            .expect("every level starts with a sentinel");
        self.ancestors.truncate(sentinel);
        self.end = Some(owner);
        Some(owner)
    }

    fn check<T, X>(&self, tree: &NameTree<T, X>) -> Result<NodeId> {
        let end = self.end.ok_or(Error::NotFound)?;
        if self.stamp != tree.stamp {
            return Err(Error::StaleChain);
        }
        Ok(end)
    }

    /// Walks from `from` to the edge of its subtree on `side`, recording the
    /// path, and returns the edge node.
    fn descend_edge<T, X>(&mut self, tree: &NameTree<T, X>, from: NodeId, side: Side) -> NodeId {
        let mut node = from;
        loop {
            let next = match side {
                Side::Left => tree.nodes[node].left,
                Side::Right => tree.nodes[node].right,
            };
            match next {
                Some(next) => {
                    self.ancestors.push(Some(node));
                    node = next;
                }
                None => return node,
            }
        }
    }

    /// From `node`, follows `down` links to the canonically last name below it.
    fn descend_last<T, X>(&mut self, tree: &NameTree<T, X>, mut node: NodeId) -> NodeId {
        while let Some(down) = tree.nodes[node].down {
            self.levels.push(node);
            self.ancestors.push(None);
            node = self.descend_edge(tree, down, Side::Right);
        }
        node
    }

    /// Positions the chain at the canonically first node: the leftmost node
    /// of the top level.
    pub fn first<T, X>(&mut self, tree: &NameTree<T, X>) -> Result<ChainStep> {
        self.reset();
        let root = tree.root.ok_or(Error::NotFound)?;
        self.stamp = tree.stamp;
        self.ancestors.push(None);
        self.end = Some(self.descend_edge(tree, root, Side::Left));
        Ok(ChainStep::NewOrigin)
    }

    /// Positions the chain at the canonically last node.
    pub fn last<T, X>(&mut self, tree: &NameTree<T, X>) -> Result<ChainStep> {
        self.reset();
        let root = tree.root.ok_or(Error::NotFound)?;
        self.stamp = tree.stamp;
        self.ancestors.push(None);
        let node = self.descend_edge(tree, root, Side::Right);
        self.end = Some(self.descend_last(tree, node));
        Ok(ChainStep::NewOrigin)
    }

    /// Advances to the next node in canonical order. At the end of the tree
    /// returns [`Error::NoMore`] and leaves the chain where it was.
    pub fn next<T, X>(&mut self, tree: &NameTree<T, X>) -> Result<ChainStep> {
        let current = self.check(tree)?;
        let nodes = &tree.nodes;

        if let Some(down) = nodes[current].down {
            self.levels.push(current);
            self.ancestors.push(None);
            self.end = Some(self.descend_edge(tree, down, Side::Left));
            return Ok(ChainStep::NewOrigin);
        }

        let mut node = current;
        let mut depth = self.ancestors.len();
        let mut level_depth = self.levels.len();
        let mut step = ChainStep::Moved;
        loop {
            if let Some(right) = nodes[node].right {
                self.ancestors.truncate(depth);
                self.levels.truncate(level_depth);
                self.ancestors.push(Some(node));
                self.end = Some(self.descend_edge(tree, right, Side::Left));
                return Ok(step);
            }

            // Climb until arriving from a left child or running out of level.
            loop {
                depth -= 1;
                match self.ancestors[depth] {
                    Some(parent) if nodes[parent].left == Some(node) => {
                        self.ancestors.truncate(depth);
                        self.levels.truncate(level_depth);
                        self.end = Some(parent);
                        return Ok(step);
                    }
                    Some(parent) => node = parent,
                    None => {
                        if level_depth == 0 {
                            return Err(Error::NoMore);
                        }
                        // The owner was visited before its level; resume
                        // with its in-level successor.
                        level_depth -= 1;
                        node = self.levels[level_depth];
                        step = ChainStep::NewOrigin;
                        break;
                    }
                }
            }
        }
    }

    /// Steps back to the previous node in canonical order. At the start of
    /// the tree returns [`Error::NoMore`] and leaves the chain where it was.
    pub fn prev<T, X>(&mut self, tree: &NameTree<T, X>) -> Result<ChainStep> {
        let current = self.check(tree)?;
        let nodes = &tree.nodes;

        let predecessor = if let Some(left) = nodes[current].left {
            self.ancestors.push(Some(current));
            self.descend_edge(tree, left, Side::Right)
        } else {
            let mut node = current;
            let mut depth = self.ancestors.len();
            loop {
                depth -= 1;
                match self.ancestors[depth] {
                    Some(parent) if nodes[parent].right == Some(node) => {
                        self.ancestors.truncate(depth);
                        break parent;
                    }
                    Some(parent) => node = parent,
                    None => {
                        // First node of its level: the owner comes right before.
                        let Some(owner) = self.levels.pop() else {
                            return Err(Error::NoMore);
                        };
                        self.ancestors.truncate(depth);
                        self.end = Some(owner);
                        return Ok(ChainStep::NewOrigin);
                    }
                }
            }
        };

        let levels_before = self.levels.len();
        self.end = Some(self.descend_last(tree, predecessor));
        if self.levels.len() > levels_before {
            Ok(ChainStep::NewOrigin)
        } else {
            Ok(ChainStep::Moved)
        }
    }

    /// The labels stored at the current node, relative to [`origin`](Self::origin).
    pub fn name<'t, T, X>(&self, tree: &'t NameTree<T, X>) -> Result<&'t [Label]> {
        let end = self.check(tree)?;
        Ok(tree.nodes[end].labels())
    }

    /// Absolute name of the current level: the root name at the top level,
    /// otherwise the full name of the node owning the level.
    pub fn origin<T, X>(&self, tree: &NameTree<T, X>) -> Result<Name> {
        self.check(tree)?;
        if self.levels.is_empty() {
            return Ok(Name::root());
        }
        let mut labels = Vec::new();
        for &owner in self.levels.iter().rev() {
            labels.extend_from_slice(tree.nodes[owner].labels());
        }
        Name::from_labels(labels).map_err(|_| Error::NoSpace)
    }

    /// Full absolute name of the current node.
    pub fn full_name<T, X>(&self, tree: &NameTree<T, X>) -> Result<Name> {
        let end = self.check(tree)?;
        tree.accumulated_name(self, end)
    }
}
