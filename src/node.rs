//! Tree nodes and the slot arena that owns them.
//!
//! Nodes never move once allocated: a [`NodeId`] stays valid until the node
//! is removed from the tree. Freed slots are recycled through a free list.

use std::ops::{Index, IndexMut};

use crate::error::{Error, Result};
use crate::name::{Label, Name};

/// Stable handle to a node in a [`NameTree`](crate::NameTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// One vertex of the tree of trees.
///
/// A node stores a run of one or more labels. Its full name is that run
/// followed by the runs of every node whose `down` link leads to its level.
pub struct Node<T, X = ()> {
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    /// Root of the level holding this node's strict sub-names.
    pub(crate) down: Option<NodeId>,
    pub(crate) color: Color,
    pub(crate) find_callback: bool,
    pub(crate) labels: Name,
    pub(crate) data: Option<T>,
    /// Never read or written by the tree after construction.
    pub(crate) ext: X,
}

impl<T, X: Default> Node<T, X> {
    pub(crate) fn new(labels: Name) -> Self {
        Self {
            left: None,
            right: None,
            down: None,
            color: Color::Red,
            find_callback: false,
            labels,
            data: None,
            ext: X::default(),
        }
    }
}

impl<T, X> Node<T, X> {
    /// The labels stored at this node, borrowed from node storage.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        self.labels.labels()
    }

    #[inline]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    #[inline]
    pub fn data_mut(&mut self) -> Option<&mut T> {
        self.data.as_mut()
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    #[inline]
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    #[inline]
    pub fn down(&self) -> Option<NodeId> {
        self.down
    }

    /// Whether lookups passing through this node invoke the find callback.
    #[inline]
    pub fn find_callback(&self) -> bool {
        self.find_callback
    }

    pub fn set_find_callback(&mut self, enabled: bool) {
        self.find_callback = enabled;
    }

    /// Caller-owned extension slot (locks, reference counts, ...).
    #[inline]
    pub fn ext(&self) -> &X {
        &self.ext
    }

    #[inline]
    pub fn ext_mut(&mut self) -> &mut X {
        &mut self.ext
    }
}

// =============================================================================
// Arena
// =============================================================================

pub(crate) struct NodeArena<T, X> {
    slots: Vec<Option<Node<T, X>>>,
    free: Vec<u32>,
    live: usize,
    max_nodes: Option<usize>,
}

impl<T, X> NodeArena<T, X> {
    pub(crate) fn new(max_nodes: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            max_nodes,
        }
    }

    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Guarantees that the next `n` calls to [`alloc`](Self::alloc) succeed.
    pub(crate) fn reserve(&mut self, n: usize) -> Result<()> {
        if self.max_nodes.is_some_and(|max| self.live + n > max) {
            return Err(Error::NoMemory);
        }
        let fresh = n.saturating_sub(self.free.len());
        if self.slots.len() + fresh > u32::MAX as usize {
            return Err(Error::NoMemory);
        }
        self.slots.try_reserve(fresh).map_err(|_| Error::NoMemory)?;
        self.free.try_reserve(fresh).map_err(|_| Error::NoMemory)
    }

    pub(crate) fn alloc(&mut self, node: Node<T, X>) -> NodeId {
        self.live += 1;
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(node);
            return NodeId(idx);
        }
        let idx = self.slots.len() as u32;
        self.slots.push(Some(node));
        NodeId(idx)
    }

    pub(crate) fn free(&mut self, id: NodeId) -> Node<T, X> {
        let node = self.slots[id.index()]
            .take()
            .expect("freeing a node that is not live");
        self.free.push(id.0);
        self.live -= 1;
        node
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> Option<&Node<T, X>> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<T, X>> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn memory_usage(&self) -> usize {
        let labels: usize = self
            .slots
            .iter()
            .flatten()
            .map(|n| n.labels().iter().map(|l| l.len()).sum::<usize>())
            .sum();
        self.slots.capacity() * std::mem::size_of::<Option<Node<T, X>>>()
            + self.free.capacity() * 4
            + labels
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let len = self.slots.len() as u32;
        self.free.retain(|&idx| idx < len);
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
    }
}

impl<T, X> Index<NodeId> for NodeArena<T, X> {
    type Output = Node<T, X>;

    #[inline]
    fn index(&self, id: NodeId) -> &Self::Output {
        self.get(id).expect("dangling node id")
    }
}

impl<T, X> IndexMut<NodeId> for NodeArena<T, X> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        self.get_mut(id).expect("dangling node id")
    }
}
