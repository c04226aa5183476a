//! Red-black balancing within one level of the tree of trees.
//!
//! Nodes keep no parent link, so every operation here takes the in-level
//! path from the level root down to the parent of the node it works on.
//! The path is what a descent records on its way down.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::node::{Color, NodeId};
use crate::NameTree;

/// Inline capacity for in-level paths. A red-black level of 2^24 nodes is
/// at most 48 deep, but real levels rarely exceed a dozen.
pub(crate) const PATH_INLINE: usize = 24;

pub(crate) type Path = SmallVec<[NodeId; PATH_INLINE]>;

/// Identifies a level by where its root link lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Level {
    Top,
    /// The level hanging off this node's `down` link.
    Below(NodeId),
}

impl<T, X> NameTree<T, X> {
    #[inline]
    pub(crate) fn level_root(&self, level: Level) -> Option<NodeId> {
        match level {
            Level::Top => self.root,
            Level::Below(owner) => self.nodes[owner].down,
        }
    }

    #[inline]
    fn set_level_root(&mut self, level: Level, root: Option<NodeId>) {
        match level {
            Level::Top => self.root = root,
            Level::Below(owner) => self.nodes[owner].down = root,
        }
    }

    #[inline]
    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.is_some_and(|id| self.nodes[id].color == Color::Red)
    }

    /// Points whichever link referenced `old` (a child link of `parent`, or
    /// the level root link) at `new`.
    pub(crate) fn replace_child(
        &mut self,
        level: Level,
        parent: Option<NodeId>,
        old: NodeId,
        new: Option<NodeId>,
    ) {
        match parent {
            None => self.set_level_root(level, new),
            Some(p) => {
                let p = &mut self.nodes[p];
                if p.left == Some(old) {
                    p.left = new;
                } else {
                    debug_assert_eq!(p.right, Some(old));
                    p.right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, level: Level, node: NodeId, parent: Option<NodeId>) {
        let pivot = self.nodes[node]
            .right
            .expect("left rotation needs a right child");
        self.nodes[node].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(node);
        self.replace_child(level, parent, node, Some(pivot));
    }

    fn rotate_right(&mut self, level: Level, node: NodeId, parent: Option<NodeId>) {
        let pivot = self.nodes[node]
            .left
            .expect("right rotation needs a left child");
        self.nodes[node].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(node);
        self.replace_child(level, parent, node, Some(pivot));
    }

    /// Links the detached node `node` under the last node of `path` (on the
    /// side given by `order`) and restores the red-black rules. An empty
    /// path makes `node` the level root.
    pub(crate) fn insert_on_level(
        &mut self,
        level: Level,
        path: &[NodeId],
        node: NodeId,
        order: Ordering,
    ) {
        let Some(&parent) = path.last() else {
            self.nodes[node].color = Color::Black;
            self.set_level_root(level, Some(node));
            return;
        };

        self.nodes[node].color = Color::Red;
        if order == Ordering::Less {
            self.nodes[parent].left = Some(node);
        } else {
            self.nodes[parent].right = Some(node);
        }

        let mut path: Path = SmallVec::from_slice(path);
        let mut child = node;
        while let Some(parent) = path.pop() {
            if self.nodes[parent].color == Color::Black {
                break;
            }
            // A red parent is never the level root.
            let grand = path.pop().expect("red node without a parent");
            let great = path.last().copied();

            if self.nodes[grand].left == Some(parent) {
                let uncle = self.nodes[grand].right;
                if let Some(uncle) = uncle.filter(|&u| self.nodes[u].color == Color::Red) {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    child = grand;
                    continue;
                }
                let mut parent = parent;
                if self.nodes[parent].right == Some(child) {
                    self.rotate_left(level, parent, Some(grand));
                    parent = child;
                }
                self.nodes[parent].color = Color::Black;
                self.nodes[grand].color = Color::Red;
                self.rotate_right(level, grand, great);
            } else {
                let uncle = self.nodes[grand].left;
                if let Some(uncle) = uncle.filter(|&u| self.nodes[u].color == Color::Red) {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    child = grand;
                    continue;
                }
                let mut parent = parent;
                if self.nodes[parent].left == Some(child) {
                    self.rotate_right(level, parent, Some(grand));
                    parent = child;
                }
                self.nodes[parent].color = Color::Black;
                self.nodes[grand].color = Color::Red;
                self.rotate_left(level, grand, great);
            }
            break;
        }

        let root = self.level_root(level).expect("level root after insert");
        self.nodes[root].color = Color::Black;
    }

    /// Unlinks `node` from its level and rebalances. `path` runs from the
    /// level root to the parent of `node`. The node itself stays allocated
    /// with cleared in-level links.
    pub(crate) fn remove_from_level(&mut self, level: Level, path: &[NodeId], node: NodeId) {
        let mut path: Path = SmallVec::from_slice(path);

        if let (Some(_), Some(right)) = (self.nodes[node].left, self.nodes[node].right) {
            // Trade places with the in-order successor so that `node` has at
            // most one child. Positions move, ids do not.
            let parent = path.last().copied();
            let slot = path.len();
            path.push(node);
            let mut succ = right;
            while let Some(left) = self.nodes[succ].left {
                path.push(succ);
                succ = left;
            }
            let succ_parent = *path.last().expect("successor path");
            self.swap_positions(level, parent, node, succ, succ_parent);
            // When `succ` was the right child, this slot is also the last
            // path entry: `node` now hangs directly off `succ`.
            path[slot] = succ;
        }

        let child = self.nodes[node].left.or(self.nodes[node].right);
        let parent = path.last().copied();
        let was_left = parent.is_some_and(|p| self.nodes[p].left == Some(node));
        self.replace_child(level, parent, node, child);
        let removed_color = self.nodes[node].color;
        {
            let n = &mut self.nodes[node];
            n.left = None;
            n.right = None;
            n.color = Color::Black;
        }

        if removed_color == Color::Black {
            if let Some(child) = child.filter(|&c| self.nodes[c].color == Color::Red) {
                self.nodes[child].color = Color::Black;
            } else {
                self.remove_fixup(level, path, child, was_left);
            }
        }

        if let Some(root) = self.level_root(level) {
            self.nodes[root].color = Color::Black;
        }
    }

    /// Exchanges the tree positions (links and colors) of `node` and its
    /// in-order successor `succ`, which has no left child.
    fn swap_positions(
        &mut self,
        level: Level,
        parent: Option<NodeId>,
        node: NodeId,
        succ: NodeId,
        succ_parent: NodeId,
    ) {
        let (node_left, node_right, node_color) = {
            let n = &self.nodes[node];
            (n.left, n.right, n.color)
        };
        let (succ_right, succ_color) = {
            let s = &self.nodes[succ];
            (s.right, s.color)
        };

        {
            let s = &mut self.nodes[succ];
            s.left = node_left;
            s.color = node_color;
            s.right = if succ_parent == node {
                Some(node)
            } else {
                node_right
            };
        }
        {
            let n = &mut self.nodes[node];
            n.left = None;
            n.right = succ_right;
            n.color = succ_color;
        }
        if succ_parent != node {
            self.nodes[succ_parent].left = Some(node);
        }
        self.replace_child(level, parent, node, Some(succ));
    }

    /// Resolves a missing black on the `x_is_left` side of `path.last()`,
    /// where `x` (possibly empty) now sits.
    fn remove_fixup(
        &mut self,
        level: Level,
        mut path: Path,
        mut x: Option<NodeId>,
        mut x_is_left: bool,
    ) {
        while let Some(&parent) = path.last() {
            if self.is_red(x) {
                break;
            }
            let grand = path.len().checked_sub(2).map(|i| path[i]);

            if x_is_left {
                let mut sib = self.nodes[parent].right.expect("short side has a sibling");
                if self.nodes[sib].color == Color::Red {
                    self.nodes[sib].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.rotate_left(level, parent, grand);
                    let top = path.len() - 1;
                    path.insert(top, sib);
                    sib = self.nodes[parent].right.expect("short side has a sibling");
                }
                let (near, far) = (self.nodes[sib].left, self.nodes[sib].right);
                if !self.is_red(near) && !self.is_red(far) {
                    self.nodes[sib].color = Color::Red;
                    x = Some(parent);
                    path.pop();
                    x_is_left = path
                        .last()
                        .is_some_and(|&p| self.nodes[p].left == Some(parent));
                    continue;
                }
                if !self.is_red(far) {
                    let near = near.expect("red near nephew");
                    self.nodes[near].color = Color::Black;
                    self.nodes[sib].color = Color::Red;
                    self.rotate_right(level, sib, Some(parent));
                    sib = self.nodes[parent].right.expect("short side has a sibling");
                }
                let grand = path.len().checked_sub(2).map(|i| path[i]);
                self.nodes[sib].color = self.nodes[parent].color;
                self.nodes[parent].color = Color::Black;
                if let Some(far) = self.nodes[sib].right {
                    self.nodes[far].color = Color::Black;
                }
                self.rotate_left(level, parent, grand);
            } else {
                let mut sib = self.nodes[parent].left.expect("short side has a sibling");
                if self.nodes[sib].color == Color::Red {
                    self.nodes[sib].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.rotate_right(level, parent, grand);
                    let top = path.len() - 1;
                    path.insert(top, sib);
                    sib = self.nodes[parent].left.expect("short side has a sibling");
                }
                let (near, far) = (self.nodes[sib].right, self.nodes[sib].left);
                if !self.is_red(near) && !self.is_red(far) {
                    self.nodes[sib].color = Color::Red;
                    x = Some(parent);
                    path.pop();
                    x_is_left = path
                        .last()
                        .is_some_and(|&p| self.nodes[p].left == Some(parent));
                    continue;
                }
                if !self.is_red(far) {
                    let near = near.expect("red near nephew");
                    self.nodes[near].color = Color::Black;
                    self.nodes[sib].color = Color::Red;
                    self.rotate_left(level, sib, Some(parent));
                    sib = self.nodes[parent].left.expect("short side has a sibling");
                }
                let grand = path.len().checked_sub(2).map(|i| path[i]);
                self.nodes[sib].color = self.nodes[parent].color;
                self.nodes[parent].color = Color::Black;
                if let Some(far) = self.nodes[sib].left {
                    self.nodes[far].color = Color::Black;
                }
                self.rotate_right(level, parent, grand);
            }
            return;
        }

        if let Some(x) = x {
            self.nodes[x].color = Color::Black;
        }
    }
}
