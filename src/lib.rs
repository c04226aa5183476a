//! # nametree
//!
//! A red-black tree of trees indexing hierarchical, DNS-style names.
//!
//! Every level of the hierarchy is its own red-black tree. A node holds a
//! run of one or more labels and may point `down` to the level holding its
//! sub-names, so a name is found by walking from the top level down,
//! consuming labels from the right. Runs shared by several names are split
//! into their own node on insertion and joined back on deletion.
//!
//! Lookups answer exact matches and longest-matching-ancestor ("partial")
//! matches in logarithmic time. [`NodeChain`] walks every node in canonical
//! order without the nodes storing parent links.
//!
//! ## Example
//!
//! ```rust
//! use nametree::{MatchKind, Name, NameTree};
//!
//! let mut tree: NameTree<&str> = NameTree::new();
//! tree.add_name(&"example.com.".parse().unwrap(), "zone").unwrap();
//! tree.add_name(&"www.example.com.".parse().unwrap(), "host").unwrap();
//!
//! let hit = tree.find_name(&"mail.example.com.".parse().unwrap()).unwrap();
//! assert_eq!(hit.kind, MatchKind::Partial);
//! assert_eq!(*hit.data, "zone");
//! assert_eq!(hit.name.to_string(), "example.com.");
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

pub mod chain;
pub mod config;
mod debug;
pub mod error;
mod level;
pub mod name;
pub mod node;
pub mod shared;

pub use chain::{ChainStep, NodeChain};
pub use config::Config;
pub use error::{Error, Result};
pub use name::{Label, Name, NameError};
pub use node::{Color, Node, NodeId};
pub use shared::SharedNameTree;

use std::cmp::Ordering;

use smallvec::SmallVec;
use tracing::{debug, trace};

use level::{Level, Path};
use name::{full_compare, Relation};
use node::NodeArena;

/// Called with each payload the tree discards.
pub type Deleter<T> = Box<dyn FnMut(T) + Send + Sync>;

/// Find callbacks receive the node, its id and its full name.
pub type FindCallback<'a, T, X> = dyn FnMut(NodeId, &Node<T, X>, &Name) -> CallbackAction + 'a;

/// What a find callback wants the search to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    /// End the search at this node, as if it had no `down` level.
    Stop,
}

/// Successful outcome of [`NameTree::find_node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Found {
    /// The node for exactly the searched name.
    Exact(NodeId),
    /// The deepest superdomain of the searched name that qualified.
    Partial(NodeId),
    /// A find callback stopped the search at this node.
    Stopped(NodeId),
}

impl Found {
    pub fn node(self) -> NodeId {
        match self {
            Found::Exact(id) | Found::Partial(id) | Found::Stopped(id) => id,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, Found::Exact(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Partial,
}

/// Result of [`NameTree::find_name`].
#[derive(Debug)]
pub struct NameMatch<'a, T> {
    pub kind: MatchKind,
    pub data: &'a T,
    /// Full name of the node that matched.
    pub name: Name,
}

/// Optional knobs for [`NameTree::find_node`].
pub struct FindOptions<'a, T, X = ()> {
    empty_data_ok: bool,
    chain: Option<&'a mut NodeChain>,
    callback: Option<&'a mut FindCallback<'a, T, X>>,
}

impl<T, X> Default for FindOptions<'_, T, X> {
    fn default() -> Self {
        Self {
            empty_data_ok: false,
            chain: None,
            callback: None,
        }
    }
}

impl<'a, T, X> FindOptions<'a, T, X> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let data-less nodes count as exact and partial matches.
    pub fn empty_data_ok(mut self, ok: bool) -> Self {
        self.empty_data_ok = ok;
        self
    }

    /// Record the search path in `chain`, whatever the outcome.
    pub fn chain(mut self, chain: &'a mut NodeChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Invoke `callback` at nodes flagged with
    /// [`Node::set_find_callback`] that the search passes through.
    pub fn callback(mut self, callback: &'a mut FindCallback<'a, T, X>) -> Self {
        self.callback = Some(callback);
        self
    }
}

// =============================================================================
// NameTree
// =============================================================================

/// A red-black tree of trees mapping absolute names to payloads.
///
/// `X` is a per-node extension slot the tree never interprets; a higher
/// layer can keep its own locks or reference counts there.
pub struct NameTree<T, X = ()> {
    pub(crate) nodes: NodeArena<T, X>,
    pub(crate) root: Option<NodeId>,
    /// Nodes carrying data.
    count: usize,
    /// Bumped by every structural change; chains compare against it.
    pub(crate) stamp: u64,
    config: Config,
    deleter: Option<Deleter<T>>,
}

impl<T, X> NameTree<T, X> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            nodes: NodeArena::new(config.max_nodes),
            root: None,
            count: 0,
            stamp: 0,
            config,
            deleter: None,
        }
    }

    pub fn with_deleter(deleter: impl FnMut(T) + Send + Sync + 'static) -> Self {
        Self::new().deleter(deleter)
    }

    /// Installs a deleter that receives every payload the tree discards:
    /// on deletion, replacement, [`clear`](Self::clear) and drop.
    pub fn deleter(mut self, deleter: impl FnMut(T) + Send + Sync + 'static) -> Self {
        self.deleter = Some(Box::new(deleter));
        self
    }

    /// Number of names carrying data.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of live nodes, split points included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.live()
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node<T, X>> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's payload, flag and extension slot. The
    /// structure itself is not reachable through it.
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<T, X>> {
        self.nodes.get_mut(id)
    }

    /// Hands a payload the tree no longer keeps to the deleter.
    fn release(&mut self, data: T) {
        match self.deleter.as_mut() {
            Some(deleter) => deleter(data),
            None => drop(data),
        }
    }

    fn discard(&mut self, data: T) {
        self.count -= 1;
        self.release(data);
    }

    /// Attaches `data` to `id`, handing any previous payload to the deleter.
    pub fn set_data(&mut self, id: NodeId, data: T) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or(Error::NotFound)?;
        let old = node.data.replace(data);
        self.count += 1;
        if let Some(old) = old {
            self.discard(old);
        }
        Ok(())
    }

    /// Full name of `id`, which must be the chain's current node or one of
    /// the chain's level owners.
    pub(crate) fn accumulated_name(&self, chain: &NodeChain, id: NodeId) -> Result<Name> {
        let above = match chain.levels.iter().position(|&owner| owner == id) {
            Some(i) => &chain.levels[..i],
            None => {
                debug_assert_eq!(chain.end, Some(id));
                &chain.levels[..]
            }
        };
        let mut labels = self.nodes[id].labels().to_vec();
        for &owner in above.iter().rev() {
            labels.extend_from_slice(self.nodes[owner].labels());
        }
        Name::from_labels(labels).map_err(|_| Error::NoSpace)
    }

    /// Iterates `(full name, data)` over every name carrying data, in
    /// canonical order.
    pub fn iter(&self) -> Iter<'_, T, X> {
        Iter {
            tree: self,
            chain: NodeChain::new(),
            started: false,
        }
    }
}

fn check_absolute(name: &Name) -> Result<()> {
    if name.is_absolute() {
        Ok(())
    } else {
        Err(Error::NotAbsolute)
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl<T, X> NameTree<T, X> {
    /// Finds the node for `name`, or its deepest qualifying superdomain.
    ///
    /// An exact match needs data unless `empty_data_ok` is set; so does a
    /// partial match. When a chain is supplied it is left pointing at the
    /// deepest node the search reached, even when the result is
    /// [`Error::NotFound`].
    pub fn find_node(&self, name: &Name, options: FindOptions<'_, T, X>) -> Result<Found> {
        check_absolute(name)?;
        let FindOptions {
            empty_data_ok,
            chain,
            mut callback,
        } = options;

        let mut local = NodeChain::new();
        let chain = chain.unwrap_or(&mut local);
        chain.reset();
        chain.stamp = self.stamp;
        if self.root.is_none() {
            return Err(Error::NotFound);
        }
        chain.ancestors.push(None);

        let labels = name.labels();
        let mut remaining = labels.len();
        let mut current = self.root;
        let mut exact = None;
        let mut stopped = None;
        // A superdomain whose level ends the search because it has none.
        let mut leaf_super = None;

        while let Some(id) = current {
            let node = &self.nodes[id];
            let cmp = full_compare(&labels[..remaining], node.labels());
            match cmp.relation {
                Relation::Equal => {
                    exact = Some(id);
                    break;
                }
                Relation::Subdomain => {
                    if node.find_callback {
                        if let Some(callback) = callback.as_deref_mut() {
                            let start = remaining - node.labels().len();
                            let matched = Name::from_labels_unchecked(labels[start..].to_vec());
                            if callback(id, node, &matched) == CallbackAction::Stop {
                                stopped = Some(id);
                                break;
                            }
                        }
                    }
                    match node.down {
                        Some(down) => {
                            remaining -= node.labels().len();
                            chain.levels.push(id);
                            chain.ancestors.push(None);
                            current = Some(down);
                        }
                        None => {
                            leaf_super = Some(id);
                            break;
                        }
                    }
                }
                _ => {
                    chain.ancestors.push(Some(id));
                    current = if cmp.order == Ordering::Less {
                        node.left
                    } else {
                        node.right
                    };
                }
            }
        }

        chain.end = exact.or(stopped).or(leaf_super);
        if chain.end.is_none() {
            // Fell off the bottom of a level: the last node compared is the
            // deepest one reached.
            chain.end = chain.ancestors.pop().flatten();
        }

        trace!(name = %name, exact = ?exact, levels = chain.levels.len(), "find_node");

        if let Some(id) = stopped {
            return Ok(Found::Stopped(id));
        }
        if let Some(id) = exact {
            if empty_data_ok || self.nodes[id].has_data() {
                return Ok(Found::Exact(id));
            }
        }
        leaf_super
            .into_iter()
            .chain(chain.levels.iter().rev().copied())
            .find(|&id| empty_data_ok || self.nodes[id].has_data())
            .map(Found::Partial)
            .ok_or(Error::NotFound)
    }

    /// Looks up the data for `name`, falling back to the deepest superdomain
    /// carrying data, and rebuilds the full name of the node that matched.
    pub fn find_name(&self, name: &Name) -> Result<NameMatch<'_, T>> {
        let mut chain = NodeChain::new();
        let found = self.find_node(name, FindOptions::new().chain(&mut chain))?;
        let (kind, id) = match found {
            Found::Exact(id) => (MatchKind::Exact, id),
            Found::Partial(id) | Found::Stopped(id) => (MatchKind::Partial, id),
        };
        let data = self.nodes[id].data.as_ref().ok_or(Error::NotFound)?;
        let name = self.accumulated_name(&chain, id)?;
        Ok(NameMatch { kind, data, name })
    }

    /// Data stored for exactly `name`.
    pub fn get(&self, name: &Name) -> Option<&T> {
        match self.find_node(name, FindOptions::new()) {
            Ok(Found::Exact(id)) => self.nodes[id].data.as_ref(),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut T> {
        match self.find_node(name, FindOptions::new()) {
            Ok(Found::Exact(id)) => self.nodes[id].data.as_mut(),
            _ => None,
        }
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.get(name).is_some()
    }
}

// =============================================================================
// Insertion
// =============================================================================

impl<T, X: Default> NameTree<T, X> {
    /// Returns the node for `name`, creating it (and any split point it
    /// needs) when absent.
    ///
    /// An existing node without data is returned as is; one with data
    /// yields [`Error::AlreadyExists`]. Node ids held elsewhere stay valid:
    /// a split keeps each existing node's id on the node that keeps its
    /// name.
    pub fn add_node(&mut self, name: &Name) -> Result<NodeId> {
        check_absolute(name)?;
        if name.label_count() > self.config.max_labels {
            return Err(Error::NoSpace);
        }

        let labels = name.labels();
        let mut remaining = labels.len();
        let mut level = Level::Top;
        let mut path = Path::new();

        'levels: loop {
            path.clear();
            let mut current = self.level_root(level);
            let mut order = Ordering::Equal;

            while let Some(id) = current {
                let node = &self.nodes[id];
                let cmp = full_compare(&labels[..remaining], node.labels());
                match cmp.relation {
                    Relation::Equal => {
                        return if node.has_data() {
                            Err(Error::AlreadyExists(id))
                        } else {
                            Ok(id)
                        };
                    }
                    Relation::Subdomain => {
                        remaining -= node.labels().len();
                        level = Level::Below(id);
                        continue 'levels;
                    }
                    Relation::Superdomain | Relation::CommonAncestor => {
                        return self.split_and_add(
                            level,
                            &path,
                            id,
                            cmp.common_labels,
                            &labels[..remaining],
                        );
                    }
                    Relation::None => {
                        path.push(id);
                        order = cmp.order;
                        current = if order == Ordering::Less {
                            node.left
                        } else {
                            node.right
                        };
                    }
                }
            }

            self.nodes.reserve(1)?;
            let id = self
                .nodes
                .alloc(Node::new(Name::from_labels_unchecked(labels[..remaining].to_vec())));
            self.insert_on_level(level, &path, id, order);
            self.stamp += 1;
            trace!(name = %name, node = ?id, "added node");
            return Ok(id);
        }
    }

    /// Splits `id` so that its last `common` labels form a new node in its
    /// place, then places whatever is left of `remaining` below that node.
    fn split_and_add(
        &mut self,
        level: Level,
        path: &[NodeId],
        id: NodeId,
        common: usize,
        remaining: &[Label],
    ) -> Result<NodeId> {
        let exhausted = common == remaining.len();
        self.nodes.reserve(if exhausted { 1 } else { 2 })?;

        let (prefix, suffix) = self.nodes[id]
            .labels
            .split(common)
            .expect("shared suffix is shorter than the node's labels");
        let mut upper = Node::new(suffix);
        {
            let old = &mut self.nodes[id];
            upper.color = old.color;
            upper.left = old.left.take();
            upper.right = old.right.take();
            upper.down = Some(id);
            old.color = Color::Black;
            old.labels = prefix;
        }
        let upper_id = self.nodes.alloc(upper);
        self.replace_child(level, path.last().copied(), id, Some(upper_id));
        self.stamp += 1;
        debug!(
            node = ?id,
            split_point = ?upper_id,
            suffix = %Name::display(self.nodes[upper_id].labels()),
            "split node"
        );

        if exhausted {
            return Ok(upper_id);
        }

        let rest = &remaining[..remaining.len() - common];
        let cmp = full_compare(rest, self.nodes[id].labels());
        debug_assert_eq!(cmp.relation, Relation::None);
        let new_id = self
            .nodes
            .alloc(Node::new(Name::from_labels_unchecked(rest.to_vec())));
        self.insert_on_level(Level::Below(upper_id), &[id], new_id, cmp.order);
        Ok(new_id)
    }

    /// Adds `name` with `data`.
    ///
    /// Fails with [`Error::AlreadyExists`] when the name already carries
    /// data. On any failure the tree is unchanged and `data` is handed to
    /// the deleter; use [`try_add_name`](Self::try_add_name) to get it back
    /// instead.
    pub fn add_name(&mut self, name: &Name, data: T) -> Result<NodeId> {
        self.try_add_name(name, data).map_err(|(err, data)| {
            self.release(data);
            err
        })
    }

    /// Like [`add_name`](Self::add_name), but returns the payload with the
    /// error when the name cannot be added.
    pub fn try_add_name(
        &mut self,
        name: &Name,
        data: T,
    ) -> std::result::Result<NodeId, (Error, T)> {
        match self.add_node(name) {
            Ok(id) => {
                self.nodes[id].data = Some(data);
                self.count += 1;
                Ok(id)
            }
            Err(err) => Err((err, data)),
        }
    }
}

// =============================================================================
// Deletion
// =============================================================================

impl<T, X> NameTree<T, X> {
    /// Removes the data for `name`; with `recurse`, every name below it too.
    ///
    /// The node itself survives when it still has sub-names. Emptied nodes
    /// are unlinked and split points that became redundant are joined back,
    /// which may free nodes whose ids callers still hold.
    pub fn delete_name(&mut self, name: &Name, recurse: bool) -> Result<()> {
        let mut chain = NodeChain::new();
        let found = self.find_node(name, FindOptions::new().chain(&mut chain))?;
        let Found::Exact(id) = found else {
            return Err(Error::NotFound);
        };

        self.stamp += 1;
        if recurse {
            if let Some(down) = self.nodes[id].down.take() {
                self.destroy_level(down);
            }
        }
        if let Some(data) = self.nodes[id].data.take() {
            self.discard(data);
        }
        debug!(name = %name, recurse, "deleted name");

        if self.nodes[id].down.is_some() {
            let level = current_level(&chain);
            let path: Path = chain.level_path().collect();
            self.try_join(level, &path, id);
            return Ok(());
        }
        self.prune(&mut chain, id);
        Ok(())
    }

    /// Unlinks and frees `id`, which has neither data nor a `down` level,
    /// then tidies the levels above. `chain` must point at `id`.
    fn prune(&mut self, chain: &mut NodeChain, mut id: NodeId) {
        loop {
            let level = current_level(chain);
            let path: Path = chain.level_path().collect();
            self.remove_from_level(level, &path, id);
            self.nodes.free(id);
            trace!(node = ?id, "removed node");

            let Some(owner) = chain.pop_level() else {
                return;
            };
            if self.nodes[owner].down.is_some() {
                let level = current_level(chain);
                let path: Path = chain.level_path().collect();
                self.try_join(level, &path, owner);
                return;
            }
            let node = &self.nodes[owner];
            if node.has_data() || node.find_callback {
                return;
            }
            id = owner;
        }
    }

    /// Merges `upper` with the only node of its `down` level when `upper`
    /// carries nothing of its own. The lower node keeps its id and takes
    /// `upper`'s place; `upper` is freed.
    fn try_join(&mut self, level: Level, path: &[NodeId], upper: NodeId) {
        let node = &self.nodes[upper];
        if node.has_data() || node.find_callback {
            return;
        }
        let Some(lower) = node.down else {
            return;
        };
        let only = &self.nodes[lower];
        if only.left.is_some() || only.right.is_some() {
            return;
        }

        self.replace_child(level, path.last().copied(), upper, Some(lower));
        let removed = self.nodes.free(upper);
        let joined = &mut self.nodes[lower];
        let mut labels = joined.labels.labels().to_vec();
        labels.extend_from_slice(removed.labels());
        joined.labels = Name::from_labels_unchecked(labels);
        joined.color = removed.color;
        joined.left = removed.left;
        joined.right = removed.right;
        debug!(
            node = ?lower,
            labels = %Name::display(self.nodes[lower].labels()),
            "joined node with its parent level"
        );
    }

    /// Frees every node of the level rooted at `root` and all levels below
    /// it, children before parents.
    fn destroy_level(&mut self, root: NodeId) {
        let mut stack: SmallVec<[(NodeId, bool); 32]> = SmallVec::new();
        stack.push((root, false));
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                let node = self.nodes.free(id);
                if let Some(data) = node.data {
                    self.discard(data);
                }
                continue;
            }
            stack.push((id, true));
            let node = &self.nodes[id];
            for child in [node.down, node.right, node.left].into_iter().flatten() {
                stack.push((child, false));
            }
        }
    }

    /// Removes every node, passing each payload to the deleter.
    pub fn clear(&mut self) {
        if let Some(root) = self.root.take() {
            self.stamp += 1;
            self.destroy_level(root);
        }
        debug_assert_eq!(self.count, 0);
    }

    /// Tears the tree down, passing each payload to the deleter.
    pub fn destroy(mut self) {
        self.clear();
    }
}

fn current_level(chain: &NodeChain) -> Level {
    chain.levels.last().map_or(Level::Top, |&owner| Level::Below(owner))
}

impl<T, X> Drop for NameTree<T, X> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, X> Default for NameTree<T, X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug, X> std::fmt::Debug for NameTree<T, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator returned by [`NameTree::iter`].
pub struct Iter<'a, T, X> {
    tree: &'a NameTree<T, X>,
    chain: NodeChain,
    started: bool,
}

impl<'a, T, X> Iterator for Iter<'a, T, X> {
    type Item = (Name, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = if self.started {
                self.chain.next(self.tree)
            } else {
                self.started = true;
                self.chain.first(self.tree)
            };
            step.ok()?;
            let id = self.chain.current()?;
            if let Some(data) = self.tree.nodes[id].data.as_ref() {
                let name = self.chain.full_name(self.tree).ok()?;
                return Some((name, data));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn scenario() -> NameTree<char> {
        let mut t = NameTree::new();
        t.add_name(&name("com."), 'A').unwrap();
        t.add_name(&name("example.com."), 'B').unwrap();
        t.add_name(&name("a.example.com."), 'C').unwrap();
        t.add_name(&name("b.example.com."), 'D').unwrap();
        t
    }

    fn names(t: &NameTree<char>) -> Vec<String> {
        t.iter().map(|(n, _)| n.to_string()).collect()
    }

    #[test]
    fn test_scenario_lookups() {
        let t = scenario();

        let hit = t.find_name(&name("a.example.com.")).unwrap();
        assert_eq!((hit.kind, *hit.data), (MatchKind::Exact, 'C'));
        assert_eq!(hit.name, name("a.example.com."));

        let hit = t.find_name(&name("x.example.com.")).unwrap();
        assert_eq!((hit.kind, *hit.data), (MatchKind::Partial, 'B'));
        assert_eq!(hit.name, name("example.com."));

        assert_eq!(t.find_name(&name("example.net.")).unwrap_err(), Error::NotFound);
        assert!(t.check_integrity().is_empty());
    }

    #[test]
    fn test_scenario_traversal() {
        let t = scenario();
        assert_eq!(
            names(&t),
            vec!["com.", "example.com.", "a.example.com.", "b.example.com."]
        );
    }

    #[test]
    fn test_scenario_delete_keeps_split_point() {
        let mut t = scenario();
        t.delete_name(&name("example.com."), false).unwrap();

        assert_eq!(t.get(&name("a.example.com.")), Some(&'C'));
        assert_eq!(t.get(&name("b.example.com.")), Some(&'D'));
        assert_eq!(t.get(&name("example.com.")), None);

        // The name itself is gone; only its data-bearing superdomain matches.
        let hit = t.find_name(&name("example.com.")).unwrap();
        assert_eq!((hit.kind, *hit.data), (MatchKind::Partial, 'A'));
        assert_eq!(hit.name, name("com."));
        let com = t.find_node(&name("com."), FindOptions::new()).unwrap().node();
        assert_eq!(
            t.find_node(&name("example.com."), FindOptions::new()),
            Ok(Found::Partial(com))
        );

        let found = t
            .find_node(&name("example.com."), FindOptions::new().empty_data_ok(true))
            .unwrap();
        assert!(found.is_exact());
        assert!(!t.node(found.node()).unwrap().has_data());
        assert_eq!(t.len(), 3);
        assert!(t.check_integrity().is_empty());
    }

    #[test]
    fn test_add_existing() {
        let mut t = scenario();
        let existing = t.find_node(&name("com."), FindOptions::new()).unwrap().node();
        assert_eq!(
            t.add_name(&name("com."), 'Z'),
            Err(Error::AlreadyExists(existing))
        );
        assert_eq!(t.get(&name("com.")), Some(&'A'));
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_split_keeps_node_ids() {
        let mut t: NameTree<u32> = NameTree::new();
        let deep = t.add_name(&name("a.b.example.com."), 1).unwrap();
        let node_count = t.node_count();

        // Shares only "example.com." with the compressed node.
        let sibling = t.add_name(&name("x.example.com."), 2).unwrap();
        assert_eq!(t.node_count(), node_count + 2);
        assert_eq!(t.node(deep).unwrap().data(), Some(&1));
        assert_eq!(
            Name::display(t.node(deep).unwrap().labels()).to_string(),
            "a.b"
        );
        assert_eq!(t.node(sibling).unwrap().data(), Some(&2));

        // Exhausted split: the new name is the shared suffix itself.
        let upper = t.add_name(&name("com."), 3).unwrap();
        assert_eq!(t.get(&name("com.")), Some(&3));
        assert_eq!(t.get(&name("a.b.example.com.")), Some(&1));
        assert_ne!(upper, deep);
        assert!(t.check_integrity().is_empty());
    }

    #[test]
    fn test_add_node_returns_existing_split_point() {
        let mut t: NameTree<u32> = NameTree::new();
        t.add_name(&name("a.example.com."), 1).unwrap();
        t.add_name(&name("b.example.com."), 2).unwrap();
        let split = t.add_node(&name("example.com.")).unwrap();
        assert!(!t.node(split).unwrap().has_data());
        assert_eq!(t.add_node(&name("example.com.")), Ok(split));
        t.set_data(split, 7).unwrap();
        assert_eq!(t.get(&name("example.com.")), Some(&7));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_relative_and_oversized_names_rejected() {
        let mut t: NameTree<u32> = NameTree::with_config(Config::default().with_max_labels(3));
        assert_eq!(t.add_name(&name("example.com"), 1), Err(Error::NotAbsolute));
        assert_eq!(t.add_name(&name("a.b.c."), 1), Err(Error::NoSpace));
        assert!(t.add_name(&name("b.c."), 1).is_ok());
        assert_eq!(t.find_name(&name("www")).unwrap_err(), Error::NotAbsolute);
        assert_eq!(t.node_count(), 1);
    }

    #[test]
    fn test_root_name() {
        let mut t: NameTree<u32> = NameTree::new();
        t.add_name(&name("com."), 1).unwrap();
        t.add_name(&Name::root(), 0).unwrap();
        t.add_name(&name("net."), 2).unwrap();

        let hit = t.find_name(&name("example.org.")).unwrap();
        assert_eq!((hit.kind, *hit.data), (MatchKind::Partial, 0));
        assert!(hit.name.is_root());
        let all: Vec<String> = t.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(all, vec![".", "com.", "net."]);
    }

    #[test]
    fn test_case_insensitive() {
        let mut t: NameTree<u32> = NameTree::new();
        t.add_name(&name("Example.COM."), 1).unwrap();
        assert_eq!(t.get(&name("example.com.")), Some(&1));
        assert!(matches!(
            t.add_name(&name("EXAMPLE.com."), 2),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_delete_joins_split_points() {
        let mut t: NameTree<u32> = NameTree::new();
        let a = t.add_name(&name("a.example.com."), 1).unwrap();
        t.add_name(&name("b.example.com."), 2).unwrap();
        assert_eq!(t.node_count(), 3);

        t.delete_name(&name("b.example.com."), false).unwrap();
        // "a" is joined back with "example.com." and keeps its id.
        assert_eq!(t.node_count(), 1);
        assert_eq!(t.root(), Some(a));
        assert_eq!(
            Name::display(t.node(a).unwrap().labels()).to_string(),
            "a.example.com."
        );
        assert!(t.check_integrity().is_empty());
        assert!(t.check_compression().is_empty());
    }

    #[test]
    fn test_delete_missing() {
        let mut t = scenario();
        assert_eq!(t.delete_name(&name("zzz.com."), false), Err(Error::NotFound));
        assert_eq!(t.delete_name(&name("net."), false), Err(Error::NotFound));
        t.delete_name(&name("example.com."), false).unwrap();
        assert_eq!(
            t.delete_name(&name("example.com."), false),
            Err(Error::NotFound)
        );
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_delete_recursive() {
        let drops = Arc::new(AtomicUsize::new(0));
        let counter = drops.clone();
        let mut t: NameTree<char> = NameTree::new().deleter(move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });
        for (n, d) in [
            ("com.", 'A'),
            ("example.com.", 'B'),
            ("a.example.com.", 'C'),
            ("b.example.com.", 'D'),
            ("x.a.example.com.", 'E'),
            ("other.com.", 'F'),
        ] {
            t.add_name(&name(n), d).unwrap();
        }

        t.delete_name(&name("example.com."), true).unwrap();
        assert_eq!(drops.load(AtomicOrdering::SeqCst), 4);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&name("a.example.com.")), None);
        assert_eq!(names(&t), vec!["com.", "other.com."]);
        assert!(t.check_integrity().is_empty());
        assert!(t.check_compression().is_empty());

        drop(t);
        assert_eq!(drops.load(AtomicOrdering::SeqCst), 6);
    }

    #[test]
    fn test_rejected_payloads() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut t: NameTree<char> = NameTree::with_config(Config::default().with_max_nodes(1))
            .deleter(move |v| sink.lock().push(v));
        let com = t.add_name(&name("com."), 'A').unwrap();

        // Handed back to the caller.
        assert_eq!(
            t.try_add_name(&name("com."), 'Z'),
            Err((Error::AlreadyExists(com), 'Z'))
        );
        assert_eq!(t.try_add_name(&name("net."), 'N'), Err((Error::NoMemory, 'N')));
        assert!(seen.lock().is_empty());

        // Handed to the deleter.
        assert_eq!(t.add_name(&name("com."), 'Y'), Err(Error::AlreadyExists(com)));
        assert_eq!(t.add_name(&name("net."), 'M'), Err(Error::NoMemory));
        assert_eq!(t.add_name(&name("www"), 'R'), Err(Error::NotAbsolute));
        assert_eq!(*seen.lock(), vec!['Y', 'M', 'R']);

        assert_eq!(t.len(), 1);
        assert_eq!(t.get(&name("com.")), Some(&'A'));
        drop(t);
        assert_eq!(*seen.lock(), vec!['Y', 'M', 'R', 'A']);
    }

    #[test]
    fn test_deleter_on_replace_and_destroy() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut t: NameTree<u32> = NameTree::new().deleter(move |v| sink.lock().push(v));
        let id = t.add_name(&name("a."), 1).unwrap();
        t.add_name(&name("b."), 2).unwrap();
        t.set_data(id, 10).unwrap();
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(t.len(), 2);

        t.destroy();
        let mut all = seen.lock().clone();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 10]);
    }

    #[test]
    fn test_find_callback_stops_descent() {
        let mut t: NameTree<&str> = NameTree::new();
        t.add_name(&name("com."), "tld").unwrap();
        let cut = t.add_name(&name("example.com."), "delegation").unwrap();
        t.add_name(&name("www.example.com."), "glue").unwrap();
        t.node_mut(cut).unwrap().set_find_callback(true);

        let mut visited = Vec::new();
        let mut stop = |id: NodeId, _: &Node<&'static str>, n: &Name| {
            visited.push((id, n.to_string()));
            CallbackAction::Stop
        };
        let found = t
            .find_node(
                &name("www.example.com."),
                FindOptions::new().callback(&mut stop),
            )
            .unwrap();
        assert_eq!(found, Found::Stopped(cut));
        assert_eq!(visited, vec![(cut, "example.com.".to_string())]);

        // Exact hits on the flagged node itself do not run the callback.
        let mut never = |_: NodeId, _: &Node<&'static str>, _: &Name| -> CallbackAction {
            panic!("callback must not run")
        };
        let found = t
            .find_node(
                &name("example.com."),
                FindOptions::new().callback(&mut never),
            )
            .unwrap();
        assert_eq!(found, Found::Exact(cut));

        let mut go_on = |_: NodeId, _: &Node<&'static str>, _: &Name| CallbackAction::Continue;
        let found = t
            .find_node(
                &name("www.example.com."),
                FindOptions::new().callback(&mut go_on),
            )
            .unwrap();
        assert!(found.is_exact());
    }

    #[test]
    fn test_find_positions_chain_on_miss() {
        let t = scenario();
        let mut chain = NodeChain::new();
        let result = t.find_node(&name("c.example.com."), FindOptions::new().chain(&mut chain));
        assert!(matches!(result, Ok(Found::Partial(_))));
        let end = chain.full_name(&t).unwrap();
        assert!(end == name("a.example.com.") || end == name("b.example.com."));
        assert_eq!(chain.origin(&t).unwrap(), name("example.com."));

        let result = t.find_node(&name("org."), FindOptions::new().chain(&mut chain));
        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(chain.full_name(&t).unwrap(), name("com."));
    }

    #[test]
    fn test_node_quota() {
        let mut t: NameTree<u32> = NameTree::with_config(Config::default().with_max_nodes(3));
        t.add_name(&name("a.example.com."), 1).unwrap();
        t.add_name(&name("b.example.com."), 2).unwrap();
        assert_eq!(t.node_count(), 3);

        // Needs a split plus a new node.
        assert_eq!(t.add_name(&name("x.org."), 3), Err(Error::NoMemory));
        assert_eq!(t.node_count(), 3);
        assert_eq!(t.len(), 2);
        assert!(t.check_integrity().is_empty());

        // Attaching data to an existing split point needs no node.
        t.add_name(&name("example.com."), 4).unwrap();
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_get_mut_and_contains() {
        let mut t = scenario();
        *t.get_mut(&name("com.")).unwrap() = 'Q';
        assert_eq!(t.get(&name("com.")), Some(&'Q'));
        assert!(t.contains(&name("b.example.com.")));
        assert!(!t.contains(&name("c.example.com.")));
    }

    #[test]
    fn test_many_siblings() {
        let mut t: NameTree<u64> = NameTree::new();
        for i in 0..1000u64 {
            t.add_name(&name(&format!("host{i:04}.example.com.")), i).unwrap();
        }
        assert_eq!(t.len(), 1000);
        for i in 0..1000u64 {
            assert_eq!(
                t.get(&name(&format!("host{i:04}.example.com."))),
                Some(&i),
                "Failed at {}",
                i
            );
        }
        assert!(t.check_integrity().is_empty());
        for i in (0..1000u64).step_by(3) {
            t.delete_name(&name(&format!("host{i:04}.example.com.")), false)
                .unwrap();
        }
        assert!(t.check_integrity().is_empty());
        assert!(t.check_compression().is_empty());
        let got: Vec<u64> = t.iter().map(|(_, v)| *v).collect();
        let expected: Vec<u64> = (0..1000u64).filter(|i| i % 3 != 0).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_randomized_against_btreemap() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeMap;

        const LABELS: [&str; 5] = ["a", "b", "c", "ab", "B"];
        let mut rng = StdRng::seed_from_u64(7);
        let mut t: NameTree<u64> = NameTree::new();
        let mut m: BTreeMap<Name, u64> = BTreeMap::new();

        for _ in 0..20_000 {
            let depth = rng.gen_range(1..=4);
            let text: String = (0..depth)
                .map(|_| format!("{}.", LABELS[rng.gen_range(0..LABELS.len())]))
                .collect();
            let key = name(&text);
            match rng.gen_range(0..100) {
                0..=49 => {
                    let v: u64 = rng.gen();
                    let expected_ok = !m.contains_key(&key);
                    assert_eq!(t.add_name(&key, v).is_ok(), expected_ok);
                    m.entry(key).or_insert(v);
                }
                50..=79 => {
                    let expected_ok = m.remove(&key).is_some();
                    assert_eq!(t.delete_name(&key, false).is_ok(), expected_ok);
                }
                _ => {
                    assert_eq!(t.get(&key).copied(), m.get(&key).copied());
                }
            }
        }

        assert_eq!(t.len(), m.len());
        assert!(t.check_integrity().is_empty());
        assert!(t.check_compression().is_empty());
        let got: Vec<(Name, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Name, u64)> = m.into_iter().collect();
        assert_eq!(got, expected);
    }
}

#[cfg(test)]
mod proptests;
