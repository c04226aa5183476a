//! A [`NameTree`] behind a reader-writer lock.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Config;
use crate::error::Result;
use crate::name::Name;
use crate::{MatchKind, NameTree};

/// A name tree shareable between threads.
///
/// Lookups take the read lock and run concurrently; additions and
/// deletions take the write lock. Values are cloned out so no guard
/// outlives a call. Use [`read`](Self::read) and [`write`](Self::write) for
/// anything longer, such as walking a [`NodeChain`](crate::NodeChain).
pub struct SharedNameTree<T, X = ()> {
    inner: RwLock<NameTree<T, X>>,
}

impl<T, X> SharedNameTree<T, X> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::from_tree(NameTree::with_config(config))
    }

    pub fn from_tree(tree: NameTree<T, X>) -> Self {
        Self {
            inner: RwLock::new(tree),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, NameTree<T, X>> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, NameTree<T, X>> {
        self.inner.write()
    }

    pub fn into_inner(self) -> NameTree<T, X> {
        self.inner.into_inner()
    }

    pub fn delete_name(&self, name: &Name, recurse: bool) -> Result<()> {
        self.inner.write().delete_name(name, recurse)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.inner.read().contains(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, X: Default> SharedNameTree<T, X> {
    pub fn add_name(&self, name: &Name, data: T) -> Result<()> {
        self.inner.write().add_name(name, data).map(|_| ())
    }
}

impl<T: Clone, X> SharedNameTree<T, X> {
    /// Data stored for exactly `name`.
    pub fn get(&self, name: &Name) -> Option<T> {
        self.inner.read().get(name).cloned()
    }

    /// Exact or closest enclosing match, with the full name that matched.
    pub fn find_name(&self, name: &Name) -> Result<(MatchKind, Name, T)> {
        let tree = self.inner.read();
        let hit = tree.find_name(name)?;
        Ok((hit.kind, hit.name, hit.data.clone()))
    }
}

impl<T, X> Default for SharedNameTree<T, X> {
    fn default() -> Self {
        Self::new()
    }
}
