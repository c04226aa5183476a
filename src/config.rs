//! Tree configuration.

use crate::name::MAX_LABELS;

/// Configuration for a [`NameTree`](crate::NameTree).
#[derive(Debug, Clone)]
pub struct Config {
    /// Names with more labels than this are rejected with
    /// [`Error::NoSpace`](crate::Error::NoSpace) before any change is made.
    pub max_labels: usize,
    /// Upper bound on live nodes, split points included. `None` leaves the
    /// allocator as the only limit.
    pub max_nodes: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_labels: MAX_LABELS,
            max_nodes: None,
        }
    }
}

impl Config {
    pub fn with_max_labels(mut self, max_labels: usize) -> Self {
        self.max_labels = max_labels;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }
}
