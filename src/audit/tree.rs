//! Dependency tree assembly.
//!
//! [`TreeBuilder`] is the only place nodes enter a [`DependencyTree`]. It keeps
//! the chain of open ancestors on an explicit stack: [`TreeBuilder::push`]
//! appends a leaf under the current parent and [`TreeBuilder::nested`] opens
//! the most recently pushed node so that subsequent pushes land beneath it.
//! Every push increments `total` exactly once, whichever adapter calls it.

use tracing::warn;

use crate::model::{Dependency, DependencyTree};

/// Default cap on tree depth (root children are depth 1).
pub const DEFAULT_MAX_DEPTH: usize = 50;

#[derive(Debug)]
pub struct TreeBuilder {
    /// Open ancestors; index 0 is the synthetic root.
    stack: Vec<Dependency>,
    total: usize,
    max_depth: usize,
    truncated: usize,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        let root = DependencyTree::empty().root;
        Self {
            stack: vec![root],
            total: 0,
            max_depth: max_depth.max(1),
            truncated: 0,
        }
    }

    /// Appends a node under the current parent.
    pub fn push(&mut self, name: impl Into<String>, version: impl Into<String>, direct: bool) {
        let node = Dependency::new(name, version, direct);
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            self.total += 1;
        }
    }

    /// Runs `f` with the most recently pushed node as the current parent.
    ///
    /// Returns `Ok(false)` without calling `f` when nothing has been pushed at
    /// this level or when descending would exceed the depth cap. The opened
    /// node is re-attached to its parent whether `f` succeeds or not.
    pub fn nested<F, E>(&mut self, f: F) -> Result<bool, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
    {
        let level = self.stack.len();
        if level + 1 > self.max_depth {
            self.truncated += 1;
            if self.truncated == 1 {
                warn!(max_depth = self.max_depth, "Dependency tree depth cap reached, truncating");
            }
            return Ok(false);
        }

        let Some(last) = self.stack.last_mut().and_then(|p| p.children.pop()) else {
            return Ok(false);
        };
        self.stack.push(last);

        let result = f(self);

        while self.stack.len() > level {
            self.close();
        }
        result.map(|_| true)
    }

    /// Depth at which the next [`push`](Self::push) inserts.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of subtrees skipped because of the depth cap.
    pub fn truncated(&self) -> usize {
        self.truncated
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Closes all open ancestors and returns the assembled tree.
    pub fn finish(mut self) -> DependencyTree {
        while self.stack.len() > 1 {
            self.close();
        }
        let mut tree = DependencyTree::empty();
        if let Some(root) = self.stack.pop() {
            tree.root = root;
        }
        tree.total = self.total;
        tree
    }

    fn close(&mut self) {
        if let Some(node) = self.stack.pop() {
            if let Some(parent) = self.stack.last_mut() {
                parent.children.push(node);
            }
        }
    }
}
