//! # Profile Tree
//!
//! Hierarchical timing bookkeeping for the layers built on top of the
//! store. A [`Profiler`] records, per profiled element, a breakdown of
//! named nanosecond counters, and arranges the elements into a tree that
//! mirrors their nesting at execution time: each element recorded while
//! another is in flight becomes its child.
//!
//! This is pure bookkeeping. It consumes whatever the caller profiles
//! (typically the directory's read and write primitives) and never
//! touches storage itself, so it has no bearing on storage correctness.
//!
//! ```ignore
//! let mut profiler = Profiler::new();
//! {
//!     let breakdown = profiler.breakdown_for("fetch-segment");
//!     let _scope = breakdown.time("open_input");
//!     // ... open and read ...
//! }
//! profiler.poll_last();
//! let results = profiler.results();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Named nanosecond counters accumulated for one profiled element.
#[derive(Debug, Clone, Default)]
pub struct ProfileBreakdown {
    timings: BTreeMap<String, u64>,
}

impl ProfileBreakdown {
    /// Adds `nanos` to the named counter.
    pub fn add(&mut self, slice: &str, nanos: u64) {
        *self.timings.entry(slice.to_string()).or_insert(0) += nanos;
    }

    /// Starts a scope that adds its elapsed time to the named counter
    /// when dropped.
    pub fn time(&mut self, slice: &str) -> TimingScope<'_> {
        TimingScope {
            breakdown: self,
            slice: slice.to_string(),
            started: Instant::now(),
        }
    }

    /// Sum of every counter.
    pub fn total_nanos(&self) -> u64 {
        self.timings.values().sum()
    }

    pub fn timings(&self) -> &BTreeMap<String, u64> {
        &self.timings
    }
}

/// Guard returned by [`ProfileBreakdown::time`]; accumulates on drop.
#[derive(Debug)]
pub struct TimingScope<'a> {
    breakdown: &'a mut ProfileBreakdown,
    slice: String,
    started: Instant,
}

impl Drop for TimingScope<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_nanos() as u64;
        self.breakdown.add(&self.slice, elapsed);
    }
}

/// One rendered node of the profiled tree.
#[derive(Debug, Clone)]
pub struct ProfileResult {
    pub name: String,
    pub total_nanos: u64,
    pub timings: BTreeMap<String, u64>,
    pub children: Vec<ProfileResult>,
}

struct Node<E> {
    element: E,
    breakdown: ProfileBreakdown,
    children: Vec<usize>,
}

/// Storage for a profile tree.
///
/// Nodes live in an arena indexed by position; an ancestry stack tracks
/// which element is currently in flight so nested recordings attach as
/// children.
pub struct Profiler<E> {
    nodes: Vec<Node<E>>,
    roots: Vec<usize>,
    stack: Vec<usize>,
}

impl<E: PartialEq + fmt::Display> Profiler<E> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// The breakdown for `element`, created under the current ancestry
    /// if it does not exist.
    ///
    /// Asking again for the element currently in flight returns its
    /// existing breakdown; anything else starts a new child node and
    /// pushes it onto the ancestry stack.
    pub fn breakdown_for(&mut self, element: E) -> &mut ProfileBreakdown {
        if let Some(&top) = self.stack.last() {
            if self.nodes[top].element == element {
                return &mut self.nodes[top].breakdown;
            }
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            element,
            breakdown: ProfileBreakdown::default(),
            children: Vec::new(),
        });

        match self.stack.last() {
            Some(&parent) => self.nodes[parent].children.push(index),
            None => self.roots.push(index),
        }
        self.stack.push(index);

        &mut self.nodes[index].breakdown
    }

    /// Removes the most recent element from the ancestry stack.
    pub fn poll_last(&mut self) {
        self.stack.pop();
    }

    /// A hierarchical representation of everything profiled so far.
    pub fn results(&self) -> Vec<ProfileResult> {
        self.roots.iter().map(|&i| self.render(i)).collect()
    }

    fn render(&self, index: usize) -> ProfileResult {
        let node = &self.nodes[index];
        ProfileResult {
            name: node.element.to_string(),
            total_nanos: node.breakdown.total_nanos(),
            timings: node.breakdown.timings().clone(),
            children: node.children.iter().map(|&c| self.render(c)).collect(),
        }
    }
}

impl<E: PartialEq + fmt::Display> Default for Profiler<E> {
    fn default() -> Self {
        Self::new()
    }
}
