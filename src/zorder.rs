//! Above/below stacking relations between windows
//!
//! This module provides the `ZOrderGraph`, an adjacency structure recording
//! which windows sit directly above or below which others. Both directions
//! are stored so that a window can be detached in time proportional to its
//! own neighbourhood, and every mutation keeps them mirrored:
//! `below[a]` contains `b` exactly when `above[b]` contains `a`.
//!
//! The graph never holds a cycle. The numeric z coordinate of a window is
//! derived from its depth, the length of the longest chain of windows below
//! it.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use thiserror::Error;

use crate::window::{Rect, WindowHandle};

/// Rejected stacking requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackingError {
    #[error("a window cannot be stacked above itself")]
    SelfReference,

    #[error("relation would close a stacking cycle")]
    Cycle,

    #[error("stacking depth {depth} exceeds {max}")]
    TooDeep { depth: usize, max: usize },
}

/// Mirrored above/below adjacency between windows.
///
/// # Examples
///
/// ```
/// use winstack::zorder::ZOrderGraph;
///
/// let mut graph: ZOrderGraph<u64> = ZOrderGraph::new();
/// graph.move_above(2, 1, 16).unwrap();
///
/// assert!(graph.is_directly_above(2, 1));
/// assert_eq!(graph.depth(2), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ZOrderGraph<K = WindowHandle> {
    /// Windows lying directly above the key
    above: HashMap<K, HashSet<K>>,

    /// Windows lying directly below the key
    below: HashMap<K, HashSet<K>>,
}

impl<K: Copy + Eq + Hash> ZOrderGraph<K> {
    pub fn new() -> Self {
        Self {
            above: HashMap::new(),
            below: HashMap::new(),
        }
    }

    /// Places `moving` directly above `reference`.
    ///
    /// An existing opposite relation (`reference` above `moving`) is swapped
    /// out first. Requests that would close a longer cycle, or push any window
    /// deeper than `max_depth`, are rejected and leave the graph untouched.
    pub fn move_above(
        &mut self,
        moving: K,
        reference: K,
        max_depth: usize,
    ) -> Result<(), StackingError> {
        if moving == reference {
            return Err(StackingError::SelfReference);
        }

        let swapped = self.is_directly_above(reference, moving);
        if self.reaches_down(reference, moving, Some((reference, moving))) {
            return Err(StackingError::Cycle);
        }

        if swapped {
            self.unlink(reference, moving);
        }
        let added = self.link(moving, reference);

        let depth = self.height_from(moving);
        if depth > max_depth {
            if added {
                self.unlink(moving, reference);
            }
            if swapped {
                self.link(reference, moving);
            }
            return Err(StackingError::TooDeep {
                depth,
                max: max_depth,
            });
        }

        Ok(())
    }

    /// Removes `window` from every neighbour and clears its own relations.
    ///
    /// Returns the former neighbours (below first, then above).
    pub fn detach(&mut self, window: K) -> Vec<K> {
        let mut neighbours = Vec::new();

        if let Some(lower) = self.below.remove(&window) {
            for other in lower {
                if let Some(set) = self.above.get_mut(&other) {
                    set.remove(&window);
                    if set.is_empty() {
                        self.above.remove(&other);
                    }
                }
                neighbours.push(other);
            }
        }

        if let Some(upper) = self.above.remove(&window) {
            for other in upper {
                if let Some(set) = self.below.get_mut(&other) {
                    set.remove(&window);
                    if set.is_empty() {
                        self.below.remove(&other);
                    }
                }
                neighbours.push(other);
            }
        }

        neighbours
    }

    /// Center of the bounding rectangle of the windows directly below
    /// `target`, or the origin when nothing is below it.
    pub fn center_below<F>(&self, target: K, rect_of: F) -> (f32, f32)
    where
        F: Fn(K) -> Option<Rect>,
    {
        let bounds = self
            .below(target)
            .filter_map(rect_of)
            .reduce(|acc, rect| acc.union(&rect));

        match bounds {
            Some(rect) => rect.center(),
            None => (0.0, 0.0),
        }
    }

    /// Windows lying directly above `window`.
    pub fn above(&self, window: K) -> impl Iterator<Item = K> + '_ {
        self.above.get(&window).into_iter().flatten().copied()
    }

    /// Windows lying directly below `window`.
    pub fn below(&self, window: K) -> impl Iterator<Item = K> + '_ {
        self.below.get(&window).into_iter().flatten().copied()
    }

    pub fn is_directly_above(&self, upper: K, lower: K) -> bool {
        self.below
            .get(&upper)
            .map_or(false, |set| set.contains(&lower))
    }

    /// Whether `window` takes part in any relation.
    pub fn contains(&self, window: K) -> bool {
        self.above.contains_key(&window) || self.below.contains_key(&window)
    }

    /// Length of the longest chain of windows below `window`.
    pub fn depth(&self, window: K) -> usize {
        let mut memo = HashMap::new();
        self.depth_memo(window, &mut memo)
    }

    /// Largest depth among `window` and everything stacked above it.
    pub fn height_from(&self, window: K) -> usize {
        let mut memo = HashMap::new();
        let mut seen = HashSet::new();
        let mut pending = vec![window];
        let mut deepest = 0;

        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            deepest = deepest.max(self.depth_memo(current, &mut memo));
            pending.extend(self.above(current));
        }

        deepest
    }

    /// Checks that both directions mirror each other.
    pub fn is_consistent(&self) -> bool {
        let downward = self
            .below
            .iter()
            .all(|(upper, set)| set.iter().all(|lower| self.is_directly_below(*lower, *upper)));
        let upward = self
            .above
            .iter()
            .all(|(lower, set)| set.iter().all(|upper| self.is_directly_above(*upper, *lower)));
        downward && upward
    }

    pub fn clear(&mut self) {
        self.above.clear();
        self.below.clear();
    }

    fn is_directly_below(&self, lower: K, upper: K) -> bool {
        self.above
            .get(&lower)
            .map_or(false, |set| set.contains(&upper))
    }

    fn link(&mut self, upper: K, lower: K) -> bool {
        let added = self.below.entry(upper).or_default().insert(lower);
        self.above.entry(lower).or_default().insert(upper);
        added
    }

    fn unlink(&mut self, upper: K, lower: K) {
        if let Some(set) = self.below.get_mut(&upper) {
            set.remove(&lower);
            if set.is_empty() {
                self.below.remove(&upper);
            }
        }
        if let Some(set) = self.above.get_mut(&lower) {
            set.remove(&upper);
            if set.is_empty() {
                self.above.remove(&lower);
            }
        }
    }

    /// Whether `target` can be reached from `from` following below-edges,
    /// ignoring the `skip` edge.
    fn reaches_down(&self, from: K, target: K, skip: Option<(K, K)>) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![from];

        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            for next in self.below(current) {
                if skip == Some((current, next)) {
                    continue;
                }
                if next == target {
                    return true;
                }
                pending.push(next);
            }
        }

        false
    }

    fn depth_memo(&self, window: K, memo: &mut HashMap<K, usize>) -> usize {
        // Post-order walk; a window is settled once everything below it is
        let mut pending = vec![(window, false)];

        while let Some((current, expanded)) = pending.pop() {
            if memo.contains_key(&current) {
                continue;
            }
            if expanded {
                let depth = self
                    .below(current)
                    .filter_map(|next| memo.get(&next).copied())
                    .map(|depth| depth + 1)
                    .max()
                    .unwrap_or(0);
                memo.insert(current, depth);
            } else {
                pending.push((current, true));
                pending.extend(
                    self.below(current)
                        .filter(|next| !memo.contains_key(next))
                        .map(|next| (next, false)),
                );
            }
        }

        memo.get(&window).copied().unwrap_or(0)
    }
}

impl<K: Copy + Eq + Hash> Default for ZOrderGraph<K> {
    fn default() -> Self {
        Self::new()
    }
}
