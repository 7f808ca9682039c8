//! Cycle detection over the pipeline graph.
//!
//! The walk is iterative: each open output keeps the dependencies it has yet
//! to explore, so deep synthesis chains never grow the call stack. Reaching
//! an output that is still open closes a cycle.

use std::collections::HashMap;
use std::vec;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::trace;

use super::BuildEdge;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mark {
    Open,
    Done,
}

pub(crate) struct CycleDetectionReport {
    pub(crate) cycle: Option<Vec<Utf8PathBuf>>,
    pub(crate) missing_dependencies: Vec<(Utf8PathBuf, Utf8PathBuf)>,
}

/// Walk every edge and report the first cycle found, if any.
///
/// Roots are taken in sorted order so the same graph always reports the same
/// cycle. Dependencies no edge produces are collected along the way.
pub(crate) fn analyse(targets: &HashMap<Utf8PathBuf, BuildEdge>) -> CycleDetectionReport {
    let mut walk = Walk {
        targets,
        marks: HashMap::new(),
        missing: Vec::new(),
    };
    let mut roots: Vec<&Utf8Path> = targets.keys().map(Utf8PathBuf::as_path).collect();
    roots.sort_unstable();
    let cycle = roots.into_iter().find_map(|root| walk.explore(root));
    CycleDetectionReport {
        cycle,
        missing_dependencies: walk.missing,
    }
}

/// An open output and the dependencies still to explore from it.
type Frame<'g> = (&'g Utf8Path, vec::IntoIter<&'g Utf8Path>);

struct Walk<'g> {
    targets: &'g HashMap<Utf8PathBuf, BuildEdge>,
    marks: HashMap<&'g Utf8Path, Mark>,
    missing: Vec<(Utf8PathBuf, Utf8PathBuf)>,
}

impl<'g> Walk<'g> {
    /// Explore everything reachable from `root`; returns the first cycle met.
    fn explore(&mut self, root: &'g Utf8Path) -> Option<Vec<Utf8PathBuf>> {
        if self.marks.contains_key(root) {
            return None;
        }
        let mut open: Vec<Frame<'g>> = Vec::new();
        self.open(root, &mut open);
        while let Some((current, pending)) = open.last_mut() {
            let finished = *current;
            match pending.next() {
                None => {
                    self.marks.insert(finished, Mark::Done);
                    open.pop();
                }
                Some(dep) => match self.marks.get(dep) {
                    Some(Mark::Done) => {}
                    Some(Mark::Open) => return Some(close_loop(&open, dep)),
                    None => self.open(dep, &mut open),
                },
            }
        }
        None
    }

    fn open(&mut self, output: &'g Utf8Path, open: &mut Vec<Frame<'g>>) {
        let targets = self.targets;
        self.marks.insert(output, Mark::Open);
        let mut next = Vec::new();
        for dep in targets.get(output).into_iter().flat_map(BuildEdge::dependencies) {
            if targets.contains_key(dep.as_path()) {
                next.push(dep.as_path());
            } else {
                trace!(missing = %dep, dependent = %output, "dependency is not produced by any edge");
                self.missing.push((output.to_path_buf(), dep.clone()));
            }
        }
        open.push((output, next.into_iter()));
    }
}

/// The cycle running from `back_to` along the open path and back again.
fn close_loop(open: &[Frame<'_>], back_to: &Utf8Path) -> Vec<Utf8PathBuf> {
    let start = open
        .iter()
        .rposition(|(output, _)| *output == back_to)
        .unwrap_or_default();
    let ring = open
        .iter()
        .skip(start)
        .map(|(output, _)| output.to_path_buf())
        .collect();
    closed_from_smallest(ring)
}

/// Rotate `ring` (each member once) to start at its smallest member and
/// repeat that member at the end.
fn closed_from_smallest(mut ring: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let smallest = ring
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    ring.rotate_left(smallest);
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    ring
}
