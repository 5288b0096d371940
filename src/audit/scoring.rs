//! Severity aggregation and scoring.

use crate::model::{Dependency, DependencyTree, Severity};

const CRITICAL_PENALTY: u32 = 20;
const HIGH_PENALTY: u32 = 10;
const MEDIUM_PENALTY: u32 = 5;
const LOW_PENALTY: u32 = 2;

/// Recomputes the tree's vulnerability counters in one walk.
///
/// Each vulnerable node counts once, in the bucket of its highest severity.
/// Counters are reset first, so repeated calls give the same result.
pub fn aggregate(tree: &mut DependencyTree) {
    tree.vulnerable = 0;
    tree.critical = 0;
    tree.high = 0;
    tree.medium = 0;
    tree.low = 0;

    let mut stack: Vec<&Dependency> = tree.root.children.iter().collect();
    let mut counts = [0usize; 5];
    while let Some(node) = stack.pop() {
        counts[node.severity() as usize] += 1;
        stack.extend(node.children.iter());
    }

    tree.low = counts[Severity::Low as usize];
    tree.medium = counts[Severity::Medium as usize];
    tree.high = counts[Severity::High as usize];
    tree.critical = counts[Severity::Critical as usize];
    tree.vulnerable = tree.low + tree.medium + tree.high + tree.critical;
}

/// `100 - 20*critical - 10*high - 5*medium - 2*low`, clamped to `0..=100`.
pub fn score(critical: usize, high: usize, medium: usize, low: usize) -> u8 {
    let penalty = [
        (critical, CRITICAL_PENALTY),
        (high, HIGH_PENALTY),
        (medium, MEDIUM_PENALTY),
        (low, LOW_PENALTY),
    ]
    .iter()
    .fold(0u32, |acc, &(count, weight)| {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        acc.saturating_add(count.saturating_mul(weight))
    });
    100u32.saturating_sub(penalty) as u8
}

pub fn tree_score(tree: &DependencyTree) -> u8 {
    score(tree.critical, tree.high, tree.medium, tree.low)
}
