//! Vulnerability annotation.
//!
//! A node matches a catalog key when its lowercased name contains the key,
//! so `lodash.merge` matches `lodash`. Substring matching is deliberate: it
//! catches renamed and scoped variants at the price of occasional false
//! positives.

use tracing::debug;

use super::catalog::VulnerabilityCatalog;
use crate::model::{Dependency, DependencyTree};

/// Attaches matching catalog records to every node below the root and
/// returns the number of vulnerable nodes.
///
/// A record already attached to a node (same id) is not attached twice, so
/// running the pass again leaves the tree unchanged.
pub fn annotate(tree: &mut DependencyTree, catalog: &VulnerabilityCatalog) -> usize {
    if catalog.is_empty() {
        return 0;
    }
    tree.root
        .children
        .iter_mut()
        .map(|child| annotate_node(child, catalog))
        .sum()
}

fn annotate_node(node: &mut Dependency, catalog: &VulnerabilityCatalog) -> usize {
    let name = node.name.to_lowercase();
    for (key, vulnerabilities) in catalog.iter() {
        if !name.contains(key) {
            continue;
        }
        for vuln in vulnerabilities {
            if node.vulnerabilities.iter().any(|v| v.id == vuln.id) {
                continue;
            }
            debug!(package = %node.name, version = %node.version, id = %vuln.id, "Vulnerability matched");
            node.vulnerabilities.push(vuln.clone());
        }
    }

    let own = usize::from(node.is_vulnerable());
    own + node
        .children
        .iter_mut()
        .map(|child| annotate_node(child, catalog))
        .sum::<usize>()
}
