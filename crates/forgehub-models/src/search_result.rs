//! Deduplication of flattened search results from several forges.

use std::collections::HashMap;

use crate::module::Module;
use crate::release::Release;

/// Group modules by full name and fold later duplicates into the first one.
///
/// Group order follows first appearance, so results from earlier forges
/// keep their position and their releases win on version conflicts.
pub fn merge_modules(results: Vec<Module>) -> Vec<Module> {
    let mut merged: Vec<Module> = Vec::with_capacity(results.len());
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for module in results {
        let full_name = module.full_name();
        match index_by_name.get(&full_name) {
            Some(&index) => merged[index].merge(module),
            None => {
                index_by_name.insert(full_name, merged.len());
                merged.push(module);
            }
        }
    }

    merged
}

/// Drop releases whose full name was already seen, keeping the first.
pub fn merge_releases(results: Vec<Release>) -> Vec<Release> {
    let mut seen = std::collections::HashSet::new();
    results
        .into_iter()
        .filter(|release| seen.insert(release.full_name()))
        .collect()
}
