//! Category-to-model routing
//!
//! The routing table maps each task category to a target model id. An
//! entry is only usable when its target is currently installed; a category
//! whose target is not installed resolves to nothing and the caller skips
//! the prompt rather than substituting a default model.

use std::collections::{HashMap, HashSet};

use crate::catalog::CategoryLabel;

/// Mapping from category to target model id, built once per run
pub type RoutingTable = HashMap<CategoryLabel, String>;

/// Resolve a category to an installed target model
///
/// Filters the table to entries whose target is installed before lookup.
/// `None` is a per-prompt routing miss, logged by the caller and non-fatal
/// to the run. Deterministic for fixed inputs.
#[must_use]
pub fn resolve<'a>(
    category: CategoryLabel,
    table: &'a RoutingTable,
    installed: &HashSet<String>,
) -> Option<&'a str> {
    table
        .get(&category)
        .filter(|model_id| installed.contains(*model_id))
        .map(String::as_str)
}

/// Count table entries whose target is installed
///
/// A routed run requires at least one usable entry; zero usable entries is
/// a whole-run configuration mismatch.
#[must_use]
pub fn usable_entries(table: &RoutingTable, installed: &HashSet<String>) -> usize {
    table
        .values()
        .filter(|model_id| installed.contains(*model_id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    fn table(entries: &[(CategoryLabel, &str)]) -> RoutingTable {
        entries
            .iter()
            .map(|(c, m)| (*c, (*m).to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_installed_target() {
        let table = table(&[
            (CategoryLabel::Factual, "M1"),
            (CategoryLabel::Reasoning, "M2"),
        ]);
        let installed = installed(&["M1", "M2"]);
        assert_eq!(
            resolve(CategoryLabel::Factual, &table, &installed),
            Some("M1")
        );
        assert_eq!(
            resolve(CategoryLabel::Reasoning, &table, &installed),
            Some("M2")
        );
    }

    #[test]
    fn test_resolve_uninstalled_target_is_a_miss() {
        // Table routes Reasoning to M2, but only M1 is installed.
        let table = table(&[
            (CategoryLabel::Factual, "M1"),
            (CategoryLabel::Reasoning, "M2"),
        ]);
        let installed = installed(&["M1"]);
        assert_eq!(resolve(CategoryLabel::Reasoning, &table, &installed), None);
    }

    #[test]
    fn test_resolve_unmapped_category_is_a_miss() {
        let table = table(&[(CategoryLabel::Factual, "M1")]);
        let installed = installed(&["M1"]);
        assert_eq!(resolve(CategoryLabel::Creative, &table, &installed), None);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let table = table(&[(CategoryLabel::Factual, "M1")]);
        let installed = installed(&["M1"]);
        let first = resolve(CategoryLabel::Factual, &table, &installed);
        for _ in 0..10 {
            assert_eq!(resolve(CategoryLabel::Factual, &table, &installed), first);
        }
    }

    #[test]
    fn test_usable_entries_counts_installed_targets_only() {
        let table = table(&[
            (CategoryLabel::Factual, "M1"),
            (CategoryLabel::Reasoning, "M2"),
            (CategoryLabel::Creative, "M3"),
        ]);
        assert_eq!(usable_entries(&table, &installed(&["M1", "M3"])), 2);
        assert_eq!(usable_entries(&table, &installed(&[])), 0);
        assert_eq!(usable_entries(&RoutingTable::new(), &installed(&["M1"])), 0);
    }
}
