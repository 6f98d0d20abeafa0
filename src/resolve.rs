//! Foreign-key dependency resolution.
//!
//! Tables must be created parents-first and dropped children-first. When
//! the FK graph has cycles, no such order exists; the resolver picks the
//! set of FKs to defer (added later as `ALTER TABLE ADD CONSTRAINT`,
//! inside the same transaction) so the remaining graph is acyclic.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::types::Table;
use crate::error::{Error, Result};

/// Result of ordering one catalog's table graph.
#[derive(Debug, Clone, Default)]
pub struct TableGraphOrder {
    /// Table keys, parents before children. Reverse it for deletion order.
    pub order: Vec<String>,
    /// `(table key, fk name)` pairs removed from the graph to break
    /// cycles. These FKs must be applied after all involved tables exist.
    pub deferred: Vec<(String, String)>,
    /// Elementary cycles found (for diagnostics).
    pub cycles: Vec<Vec<String>>,
}

impl TableGraphOrder {
    pub fn is_deferred(&self, table_key: &str, fk_name: &str) -> bool {
        self.deferred
            .iter()
            .any(|(t, f)| t == table_key && f == fk_name)
    }
}

/// Compute a creation order for `tables`.
///
/// Edges run child → parent for every FK whose referenced table is also in
/// the set; self-references and external references contribute no edge.
/// Ties are broken by case-sensitive name ascending so the output is
/// reproducible. If cycle-breaking fails to produce a total order, that is
/// a resolver bug and surfaces as [`Error::Dependency`].
pub fn order_tables<'a>(tables: impl Iterator<Item = &'a Table>) -> Result<TableGraphOrder> {
    let tables: Vec<&Table> = tables.collect();
    let keys: BTreeSet<String> = tables.iter().map(|t| t.name.key()).collect();

    // child -> set of parents (dependencies), with the FK names that
    // created each edge.
    let mut parents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut edge_fks: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for key in &keys {
        parents.insert(key.clone(), BTreeSet::new());
    }
    for table in &tables {
        let child = table.name.key();
        for fk in &table.foreign_keys {
            let parent = fk.ref_table.key();
            if parent == child || !keys.contains(&parent) {
                continue;
            }
            parents.get_mut(&child).unwrap().insert(parent.clone());
            edge_fks
                .entry((child.clone(), parent.clone()))
                .or_default()
                .push(fk.name.clone());
        }
    }

    if let Some(order) = kahn(&keys, &parents) {
        return Ok(TableGraphOrder {
            order,
            deferred: Vec::new(),
            cycles: Vec::new(),
        });
    }

    // Cycle: collect every table participating in one, defer every FK
    // whose both endpoints are inside the cycle set.
    let cycles = find_cycles(&keys, &parents);
    let cycle_nodes: BTreeSet<&String> = cycles.iter().flatten().collect();

    let mut deferred = Vec::new();
    let mut pruned = parents.clone();
    for table in &tables {
        let child = table.name.key();
        if !cycle_nodes.contains(&child) {
            continue;
        }
        for fk in &table.foreign_keys {
            let parent = fk.ref_table.key();
            if parent != child && cycle_nodes.contains(&parent) {
                deferred.push((child.clone(), fk.name.clone()));
                pruned.get_mut(&child).unwrap().remove(&parent);
            }
        }
    }
    deferred.sort();
    deferred.dedup();

    match kahn(&keys, &pruned) {
        Some(order) => Ok(TableGraphOrder {
            order,
            deferred,
            cycles,
        }),
        None => Err(Error::Dependency { cycles }),
    }
}

/// Kahn's algorithm with deterministic tie-breaking. Returns `None` when
/// the graph has a cycle.
fn kahn(
    keys: &BTreeSet<String>,
    parents: &BTreeMap<String, BTreeSet<String>>,
) -> Option<Vec<String>> {
    // parent -> children, for decrementing after emission.
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    for key in keys {
        in_degree.insert(key, parents[key].len());
        for parent in &parents[key] {
            children.entry(parent).or_default().push(key);
        }
    }

    // BTreeSet queue: always pops the lexically smallest ready node.
    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(k, _)| *k)
        .collect();

    let mut order = Vec::with_capacity(keys.len());
    while let Some(&node) = ready.iter().next() {
        ready.remove(node);
        order.push(node.to_string());
        if let Some(kids) = children.get(node) {
            for child in kids {
                let d = in_degree.get_mut(child).unwrap();
                *d -= 1;
                if *d == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    if order.len() == keys.len() {
        Some(order)
    } else {
        None
    }
}

/// Find elementary cycles by DFS with an explicit recursion stack.
fn find_cycles(
    keys: &BTreeSet<String>,
    parents: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        InStack,
        Done,
    }

    let mut state: BTreeMap<&str, State> = keys.iter().map(|k| (k.as_str(), State::Unvisited)).collect();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    fn dfs<'a>(
        node: &'a str,
        parents: &'a BTreeMap<String, BTreeSet<String>>,
        state: &mut BTreeMap<&'a str, State>,
        stack: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        state.insert(node, State::InStack);
        stack.push(node);

        if let Some(next) = parents.get(node) {
            for parent in next {
                match state.get(parent.as_str()) {
                    Some(State::Unvisited) => dfs(parent, parents, state, stack, cycles),
                    Some(State::InStack) => {
                        // Everything from `parent`'s stack position to the
                        // top forms a cycle.
                        let pos = stack.iter().position(|n| *n == parent).unwrap();
                        let cycle: Vec<String> =
                            stack[pos..].iter().map(|s| s.to_string()).collect();
                        cycles.push(cycle);
                    }
                    _ => {}
                }
            }
        }

        stack.pop();
        state.insert(node, State::Done);
    }

    let mut stack = Vec::new();
    let node_list: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
    for node in node_list {
        if state[node] == State::Unvisited {
            dfs(node, parents, &mut state, &mut stack, &mut cycles);
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::CatalogBuilder;
    use crate::catalog::Catalog;

    fn order(catalog: &Catalog) -> TableGraphOrder {
        order_tables(catalog.tables()).expect("resolver should not fail")
    }

    #[test]
    fn test_acyclic_chain_parents_first() {
        let catalog = CatalogBuilder::new()
            .table("orders", |t| {
                t.column("id", "integer", false)
                    .column("customer_id", "integer", false)
                    .fk("fk_c", &["customer_id"], "customers", &["id"]);
            })
            .table("customers", |t| {
                t.column("id", "integer", false);
            })
            .build();

        let res = order(&catalog);
        assert_eq!(res.order, vec!["public.customers", "public.orders"]);
        assert!(res.deferred.is_empty());
        assert!(res.cycles.is_empty());
    }

    #[test]
    fn test_two_table_cycle_defers_fks() {
        let catalog = CatalogBuilder::new()
            .table("a", |t| {
                t.column("id", "integer", false)
                    .column("b_id", "integer", true)
                    .fk("fkb", &["b_id"], "b", &["id"]);
            })
            .table("b", |t| {
                t.column("id", "integer", false)
                    .column("a_id", "integer", true)
                    .fk("fka", &["a_id"], "a", &["id"]);
            })
            .build();

        let res = order(&catalog);
        assert_eq!(res.order.len(), 2);
        assert_eq!(
            res.deferred,
            vec![
                ("public.a".to_string(), "fkb".to_string()),
                ("public.b".to_string(), "fka".to_string()),
            ]
        );
        assert!(!res.cycles.is_empty());
    }

    #[test]
    fn test_three_table_cycle() {
        let catalog = CatalogBuilder::new()
            .table("a", |t| {
                t.column("id", "integer", false)
                    .fk("fk_ab", &["b_id"], "b", &["id"]);
            })
            .table("b", |t| {
                t.column("id", "integer", false)
                    .fk("fk_bc", &["c_id"], "c", &["id"]);
            })
            .table("c", |t| {
                t.column("id", "integer", false)
                    .fk("fk_ca", &["a_id"], "a", &["id"]);
            })
            .build();

        let res = order(&catalog);
        assert_eq!(res.order.len(), 3);
        assert_eq!(res.deferred.len(), 3);
    }

    #[test]
    fn test_self_reference_not_deferred() {
        let catalog = CatalogBuilder::new()
            .table("employees", |t| {
                t.column("id", "integer", false)
                    .column("manager_id", "integer", true)
                    .fk("fk_mgr", &["manager_id"], "employees", &["id"]);
            })
            .build();

        let res = order(&catalog);
        assert_eq!(res.order, vec!["public.employees"]);
        assert!(res.deferred.is_empty());
    }

    #[test]
    fn test_external_reference_ignored() {
        let catalog = CatalogBuilder::new()
            .table("t", |t| {
                t.column("id", "integer", false)
                    .fk("fk_ext", &["x"], "unmanaged.elsewhere", &["id"]);
            })
            .build();

        let res = order(&catalog);
        assert_eq!(res.order, vec!["public.t"]);
        assert!(res.deferred.is_empty());
    }

    #[test]
    fn test_cycle_plus_acyclic_tail() {
        // a <-> b cycle, c depends on a: c must come after a either way.
        let catalog = CatalogBuilder::new()
            .table("a", |t| {
                t.column("id", "integer", false)
                    .fk("fk_ab", &["b_id"], "b", &["id"]);
            })
            .table("b", |t| {
                t.column("id", "integer", false)
                    .fk("fk_ba", &["a_id"], "a", &["id"]);
            })
            .table("c", |t| {
                t.column("id", "integer", false)
                    .fk("fk_ca", &["a_id"], "a", &["id"]);
            })
            .build();

        let res = order(&catalog);
        let pos = |k: &str| res.order.iter().position(|x| x == k).unwrap();
        assert!(pos("public.a") < pos("public.c"));
        // Only the cycle edges are deferred, not c's FK.
        assert_eq!(res.deferred.len(), 2);
        assert!(!res.is_deferred("public.c", "fk_ca"));
    }

    #[test]
    fn test_deterministic_tie_break_by_name() {
        let catalog = CatalogBuilder::new()
            .table("zebra", |t| {
                t.column("id", "integer", false);
            })
            .table("apple", |t| {
                t.column("id", "integer", false);
            })
            .table("mango", |t| {
                t.column("id", "integer", false);
            })
            .build();

        let res = order(&catalog);
        assert_eq!(
            res.order,
            vec!["public.apple", "public.mango", "public.zebra"]
        );
    }

    #[test]
    fn test_repeated_runs_identical() {
        let build = || {
            CatalogBuilder::new()
                .table("a", |t| {
                    t.column("id", "integer", false)
                        .fk("fk_ab", &["b_id"], "b", &["id"]);
                })
                .table("b", |t| {
                    t.column("id", "integer", false)
                        .fk("fk_ba", &["a_id"], "a", &["id"]);
                })
                .build()
        };
        let r1 = order(&build());
        let r2 = order(&build());
        assert_eq!(r1.order, r2.order);
        assert_eq!(r1.deferred, r2.deferred);
    }
}
