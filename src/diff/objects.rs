//! View, function, and trigger reconciliation.

use crate::catalog::types::*;
use crate::catalog::Catalog;
use crate::diff::edit::Edit;
use crate::diff::DiffResult;
use crate::provider::{Feature, Provider};

pub(super) fn diff_views(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    out: &mut DiffResult,
) {
    for view in desired.views() {
        if view.materialized && !provider.supports(Feature::MaterializedViews) {
            // validate_catalog already rejected this; belt and braces.
            continue;
        }
        match current.get_view(&view.name.key()) {
            None => out.edits.push(Edit::CreateView {
                view: view.clone(),
                or_replace: false,
            }),
            Some(existing) if views_equal(existing, view) => {}
            Some(existing) => {
                // Column-set compatibility for CREATE OR REPLACE cannot be
                // judged from the text alone, so a changed view is always
                // dropped and recreated; materialized views require it.
                out.edits.push(Edit::DropView {
                    name: existing.name.clone(),
                    materialized: existing.materialized,
                });
                out.edits.push(Edit::CreateView {
                    view: view.clone(),
                    or_replace: false,
                });
            }
        }
    }

    for view in current.views() {
        if desired.get_view(&view.name.key()).is_none() {
            out.edits.push(Edit::DropView {
                name: view.name.clone(),
                materialized: view.materialized,
            });
        }
    }
}

fn views_equal(a: &View, b: &View) -> bool {
    a.materialized == b.materialized
        && a.definition == b.definition
        && a.check_option == b.check_option
        && a.security_barrier == b.security_barrier
}

pub(super) fn diff_functions(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    out: &mut DiffResult,
) {
    for f in desired.functions() {
        let supported = match f.kind {
            RoutineKind::Function => provider.supports(Feature::StoredFunctions),
            RoutineKind::Procedure => provider.supports(Feature::StoredProcedures),
        };
        if !supported {
            continue;
        }
        match current.get_function(&f.signature()) {
            None => out.edits.push(Edit::CreateFunction(f.clone())),
            Some(existing) if functions_equal(existing, f) => {}
            Some(existing) => {
                // CREATE OR REPLACE cannot change the return type or
                // parameter names; drop first in that case.
                if existing.returns != f.returns || param_names(existing) != param_names(f) {
                    out.edits.push(Edit::DropFunction(existing.clone()));
                }
                out.edits.push(Edit::CreateFunction(f.clone()));
            }
        }
    }

    for f in current.functions() {
        if desired.get_function(&f.signature()).is_none() {
            out.edits.push(Edit::DropFunction(f.clone()));
        }
    }
}

fn param_names(f: &Function) -> Vec<&str> {
    f.params
        .iter()
        .map(|p| p.name.as_deref().unwrap_or(""))
        .collect()
}

fn functions_equal(a: &Function, b: &Function) -> bool {
    a.kind == b.kind
        && a.params == b.params
        && a.returns == b.returns
        && a.language == b.language
        && a.body == b.body
        && a.volatility == b.volatility
        && a.strict == b.strict
}

pub(super) fn diff_triggers(
    desired: &Catalog,
    current: &Catalog,
    provider: &dyn Provider,
    out: &mut DiffResult,
) {
    if !provider.supports(Feature::Triggers) {
        return;
    }

    for t in desired.triggers() {
        match current.get_trigger(&t.key()) {
            None => out.edits.push(Edit::CreateTrigger(t.clone())),
            Some(existing) if existing.same_definition(t) => {}
            Some(existing) => {
                out.edits.push(Edit::DropTrigger {
                    table: existing.table.clone(),
                    name: existing.name.clone(),
                });
                out.edits.push(Edit::CreateTrigger(t.clone()));
            }
        }
    }

    for t in current.triggers() {
        if desired.get_trigger(&t.key()).is_none() {
            // The trigger vanishes with its table; an explicit drop on a
            // dropped table would fail.
            if desired.has_table(&t.table.key()) {
                out.edits.push(Edit::DropTrigger {
                    table: t.table.clone(),
                    name: t.name.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::CatalogBuilder;
    use crate::diff::diff;
    use crate::provider::PostgresProvider;

    fn view(name: &str, definition: &str, materialized: bool) -> View {
        View {
            name: ObjectName::qualified("public", name),
            definition: definition.to_string(),
            materialized,
            check_option: CheckOption::None,
            security_barrier: false,
        }
    }

    fn with_view(v: View) -> Catalog {
        let mut c = CatalogBuilder::new().build();
        c.insert_view(v);
        c
    }

    #[test]
    fn test_unchanged_view_no_edit() {
        let d = with_view(view("v", "SELECT 1", false));
        let c = with_view(view("v", "SELECT 1", false));
        let result = diff(&d, &c, &PostgresProvider).unwrap();
        assert!(result.edits.is_empty());
    }

    #[test]
    fn test_changed_view_drop_create() {
        let d = with_view(view("v", "SELECT 2", false));
        let c = with_view(view("v", "SELECT 1", false));
        let result = diff(&d, &c, &PostgresProvider).unwrap();
        assert!(matches!(result.edits[0], Edit::DropView { .. }));
        assert!(matches!(result.edits[1], Edit::CreateView { .. }));
    }

    #[test]
    fn test_materialized_flag_change_is_drop_create() {
        let d = with_view(view("v", "SELECT 1", true));
        let c = with_view(view("v", "SELECT 1", false));
        let result = diff(&d, &c, &PostgresProvider).unwrap();
        assert!(matches!(
            result.edits[0],
            Edit::DropView {
                materialized: false,
                ..
            }
        ));
    }

    fn function(body: &str, returns: &str) -> Function {
        Function {
            name: ObjectName::qualified("public", "f"),
            kind: RoutineKind::Function,
            params: vec![],
            returns: Some(TypeName::simple(returns)),
            language: "sql".to_string(),
            body: body.to_string(),
            volatility: Volatility::Volatile,
            strict: false,
        }
    }

    fn with_function(f: Function) -> Catalog {
        let mut c = CatalogBuilder::new().build();
        c.insert_function(f);
        c
    }

    #[test]
    fn test_function_body_change_is_replace_only() {
        let d = with_function(function("SELECT 2", "integer"));
        let c = with_function(function("SELECT 1", "integer"));
        let result = diff(&d, &c, &PostgresProvider).unwrap();
        assert_eq!(result.edits.len(), 1);
        assert!(matches!(result.edits[0], Edit::CreateFunction(_)));
    }

    #[test]
    fn test_function_return_change_drops_first() {
        let d = with_function(function("SELECT 1", "bigint"));
        let c = with_function(function("SELECT 1", "integer"));
        let result = diff(&d, &c, &PostgresProvider).unwrap();
        assert!(matches!(result.edits[0], Edit::DropFunction(_)));
        assert!(matches!(result.edits[1], Edit::CreateFunction(_)));
    }

    fn trigger(timing: TriggerTiming) -> Trigger {
        Trigger {
            name: "trg".to_string(),
            table: ObjectName::qualified("public", "t"),
            timing,
            events: vec![TriggerEvent::Insert],
            level: TriggerLevel::Row,
            when: None,
            function: ObjectName::qualified("public", "f"),
            args: vec![],
        }
    }

    fn with_trigger(t: Trigger) -> Catalog {
        let mut c = CatalogBuilder::new()
            .table("t", |t| {
                t.column("id", "integer", false);
            })
            .build();
        c.insert_trigger(t);
        c
    }

    #[test]
    fn test_trigger_timing_change_drop_create() {
        let d = with_trigger(trigger(TriggerTiming::Before));
        let c = with_trigger(trigger(TriggerTiming::After));
        let result = diff(&d, &c, &PostgresProvider).unwrap();
        assert!(matches!(result.edits[0], Edit::DropTrigger { .. }));
        assert!(matches!(result.edits[1], Edit::CreateTrigger(_)));
    }

    #[test]
    fn test_trigger_drop_skipped_when_table_dropped() {
        let d = CatalogBuilder::new().build();
        let c = with_trigger(trigger(TriggerTiming::After));
        let result = diff(&d, &c, &PostgresProvider).unwrap();
        assert!(result
            .edits
            .iter()
            .all(|e| !matches!(e, Edit::DropTrigger { .. })));
        assert!(result
            .edits
            .iter()
            .any(|e| matches!(e, Edit::DropTable { .. })));
    }
}
