//! Plan display.
//!
//! Renders a [`MigrationPlan`] for the terminal or as JSON. Kept separate
//! from the core so the format can change without touching planning.

use std::fmt::Write as FmtWrite;

use crate::plan::MigrationPlan;

/// Format the plan as human-readable text.
///
/// ```text
/// Plan: 3 statement(s)
///
/// Transaction:
///   1. CREATE TABLE users (...)
///   2. CREATE INDEX ...
///
/// After commit (non-transactional):
///   3. ALTER TYPE status ADD VALUE 'c'
/// ```
pub fn format_plan(plan: &MigrationPlan) -> String {
    if !plan.has_changes() {
        return "No changes. The database matches the desired schema.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Plan: {} statement(s)", plan.statement_count());

    for warning in &plan.warnings {
        let _ = writeln!(out, "warning: {}", warning);
    }

    let mut counter = 0usize;
    let mut section = |title: &str, statements: &[String], out: &mut String| {
        if statements.is_empty() {
            return;
        }
        let _ = writeln!(out, "\n{}:", title);
        for statement in statements {
            counter += 1;
            let _ = writeln!(out, "  {}. {}", counter, statement);
        }
    };

    section("Transaction", &plan.transactional, &mut out);
    section("Transaction (deferred constraints)", &plan.deferred, &mut out);
    section("After commit (non-transactional)", &plan.concurrent, &mut out);

    out
}

/// Format the plan as JSON for machine consumption.
pub fn format_plan_json(plan: &MigrationPlan) -> String {
    serde_json::to_string_pretty(plan).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MigrationPlan {
        MigrationPlan {
            transactional: vec!["CREATE TABLE t (id integer)".to_string()],
            deferred: vec!["ALTER TABLE t ADD CONSTRAINT fk ...".to_string()],
            concurrent: vec!["ALTER TYPE s ADD VALUE 'x'".to_string()],
            warnings: vec!["something to know".to_string()],
        }
    }

    #[test]
    fn test_format_empty_plan() {
        let text = format_plan(&MigrationPlan::default());
        assert!(text.contains("No changes"));
    }

    #[test]
    fn test_format_sections_and_numbering() {
        let text = format_plan(&sample());
        assert!(text.contains("Plan: 3 statement(s)"));
        assert!(text.contains("warning: something to know"));
        assert!(text.contains("1. CREATE TABLE"));
        assert!(text.contains("2. ALTER TABLE"));
        assert!(text.contains("3. ALTER TYPE"));
        assert!(text.contains("After commit"));
    }

    #[test]
    fn test_format_json_round_trips() {
        let json = format_plan_json(&sample());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["transactional"].as_array().unwrap().len(), 1);
        assert_eq!(value["concurrent"][0], "ALTER TYPE s ADD VALUE 'x'");
    }
}
