//! The closed set of reconciliation actions.
//!
//! The differ emits [`Edit`] values; the provider renders them; the plan
//! assembler orders them by [`Phase`] and partitions them into execution
//! buckets. One arm per (object kind, operation) pair — adding an object
//! kind means adding arms here and rendering for them in each provider.

use crate::catalog::types::*;

/// Per-table ALTER clause. A table's clauses are batched into a single
/// `ALTER TABLE` statement when the dialect permits.
#[derive(Debug, Clone, PartialEq)]
pub enum TableAction {
    AddColumn(Column),
    DropColumn {
        name: String,
    },
    /// Type change; `using` carries an explicit cast expression when the
    /// families differ.
    AlterColumnType {
        name: String,
        type_name: TypeName,
        using: Option<String>,
    },
    SetNotNull {
        name: String,
    },
    DropNotNull {
        name: String,
    },
    SetDefault {
        name: String,
        expr: String,
    },
    DropDefault {
        name: String,
    },
    AddPrimaryKey(PrimaryKey),
    AddUnique(UniqueConstraint),
    AddCheck(CheckConstraint),
    AddForeignKey(ForeignKey),
    /// Shared drop for PK/UNIQUE/CHECK/FK — constraints are dropped by
    /// name. Rendered with IF EXISTS so that drops cascaded by an earlier
    /// `DROP TABLE` in the same plan do not fail the transaction.
    DropConstraint {
        name: String,
    },
}

impl TableAction {
    /// Affected column or constraint name, for deterministic ordering.
    pub fn target(&self) -> &str {
        match self {
            TableAction::AddColumn(c) => &c.name,
            TableAction::DropColumn { name } => name,
            TableAction::AlterColumnType { name, .. } => name,
            TableAction::SetNotNull { name } => name,
            TableAction::DropNotNull { name } => name,
            TableAction::SetDefault { name, .. } => name,
            TableAction::DropDefault { name } => name,
            TableAction::AddPrimaryKey(pk) => &pk.name,
            TableAction::AddUnique(u) => &u.name,
            TableAction::AddCheck(c) => &c.name,
            TableAction::AddForeignKey(fk) => &fk.name,
            TableAction::DropConstraint { name } => name,
        }
    }
}

/// One atomic reconciliation action.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    CreateSchema {
        name: String,
    },
    DropSchema {
        name: String,
    },

    CreateExtension(Extension),
    /// Rendered with CASCADE; the differ attaches a warning (see plan
    /// warnings) because the cascade may reach user objects.
    DropExtension {
        name: String,
    },

    CreateEnum(EnumType),
    /// One appended label. Non-transactional in PostgreSQL; lands in the
    /// concurrent tail.
    AddEnumValue {
        name: ObjectName,
        value: String,
    },
    /// Only emitted when no column references the type any more.
    DropEnum {
        name: ObjectName,
    },

    CreateSequence(Sequence),
    AlterSequence(Sequence),
    DropSequence {
        name: ObjectName,
    },

    /// `skipped_fks` are FK names withheld from the inline definition
    /// because they participate in a cycle; they follow as deferred
    /// [`Edit::AddForeignKey`] edits.
    CreateTable {
        table: Table,
        skipped_fks: Vec<String>,
    },
    DropTable {
        name: ObjectName,
    },
    AlterTable {
        name: ObjectName,
        actions: Vec<TableAction>,
    },

    /// Standalone FK addition used for cycle-breaking. Lives in the
    /// deferred bucket, inside the same transaction as the table edits.
    AddForeignKey {
        table: ObjectName,
        fk: ForeignKey,
    },

    /// Standalone FK drop emitted before table drops when the drop graph
    /// has cycles, so `DROP TABLE` statements do not depend on removal
    /// order.
    DropForeignKey {
        table: ObjectName,
        name: String,
    },

    CreateIndex {
        index: Index,
        /// Built CONCURRENTLY (concurrent tail) when the index lands on a
        /// pre-existing table and the provider supports it.
        concurrently: bool,
    },
    DropIndex {
        /// Schema-qualified index name.
        name: ObjectName,
    },

    /// `CREATE [OR REPLACE] VIEW` / `CREATE MATERIALIZED VIEW`.
    CreateView {
        view: View,
        or_replace: bool,
    },
    DropView {
        name: ObjectName,
        materialized: bool,
    },

    /// Always `CREATE OR REPLACE`.
    CreateFunction(Function),
    DropFunction(Function),

    CreateTrigger(Trigger),
    DropTrigger {
        table: ObjectName,
        name: String,
    },

    /// `COMMENT ON … IS <text|NULL>`.
    SetComment {
        key: CommentKey,
        text: Option<String>,
    },
}

/// Execution phases in the order of §execution: the plan assembler sorts
/// edits by `(phase, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    SchemaCreate,
    ExtensionCreate,
    EnumCreate,
    SequenceCreate,
    ConstraintPreDrop,
    TableDrop,
    TableCreate,
    TableAlter,
    DeferredConstraint,
    IndexDrop,
    IndexCreate,
    SequenceDrop,
    EnumDrop,
    Function,
    View,
    Trigger,
    Comment,
    ExtensionDrop,
    SchemaDrop,
}

impl Edit {
    pub fn phase(&self) -> Phase {
        match self {
            Edit::CreateSchema { .. } => Phase::SchemaCreate,
            Edit::DropSchema { .. } => Phase::SchemaDrop,
            Edit::CreateExtension(_) => Phase::ExtensionCreate,
            Edit::DropExtension { .. } => Phase::ExtensionDrop,
            Edit::CreateEnum(_) | Edit::AddEnumValue { .. } => Phase::EnumCreate,
            Edit::DropEnum { .. } => Phase::EnumDrop,
            Edit::CreateSequence(_) | Edit::AlterSequence(_) => Phase::SequenceCreate,
            Edit::DropSequence { .. } => Phase::SequenceDrop,
            Edit::CreateTable { .. } => Phase::TableCreate,
            Edit::DropTable { .. } => Phase::TableDrop,
            Edit::AlterTable { .. } => Phase::TableAlter,
            Edit::AddForeignKey { .. } => Phase::DeferredConstraint,
            Edit::DropForeignKey { .. } => Phase::ConstraintPreDrop,
            Edit::CreateIndex { .. } => Phase::IndexCreate,
            Edit::DropIndex { .. } => Phase::IndexDrop,
            Edit::CreateView { .. } | Edit::DropView { .. } => Phase::View,
            Edit::CreateFunction(_) | Edit::DropFunction(_) => Phase::Function,
            Edit::CreateTrigger(_) | Edit::DropTrigger { .. } => Phase::Trigger,
            Edit::SetComment { .. } => Phase::Comment,
        }
    }

    /// Name key for tie-breaking within a phase.
    pub fn sort_name(&self) -> String {
        match self {
            Edit::CreateSchema { name } | Edit::DropSchema { name } => name.clone(),
            Edit::CreateExtension(e) => e.name.clone(),
            Edit::DropExtension { name } => name.clone(),
            Edit::CreateEnum(e) => e.name.key(),
            Edit::AddEnumValue { name, value } => format!("{}.{}", name.key(), value),
            Edit::DropEnum { name } => name.key(),
            Edit::CreateSequence(s) | Edit::AlterSequence(s) => s.name.key(),
            Edit::DropSequence { name } => name.key(),
            Edit::CreateTable { table, .. } => table.name.key(),
            Edit::DropTable { name } => name.key(),
            Edit::AlterTable { name, .. } => name.key(),
            Edit::AddForeignKey { table, fk } => format!("{}.{}", table.key(), fk.name),
            Edit::DropForeignKey { table, name } => format!("{}.{}", table.key(), name),
            Edit::CreateIndex { index, .. } => index.name.clone(),
            Edit::DropIndex { name } => name.key(),
            Edit::CreateView { view, .. } => view.name.key(),
            Edit::DropView { name, .. } => name.key(),
            Edit::CreateFunction(f) | Edit::DropFunction(f) => f.signature(),
            Edit::CreateTrigger(t) => t.key(),
            Edit::DropTrigger { table, name } => format!("{}.{}", table.key(), name),
            Edit::SetComment { key, .. } => format!("{} {}", key.kind, key.target),
        }
    }

    /// Drop-before-create within the same phase: views, functions and
    /// triggers interleave drops and creates in one phase, and the drop of
    /// a replaced object must precede its create.
    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            Edit::DropSchema { .. }
                | Edit::DropExtension { .. }
                | Edit::DropEnum { .. }
                | Edit::DropSequence { .. }
                | Edit::DropTable { .. }
                | Edit::DropIndex { .. }
                | Edit::DropView { .. }
                | Edit::DropFunction(_)
                | Edit::DropTrigger { .. }
                | Edit::DropForeignKey { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering_matches_execution_order() {
        assert!(Phase::SchemaCreate < Phase::ExtensionCreate);
        assert!(Phase::ExtensionCreate < Phase::EnumCreate);
        assert!(Phase::EnumCreate < Phase::SequenceCreate);
        assert!(Phase::SequenceCreate < Phase::ConstraintPreDrop);
        assert!(Phase::ConstraintPreDrop < Phase::TableDrop);
        assert!(Phase::TableCreate < Phase::TableAlter);
        assert!(Phase::TableAlter < Phase::DeferredConstraint);
        assert!(Phase::DeferredConstraint < Phase::IndexDrop);
        assert!(Phase::IndexCreate < Phase::SequenceDrop);
        assert!(Phase::SequenceDrop < Phase::EnumDrop);
        assert!(Phase::DeferredConstraint < Phase::EnumDrop);
        assert!(Phase::EnumDrop < Phase::Function);
        assert!(Phase::Function < Phase::View);
        assert!(Phase::View < Phase::Trigger);
        assert!(Phase::Trigger < Phase::Comment);
        assert!(Phase::Comment < Phase::ExtensionDrop);
        assert!(Phase::ExtensionDrop < Phase::SchemaDrop);
    }

    #[test]
    fn test_edit_phases() {
        let edit = Edit::CreateSchema {
            name: "app".to_string(),
        };
        assert_eq!(edit.phase(), Phase::SchemaCreate);

        let edit = Edit::DropTable {
            name: ObjectName::qualified("public", "t"),
        };
        assert_eq!(edit.phase(), Phase::TableDrop);
        assert!(edit.is_drop());
    }
}
