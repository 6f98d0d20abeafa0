//! Test harness for building catalog state.
//!
//! Fluent API for constructing catalogs in differ and resolver tests
//! without going through SQL parsing.
//!
//! # Example
//!
//! ```ignore
//! let catalog = CatalogBuilder::new()
//!     .table("orders", |t| {
//!         t.column("id", "integer", false)
//!             .column("status", "text", true)
//!             .pk(&["id"])
//!             .fk("fk_customer", &["customer_id"], "customers", &["id"]);
//!     })
//!     .build();
//! ```

use crate::catalog::types::*;
use crate::catalog::Catalog;

pub struct CatalogBuilder {
    catalog: Catalog,
    default_schema: String,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::empty(),
            default_schema: "public".to_string(),
        }
    }

    fn name(&self, raw: &str) -> ObjectName {
        match raw.split_once('.') {
            Some((schema, name)) => ObjectName::qualified(schema, name),
            None => ObjectName::qualified(self.default_schema.clone(), raw),
        }
    }

    /// Add a table. The closure configures columns and constraints.
    pub fn table(mut self, name: &str, f: impl FnOnce(&mut TableBuilder)) -> Self {
        let object_name = self.name(name);
        self.catalog
            .insert_schema(object_name.schema.clone().unwrap_or_default());
        let mut builder = TableBuilder::new(object_name);
        f(&mut builder);
        self.catalog.insert_table(builder.build());
        self
    }

    pub fn enum_type(mut self, name: &str, values: &[&str]) -> Self {
        let e = EnumType {
            name: self.name(name),
            values: values.iter().map(|s| s.to_string()).collect(),
        };
        self.catalog.insert_enum(e);
        self
    }

    pub fn view(mut self, name: &str, definition: &str) -> Self {
        let v = View {
            name: self.name(name),
            definition: definition.to_string(),
            materialized: false,
            check_option: CheckOption::None,
            security_barrier: false,
        };
        self.catalog.insert_view(v);
        self
    }

    pub fn sequence(mut self, name: &str) -> Self {
        let s = Sequence::with_defaults(self.name(name));
        self.catalog.insert_sequence(s);
        self
    }

    pub fn extension(mut self, name: &str) -> Self {
        self.catalog.insert_extension(Extension {
            name: name.to_string(),
            schema: None,
        });
        self
    }

    pub fn schema(mut self, name: &str) -> Self {
        self.catalog.insert_schema(name);
        self
    }

    pub fn comment(mut self, kind: CommentKind, target: &str, text: &str) -> Self {
        self.catalog
            .insert_comment(CommentKey::new(kind, target), text.to_string());
        self
    }

    pub fn build(self) -> Catalog {
        self.catalog
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    fn new(name: ObjectName) -> Self {
        Self {
            table: Table::new(name),
        }
    }

    pub fn column(&mut self, name: &str, type_name: &str, nullable: bool) -> &mut Self {
        self.table.columns.push(Column {
            name: name.to_string(),
            type_name: TypeName::simple(type_name),
            nullable,
            default: None,
            serial: None,
            identity: None,
        });
        self
    }

    pub fn column_with_default(
        &mut self,
        name: &str,
        type_name: &str,
        nullable: bool,
        default: &str,
    ) -> &mut Self {
        self.table.columns.push(Column {
            name: name.to_string(),
            type_name: TypeName::simple(type_name),
            nullable,
            default: Some(default.to_string()),
            serial: None,
            identity: None,
        });
        self
    }

    pub fn serial_column(&mut self, name: &str) -> &mut Self {
        self.table.columns.push(Column {
            name: name.to_string(),
            type_name: TypeName::simple("integer"),
            nullable: false,
            default: None,
            serial: Some(SerialKind::Regular),
            identity: None,
        });
        self
    }

    pub fn pk(&mut self, columns: &[&str]) -> &mut Self {
        let name = format!("{}_pkey", self.table.name.name);
        self.table.primary_key = Some(PrimaryKey {
            name,
            columns: columns.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn fk(
        &mut self,
        name: &str,
        columns: &[&str],
        ref_table: &str,
        ref_columns: &[&str],
    ) -> &mut Self {
        let ref_table = match ref_table.split_once('.') {
            Some((schema, table)) => ObjectName::qualified(schema, table),
            None => ObjectName::qualified("public", ref_table),
        };
        self.table.foreign_keys.push(ForeignKey {
            name: name.to_string(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            ref_table,
            ref_columns: ref_columns.iter().map(|s| s.to_string()).collect(),
            on_delete: RefAction::NoAction,
            on_update: RefAction::NoAction,
            deferrable: false,
            initially_deferred: false,
        });
        self
    }

    pub fn unique(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.table.uniques.push(UniqueConstraint {
            name: name.to_string(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn check(&mut self, name: &str, expression: &str) -> &mut Self {
        self.table.checks.push(CheckConstraint {
            name: name.to_string(),
            expression: expression.to_string(),
        });
        self
    }

    pub fn index(&mut self, name: &str, columns: &[&str], unique: bool) -> &mut Self {
        self.table.indexes.push(Index {
            name: name.to_string(),
            table: self.table.name.clone(),
            columns: columns
                .iter()
                .map(|c| IndexColumn {
                    expr: IndexExpr::Column(c.to_string()),
                    direction: SortDirection::Asc,
                    opclass: None,
                })
                .collect(),
            unique,
            method: IndexMethod::Btree,
            predicate: None,
            storage_params: Vec::new(),
            origin: IndexOrigin::Declared,
        });
        self
    }

    fn build(self) -> Table {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_builder_basic() {
        let catalog = CatalogBuilder::new()
            .table("users", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .build();

        assert!(catalog.has_table("public.users"));
        let table = catalog.get_table("public.users").unwrap();
        assert_eq!(table.columns.len(), 1);
        assert!(table.primary_key.is_some());
    }

    #[test]
    fn test_catalog_builder_complex() {
        let catalog = CatalogBuilder::new()
            .table("customers", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .table("orders", |t| {
                t.column("id", "integer", false)
                    .column("customer_id", "integer", false)
                    .column("status", "text", true)
                    .pk(&["id"])
                    .fk("fk_customer", &["customer_id"], "customers", &["id"])
                    .index("idx_status", &["status"], false);
            })
            .build();

        let orders = catalog.get_table("public.orders").unwrap();
        assert_eq!(orders.columns.len(), 3);
        assert_eq!(orders.indexes.len(), 1);
        assert_eq!(orders.foreign_keys.len(), 1);
        assert_eq!(
            orders.foreign_keys[0].ref_table.key(),
            "public.customers"
        );
    }
}
