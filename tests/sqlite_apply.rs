//! End-to-end apply tests against in-memory SQLite.
//!
//! These exercise the full loop — parse, introspect, diff, render, apply,
//! re-introspect — with a real database engine, including the table
//! rebuild path and transactional-bucket atomicity.

use schema_sync::exec::{self, ExecuteOptions, NoPrompt};
use schema_sync::provider::{DbClient, Dialect, Provider, SqliteProvider};
use schema_sync::MigrationPlan;

struct Harness {
    provider: SqliteProvider,
    client: Box<dyn DbClient>,
    schemas: Vec<String>,
}

impl Harness {
    fn new() -> Self {
        let provider = SqliteProvider;
        let client = provider.connect(":memory:").expect("open in-memory db");
        Self {
            provider,
            client,
            schemas: vec!["public".to_string()],
        }
    }

    fn plan(&mut self, desired_sql: &str) -> MigrationPlan {
        let decls = schema_sync::parse_sql(desired_sql).expect("parse");
        let desired = schema_sync::assemble(decls, &self.schemas).expect("assemble");
        let current = self
            .provider
            .introspect(self.client.as_mut(), &self.schemas)
            .expect("introspect");
        schema_sync::build_plan(&desired, &current, &self.provider).expect("build_plan")
    }

    fn apply(&mut self, desired_sql: &str) -> MigrationPlan {
        let plan = self.plan(desired_sql);
        let options = ExecuteOptions {
            auto_approve: true,
            lock: None,
        };
        exec::apply(
            self.client.as_mut(),
            &self.provider,
            &plan,
            &options,
            &mut NoPrompt,
        )
        .expect("apply");
        plan
    }

    fn execute(&mut self, sql: &str) {
        self.client.execute(sql).expect("execute");
    }

    fn scalar(&mut self, sql: &str) -> i64 {
        let rows = self.client.query(sql).expect("query");
        rows[0][0].as_i64().expect("integer scalar")
    }
}

#[test]
fn sqlite_url_sniffing() {
    assert_eq!(Dialect::from_url(":memory:"), Some(Dialect::Sqlite));
}

#[test]
fn apply_then_plan_is_empty() {
    let mut h = Harness::new();
    let sql = "
        CREATE TABLE customers (
            id integer PRIMARY KEY,
            email text NOT NULL,
            created_at text DEFAULT 'unknown',
            CONSTRAINT customers_email_key UNIQUE (email)
        );
        CREATE TABLE orders (
            id integer PRIMARY KEY,
            customer_id integer NOT NULL,
            amount numeric(10,2),
            CONSTRAINT orders_customer_fkey FOREIGN KEY (customer_id)
                REFERENCES customers(id) ON DELETE CASCADE,
            CONSTRAINT orders_amount_check CHECK (amount > 0)
        );
        CREATE INDEX idx_orders_customer ON orders (customer_id);
        CREATE VIEW customer_orders AS SELECT customer_id, amount FROM orders;
    ";
    let first = h.apply(sql);
    assert!(first.has_changes());

    let second = h.plan(sql);
    assert!(
        !second.has_changes(),
        "re-plan after apply should be empty, got {:#?}",
        second
    );
}

#[test]
fn add_column_round_trip() {
    let mut h = Harness::new();
    h.apply("CREATE TABLE t (id integer PRIMARY KEY);");
    h.execute("INSERT INTO t (id) VALUES (1)");

    let plan = h.apply("CREATE TABLE t (id integer PRIMARY KEY, note text DEFAULT 'n/a');");
    assert!(plan
        .transactional
        .iter()
        .any(|s| s.contains("ADD COLUMN note")));

    // Existing data survives and picks up the default.
    assert_eq!(h.scalar("SELECT count(*) FROM t WHERE note = 'n/a'"), 1);
    assert!(!h.plan("CREATE TABLE t (id integer PRIMARY KEY, note text DEFAULT 'n/a');")
        .has_changes());
}

#[test]
fn drop_column_rebuild_preserves_data() {
    let mut h = Harness::new();
    h.apply("CREATE TABLE t (id integer PRIMARY KEY, keep text, legacy text);");
    h.execute("INSERT INTO t (id, keep, legacy) VALUES (1, 'yes', 'old')");

    let plan = h.apply("CREATE TABLE t (id integer PRIMARY KEY, keep text);");
    // Rebuild, not a native DROP COLUMN.
    assert!(plan.transactional.iter().any(|s| s.contains("__rebuild")));

    assert_eq!(h.scalar("SELECT count(*) FROM t"), 1);
    assert_eq!(h.scalar("SELECT count(*) FROM t WHERE keep = 'yes'"), 1);
    let cols = h.scalar(
        "SELECT count(*) FROM pragma_table_info('t') WHERE name = 'legacy'",
    );
    assert_eq!(cols, 0, "legacy column should be gone");

    assert!(!h.plan("CREATE TABLE t (id integer PRIMARY KEY, keep text);").has_changes());
}

#[test]
fn fk_cycle_applies_and_data_round_trips() {
    let mut h = Harness::new();
    let sql = "
        CREATE TABLE a (
            id integer PRIMARY KEY,
            b_id integer,
            CONSTRAINT fkb FOREIGN KEY (b_id) REFERENCES b(id)
        );
        CREATE TABLE b (
            id integer PRIMARY KEY,
            a_id integer,
            CONSTRAINT fka FOREIGN KEY (a_id) REFERENCES a(id)
        );
    ";
    h.apply(sql);

    h.execute("INSERT INTO a (id, b_id) VALUES (1, NULL)");
    h.execute("INSERT INTO b (id, a_id) VALUES (10, 1)");
    h.execute("UPDATE a SET b_id = 10 WHERE id = 1");
    assert_eq!(h.scalar("SELECT b_id FROM a WHERE id = 1"), 10);

    assert!(!h.plan(sql).has_changes(), "cycle should be idempotent");
}

#[test]
fn transactional_bucket_is_atomic() {
    let mut h = Harness::new();
    let plan = MigrationPlan {
        transactional: vec![
            "CREATE TABLE should_roll_back (id integer)".to_string(),
            "THIS IS NOT SQL".to_string(),
        ],
        deferred: vec![],
        concurrent: vec![],
        warnings: vec![],
    };
    let options = ExecuteOptions {
        auto_approve: true,
        lock: None,
    };
    let err = exec::apply(
        h.client.as_mut(),
        &h.provider,
        &plan,
        &options,
        &mut NoPrompt,
    )
    .unwrap_err();
    match err {
        schema_sync::Error::Migration { statement, .. } => {
            assert_eq!(statement, "THIS IS NOT SQL")
        }
        other => panic!("Expected Migration, got {:?}", other),
    }

    let count = h.scalar(
        "SELECT count(*) FROM sqlite_master WHERE name = 'should_roll_back'",
    );
    assert_eq!(count, 0, "earlier statement must have been rolled back");
}

#[test]
fn empty_schema_reconciles_everything_away() {
    let mut h = Harness::new();
    h.apply(
        "CREATE TABLE t (id integer PRIMARY KEY);
         CREATE VIEW v AS SELECT id FROM t;",
    );
    let plan = h.apply("");
    assert!(plan.statements().any(|s| s.starts_with("DROP TABLE")));
    assert!(plan.statements().any(|s| s.starts_with("DROP VIEW")));

    let remaining = h.scalar(
        "SELECT count(*) FROM sqlite_master WHERE name NOT LIKE 'sqlite_%'",
    );
    assert_eq!(remaining, 0);
}

#[test]
fn unique_constraint_change_rebuilds() {
    let mut h = Harness::new();
    h.apply(
        "CREATE TABLE t (id integer PRIMARY KEY, a text, b text,
            CONSTRAINT uq_ab UNIQUE (a, b));",
    );
    // Column order is significant: (b, a) is a different constraint.
    h.apply(
        "CREATE TABLE t (id integer PRIMARY KEY, a text, b text,
            CONSTRAINT uq_ab UNIQUE (b, a));",
    );
    assert!(!h
        .plan(
            "CREATE TABLE t (id integer PRIMARY KEY, a text, b text,
                CONSTRAINT uq_ab UNIQUE (b, a));"
        )
        .has_changes());
}

#[test]
fn view_change_drops_and_recreates() {
    let mut h = Harness::new();
    h.apply(
        "CREATE TABLE t (id integer PRIMARY KEY, x integer);
         CREATE VIEW v AS SELECT id FROM t;",
    );
    let plan = h.apply(
        "CREATE TABLE t (id integer PRIMARY KEY, x integer);
         CREATE VIEW v AS SELECT id, x FROM t;",
    );
    assert!(plan.transactional.iter().any(|s| s.starts_with("DROP VIEW")));
    assert!(plan
        .transactional
        .iter()
        .any(|s| s.starts_with("CREATE VIEW")));
    assert!(!h
        .plan(
            "CREATE TABLE t (id integer PRIMARY KEY, x integer);
             CREATE VIEW v AS SELECT id, x FROM t;"
        )
        .has_changes());
}
