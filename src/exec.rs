//! Plan execution.
//!
//! The transactional and deferred buckets run inside one transaction:
//! either every statement lands or none do. The concurrent tail runs
//! after commit, outside any transaction, and a failure there leaves the
//! database partially applied — the error carries the exact boundary.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::normalize;
use crate::plan::MigrationPlan;
use crate::provider::{DbClient, Feature, Provider};

/// Advisory-lock settings, enabled by the caller naming a lock.
#[derive(Debug, Clone)]
pub struct LockOptions {
    pub name: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub auto_approve: bool,
    pub lock: Option<LockOptions>,
}

/// What happened to the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every statement executed.
    Applied,
    /// The plan was empty; nothing to do.
    NoChanges,
    /// The confirmation prompt declined; nothing ran.
    Canceled,
}

/// Confirmation seam. The CLI implements this over stdin; tests script it.
pub trait ConfirmPrompt {
    /// Return `true` to proceed. Anything else cancels the apply with no
    /// statements run.
    fn confirm(&mut self, plan: &MigrationPlan) -> bool;
}

/// Auto-approve: never asks.
pub struct NoPrompt;

impl ConfirmPrompt for NoPrompt {
    fn confirm(&mut self, _plan: &MigrationPlan) -> bool {
        true
    }
}

const LOCK_BACKOFF_INITIAL: Duration = Duration::from_millis(100);
const LOCK_BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Apply a rendered plan over the given connection.
///
/// The connection is owned exclusively by this call for its duration.
pub fn apply(
    client: &mut dyn DbClient,
    provider: &dyn Provider,
    plan: &MigrationPlan,
    options: &ExecuteOptions,
    prompt: &mut dyn ConfirmPrompt,
) -> Result<ApplyOutcome> {
    if !plan.has_changes() {
        return Ok(ApplyOutcome::NoChanges);
    }

    if !options.auto_approve && !prompt.confirm(plan) {
        return Ok(ApplyOutcome::Canceled);
    }

    let lock_key = match &options.lock {
        Some(lock) if provider.supports(Feature::AdvisoryLocks) => {
            Some(acquire_lock(client, provider, lock)?)
        }
        Some(lock) => {
            warn!(
                "advisory lock {} requested but the backend does not support \
                 advisory locks; proceeding without serialization",
                lock.name
            );
            None
        }
        None => None,
    };

    let result = run_transaction(client, plan);
    if let Some(key) = lock_key {
        // Release even on failure; errors on release are logged, not
        // surfaced over the original outcome.
        if let Err(e) = provider.release_advisory_lock(client, key) {
            warn!("failed to release advisory lock: {}", e);
        }
    }
    result?;

    run_concurrent_tail(client, plan)?;
    Ok(ApplyOutcome::Applied)
}

/// Poll for the advisory lock with exponential backoff (100 ms initial,
/// 5 s cap) until the caller's timeout. The key is derived from the lock
/// name with in-process FNV-1a.
fn acquire_lock(
    client: &mut dyn DbClient,
    provider: &dyn Provider,
    lock: &LockOptions,
) -> Result<i64> {
    let key = normalize::advisory_lock_key(&lock.name);
    let deadline = Instant::now() + Duration::from_millis(lock.timeout_ms);
    let mut backoff = LOCK_BACKOFF_INITIAL;

    loop {
        if provider.try_advisory_lock(client, key)? {
            debug!("acquired advisory lock {} (key {})", lock.name, key);
            return Ok(key);
        }
        if Instant::now() + backoff > deadline {
            return Err(Error::LockTimeout {
                lock_name: lock.name.clone(),
                waited_ms: lock.timeout_ms,
            });
        }
        warn!(
            "advisory lock {} is held elsewhere; retrying in {:?}",
            lock.name, backoff
        );
        thread::sleep(backoff);
        backoff = (backoff * 2).min(LOCK_BACKOFF_CAP);
    }
}

fn run_transaction(client: &mut dyn DbClient, plan: &MigrationPlan) -> Result<()> {
    client.execute("BEGIN").map_err(|e| Error::Migration {
        statement: "BEGIN".to_string(),
        db: e,
    })?;

    for statement in plan.transactional.iter().chain(plan.deferred.iter()) {
        debug!("executing: {}", statement);
        if let Err(db) = client.execute(statement) {
            if let Err(rb) = client.execute("ROLLBACK") {
                warn!("rollback after failed statement also failed: {}", rb);
            }
            return Err(Error::Migration {
                statement: statement.clone(),
                db,
            });
        }
    }

    client.execute("COMMIT").map_err(|e| Error::Migration {
        statement: "COMMIT".to_string(),
        db: e,
    })
}

/// Concurrent statements run one at a time outside any transaction. On
/// failure, report what committed, what failed, and what never ran.
fn run_concurrent_tail(client: &mut dyn DbClient, plan: &MigrationPlan) -> Result<()> {
    for (i, statement) in plan.concurrent.iter().enumerate() {
        debug!("executing (non-transactional): {}", statement);
        if let Err(db) = client.execute(statement) {
            let mut succeeded: Vec<String> = plan
                .transactional
                .iter()
                .chain(plan.deferred.iter())
                .cloned()
                .collect();
            succeeded.extend(plan.concurrent[..i].iter().cloned());
            return Err(Error::PartiallyApplied {
                succeeded,
                failed: statement.clone(),
                db,
                skipped: plan.concurrent[i + 1..].to_vec(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::diff::edit::Edit;
    use crate::error::DbErrorInfo;
    use crate::provider::{Dialect, Row, SqlValue};

    /// Scripted client: records every statement, fails on command.
    struct FakeClient {
        executed: Vec<String>,
        fail_on: Option<String>,
        /// Lock results to hand out, front first.
        lock_results: Vec<bool>,
    }

    impl FakeClient {
        fn new() -> Self {
            Self {
                executed: Vec::new(),
                fail_on: None,
                lock_results: vec![true],
            }
        }

        fn failing_on(statement: &str) -> Self {
            Self {
                executed: Vec::new(),
                fail_on: Some(statement.to_string()),
                lock_results: vec![true],
            }
        }
    }

    impl DbClient for FakeClient {
        fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DbErrorInfo> {
            if sql.contains("try_advisory_lock") {
                let granted = if self.lock_results.is_empty() {
                    true
                } else {
                    self.lock_results.remove(0)
                };
                return Ok(vec![vec![SqlValue::Bool(granted)]]);
            }
            Ok(vec![])
        }

        fn execute(&mut self, sql: &str) -> std::result::Result<u64, DbErrorInfo> {
            if self.fail_on.as_deref() == Some(sql) {
                self.executed.push(format!("FAILED: {}", sql));
                return Err(DbErrorInfo {
                    code: Some("42601".to_string()),
                    message: "scripted failure".to_string(),
                    detail: None,
                    hint: None,
                    position: None,
                });
            }
            self.executed.push(sql.to_string());
            Ok(0)
        }

        fn close(self: Box<Self>) -> std::result::Result<(), DbErrorInfo> {
            Ok(())
        }
    }

    /// Minimal provider for executor tests: lock calls go through the
    /// client, everything else is unused.
    struct FakeProvider {
        advisory_locks: bool,
    }

    impl Provider for FakeProvider {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        fn supports(&self, feature: Feature) -> bool {
            match feature {
                Feature::AdvisoryLocks => self.advisory_locks,
                _ => true,
            }
        }

        fn validate_catalog(&self, _catalog: &Catalog) -> Vec<Error> {
            vec![]
        }

        fn render_edit(&self, _edit: &Edit, _desired: &Catalog) -> Result<Vec<String>> {
            Ok(vec![])
        }

        fn connect(&self, _url: &str) -> Result<Box<dyn DbClient>> {
            unimplemented!("executor tests inject a client directly")
        }

        fn introspect(
            &self,
            _client: &mut dyn DbClient,
            _schemas: &[String],
        ) -> Result<Catalog> {
            Ok(Catalog::empty())
        }

        fn try_advisory_lock(&self, client: &mut dyn DbClient, key: i64) -> Result<bool> {
            let rows = client
                .query(&format!("SELECT pg_try_advisory_lock({})", key))
                .map_err(|e| Error::Connection(e.message))?;
            Ok(rows[0][0].as_bool().unwrap())
        }

        fn release_advisory_lock(&self, client: &mut dyn DbClient, key: i64) -> Result<()> {
            client
                .execute(&format!("SELECT pg_advisory_unlock({})", key))
                .map_err(|e| Error::Connection(e.message))?;
            Ok(())
        }
    }

    fn plan(transactional: &[&str], deferred: &[&str], concurrent: &[&str]) -> MigrationPlan {
        MigrationPlan {
            transactional: transactional.iter().map(|s| s.to_string()).collect(),
            deferred: deferred.iter().map(|s| s.to_string()).collect(),
            concurrent: concurrent.iter().map(|s| s.to_string()).collect(),
            warnings: vec![],
        }
    }

    fn options() -> ExecuteOptions {
        ExecuteOptions {
            auto_approve: true,
            lock: None,
        }
    }

    #[test]
    fn test_transactional_and_deferred_share_one_transaction() {
        let mut client = FakeClient::new();
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["CREATE TABLE a (id int)"], &["ALTER TABLE a ADD x"], &[]);
        let outcome = apply(&mut client, &provider, &p, &options(), &mut NoPrompt).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(
            client.executed,
            vec![
                "BEGIN",
                "CREATE TABLE a (id int)",
                "ALTER TABLE a ADD x",
                "COMMIT",
            ]
        );
    }

    #[test]
    fn test_failure_rolls_back() {
        let mut client = FakeClient::failing_on("STMT2");
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["STMT1", "STMT2", "STMT3"], &[], &[]);
        let err = apply(&mut client, &provider, &p, &options(), &mut NoPrompt).unwrap_err();
        match err {
            Error::Migration { statement, db } => {
                assert_eq!(statement, "STMT2");
                assert_eq!(db.code.as_deref(), Some("42601"));
            }
            other => panic!("Expected Migration, got {:?}", other),
        }
        assert_eq!(
            client.executed,
            vec!["BEGIN", "STMT1", "FAILED: STMT2", "ROLLBACK"]
        );
    }

    #[test]
    fn test_concurrent_runs_after_commit() {
        let mut client = FakeClient::new();
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["T1"], &[], &["C1", "C2"]);
        apply(&mut client, &provider, &p, &options(), &mut NoPrompt).unwrap();
        assert_eq!(client.executed, vec!["BEGIN", "T1", "COMMIT", "C1", "C2"]);
    }

    #[test]
    fn test_concurrent_failure_reports_boundary() {
        let mut client = FakeClient::failing_on("C2");
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["T1"], &[], &["C1", "C2", "C3"]);
        let err = apply(&mut client, &provider, &p, &options(), &mut NoPrompt).unwrap_err();
        match err {
            Error::PartiallyApplied {
                succeeded,
                failed,
                skipped,
                ..
            } => {
                assert_eq!(succeeded, vec!["T1", "C1"]);
                assert_eq!(failed, "C2");
                assert_eq!(skipped, vec!["C3"]);
            }
            other => panic!("Expected PartiallyApplied, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_plan_is_no_changes() {
        let mut client = FakeClient::new();
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&[], &[], &[]);
        let outcome = apply(&mut client, &provider, &p, &options(), &mut NoPrompt).unwrap();
        assert_eq!(outcome, ApplyOutcome::NoChanges);
        assert!(client.executed.is_empty());
    }

    struct DenyPrompt;
    impl ConfirmPrompt for DenyPrompt {
        fn confirm(&mut self, _plan: &MigrationPlan) -> bool {
            false
        }
    }

    #[test]
    fn test_declined_confirmation_runs_nothing() {
        let mut client = FakeClient::new();
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["T1"], &[], &[]);
        let opts = ExecuteOptions {
            auto_approve: false,
            lock: None,
        };
        let outcome = apply(&mut client, &provider, &p, &opts, &mut DenyPrompt).unwrap();
        assert_eq!(outcome, ApplyOutcome::Canceled);
        assert!(client.executed.is_empty());
    }

    #[test]
    fn test_lock_acquired_and_released() {
        let mut client = FakeClient::new();
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["T1"], &[], &[]);
        let opts = ExecuteOptions {
            auto_approve: true,
            lock: Some(LockOptions {
                name: "deploy".to_string(),
                timeout_ms: 1000,
            }),
        };
        apply(&mut client, &provider, &p, &opts, &mut NoPrompt).unwrap();
        let key = crate::normalize::advisory_lock_key("deploy");
        assert!(client
            .executed
            .contains(&format!("SELECT pg_advisory_unlock({})", key)));
    }

    #[test]
    fn test_lock_retry_then_acquire() {
        let mut client = FakeClient::new();
        client.lock_results = vec![false, true];
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["T1"], &[], &[]);
        let opts = ExecuteOptions {
            auto_approve: true,
            lock: Some(LockOptions {
                name: "deploy".to_string(),
                timeout_ms: 5000,
            }),
        };
        let outcome = apply(&mut client, &provider, &p, &opts, &mut NoPrompt).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
    }

    #[test]
    fn test_lock_timeout() {
        let mut client = FakeClient::new();
        client.lock_results = vec![false; 100];
        let provider = FakeProvider {
            advisory_locks: true,
        };
        let p = plan(&["T1"], &[], &[]);
        let opts = ExecuteOptions {
            auto_approve: true,
            lock: Some(LockOptions {
                name: "deploy".to_string(),
                timeout_ms: 150,
            }),
        };
        let err = apply(&mut client, &provider, &p, &opts, &mut NoPrompt).unwrap_err();
        match err {
            Error::LockTimeout { lock_name, .. } => assert_eq!(lock_name, "deploy"),
            other => panic!("Expected LockTimeout, got {:?}", other),
        }
        // Nothing was applied.
        assert!(!client.executed.iter().any(|s| s == "BEGIN"));
    }

    #[test]
    fn test_lock_demoted_when_unsupported() {
        let mut client = FakeClient::new();
        let provider = FakeProvider {
            advisory_locks: false,
        };
        let p = plan(&["T1"], &[], &[]);
        let opts = ExecuteOptions {
            auto_approve: true,
            lock: Some(LockOptions {
                name: "deploy".to_string(),
                timeout_ms: 1000,
            }),
        };
        let outcome = apply(&mut client, &provider, &p, &opts, &mut NoPrompt).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(client.executed, vec!["BEGIN", "T1", "COMMIT"]);
    }
}
