//! schema-sync CLI
//!
//! Entry point for the command-line tool.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use schema_sync::exec::{self, ConfirmPrompt, ExecuteOptions, LockOptions};
use schema_sync::output;
use schema_sync::plan::MigrationPlan;
use schema_sync::provider::Dialect;

#[derive(Parser, Debug)]
#[command(name = "schema-sync")]
#[command(about = "Declarative schema reconciliation for PostgreSQL and SQLite", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "schema-sync.toml")]
    config: PathBuf,

    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Target dialect (inferred from the URL when omitted)
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Managed schema (repeatable; first entry is the default schema)
    #[arg(long = "schemas")]
    schemas: Vec<String>,

    /// Advisory lock name (enables cross-process serialization)
    #[arg(long)]
    lock_name: Option<String>,

    /// Advisory lock acquisition timeout in milliseconds
    #[arg(long)]
    lock_timeout: Option<u64>,

    /// Output format for the plan (text, json)
    #[arg(long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute and print the migration plan without applying it
    Plan {
        /// Desired schema: a .sql file path or inline SQL
        schema: String,
    },
    /// Apply the migration plan to the database
    Apply {
        /// Desired schema: a .sql file path or inline SQL
        schema: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        auto_approve: bool,

        /// Compute and show the plan without executing anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        schema_sync::Config::from_file(&args.config).context("Failed to load configuration")?
    } else {
        schema_sync::Config::default()
    };

    let url = args
        .database_url
        .clone()
        .or(config.connection.url.clone())
        .context(
            "no database URL: pass --database-url, set DATABASE_URL, or configure connection.url",
        )?;

    let dialect = args
        .dialect
        .or(config.connection.dialect)
        .or_else(|| Dialect::from_url(&url))
        .context("could not infer the dialect from the URL; pass --dialect")?;

    let schemas = if args.schemas.is_empty() {
        config.schemas.managed.clone()
    } else {
        args.schemas.clone()
    };

    let lock = match (
        args.lock_name.clone().or(config.lock.name.clone()),
        args.lock_timeout,
    ) {
        (Some(name), timeout) => Some(LockOptions {
            name,
            timeout_ms: timeout.unwrap_or(config.lock.timeout_ms),
        }),
        (None, _) => None,
    };

    match &args.command {
        Command::Plan { schema } => {
            let plan = compute_plan(schema, dialect, &url, &schemas)?;
            print_plan(&plan, &args.format);
            Ok(())
        }
        Command::Apply {
            schema,
            auto_approve,
            dry_run,
        } => {
            let plan = compute_plan(schema, dialect, &url, &schemas)?;
            print_plan(&plan, &args.format);
            if *dry_run {
                return Ok(());
            }
            let provider = dialect.provider();
            let mut client = provider.connect(&url)?;
            let options = ExecuteOptions {
                auto_approve: *auto_approve || config.apply.auto_approve,
                lock,
            };
            let outcome = exec::apply(
                client.as_mut(),
                provider.as_ref(),
                &plan,
                &options,
                &mut StdinPrompt,
            )?;
            match outcome {
                exec::ApplyOutcome::Applied => {
                    println!("Applied {} statement(s).", plan.statement_count());
                }
                exec::ApplyOutcome::NoChanges => {}
                exec::ApplyOutcome::Canceled => {
                    bail!("apply canceled");
                }
            }
            Ok(())
        }
    }
}

fn compute_plan(
    schema_arg: &str,
    dialect: Dialect,
    url: &str,
    schemas: &[String],
) -> Result<MigrationPlan> {
    let sql = schema_sync::input::load_schema_source(schema_arg)
        .context("failed to load the desired schema")?;
    let decls = schema_sync::parse_sql(&sql)?;
    let desired =
        schema_sync::assemble(decls, schemas).context("failed to assemble the desired catalog")?;

    let provider = dialect.provider();
    let mut client = provider.connect(url)?;
    let current = provider.introspect(client.as_mut(), schemas)?;

    let plan = schema_sync::build_plan(&desired, &current, provider.as_ref())?;
    Ok(plan)
}

fn print_plan(plan: &MigrationPlan, format: &str) {
    match format {
        "json" => println!("{}", output::format_plan_json(plan)),
        _ => print!("{}", output::format_plan(plan)),
    }
}

/// Interactive confirmation over stdin. Anything other than `yes` or `y`
/// cancels.
struct StdinPrompt;

impl ConfirmPrompt for StdinPrompt {
    fn confirm(&mut self, _plan: &MigrationPlan) -> bool {
        print!("Apply these changes? [y/N]: ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}
