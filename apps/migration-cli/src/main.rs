use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use db_infra::config::settings::database_target_from_env;
use db_infra::infra::db::{connect_database, LazyServerAdmin, SeaOrmEngine};
use db_infra::infra::process::TokioProcessRunner;
use db_infra::orchestrate::{
    dump_database, load_database, ConsolePrompter, LockFileToggle, SqlDumpOptions,
    SqlLoadOptions, SystemClock,
};
use db_infra::{SafeMigrate, SafeMigrateConfig, SafeMigrateError, SafeMigrateOptions};
use migration::Migrator;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn,sea_orm=warn,sea_orm_migration=warn";

#[derive(Parser)]
#[command(name = "safe-migrate")]
#[command(about = "Run MySQL schema migrations behind a full backup")]
struct Cli {
    /// Show migration errors with their full traces
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Back up, migrate, and restore the backup if anything went wrong
    Migrate(MigrateArgs),
    /// Export the database to a SQL file
    Dump(DumpArgs),
    /// Drop the database and load SQL files into it
    Load(LoadArgs),
}

#[derive(Args)]
struct MigrateArgs {
    /// Target version (defaults to the latest)
    version: Option<i64>,

    /// Backup file or directory, relative to the SQL directory
    #[arg(long)]
    target: Option<PathBuf>,

    /// Skip all confirmation prompts
    #[arg(long)]
    no_confirmation: bool,

    /// Keep the backup file after a successful run
    #[arg(long)]
    keep_backup: bool,

    /// Disable the environment while migrating
    #[arg(long)]
    disable_env: bool,

    /// Migrate, then always restore the backup
    #[arg(long)]
    dry_run: bool,

    /// Migrate one version up
    #[arg(long, conflicts_with = "down")]
    up: bool,

    /// Migrate one version down
    #[arg(long)]
    down: bool,

    #[arg(long, default_value = "dev")]
    env: String,
}

#[derive(Args)]
struct DumpArgs {
    /// Output file or directory, relative to the SQL directory
    target: Option<PathBuf>,

    /// Dump another database on the same server
    #[arg(long)]
    database: Option<String>,

    #[arg(long, default_value = "dev")]
    env: String,
}

#[derive(Args)]
struct LoadArgs {
    /// SQL files, or directories searched recursively for *.sql
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Load on top of the existing database instead of recreating it
    #[arg(long)]
    append: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    no_confirmation: bool,

    #[arg(long, default_value = "dev")]
    env: String,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, SafeMigrateError> {
    let config = SafeMigrateConfig::from_env()?;
    let target = database_target_from_env()?;
    let runner = TokioProcessRunner;

    match cli.command {
        Command::Migrate(args) => {
            let options = SafeMigrateOptions {
                version: args.version,
                target: args.target,
                no_confirmation: args.no_confirmation,
                keep_backup: args.keep_backup,
                disable_env: args.disable_env,
                dry_run: args.dry_run,
                up: args.up,
                down: args.down,
                env: args.env,
                verbose: cli.trace,
            };

            let conn = connect_database(&target).await?;
            let mut engine = SeaOrmEngine::<Migrator>::new(conn, target.clone());
            let admin = LazyServerAdmin::new(target.clone());

            let outcome = SafeMigrate {
                config: &config,
                runner: &runner,
                admin: &admin,
                prompter: &ConsolePrompter,
                env_toggle: &LockFileToggle::new(config.lock_dir.clone()),
                clock: &SystemClock,
            }
            .run(&mut engine, &options)
            .await?;

            Ok(outcome.exit_code())
        }
        Command::Dump(args) => {
            let options = SqlDumpOptions {
                target: args.target,
                database: args.database,
                env: args.env,
            };
            let path = dump_database(&config, &runner, &SystemClock, &target, &options).await?;
            info!("Wrote {}", path.display());
            Ok(0)
        }
        Command::Load(args) => {
            let options = SqlLoadOptions {
                paths: args.paths,
                append: args.append,
                no_confirmation: args.no_confirmation,
                env: args.env,
            };
            let admin = LazyServerAdmin::new(target.clone());
            load_database(&config, &runner, &admin, &ConsolePrompter, &target, &options).await?;
            Ok(0)
        }
    }
}

fn report(err: &SafeMigrateError) {
    eprintln!("❌ {err}");
}
