use anyhow::Result;
use clap::{Parser, Subcommand};
use minireddit_backend::api;
use minireddit_backend::bootstrap;
use minireddit_backend::config::BoardConfig;
use minireddit_backend::consistency;
use minireddit_backend::telemetry;
use minireddit_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Minireddit discussion board backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Create the data directory and apply migrations
    Init {
        /// Create a demo user, community, post and comment if the store is empty
        #[arg(long)]
        seed: bool,
    },
    /// Delete the database file and initialize a fresh store
    Reset {
        #[arg(long)]
        seed: bool,
    },
    /// Print row counts, communities and recent posts
    Status,
    /// Compare cached counters with the ledger tables
    Check {
        /// Rewrite drifted counters from the ledgers
        #[arg(long)]
        repair: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();
    let config = BoardConfig::from_env()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let resources = bootstrap::initialize(&config, false)?;
            tracing::info!(
                db = %config.paths.db_path.display(),
                created = resources.database_initialized,
                port = config.api_port,
                "starting minireddit HTTP server"
            );
            api::serve_http(config, resources.database).await
        }
        Command::Init { seed } => {
            let resources = bootstrap::initialize(&config, seed)?;
            report_bootstrap(&config, &resources);
            Ok(())
        }
        Command::Reset { seed } => {
            let resources = bootstrap::reset(&config, seed)?;
            report_bootstrap(&config, &resources);
            Ok(())
        }
        Command::Status => {
            let resources = bootstrap::initialize(&config, false)?;
            let status = bootstrap::status(&resources.database)?;
            println!("Database: {}", config.paths.db_path.display());
            for (table, count) in &status.table_counts {
                println!("  {table:<24} {count}");
            }
            println!("Communities: {}", status.communities.join(", "));
            for (id, title) in &status.recent_posts {
                println!("  #{id} {title}");
            }
            Ok(())
        }
        Command::Check { repair } => {
            let resources = bootstrap::initialize(&config, false)?;
            let report = consistency::check(&resources.database)?;
            if report.is_clean() {
                println!("All counters match the ledgers.");
                return Ok(());
            }
            for drift in &report.drifts {
                println!(
                    "  {}.{} row {}: cached {} actual {}",
                    drift.table, drift.column, drift.row_id, drift.cached, drift.actual
                );
            }
            if repair {
                let fixed = consistency::reconcile(&resources.database)?;
                println!("Repaired {fixed} rows.");
            } else {
                println!("Run with --repair to rewrite drifted counters.");
            }
            Ok(())
        }
    }
}

fn report_bootstrap(config: &BoardConfig, resources: &bootstrap::BootstrapResources) {
    for dir in &resources.directories_created {
        tracing::info!(path = %dir, "created directory");
    }
    tracing::info!(
        db = %config.paths.db_path.display(),
        created = resources.database_initialized,
        "database ready"
    );
    if let Some(seed) = &resources.seeded {
        println!(
            "Seeded demo data: user #{} community #{} post #{}",
            seed.user_id, seed.community_id, seed.post_id
        );
    }
}
