use crate::config::BoardConfig;
use crate::database::Database;
use crate::seed::{seed_demo_data, SeedSummary};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

const COUNTED_TABLES: &[&str] = &[
    "users",
    "communities",
    "community_subscriptions",
    "posts",
    "comments",
    "votes",
    "bookmarks",
    "sessions",
];

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub seeded: Option<SeedSummary>,
    pub database: Database,
}

pub fn initialize(config: &BoardConfig, seed: bool) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.base, &mut directories_created)?;
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)?;
    let database_initialized = database.ensure_migrations()?;

    let seeded = if seed {
        seed_demo_data(&database).context("failed to seed demo data")?
    } else {
        None
    };

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        seeded,
        database,
    })
}

/// Deletes the store (plus its WAL side files) and initializes a fresh one.
pub fn reset(config: &BoardConfig, seed: bool) -> Result<BootstrapResources> {
    let db_path = &config.paths.db_path;
    for suffix in ["", "-wal", "-shm"] {
        let mut candidate = db_path.clone().into_os_string();
        candidate.push(suffix);
        let candidate = Path::new(&candidate);
        if candidate.exists() {
            fs::remove_file(candidate)
                .with_context(|| format!("failed to remove {}", candidate.display()))?;
            tracing::info!(path = %candidate.display(), "removed database file");
        }
    }
    initialize(config, seed)
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub table_counts: Vec<(String, i64)>,
    pub communities: Vec<String>,
    pub recent_posts: Vec<(i64, String)>,
}

pub fn status(database: &Database) -> Result<StoreStatus> {
    database.with_repositories(|repos| {
        let conn = repos.conn();
        let mut table_counts = Vec::with_capacity(COUNTED_TABLES.len());
        for table in COUNTED_TABLES {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .with_context(|| format!("failed to count {table}"))?;
            table_counts.push((table.to_string(), count));
        }

        let mut stmt = conn.prepare("SELECT name FROM communities ORDER BY name")?;
        let communities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt =
            conn.prepare("SELECT id, title FROM posts ORDER BY created_at DESC, id DESC LIMIT 20")?;
        let recent_posts = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StoreStatus {
            table_counts,
            communities,
            recent_posts,
        })
    })
}

fn create_dir_if_missing(path: &Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}
