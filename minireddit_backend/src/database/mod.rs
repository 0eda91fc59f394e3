pub mod models;
pub mod repositories;

use crate::config::BoardPaths;
use anyhow::{anyhow, Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        email TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        karma INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS communities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL,
        display_name TEXT NOT NULL,
        description TEXT,
        owner_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        subscribers_count INTEGER NOT NULL DEFAULT 0 CHECK (subscribers_count >= 0),
        is_public INTEGER NOT NULL DEFAULT 1,
        FOREIGN KEY (owner_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS community_subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        community_id INTEGER NOT NULL,
        subscribed_at TEXT NOT NULL,
        UNIQUE (user_id, community_id),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (community_id) REFERENCES communities(id)
    );

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        community_id INTEGER,
        post_type TEXT NOT NULL DEFAULT 'text',
        upvotes INTEGER NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
        downvotes INTEGER NOT NULL DEFAULT 0 CHECK (downvotes >= 0),
        comments_count INTEGER NOT NULL DEFAULT 0 CHECK (comments_count >= 0),
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (community_id) REFERENCES communities(id)
    );

    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        post_id INTEGER NOT NULL,
        parent_id INTEGER,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (post_id) REFERENCES posts(id),
        FOREIGN KEY (parent_id) REFERENCES comments(id)
    );

    CREATE TABLE IF NOT EXISTS votes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        post_id INTEGER NOT NULL,
        vote_type TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
        UNIQUE (user_id, post_id),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (post_id) REFERENCES posts(id)
    );

    CREATE TABLE IF NOT EXISTS bookmarks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        post_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, post_id),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (post_id) REFERENCES posts(id)
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );
"#;

/// Indexes reference columns that older stores only gain through
/// `ensure_column`, so they run after the column checks.
const INDEXES: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_posts_community ON posts(community_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_votes_post ON votes(post_id);
    CREATE INDEX IF NOT EXISTS idx_bookmarks_user ON bookmarks(user_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_subscriptions_community ON community_subscriptions(community_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;

/// Columns that stores created by earlier schema revisions may lack.
const LATE_COLUMNS: &[(&str, &str, &str)] = &[
    ("users", "karma", "INTEGER NOT NULL DEFAULT 0"),
    ("posts", "community_id", "INTEGER REFERENCES communities(id)"),
    ("posts", "post_type", "TEXT NOT NULL DEFAULT 'text'"),
    ("posts", "comments_count", "INTEGER NOT NULL DEFAULT 0"),
    ("comments", "parent_id", "INTEGER REFERENCES comments(id)"),
];

/// Handle to the relational store.
///
/// A file-backed handle opens a fresh connection for every storage call and
/// closes it when the call returns, so no connection outlives a request. The
/// shared variant wraps a single connection (used for in-memory stores,
/// which cannot be reopened).
#[derive(Clone)]
pub struct Database {
    backing: Backing,
    newly_created: bool,
}

#[derive(Clone)]
enum Backing {
    File(PathBuf),
    Shared(Arc<Mutex<Connection>>),
}

impl Database {
    pub fn connect(paths: &BoardPaths) -> Result<Self> {
        Self::open_path(&paths.db_path)
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let newly_created = !path.exists();
        // Opening once up front surfaces permission/path errors at startup.
        open_session(&path)?;
        Ok(Self {
            backing: Backing::File(path),
            newly_created,
        })
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Result<Self> {
        register_functions(&conn)?;
        Ok(Self {
            backing: Backing::Shared(Arc::new(Mutex::new(conn))),
            newly_created,
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, true)
    }

    pub fn db_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path.as_path()),
            Backing::Shared(_) => None,
        }
    }

    /// Creates missing tables, columns and indexes. Never drops anything, so
    /// it is safe to run against an existing store on every start.
    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)
                .context("failed to apply base schema")?;
            for (table, column, ddl) in LATE_COLUMNS {
                ensure_column(conn, table, column, ddl)?;
            }
            conn.execute_batch(INDEXES)
                .context("failed to create indexes")?;
            Ok::<_, anyhow::Error>(())
        })?;
        Ok(self.newly_created)
    }

    /// Runs read-only work against a scoped storage session.
    pub fn with_repositories<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T, E>,
        E: From<anyhow::Error>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction. The write lock is
    /// taken up front so concurrent ledger mutations serialize in SQLite
    /// instead of racing on counter arithmetic. Commits only when `f`
    /// succeeds; any error rolls back every statement `f` issued.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T, E>,
        E: From<anyhow::Error>,
    {
        self.with_conn(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
                .context("failed to begin transaction")?;
            let value = f(repositories::SqliteRepositories::new(&tx))?;
            tx.commit().context("failed to commit transaction")?;
            Ok(value)
        })
    }

    fn with_conn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<anyhow::Error>,
    {
        match &self.backing {
            Backing::File(path) => {
                let conn = open_session(path)?;
                f(&conn)
            }
            Backing::Shared(shared) => {
                let guard = shared
                    .lock()
                    .map_err(|_| anyhow!("database mutex poisoned"))?;
                f(&guard)
            }
        }
    }
}

fn open_session(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    // Foreign key enforcement is per-connection in SQLite.
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    register_functions(&conn)?;
    Ok(conn)
}

/// Installs `fold_case(text)`, a Unicode-aware lowercase. SQLite's own
/// `lower()` and `LIKE` only fold ASCII letters.
pub(crate) fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
    .context("failed to register fold_case")?;
    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, column: &str, ddl: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut present = false;
    for row in rows {
        if row?.eq_ignore_ascii_case(column) {
            present = true;
            break;
        }
    }
    if !present {
        tracing::info!(table, column, "adding missing column");
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}"), [])
            .with_context(|| format!("failed to add {table}.{column}"))?;
    }
    Ok(())
}
